//! Minimal owned XML tree used for reading and rewriting ALTO files.
//!
//! Parsing and writing go through `quick-xml`; the tree itself is an arena so
//! that queries can return plain [`NodeId`] handles which stay valid while the
//! document is being mutated.

mod document;
mod reader;
mod writer;

pub use document::{Declaration, Document, Element, Node, NodeId};
pub use reader::XmlError;
