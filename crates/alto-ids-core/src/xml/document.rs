use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::reader::{self, XmlError};
use super::writer;

/// Index of a node inside its owning [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(super) usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written in the source, e.g. `alto:TextBlock`.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
}

/// Parsed XML document. Prolog and epilog hold the comments and processing
/// instructions found outside the root element. `encoding` is the charset the
/// document is written back in.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) declaration: Option<Declaration>,
    pub(crate) doctype: Option<String>,
    pub(crate) prolog: Vec<NodeId>,
    pub(crate) epilog: Vec<NodeId>,
    pub(crate) encoding: &'static Encoding,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    /// Tag name with any namespace prefix removed.
    pub fn local_name(&self) -> &str {
        match self.name.rsplit_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|(key, _)| key == name)
    }

    /// Replaces the value in place if present, otherwise appends it.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }
}

impl Document {
    pub fn parse_str(content: &str) -> Result<Self, XmlError> {
        reader::parse(content)
    }

    /// Decodes raw file content before parsing it. A byte order mark wins over
    /// the `encoding` declared in the XML declaration; without either the
    /// content must be UTF-8.
    ///
    /// Documents read as UTF-16 are written back as UTF-8, with the
    /// declaration updated to match.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XmlError> {
        let (encoding, body) = match Encoding::for_bom(bytes) {
            Some((encoding, bom_length)) => (encoding, &bytes[bom_length..]),
            None => (declared_encoding(bytes)?, bytes),
        };
        let content = encoding
            .decode_without_bom_handling_and_without_replacement(body)
            .ok_or_else(|| {
                XmlError::Encoding(format!("content is not valid {}", encoding.name()))
            })?;

        let mut doc = reader::parse(&content)?;
        doc.encoding = encoding.output_encoding();
        if doc.encoding != encoding {
            if let Some(decl) = &mut doc.declaration {
                decl.encoding = Some(doc.encoding.name().to_string());
            }
        }
        Ok(doc)
    }

    /// Reads and parses a file. IO failures and malformed or undecodable XML
    /// are reported as distinct [`crate::Error`] variants.
    pub fn from_path(path: &Path) -> Result<Self, crate::Error> {
        let bytes = std::fs::read(path).map_err(|e| crate::Error::io(path, e))?;
        Self::from_bytes(&bytes).map_err(|e| crate::Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        writer::serialize(self)
    }

    /// Pretty-prints the document over `path` in its original encoding,
    /// replacing the file's contents.
    pub fn write_to_path(&self, path: &Path) -> Result<(), crate::Error> {
        let xml = self
            .to_xml_string()
            .map_err(|e| crate::Error::io(path, std::io::Error::other(e.to_string())))?;
        let (bytes, _, unmappable) = self.encoding.encode(&xml);
        if unmappable {
            return Err(crate::Error::io(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("document contains characters outside {}", self.encoding.name()),
                ),
            ));
        }
        std::fs::write(path, bytes).map_err(|e| crate::Error::io(path, e))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn declaration(&self) -> Option<&Declaration> {
        self.declaration.as_ref()
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0] {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0] {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    /// All elements below and including the root, in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            doc: self,
            stack: vec![self.root],
        }
    }
}

/// Charset named by the XML declaration, UTF-8 when there is none.
fn declared_encoding(bytes: &[u8]) -> Result<&'static Encoding, XmlError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let label = match reader.read_event_into(&mut buf) {
        Ok(Event::Decl(decl)) => match decl.encoding() {
            Some(Ok(label)) => label.into_owned(),
            _ => return Ok(UTF_8),
        },
        // Anything else is left for the parser to accept or reject.
        _ => return Ok(UTF_8),
    };
    Encoding::for_label(&label).ok_or_else(|| {
        XmlError::Encoding(format!(
            "unsupported encoding {:?}",
            String::from_utf8_lossy(&label)
        ))
    })
}

/// Pre-order traversal over element nodes.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = (NodeId, &'a Element);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Some(element) = self.doc.element(id) {
                self.stack.extend(element.children.iter().rev().copied());
                return Some((id, element));
            }
        }
        None
    }
}
