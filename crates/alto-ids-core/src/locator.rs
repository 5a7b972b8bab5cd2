//! Namespace-agnostic lookup of the ALTO elements that carry identifiers.
//!
//! A `TextBlock` is matched on its local name alone. A `TextLine` only counts
//! when its parent is a block, and a `String` only when its parent is such a
//! line.

use crate::xml::{Document, Element, NodeId};

pub const ID_ATTRIBUTE: &str = "ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Block,
    Line,
    Word,
}

impl Role {
    /// Processing order within one document.
    pub const ALL: [Role; 3] = [Role::Block, Role::Line, Role::Word];

    pub fn local_name(self) -> &'static str {
        match self {
            Role::Block => "TextBlock",
            Role::Line => "TextLine",
            Role::Word => "String",
        }
    }
}

/// Structural elements of one document, each list in document order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Located {
    pub blocks: Vec<NodeId>,
    pub lines: Vec<NodeId>,
    pub words: Vec<NodeId>,
}

impl Located {
    pub fn of(&self, role: Role) -> &[NodeId] {
        match role {
            Role::Block => &self.blocks,
            Role::Line => &self.lines,
            Role::Word => &self.words,
        }
    }
}

pub fn locate(doc: &Document) -> Located {
    let mut located = Located::default();
    for (id, element) in doc.descendants() {
        match classify(doc, element) {
            Some(Role::Block) => located.blocks.push(id),
            Some(Role::Line) => located.lines.push(id),
            Some(Role::Word) => located.words.push(id),
            None => {}
        }
    }
    located
}

/// Elements of a single role, in document order.
pub fn locate_role(doc: &Document, role: Role) -> Vec<NodeId> {
    doc.descendants()
        .filter(|(_, element)| classify(doc, element) == Some(role))
        .map(|(id, _)| id)
        .collect()
}

pub fn classify(doc: &Document, element: &Element) -> Option<Role> {
    let role = Role::ALL
        .into_iter()
        .find(|role| role.local_name() == element.local_name())?;
    let parent_role = match role {
        Role::Block => return Some(role),
        Role::Line => Role::Block,
        Role::Word => Role::Line,
    };
    let parent = element.parent.and_then(|parent| doc.element(parent))?;
    (classify(doc, parent) == Some(parent_role)).then_some(role)
}
