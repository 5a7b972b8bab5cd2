use encoding_rs::UTF_8;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::document::{Declaration, Document, Element, Node, NodeId};

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("{message} (at byte {position})")]
    Syntax { position: u64, message: String },

    #[error("document has no root element")]
    MissingRoot,

    #[error("unexpected content outside the root element (at byte {0})")]
    OutsideRoot(u64),

    #[error("element <{0}> is never closed")]
    Unclosed(String),

    #[error("{0}")]
    Encoding(String),

    #[error("failed to serialize document: {0}")]
    Write(String),
}

#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<Node>,
    open: Vec<NodeId>,
    root: Option<NodeId>,
    prolog: Vec<NodeId>,
    epilog: Vec<NodeId>,
    declaration: Option<Declaration>,
    doctype: Option<String>,
}

impl TreeBuilder {
    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn attach(&mut self, id: NodeId) {
        if let Some(&parent) = self.open.last() {
            if let Node::Element(element) = &mut self.nodes[id.0] {
                element.parent = Some(parent);
            }
            if let Node::Element(parent_element) = &mut self.nodes[parent.0] {
                parent_element.children.push(id);
            }
        }
    }

    fn open_element(&mut self, element: Element, position: u64) -> Result<NodeId, XmlError> {
        if self.open.is_empty() && self.root.is_some() {
            return Err(XmlError::OutsideRoot(position));
        }
        let id = self.push(Node::Element(element));
        self.attach(id);
        if self.open.is_empty() {
            self.root = Some(id);
        }
        self.open.push(id);
        Ok(id)
    }

    fn close_element(&mut self, position: u64) -> Result<(), XmlError> {
        let id = self.open.pop().ok_or(XmlError::Syntax {
            position,
            message: "closing tag without matching opening tag".to_string(),
        })?;
        self.drop_indentation(id);
        Ok(())
    }

    /// Removes blank text between child elements. Elements holding real text,
    /// or nothing but text, keep every character.
    fn drop_indentation(&mut self, id: NodeId) {
        let Node::Element(element) = &self.nodes[id.0] else {
            return;
        };
        let nodes = &self.nodes;
        let has_text = element.children.iter().any(|&child| match &nodes[child.0] {
            Node::Text(text) => !is_blank(text),
            Node::CData(_) => true,
            _ => false,
        });
        let text_only = element
            .children
            .iter()
            .all(|&child| matches!(nodes[child.0], Node::Text(_)));
        if has_text || text_only {
            return;
        }

        let children: Vec<NodeId> = element
            .children
            .iter()
            .copied()
            .filter(|&child| !matches!(&nodes[child.0], Node::Text(text) if is_blank(text)))
            .collect();
        if let Node::Element(element) = &mut self.nodes[id.0] {
            element.children = children;
        }
    }

    /// Text and CDATA are only valid inside the root element.
    fn content(&mut self, node: Node, position: u64) -> Result<(), XmlError> {
        if self.open.is_empty() {
            return Err(XmlError::OutsideRoot(position));
        }
        let id = self.push(node);
        self.attach(id);
        Ok(())
    }

    /// Comments and processing instructions may also appear around the root.
    fn misc(&mut self, node: Node) {
        let id = self.push(node);
        if !self.open.is_empty() {
            self.attach(id);
        } else if self.root.is_none() {
            self.prolog.push(id);
        } else {
            self.epilog.push(id);
        }
    }

    fn finish(self) -> Result<Document, XmlError> {
        if let Some(&unclosed) = self.open.last() {
            let name = match &self.nodes[unclosed.0] {
                Node::Element(element) => element.name.clone(),
                _ => String::new(),
            };
            return Err(XmlError::Unclosed(name));
        }
        let root = self.root.ok_or(XmlError::MissingRoot)?;
        Ok(Document {
            nodes: self.nodes,
            root,
            declaration: self.declaration,
            doctype: self.doctype,
            prolog: self.prolog,
            epilog: self.epilog,
            encoding: UTF_8,
        })
    }
}

pub(crate) fn parse(content: &str) -> Result<Document, XmlError> {
    let mut reader = Reader::from_str(content);
    let mut builder = TreeBuilder::default();

    loop {
        let position = reader.buffer_position() as u64;
        let syntax = |message: String| XmlError::Syntax { position, message };

        let event = reader.read_event().map_err(|e| syntax(e.to_string()))?;
        match event {
            Event::Start(start) => {
                let element = element_from(&start).map_err(syntax)?;
                builder.open_element(element, position)?;
            }
            Event::Empty(start) => {
                let element = element_from(&start).map_err(syntax)?;
                builder.open_element(element, position)?;
                builder.close_element(position)?;
            }
            Event::End(_) => builder.close_element(position)?,
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| syntax(e.to_string()))?;
                // Line breaks around the root are not content.
                if !(builder.open.is_empty() && is_blank(&text)) {
                    builder.content(Node::Text(text.into_owned()), position)?;
                }
            }
            Event::CData(cdata) => {
                let text = String::from_utf8_lossy(&cdata).into_owned();
                builder.content(Node::CData(text), position)?;
            }
            Event::Comment(comment) => {
                builder.misc(Node::Comment(String::from_utf8_lossy(&comment).into_owned()));
            }
            Event::PI(pi) => {
                builder.misc(Node::ProcessingInstruction(
                    String::from_utf8_lossy(&pi).into_owned(),
                ));
            }
            Event::Decl(decl) => {
                let version = decl.version().map_err(|e| syntax(e.to_string()))?;
                let encoding = match decl.encoding() {
                    Some(encoding) => Some(encoding.map_err(|e| syntax(e.to_string()))?),
                    None => None,
                };
                let standalone = match decl.standalone() {
                    Some(standalone) => Some(standalone.map_err(|e| syntax(e.to_string()))?),
                    None => None,
                };
                builder.declaration = Some(Declaration {
                    version: String::from_utf8_lossy(&version).into_owned(),
                    encoding: encoding.map(|e| String::from_utf8_lossy(&e).into_owned()),
                    standalone: standalone.map(|s| String::from_utf8_lossy(&s).into_owned()),
                });
            }
            Event::DocType(doctype) => {
                builder.doctype = Some(String::from_utf8_lossy(&doctype).trim().to_string());
            }
            Event::Eof => break,
        }
    }

    builder.finish()
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

fn element_from(start: &BytesStart) -> Result<Element, String> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(|e| e.to_string())?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}
