use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::document::{Document, Node, NodeId};
use super::reader::XmlError;

const INDENT_WIDTH: usize = 2;

/// Pending work while walking the tree. `inline` marks nodes inside mixed
/// content, which are written without line breaks or indentation.
enum Step {
    Node { id: NodeId, depth: usize, inline: bool },
    End { id: NodeId, depth: usize, inline: bool },
}

pub(crate) fn serialize(doc: &Document) -> Result<String, XmlError> {
    let mut writer = Writer::new(Vec::new());

    if let Some(decl) = &doc.declaration {
        write(
            &mut writer,
            Event::Decl(BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                decl.standalone.as_deref(),
            )),
        )?;
    }
    if let Some(doctype) = &doc.doctype {
        break_line(&mut writer, 0);
        write(&mut writer, Event::DocType(BytesText::from_escaped(doctype.as_str())))?;
    }
    let top_level = doc.prolog.iter().chain(std::iter::once(&doc.root)).chain(&doc.epilog);
    for &id in top_level {
        write_tree(&mut writer, doc, id)?;
    }

    let mut xml =
        String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Write(e.to_string()))?;
    xml.push('\n');
    Ok(xml)
}

/// Writes one top-level node and everything below it. Uses an explicit stack
/// so nesting depth is bounded by memory only.
fn write_tree(writer: &mut Writer<Vec<u8>>, doc: &Document, top: NodeId) -> Result<(), XmlError> {
    let mut stack = vec![Step::Node {
        id: top,
        depth: 0,
        inline: false,
    }];

    while let Some(step) = stack.pop() {
        match step {
            Step::Node { id, depth, inline } => {
                if !inline {
                    break_line(writer, depth);
                }
                match doc.node(id) {
                    Node::Element(element) => {
                        let mut start = BytesStart::new(element.name.as_str());
                        for (key, value) in &element.attributes {
                            start.push_attribute((key.as_str(), value.as_str()));
                        }
                        if element.children.is_empty() {
                            write(writer, Event::Empty(start))?;
                            continue;
                        }
                        write(writer, Event::Start(start))?;

                        let mixed =
                            inline || element.children.iter().any(|&child| is_text(doc, child));
                        stack.push(Step::End {
                            id,
                            depth,
                            inline: mixed,
                        });
                        stack.extend(element.children.iter().rev().map(|&child| Step::Node {
                            id: child,
                            depth: depth + 1,
                            inline: mixed,
                        }));
                    }
                    Node::Text(text) => write(writer, Event::Text(BytesText::new(text)))?,
                    Node::CData(text) => {
                        write(writer, Event::CData(BytesCData::new(text.as_str())))?
                    }
                    Node::Comment(text) => {
                        write(writer, Event::Comment(BytesText::from_escaped(text.as_str())))?
                    }
                    Node::ProcessingInstruction(content) => {
                        write(writer, Event::PI(BytesPI::new(content.as_str())))?
                    }
                }
            }
            Step::End { id, depth, inline } => {
                if !inline {
                    break_line(writer, depth);
                }
                if let Some(element) = doc.element(id) {
                    write(writer, Event::End(BytesEnd::new(element.name.as_str())))?;
                }
            }
        }
    }
    Ok(())
}

fn is_text(doc: &Document, id: NodeId) -> bool {
    matches!(doc.node(id), Node::Text(_) | Node::CData(_))
}

fn break_line(writer: &mut Writer<Vec<u8>>, depth: usize) {
    let out = writer.get_mut();
    if !out.is_empty() {
        out.push(b'\n');
    }
    out.resize(out.len() + depth * INDENT_WIDTH, b' ');
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|e| XmlError::Write(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_prints_nested_elements() {
        let doc = Document::parse_str(r#"<a><b x="1"><c/></b></a>"#).unwrap();
        let xml = serialize(&doc).unwrap();
        assert_eq!(xml, "<a>\n  <b x=\"1\">\n    <c/>\n  </b>\n</a>\n");
    }

    #[test]
    fn test_escapes_attribute_values() {
        let doc = Document::parse_str(r#"<a CONTENT="&quot;R&amp;D&quot; &lt;1&gt;"/>"#).unwrap();
        let xml = serialize(&doc).unwrap();
        let reparsed = Document::parse_str(&xml).unwrap();
        let root = reparsed.element(reparsed.root()).unwrap();
        assert_eq!(root.attribute("CONTENT"), Some("\"R&D\" <1>"));
    }

    #[test]
    fn test_keeps_declaration_comments_and_text() {
        let source = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                      <!-- page 1 -->\n\
                      <a><b>some text</b><?render fast?></a>";
        let doc = Document::parse_str(source).unwrap();
        let xml = serialize(&doc).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<!-- page 1 -->"));
        assert!(xml.contains("<b>some text</b>"));
        assert!(xml.contains("<?render fast?>"));
    }

    #[test]
    fn test_serialization_is_stable() {
        let doc = Document::parse_str("<a>\n<b ID=\"1\">t</b>\n\n<c/></a>").unwrap();
        let first = serialize(&doc).unwrap();
        let second = serialize(&Document::parse_str(&first).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_whitespace_and_mixed_content_unchanged() {
        let doc = Document::parse_str(
            "<a>\n<fileName> </fileName>\n<p>a <b>x</b> <i>y</i></p>\n</a>",
        )
        .unwrap();
        let xml = serialize(&doc).unwrap();
        assert_eq!(
            xml,
            "<a>\n  <fileName> </fileName>\n  <p>a <b>x</b> <i>y</i></p>\n</a>\n"
        );
    }

    #[test]
    fn test_deeply_nested_document() {
        let depth = 100_000;
        let source = format!("{}{}", "<a>x".repeat(depth), "</a>".repeat(depth));
        let doc = Document::parse_str(&source).unwrap();
        let xml = serialize(&doc).unwrap();
        assert_eq!(xml, format!("{}\n", source));
    }
}
