//! Minimal ordered XML tree for KML documents

use crate::types::KmzResult;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

/// Child of an element
#[derive(Debug, Clone, PartialEq)]
pub enum KmlNode {
    Element(KmlElement),
    Text(String),
    CData(String),
}

/// Named element with ordered attributes and children
#[derive(Debug, Clone, PartialEq)]
pub struct KmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<KmlNode>,
}

impl KmlElement {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// `<name>text</name>`
    pub fn with_text(name: &str, text: impl Into<String>) -> Self {
        Self::new(name).child_node(KmlNode::Text(text.into()))
    }

    pub fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.push((key.to_string(), value.into()));
        self
    }

    pub fn child(self, element: KmlElement) -> Self {
        self.child_node(KmlNode::Element(element))
    }

    pub fn child_node(mut self, node: KmlNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn push(&mut self, element: KmlElement) {
        self.children.push(KmlNode::Element(element));
    }

    /// Child elements in document order
    pub fn elements(&self) -> impl Iterator<Item = &KmlElement> {
        self.children.iter().filter_map(|n| match n {
            KmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Pretty-printed UTF-8 document with an XML declaration
    pub fn to_xml_string(&self) -> KmzResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.write_to(&mut writer)?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> KmzResult<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attributes {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            match child {
                KmlNode::Element(e) => e.write_to(writer)?,
                KmlNode::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
                KmlNode::CData(t) => {
                    // "]]>" cannot appear inside a single section
                    let parts: Vec<&str> = t.split("]]>").collect();
                    let last = parts.len() - 1;
                    for (i, part) in parts.iter().enumerate() {
                        let mut section = String::new();
                        if i > 0 {
                            section.push('>');
                        }
                        section.push_str(part);
                        if i < last {
                            section.push_str("]]");
                        }
                        writer.write_event(Event::CData(BytesCData::new(section)))?;
                    }
                }
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}
