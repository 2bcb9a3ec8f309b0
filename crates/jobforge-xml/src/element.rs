//! A small owned XML element tree and its serialization.

use crate::{XmlError, XmlResult};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Append a child and return it for further building.
    pub fn push(&mut self, child: XmlElement) -> &mut XmlElement {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Append an empty child element.
    pub fn sub_element(&mut self, name: impl Into<String>) -> &mut XmlElement {
        self.push(XmlElement::new(name))
    }

    /// Append a child element holding only text.
    pub fn text_element(&mut self, name: impl Into<String>, text: impl Into<String>) -> &mut XmlElement {
        self.push(XmlElement::new(name).with_text(text))
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// The named child, created at the end when missing.
    pub fn child_or_insert(&mut self, name: &str) -> &mut XmlElement {
        match self.children.iter().position(|c| c.name == name) {
            Some(index) => &mut self.children[index],
            None => self.sub_element(name),
        }
    }

    /// Render as an indented UTF-8 document with an XML declaration.
    pub fn to_pretty_xml(&self) -> XmlResult<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(write_error)?;
        self.write(&mut writer)?;
        let mut out = writer.into_inner();
        out.push(b'\n');
        Ok(out)
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> XmlResult<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        let text = self.text.as_deref().filter(|t| !t.is_empty());
        if text.is_none() && self.children.is_empty() {
            return writer.write_event(Event::Empty(start)).map_err(write_error);
        }

        writer.write_event(Event::Start(start)).map_err(write_error)?;
        if let Some(text) = text {
            writer
                .write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))
                .map_err(write_error)?;
        }
        for child in &self.children {
            child.write(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(write_error)
    }
}

fn write_error(err: impl std::fmt::Display) -> XmlError {
    XmlError::Write(err.to_string())
}

/// The text of the `description` element directly under the root, if any.
pub fn extract_description(xml: &str) -> XmlResult<Option<String>> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut in_description = false;
    let mut description = String::new();

    loop {
        match reader.read_event().map_err(|e| XmlError::Read(e.to_string()))? {
            Event::Start(start) => {
                depth += 1;
                in_description = depth == 2 && start.name().as_ref() == b"description";
            }
            Event::Empty(start) if depth == 1 && start.name().as_ref() == b"description" => {
                return Ok(Some(String::new()));
            }
            Event::Text(text) if in_description => {
                let text = text.unescape().map_err(|e| XmlError::Read(e.to_string()))?;
                description.push_str(&text);
            }
            Event::CData(data) if in_description => {
                description.push_str(&String::from_utf8_lossy(&data));
            }
            Event::End(_) => {
                if in_description {
                    return Ok(Some(description));
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}
