use std::collections::HashMap;
#[cfg(test)]
use std::io::{Read, Seek};

use quick_xml::{
    NsReader,
    escape::{resolve_predefined_entity, unescape},
    events::{BytesStart, Event},
};
#[cfg(test)]
use zip::ZipArchive;

use crate::error::EpubError;

/// Dublin Core elements, written with the `dc:` prefix in the package document
pub static ELEMENT_IN_DC_NAMESPACE: std::sync::LazyLock<Vec<&str>> =
    std::sync::LazyLock::new(|| {
        vec![
            "contributor",
            "coverage",
            "creator",
            "date",
            "description",
            "format",
            "identifier",
            "language",
            "publisher",
            "relation",
            "rights",
            "source",
            "subject",
            "title",
            "type",
        ]
    });

/// Extracts the contents of a specified file from a ZIP archive
#[cfg(test)]
pub fn get_file_in_zip_archive<R: Read + Seek>(
    zip_file: &mut ZipArchive<R>,
    file_name: &str,
) -> Result<Vec<u8>, EpubError> {
    let mut buffer = Vec::<u8>::new();
    match zip_file.by_name(file_name) {
        Ok(mut file) => {
            let _ = file.read_to_end(&mut buffer).map_err(EpubError::from)?;
            Ok(buffer)
        }
        Err(err) => Err(EpubError::from(err)),
    }
}

/// Returns a short, single-line preview of a payload for diagnostics
///
/// Whitespace runs are collapsed and the result is cut after `max_chars`
/// characters, with "..." appended when something was cut.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let normalized = content.normalize_whitespace();
    if normalized.chars().count() <= max_chars {
        return normalized;
    }

    let mut cut = normalized.chars().take(max_chars).collect::<String>();
    cut.push_str("...");
    cut
}

/// Provides functionality to decode byte data into strings
///
/// Supports UTF-8 (with or without BOM), UTF-16 BE and UTF-16 LE.
///
/// ## Notes
/// - A byte stream lacking a BOM (Byte Order Mark) must be valid UTF-8.
pub trait DecodeBytes {
    fn decode(&self) -> Result<String, EpubError>;
}

impl DecodeBytes for Vec<u8> {
    fn decode(&self) -> Result<String, EpubError> {
        match self.as_slice() {
            [] => Err(EpubError::EmptyDataError),

            // UTF-8 BOM (0xEF, 0xBB, 0xBF)
            [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8(rest.to_vec()).map_err(EpubError::from),

            // UTF-16 BE BOM (0xFE, 0xFF)
            [0xFE, 0xFF, rest @ ..] => {
                let utf16_units: Vec<u16> = rest
                    .chunks_exact(2)
                    .map(|b| u16::from_be_bytes([b[0], b[1]]))
                    .collect();

                String::from_utf16(&utf16_units).map_err(EpubError::from)
            }

            // UTF-16 LE BOM (0xFF, 0xFE)
            [0xFF, 0xFE, rest @ ..] => {
                let utf16_units: Vec<u16> = rest
                    .chunks_exact(2)
                    .map(|b| u16::from_le_bytes([b[0], b[1]]))
                    .collect();

                String::from_utf16(&utf16_units).map_err(EpubError::from)
            }

            // E-utilities answers in UTF-8, invalid sequences are an error
            _ => String::from_utf8(self.to_vec()).map_err(EpubError::from),
        }
    }
}

/// Provides functionality for normalizing whitespace characters
///
/// Collapses every whitespace run into a single space and removes
/// leading and trailing whitespace.
pub trait NormalizeWhitespace {
    fn normalize_whitespace(&self) -> String;
}

impl NormalizeWhitespace for &str {
    fn normalize_whitespace(&self) -> String {
        self.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl NormalizeWhitespace for String {
    fn normalize_whitespace(&self) -> String {
        self.as_str().normalize_whitespace()
    }
}

/// A node of the element tree: either a nested element or a run of text
#[derive(Debug)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// Represents an element node in an XML document
///
/// Text and child elements are kept in document order, so mixed content
/// such as `The <italic>p53</italic> pathway` can be flattened faithfully.
#[derive(Debug)]
pub struct XmlElement {
    /// The local name of the element(excluding namespace prefix)
    pub name: String,

    /// The namespace prefix of the element
    pub prefix: Option<String>,

    /// The attributes of the element
    ///
    /// The key is the qualified attribute name (e.g. `xml:lang`),
    /// the value is the unescaped attribute value.
    pub attributes: HashMap<String, String>,

    /// Text runs and child elements in document order
    pub nodes: Vec<XmlNode>,
}

impl XmlElement {
    /// Create a new element
    pub fn new(name: String) -> Self {
        Self {
            name,
            prefix: None,
            attributes: HashMap::new(),
            nodes: Vec::new(),
        }
    }

    /// Get the full tag name of the element
    ///
    /// If the element has a namespace prefix, return "prefix:name" format;
    /// otherwise, return only the element name.
    pub fn tag_name(&self) -> String {
        if let Some(prefix) = &self.prefix {
            format!("{}:{}", prefix, self.name)
        } else {
            self.name.clone()
        }
    }

    /// Gets the text content of the element and all its descendants
    ///
    /// Text runs are concatenated in document order with the markup dropped;
    /// only the leading and trailing whitespace of the whole result is removed.
    pub fn text(&self) -> String {
        let mut result = String::new();
        self.collect_text(&mut result);
        result.trim().to_string()
    }

    fn collect_text(&self, result: &mut String) {
        for node in &self.nodes {
            match node {
                XmlNode::Text(text) => result.push_str(text),
                XmlNode::Element(child) => child.collect_text(result),
            }
        }
    }

    /// Returns the value of the specified attribute
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Find all descendant elements with the specified name, in document order
    pub fn find_elements_by_name(&self, name: &str) -> impl Iterator<Item = &XmlElement> {
        SearchElementsByNameIter::new(self, name)
    }

    /// Find the first descendant element with the specified name
    pub fn find_element_by_name(&self, name: &str) -> Option<&XmlElement> {
        self.find_elements_by_name(name).next()
    }

    /// Find all elements with the specified name among the child elements of the current element
    pub fn find_children_by_name(&self, name: &str) -> impl Iterator<Item = &XmlElement> {
        self.children().filter(move |child| child.name == name)
    }

    /// Get children elements
    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.nodes.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        // merge adjacent runs, references arrive as separate events
        if let Some(XmlNode::Text(last)) = self.nodes.last_mut() {
            last.push_str(text);
        } else {
            self.nodes.push(XmlNode::Text(text.to_string()));
        }
    }
}

struct SearchElementsByNameIter<'a> {
    elements: Vec<&'a XmlElement>,
    current_index: usize,
    target_name: String,
}

impl<'a> SearchElementsByNameIter<'a> {
    fn new(root: &'a XmlElement, name: &str) -> Self {
        let mut elements = Vec::new();
        for child in root.children() {
            Self::collect_elements(child, &mut elements);
        }
        Self {
            elements,
            current_index: 0,
            target_name: name.to_string(),
        }
    }

    fn collect_elements(element: &'a XmlElement, collection: &mut Vec<&'a XmlElement>) {
        collection.push(element);
        for child in element.children() {
            Self::collect_elements(child, collection);
        }
    }
}

impl<'a> Iterator for SearchElementsByNameIter<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        while self.current_index < self.elements.len() {
            let element = self.elements[self.current_index];
            self.current_index += 1;
            if element.name == self.target_name {
                return Some(element);
            }
        }
        None
    }
}

/// XML parser used to parse XML content and build an XML element tree
pub struct XmlReader {}

impl XmlReader {
    /// Parses an XML from string and builds the root element
    ///
    /// ## Parameters
    /// - `content`: The XML string to be parsed
    ///
    /// ## Return
    /// - `Ok(XmlElement)`: The root element of the XML element tree
    /// - `Err(EpubError)`: The content is empty, not well-formed, or has no single root element
    pub fn parse(content: &str) -> Result<XmlElement, EpubError> {
        if content.is_empty() {
            return Err(EpubError::EmptyDataError);
        }

        let mut reader = NsReader::from_str(content);
        reader.config_mut().trim_text(false);

        let mut buf = Vec::new();
        let mut stack = Vec::<XmlElement>::new();
        let mut root = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Eof) => break,

                Ok(Event::Start(e)) => {
                    stack.push(Self::make_element(&e));
                }

                Ok(Event::End(_)) => {
                    if let Some(element) = stack.pop() {
                        Self::attach(&mut stack, &mut root, element)?;
                    }
                }

                Ok(Event::Empty(e)) => {
                    let element = Self::make_element(&e);
                    Self::attach(&mut stack, &mut root, element)?;
                }

                Ok(Event::Text(e)) => {
                    if let Some(element) = stack.last_mut() {
                        element.push_text(&String::from_utf8_lossy(e.as_ref()));
                    } else if root.is_some() && !e.iter().all(u8::is_ascii_whitespace) {
                        return Err(EpubError::FailedParsingXml {
                            reason: "text after the root element".to_string(),
                        });
                    }
                }

                Ok(Event::CData(e)) => {
                    if let Some(element) = stack.last_mut() {
                        element.push_text(&String::from_utf8_lossy(e.as_ref()));
                    }
                }

                Ok(Event::GeneralRef(e)) => {
                    if let Some(element) = stack.last_mut() {
                        let name = String::from_utf8_lossy(&e);
                        element.push_text(&Self::resolve_reference(&name));
                    } else if root.is_some() {
                        return Err(EpubError::FailedParsingXml {
                            reason: "text after the root element".to_string(),
                        });
                    }
                }

                Err(err) => return Err(err.into()),

                // Ignore the following events (elements):
                // Comment, PI, Declaration, Doctype
                _ => {}
            }

            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(EpubError::FailedParsingXml {
                reason: format!("element <{}> is never closed", open.tag_name()),
            });
        }

        root.ok_or(EpubError::FailedParsingXml {
            reason: "no root element".to_string(),
        })
    }

    fn make_element(start: &BytesStart) -> XmlElement {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).to_string();
        let mut element = XmlElement::new(name);

        if let Some(prefix) = start.name().prefix() {
            element.prefix = Some(String::from_utf8_lossy(prefix.as_ref()).to_string());
        }

        for attr in start.attributes().flatten() {
            let attr_key = String::from_utf8_lossy(attr.key.as_ref()).to_string();

            // namespace declarations are not attributes of the document model
            if attr_key == "xmlns" || attr_key.starts_with("xmlns:") {
                continue;
            }

            let raw_value = String::from_utf8_lossy(&attr.value).to_string();
            let attr_value = match unescape(&raw_value) {
                Ok(value) => value.into_owned(),
                Err(_) => raw_value,
            };

            element.attributes.insert(attr_key, attr_value);
        }

        element
    }

    /// Hands a finished element to its parent, or makes it the root
    fn attach(
        stack: &mut [XmlElement],
        root: &mut Option<XmlElement>,
        element: XmlElement,
    ) -> Result<(), EpubError> {
        if let Some(parent) = stack.last_mut() {
            parent.nodes.push(XmlNode::Element(element));
            return Ok(());
        }

        if root.is_some() {
            return Err(EpubError::FailedParsingXml {
                reason: format!("second root element <{}>", element.tag_name()),
            });
        }

        *root = Some(element);
        Ok(())
    }

    /// Resolves a character or predefined entity reference
    ///
    /// Entities declared in an external DTD are unknown here and
    /// are kept verbatim, e.g. `&nbsp;`.
    fn resolve_reference(name: &str) -> String {
        if let Some(number) = name.strip_prefix('#') {
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => number.parse::<u32>().ok(),
            };

            if let Some(ch) = code.and_then(char::from_u32) {
                return ch.to_string();
            }
        } else if let Some(value) = resolve_predefined_entity(name) {
            return value.to_string();
        }

        format!("&{};", name)
    }
}
