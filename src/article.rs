//! Article document and metadata extraction
//!
//! [ArticleXml] is the parsed JATS document handed from the resolver to the
//! assembler. [ArticleMetadata] is the small view over it that the EPUB
//! package needs: language, DOI, authors and title. Every field is optional
//! in the source; a missing element never fails extraction.

use crate::{
    error::EpubError,
    utils::{XmlElement, XmlReader},
};

/// Language used when the document does not declare one
pub const DEFAULT_LANGUAGE: &str = "en";

/// A parsed full-text article document
///
/// Read-only: the assembler only queries attributes, descendants and text.
#[derive(Debug)]
pub struct ArticleXml {
    root: XmlElement,
}

impl ArticleXml {
    /// Parse a document from a string
    pub fn parse(content: &str) -> Result<Self, EpubError> {
        Ok(Self {
            root: XmlReader::parse(content)?,
        })
    }

    /// The document (root) element
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// The `article` element: the root itself, or the first one inside
    /// an efetch `pmc-articleset` wrapper
    pub fn article(&self) -> Option<&XmlElement> {
        if self.root.name == "article" {
            return Some(&self.root);
        }
        self.root.find_element_by_name("article")
    }
}

/// Metadata extracted from an article, built once per conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleMetadata {
    /// ISO language code, `"en"` unless declared
    pub language: String,

    /// The DOI, used as package identifier
    pub identifier: Option<String>,

    /// Author display names, `"Surname, GivenNames"`, in document order
    pub authors: Vec<String>,

    /// Plain-text title with inline markup stripped
    pub title: Option<String>,
}

impl ArticleMetadata {
    pub fn extract(doc: &ArticleXml) -> Self {
        Self {
            language: extract_language(doc),
            identifier: extract_identifier(doc.root()),
            authors: extract_authors(doc.root()),
            title: extract_title(doc.root()),
        }
    }

    /// All author names joined into the single creator value
    pub fn author_line(&self) -> Option<String> {
        if self.authors.is_empty() {
            None
        } else {
            Some(self.authors.join("; "))
        }
    }
}

fn extract_language(doc: &ArticleXml) -> String {
    doc.root()
        .get_attr("xml:lang")
        .or_else(|| doc.article().and_then(|article| article.get_attr("xml:lang")))
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_string()
}

fn extract_identifier(root: &XmlElement) -> Option<String> {
    root.find_elements_by_name("article-id")
        .find(|id| id.get_attr("pub-id-type") == Some("doi"))
        .map(XmlElement::text)
        .filter(|doi| !doi.is_empty())
}

/// Authors of the first contributor group
///
/// Contributors lacking either a surname or given names are skipped.
fn extract_authors(root: &XmlElement) -> Vec<String> {
    let Some(group) = root.find_element_by_name("contrib-group") else {
        return vec![];
    };

    group
        .find_elements_by_name("contrib")
        .filter(|contrib| contrib.get_attr("contrib-type") == Some("author"))
        .filter_map(|contrib| {
            let surname = name_part(contrib, "surname")?;
            let given_names = name_part(contrib, "given-names")?;
            Some(format!("{}, {}", surname, given_names))
        })
        .collect()
}

fn name_part(contrib: &XmlElement, part: &str) -> Option<String> {
    contrib
        .find_element_by_name(part)
        .map(XmlElement::text)
        .filter(|text| !text.is_empty())
}

fn extract_title(root: &XmlElement) -> Option<String> {
    root.find_element_by_name("article-title")
        .map(XmlElement::text)
        .filter(|title| !title.is_empty())
}
