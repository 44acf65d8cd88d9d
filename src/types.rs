use std::fmt;

use crate::error::{EpubBuilderError, EpubError, ResolutionError};

/// The identifier a resolution starts from
///
/// Exactly one kind of identifier is supplied per resolution request. The
/// chain only ever moves forward from the entry point:
/// DOI -> PMID -> PMCID -> full-text XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleIdentifier {
    /// Digital Object Identifier, free text such as `10.3390/biom13020339`
    Doi(String),

    /// PubMed identifier, expected to be all digits
    Pmid(String),

    /// PubMed Central identifier, with or without the `PMC` prefix
    Pmcid(String),
}

impl ArticleIdentifier {
    /// Builds an identifier from option-style inputs
    ///
    /// Exactly one of the three values must be supplied and it must not be
    /// blank. Anything else is a caller error, reported as
    /// [ResolutionError::InvalidArgument] without touching the network.
    pub fn from_options(
        doi: Option<&str>,
        pmid: Option<&str>,
        pmcid: Option<&str>,
    ) -> Result<Self, ResolutionError> {
        let identifier = match (doi, pmid, pmcid) {
            (Some(doi), None, None) => ArticleIdentifier::Doi(doi.to_string()),
            (None, Some(pmid), None) => ArticleIdentifier::Pmid(pmid.to_string()),
            (None, None, Some(pmcid)) => ArticleIdentifier::Pmcid(pmcid.to_string()),
            _ => {
                let supplied = [doi, pmid, pmcid].iter().filter(|v| v.is_some()).count();
                return Err(ResolutionError::InvalidArgument {
                    reason: format!(
                        "exactly one of doi, pmid or pmcid must be supplied, got {}",
                        supplied
                    ),
                });
            }
        };

        identifier.ensure_not_blank()?;
        Ok(identifier)
    }

    /// Short lowercase name of the identifier kind
    pub fn kind(&self) -> &'static str {
        match self {
            ArticleIdentifier::Doi(_) => "doi",
            ArticleIdentifier::Pmid(_) => "pmid",
            ArticleIdentifier::Pmcid(_) => "pmcid",
        }
    }

    /// The raw value as supplied by the caller
    pub fn value(&self) -> &str {
        match self {
            ArticleIdentifier::Doi(value)
            | ArticleIdentifier::Pmid(value)
            | ArticleIdentifier::Pmcid(value) => value,
        }
    }

    pub(crate) fn ensure_not_blank(&self) -> Result<(), ResolutionError> {
        if self.value().trim().is_empty() {
            return Err(ResolutionError::InvalidArgument {
                reason: format!("the supplied {} is empty", self.kind()),
            });
        }

        Ok(())
    }
}

impl fmt::Display for ArticleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArticleIdentifier::Doi(value) => write!(f, "DOI {}", value),
            ArticleIdentifier::Pmid(value) => write!(f, "PMID {}", value),
            ArticleIdentifier::Pmcid(value) => write!(f, "PMCID {}", value),
        }
    }
}

/// Represents a metadata item in the EPUB publication
///
/// Metadata items contain information about the publication such as title,
/// author, identifier and language. Properties listed in the Dublin Core
/// namespace are written as `dc:*` elements, everything else as `meta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataItem {
    /// Optional unique identifier for this metadata item
    ///
    /// The package identifier must carry the id `pub-id`, which the
    /// `unique-identifier` attribute of the package document points to.
    pub id: Option<String>,

    /// The metadata property name, e.g. "title", "creator", "language"
    pub property: String,

    /// The metadata value
    pub value: String,
}

impl MetadataItem {
    pub fn new(property: &str, value: &str) -> Self {
        Self {
            id: None,
            property: property.to_string(),
            value: value.to_string(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Attributes written on the metadata element
    pub fn attributes(&self) -> Vec<(&str, &str)> {
        let mut attributes = Vec::new();
        if let Some(id) = &self.id {
            attributes.push(("id", id.as_str()));
        }
        attributes
    }
}

/// Represents a resource item declared in the EPUB manifest
///
/// Every resource written into the container is declared here, with its
/// location relative to the package document and its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    /// The unique id other parts of the package refer to
    pub id: String,

    /// The path of the resource relative to the package document
    pub path: String,

    /// The media type of the resource
    pub mime: String,

    /// Optional space-separated properties, e.g. "cover-image"
    pub properties: Option<String>,
}

impl ManifestItem {
    /// Create a new manifest item
    ///
    /// The path must stay inside the package directory: absolute paths and
    /// paths starting with "../" are rejected.
    pub fn new(id: &str, path: &str) -> Result<Self, EpubError> {
        if path.starts_with('/') || path.starts_with("../") {
            return Err(EpubBuilderError::IllegalManifestPath {
                manifest_id: id.to_string(),
            }
            .into());
        }

        Ok(Self {
            id: id.to_string(),
            path: path.to_string(),
            mime: String::new(),
            properties: None,
        })
    }

    pub fn set_mime(mut self, mime: &str) -> Self {
        self.mime = mime.to_string();
        self
    }

    pub fn append_property(mut self, property: &str) -> Self {
        self.properties = match self.properties {
            Some(properties) => Some(format!("{} {}", properties, property)),
            None => Some(property.to_string()),
        };
        self
    }

    /// Returns true if the space-separated properties contain `property`
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|properties| properties.split_whitespace().any(|p| p == property))
    }

    /// Attributes written on the manifest `item` element
    pub fn attributes(&self) -> Vec<(&str, &str)> {
        let mut attributes = vec![
            ("id", self.id.as_str()),
            ("href", self.path.as_str()),
            ("media-type", self.mime.as_str()),
        ];
        if let Some(properties) = &self.properties {
            attributes.push(("properties", properties.as_str()));
        }
        attributes
    }
}

/// Represents an item in the EPUB spine, defining the reading order of the publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    /// The ID reference to a manifest item
    pub idref: String,
}

impl SpineItem {
    pub fn new(idref: &str) -> Self {
        Self {
            idref: idref.to_string(),
        }
    }

    /// Attributes written on the spine `itemref` element
    pub fn attributes(&self) -> Vec<(&str, &str)> {
        vec![("idref", self.idref.as_str())]
    }
}

/// Represents a navigation point in an EPUB document's table of contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavPoint {
    /// The display label/title of this navigation point
    pub label: String,

    /// The content document path this navigation point references
    pub content: Option<String>,

    /// Child navigation points (sub-sections)
    pub children: Vec<NavPoint>,
}

impl NavPoint {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            content: None,
            children: vec![],
        }
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = Some(content.to_string());
        self
    }
}
