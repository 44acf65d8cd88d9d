//! Error Type Definition Module
//!
//! This module defines the error types that may be encountered while resolving
//! an article identifier and while writing the resulting EPUB package.
//!
//! ## Main Error Types
//!
//! - [ResolutionError] - Failures of the DOI -> PMID -> PMCID -> full-text chain
//! - [EpubError] - Failures during XML tree construction and EPUB serialization
//! - [EpubBuilderError] - Package consistency errors detected while serializing

use std::fmt;

use thiserror::Error;

/// The stage of the resolution chain in which a failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStage {
    /// Construction of the HTTP client, before any request
    Setup,

    /// `esearch` on the pubmed database by DOI
    DoiSearch,

    /// `esearch` cross-reference from pubmed to pmc by PMID
    PmidSearch,

    /// `efetch` of the full-text XML from pmc
    Fetch,
}

impl fmt::Display for ResolutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStage::Setup => write!(f, "HTTP client setup"),
            ResolutionStage::DoiSearch => write!(f, "DOI search"),
            ResolutionStage::PmidSearch => write!(f, "PMID cross-reference search"),
            ResolutionStage::Fetch => write!(f, "full-text fetch"),
        }
    }
}

/// Types of errors that can occur while resolving an article identifier
///
/// Every variant is terminal for the current resolution: the chain is
/// aborted and no partial document is returned.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// Bad caller input
    ///
    /// Raised before any network access when zero or several identifiers are
    /// supplied, when the identifier is empty, or when a PMID/PMCID is not numeric.
    #[error("Invalid argument: {reason}.")]
    InvalidArgument { reason: String },

    /// A lookup in the chain returned no candidates
    #[error("Not found: {reason}.")]
    NotFound { reason: String },

    /// Network or HTTP level fault (timeout, refused connection, non-2xx status)
    #[error("Transport error during {stage}: {message}")]
    TransportError {
        stage: ResolutionStage,
        message: String,
    },

    /// The full-text fetch returned a zero-length body
    #[error("Empty response: the full-text fetch for PMC{pmcid} returned no content.")]
    EmptyResponse { pmcid: String },

    /// The full-text payload could not be parsed as XML
    #[error(
        "Malformed document: the full text of PMC{pmcid} is not valid XML ({reason}); payload starts with \"{excerpt}\"."
    )]
    MalformedDocument {
        pmcid: String,
        reason: String,
        excerpt: String,
    },
}

impl ResolutionError {
    /// Returns the network stage this error originated from, if any
    pub fn stage(&self) -> Option<ResolutionStage> {
        match self {
            ResolutionError::TransportError { stage, .. } => Some(*stage),
            ResolutionError::EmptyResponse { .. } | ResolutionError::MalformedDocument { .. } => {
                Some(ResolutionStage::Fetch)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
impl PartialEq for ResolutionError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::InvalidArgument { reason: l_reason },
                Self::InvalidArgument { reason: r_reason },
            ) => l_reason == r_reason,
            (Self::NotFound { reason: l_reason }, Self::NotFound { reason: r_reason }) => {
                l_reason == r_reason
            }
            (
                Self::TransportError { stage: l_stage, .. },
                Self::TransportError { stage: r_stage, .. },
            ) => l_stage == r_stage,
            (Self::EmptyResponse { pmcid: l_pmcid }, Self::EmptyResponse { pmcid: r_pmcid }) => {
                l_pmcid == r_pmcid
            }
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

/// Types of errors that can occur during XML processing and EPUB writing
#[derive(Debug, Error)]
pub enum EpubError {
    /// ZIP archive related errors
    #[error("Archive error: {source}")]
    ArchiveError { source: zip::result::ZipError },

    /// Data Decoding Error - Null data
    ///
    /// This error occurs when trying to decode an empty stream.
    #[error("Decode error: The data is empty.")]
    EmptyDataError,

    #[error("Epub builder error: {source}")]
    EpubBuilderError { source: EpubBuilderError },

    /// XML parsing failure error
    ///
    /// The event stream ended without producing a complete root element,
    /// e.g. the input is plain text or an element was never closed.
    #[error("Failed parsing XML error: {reason}")]
    FailedParsingXml { reason: String },

    #[error("IO error: {source}")]
    IOError { source: std::io::Error },

    /// UTF-8 decoding error
    #[error("Decode error: {source}")]
    Utf8DecodeError { source: std::string::FromUtf8Error },

    /// UTF-16 decoding error
    #[error("Decode error: {source}")]
    Utf16DecodeError { source: std::string::FromUtf16Error },

    /// QuickXml error
    ///
    /// This error occurs when reading or writing XML data using the QuickXml library.
    #[error("QuickXml error: {source}")]
    QuickXmlError { source: quick_xml::Error },
}

impl From<zip::result::ZipError> for EpubError {
    fn from(value: zip::result::ZipError) -> Self {
        EpubError::ArchiveError { source: value }
    }
}

impl From<quick_xml::Error> for EpubError {
    fn from(value: quick_xml::Error) -> Self {
        EpubError::QuickXmlError { source: value }
    }
}

impl From<std::io::Error> for EpubError {
    fn from(value: std::io::Error) -> Self {
        EpubError::IOError { source: value }
    }
}

impl From<std::string::FromUtf8Error> for EpubError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        EpubError::Utf8DecodeError { source: value }
    }
}

impl From<std::string::FromUtf16Error> for EpubError {
    fn from(value: std::string::FromUtf16Error) -> Self {
        EpubError::Utf16DecodeError { source: value }
    }
}

impl From<EpubBuilderError> for EpubError {
    fn from(value: EpubBuilderError) -> Self {
        EpubError::EpubBuilderError { source: value }
    }
}

#[cfg(test)]
impl PartialEq for EpubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::FailedParsingXml { reason: l_reason },
                Self::FailedParsingXml { reason: r_reason },
            ) => l_reason == r_reason,
            (
                Self::EpubBuilderError { source: l_source },
                Self::EpubBuilderError { source: r_source },
            ) => l_source == r_source,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

/// Types of errors that can occur while serializing an EPUB package
///
/// These errors are detected when the in-memory package is written to a
/// container file and indicate an inconsistent manifest or spine.
#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq))]
pub enum EpubBuilderError {
    /// Duplicate manifest id error
    ///
    /// Two resources were added to the manifest under the same id.
    #[error("A manifest item with id '{manifest_id}' already exists.")]
    DuplicateManifestId { manifest_id: String },

    /// Illegal manifest path error
    ///
    /// This error is triggered when the path corresponding to a resource ID
    /// in the manifest is absolute or begins with "../", which would place
    /// the resource outside the package directory.
    #[error(
        "A manifest with id '{manifest_id}' should not use an absolute path or a relative path starting with '../'."
    )]
    IllegalManifestPath { manifest_id: String },

    /// Manifest resource not found error
    ///
    /// This error is triggered when a spine item references an id that
    /// does not exist in the manifest.
    #[error("Spine item references '{manifest_id}', which does not exist in manifest.")]
    ManifestNotFound { manifest_id: String },

    /// Navigation information uninitialized error
    ///
    /// This error is triggered when attempting to build an EPUB but without setting navigation information.
    #[error("Navigation information is not set.")]
    NavigationInfoUninitialized,

    /// Too many nav flags error
    ///
    /// The navigation document is generated during serialization, so no
    /// user-supplied manifest item may carry the `nav` property.
    #[error("There are too many items with 'nav' property in the manifest.")]
    TooManyNavFlags,
}
