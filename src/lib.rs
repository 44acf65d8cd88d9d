//! pmc2epub
//!
//! A Rust library that turns a scientific article identifier into an EPUB book.
//!
//! A DOI, PubMed id (PMID) or PubMed Central id (PMCID) is resolved through the
//! NCBI E-utilities service to the article's full-text JATS XML. The article
//! metadata (language, DOI, authors, title) is then packaged as an EPUB 3 book
//! with a generated cover page.
//!
//! ## Features
//!
//! - Forward-only resolution chain DOI -> PMID -> PMCID -> full text, with a
//!   typed failure naming the stage that failed.
//! - Metadata extraction that degrades to defaults instead of failing.
//! - Cover page with logo, title, authors and DOI, always first in reading order.
//! - EPUB 3 serialization into a zip container.
//!
//! ## Quick Start
//!
//! ```rust, no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use pmc2epub::{ArticleIdentifier, assemble, resolve};
//!
//! let doc = resolve(&ArticleIdentifier::Doi("10.3390/biom13020339".to_string()))?;
//! let package = assemble(&doc)?;
//! package.make("biom13020339.epub")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `cli` (default): builds the `pmc2epub` command line tool.

pub(crate) mod utils;

pub mod article;
pub mod assembler;
pub mod error;
pub mod package;
pub mod resolver;
pub mod types;

pub use article::{ArticleMetadata, ArticleXml};
pub use assembler::{Assembler, AssemblerConfig, assemble};
pub use error::{EpubError, ResolutionError, ResolutionStage};
pub use package::EpubPackage;
pub use resolver::{Resolver, ResolverConfig, Transport, resolve};
pub use types::ArticleIdentifier;
pub use utils::{XmlElement, XmlNode};
