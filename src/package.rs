//! Epub Package
//!
//! This module provides the in-memory EPUB book produced by the assembler and
//! the logic that serializes it into an EPUB 3 container file.
//!
//! ## Usage
//!
//! ```rust, no_run
//! # fn main() -> Result<(), pmc2epub::error::EpubError> {
//! use pmc2epub::{
//!     package::EpubPackage,
//!     types::{ManifestItem, NavPoint, SpineItem},
//! };
//!
//! let mut package = EpubPackage::new();
//! package.set_title("Test Book");
//! package.set_language("en");
//! package.add_resource(
//!     ManifestItem::new("chapter", "chapter.xhtml")?.set_mime("application/xhtml+xml"),
//!     b"<html xmlns=\"http://www.w3.org/1999/xhtml\"/>".to_vec(),
//! )?;
//! package.add_spine(SpineItem::new("chapter"));
//! package.add_catalog_item(NavPoint::new("Chapter").with_content("chapter.xhtml"));
//!
//! package.make("output.epub")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Notes
//!
//! - Resources are held in memory; nothing touches the file system until `make`.
//! - The navigation document and the package document are generated by `make`.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{Cursor, Write},
    path::Path,
};

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use log::{debug, info};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use uuid::Uuid;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{
    error::{EpubBuilderError, EpubError},
    types::{ManifestItem, MetadataItem, NavPoint, SpineItem},
    utils::ELEMENT_IN_DC_NAMESPACE,
};

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Directory inside the container holding the package document and all resources
pub const PACKAGE_DIR: &str = "EPUB";

/// Title used when an article has no usable title
pub const DEFAULT_TITLE: &str = "Scientific Article";

const NAV_ID: &str = "nav";
const NAV_PATH: &str = "nav.xhtml";

/// EPUB package
///
/// An owned, in-memory book: metadata, manifest resources with their bytes,
/// the spine (linear reading order) and the navigation catalog.
/// Every stage of the conversion works on the same owned value through
/// `&mut` access; the package is serialized once with [EpubPackage::make].
#[derive(Debug, Default)]
pub struct EpubPackage {
    /// List of metadata items
    metadata: Vec<MetadataItem>,

    /// Manifest items in insertion order, with ID as the key
    manifest: IndexMap<String, ManifestItem>,

    /// Resource bytes, with manifest ID as the key
    resources: HashMap<String, Vec<u8>>,

    /// List of spine items, defining the reading order
    spine: Vec<SpineItem>,

    catalog_title: String,

    /// List of catalog navigation points
    catalog: Vec<NavPoint>,
}

impl EpubPackage {
    /// Create a new, empty package
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the publication language, replacing any previous value
    pub fn set_language(&mut self, language: &str) -> &mut Self {
        self.replace_metadata(MetadataItem::new("language", language))
    }

    /// Set the unique publication identifier, replacing any previous value
    pub fn set_identifier(&mut self, identifier: &str) -> &mut Self {
        self.replace_metadata(MetadataItem::new("identifier", identifier).with_id("pub-id"))
    }

    /// Set the publication title, replacing any previous value
    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.replace_metadata(MetadataItem::new("title", title))
    }

    /// Add a creator entry
    ///
    /// Creators keep the order in which they were added.
    pub fn add_author(&mut self, author: &str) -> &mut Self {
        self.add_metadata(MetadataItem::new("creator", author))
    }

    /// Add metadata item
    pub fn add_metadata(&mut self, item: MetadataItem) -> &mut Self {
        self.metadata.push(item);
        self
    }

    fn replace_metadata(&mut self, item: MetadataItem) -> &mut Self {
        self.metadata.retain(|existing| existing.property != item.property);
        self.metadata.push(item);
        self
    }

    /// Returns the first value recorded for a metadata property
    pub fn get_metadata_value(&self, property: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|item| item.property == property)
            .map(|item| item.value.as_str())
    }

    /// Returns all values recorded for a metadata property, in insertion order
    pub fn get_metadata_values(&self, property: &str) -> Vec<&str> {
        self.metadata
            .iter()
            .filter(|item| item.property == property)
            .map(|item| item.value.as_str())
            .collect()
    }

    pub fn metadata(&self) -> &[MetadataItem] {
        &self.metadata
    }

    pub fn title(&self) -> Option<&str> {
        self.get_metadata_value("title")
    }

    pub fn language(&self) -> Option<&str> {
        self.get_metadata_value("language")
    }

    pub fn identifier(&self) -> Option<&str> {
        self.get_metadata_value("identifier")
    }

    pub fn creators(&self) -> Vec<&str> {
        self.get_metadata_values("creator")
    }

    /// Add manifest item and corresponding resource data
    ///
    /// # Return
    /// - `Ok(&mut Self)` - Successful addition, returns a reference to itself
    /// - `Err(EpubError)` - An item with the same id already exists
    pub fn add_resource(
        &mut self,
        manifest_item: ManifestItem,
        data: Vec<u8>,
    ) -> Result<&mut Self, EpubError> {
        if manifest_item.id == NAV_ID || self.manifest.contains_key(&manifest_item.id) {
            return Err(EpubBuilderError::DuplicateManifestId {
                manifest_id: manifest_item.id,
            }
            .into());
        }

        self.resources.insert(manifest_item.id.clone(), data);
        self.manifest.insert(manifest_item.id.clone(), manifest_item);
        Ok(self)
    }

    pub fn manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.get(id)
    }

    /// Returns the bytes of a resource by manifest id
    pub fn resource(&self, id: &str) -> Option<&[u8]> {
        self.resources.get(id).map(Vec::as_slice)
    }

    /// Iterate over manifest items in insertion order
    pub fn manifest(&self) -> impl Iterator<Item = &ManifestItem> {
        self.manifest.values()
    }

    /// Append a spine item to the end of the reading order
    pub fn add_spine(&mut self, item: SpineItem) -> &mut Self {
        self.spine.push(item);
        self
    }

    /// Insert a spine item at the front of the reading order
    pub fn prepend_spine(&mut self, item: SpineItem) -> &mut Self {
        self.spine.insert(0, item);
        self
    }

    pub fn spine(&self) -> &[SpineItem] {
        &self.spine
    }

    /// Set catalog title
    pub fn set_catalog_title(&mut self, title: &str) -> &mut Self {
        self.catalog_title = title.to_string();
        self
    }

    /// Add catalog item to the end of the existing list
    pub fn add_catalog_item(&mut self, item: NavPoint) -> &mut Self {
        self.catalog.push(item);
        self
    }

    /// Insert a catalog item in front of the existing list
    pub fn prepend_catalog_item(&mut self, item: NavPoint) -> &mut Self {
        self.catalog.insert(0, item);
        self
    }

    pub fn catalog(&self) -> &[NavPoint] {
        &self.catalog
    }

    /// Writes the package to an EPUB container file
    ///
    /// # Parameters
    /// - `output_path`: Output file path, missing parent directories are created
    ///
    /// # Return
    /// - `Ok(())`: Build successful
    /// - `Err(EpubError)`: Inconsistent package or an IO/archive failure
    pub fn make<P: AsRef<Path>>(&self, output_path: P) -> Result<(), EpubError> {
        self.validate_manifest_nav()?;
        self.validate_spine()?;

        let container = self.make_container_xml()?;
        let navigation = self.make_navigation_document()?;
        let opf = self.make_opf_file()?;

        if let Some(parent) = output_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&output_path)?;
        let mut zip = ZipWriter::new(file);

        // the mimetype entry must come first and stay uncompressed
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("mimetype", stored)?;
        zip.write_all(b"application/epub+zip")?;

        zip.start_file("META-INF/container.xml", deflated)?;
        zip.write_all(&container)?;

        zip.start_file(format!("{}/content.opf", PACKAGE_DIR), deflated)?;
        zip.write_all(&opf)?;

        zip.start_file(format!("{}/{}", PACKAGE_DIR, NAV_PATH), deflated)?;
        zip.write_all(&navigation)?;

        for item in self.manifest.values() {
            let data = self.resources.get(&item.id).map(Vec::as_slice).unwrap_or_default();
            debug!("writing resource {} ({} bytes)", item.path, data.len());

            zip.start_file(format!("{}/{}", PACKAGE_DIR, item.path), deflated)?;
            zip.write_all(data)?;
        }

        zip.finish()?;
        info!("EPUB written to {}", output_path.as_ref().display());
        Ok(())
    }

    /// Creates the `container.xml` file
    fn make_container_xml(&self) -> Result<Vec<u8>, EpubError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        writer.write_event(Event::Start(BytesStart::new("container").with_attributes(
            [
                ("version", "1.0"),
                ("xmlns", "urn:oasis:names:tc:opendocument:xmlns:container"),
            ],
        )))?;
        writer.write_event(Event::Start(BytesStart::new("rootfiles")))?;

        let rootfile = format!("{}/content.opf", PACKAGE_DIR);
        writer.write_event(Event::Empty(BytesStart::new("rootfile").with_attributes([
            ("full-path", rootfile.as_str()),
            ("media-type", "application/oebps-package+xml"),
        ])))?;

        writer.write_event(Event::End(BytesEnd::new("rootfiles")))?;
        writer.write_event(Event::End(BytesEnd::new("container")))?;

        Ok(writer.into_inner().into_inner())
    }

    /// Creates the `navigation document`
    ///
    /// An error will occur if navigation information is not initialized.
    fn make_navigation_document(&self) -> Result<Vec<u8>, EpubError> {
        if self.catalog.is_empty() {
            return Err(EpubBuilderError::NavigationInfoUninitialized.into());
        }

        let mut writer = Writer::new(Cursor::new(Vec::new()));

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("html").with_attributes([
            ("xmlns", "http://www.w3.org/1999/xhtml"),
            ("xmlns:epub", "http://www.idpf.org/2007/ops"),
        ])))?;

        // make head
        writer.write_event(Event::Start(BytesStart::new("head")))?;
        writer.write_event(Event::Start(BytesStart::new("title")))?;
        writer.write_event(Event::Text(BytesText::new(&self.catalog_title)))?;
        writer.write_event(Event::End(BytesEnd::new("title")))?;
        writer.write_event(Event::End(BytesEnd::new("head")))?;

        // make body
        writer.write_event(Event::Start(BytesStart::new("body")))?;
        writer.write_event(Event::Start(
            BytesStart::new("nav").with_attributes([("epub:type", "toc")]),
        ))?;

        if !self.catalog_title.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("h1")))?;
            writer.write_event(Event::Text(BytesText::new(&self.catalog_title)))?;
            writer.write_event(Event::End(BytesEnd::new("h1")))?;
        }

        Self::make_nav(&mut writer, &self.catalog)?;

        writer.write_event(Event::End(BytesEnd::new("nav")))?;
        writer.write_event(Event::End(BytesEnd::new("body")))?;
        writer.write_event(Event::End(BytesEnd::new("html")))?;

        Ok(writer.into_inner().into_inner())
    }

    /// Creates the `OPF` file
    fn make_opf_file(&self) -> Result<Vec<u8>, EpubError> {
        let metadata = self.effective_metadata();
        let language = metadata
            .iter()
            .find(|item| item.property == "language")
            .map(|item| item.value.clone())
            .unwrap_or_else(|| "en".to_string());

        let mut writer = Writer::new(Cursor::new(Vec::new()));

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        writer.write_event(Event::Start(BytesStart::new("package").with_attributes([
            ("xmlns", "http://www.idpf.org/2007/opf"),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("unique-identifier", "pub-id"),
            ("version", "3.0"),
            ("xml:lang", language.as_str()),
        ])))?;

        Self::make_opf_metadata(&mut writer, &metadata)?;
        self.make_opf_manifest(&mut writer)?;
        self.make_opf_spine(&mut writer)?;

        writer.write_event(Event::End(BytesEnd::new("package")))?;

        Ok(writer.into_inner().into_inner())
    }

    /// Metadata as written to the package document
    ///
    /// EPUB requires a title, a language and an identifier referenced by
    /// `unique-identifier`; absent values are filled in here without
    /// touching the package itself.
    fn effective_metadata(&self) -> Vec<MetadataItem> {
        let mut metadata = self.metadata.clone();

        let has_identifier = metadata.iter().any(|item| {
            item.property == "identifier" && item.id.as_deref() == Some("pub-id")
        });
        if !has_identifier {
            let generated = format!("urn:uuid:{}", Uuid::new_v4());
            info!("no identifier set, using generated {}", generated);
            metadata.push(MetadataItem::new("identifier", &generated).with_id("pub-id"));
        }

        if !metadata.iter().any(|item| item.property == "title") {
            metadata.push(MetadataItem::new("title", DEFAULT_TITLE));
        }

        if !metadata.iter().any(|item| item.property == "language") {
            metadata.push(MetadataItem::new("language", "en"));
        }

        metadata.push(MetadataItem::new(
            "dcterms:modified",
            &Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        ));

        metadata
    }

    fn make_opf_metadata(writer: &mut XmlWriter, metadata: &[MetadataItem]) -> Result<(), EpubError> {
        writer.write_event(Event::Start(BytesStart::new("metadata")))?;

        for item in metadata {
            let mut attributes = item.attributes();
            let tag_name = if ELEMENT_IN_DC_NAMESPACE.contains(&item.property.as_str()) {
                format!("dc:{}", item.property)
            } else {
                attributes.push(("property", item.property.as_str()));
                "meta".to_string()
            };

            writer.write_event(Event::Start(
                BytesStart::new(tag_name.as_str()).with_attributes(attributes),
            ))?;
            writer.write_event(Event::Text(BytesText::new(item.value.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new(tag_name.as_str())))?;
        }

        writer.write_event(Event::End(BytesEnd::new("metadata")))?;

        Ok(())
    }

    fn make_opf_manifest(&self, writer: &mut XmlWriter) -> Result<(), EpubError> {
        writer.write_event(Event::Start(BytesStart::new("manifest")))?;

        writer.write_event(Event::Empty(BytesStart::new("item").with_attributes([
            ("id", NAV_ID),
            ("href", NAV_PATH),
            ("media-type", "application/xhtml+xml"),
            ("properties", "nav"),
        ])))?;

        for manifest in self.manifest.values() {
            writer.write_event(Event::Empty(
                BytesStart::new("item").with_attributes(manifest.attributes()),
            ))?;
        }

        writer.write_event(Event::End(BytesEnd::new("manifest")))?;

        Ok(())
    }

    fn make_opf_spine(&self, writer: &mut XmlWriter) -> Result<(), EpubError> {
        writer.write_event(Event::Start(BytesStart::new("spine")))?;

        for spine in &self.spine {
            writer.write_event(Event::Empty(
                BytesStart::new("itemref").with_attributes(spine.attributes()),
            ))?;
        }

        writer.write_event(Event::End(BytesEnd::new("spine")))?;

        Ok(())
    }

    fn make_nav(writer: &mut XmlWriter, navigations: &[NavPoint]) -> Result<(), EpubError> {
        writer.write_event(Event::Start(BytesStart::new("ol")))?;

        for nav in navigations {
            writer.write_event(Event::Start(BytesStart::new("li")))?;

            if let Some(path) = &nav.content {
                writer.write_event(Event::Start(
                    BytesStart::new("a").with_attributes([("href", path.as_str())]),
                ))?;
                writer.write_event(Event::Text(BytesText::new(nav.label.as_str())))?;
                writer.write_event(Event::End(BytesEnd::new("a")))?;
            } else {
                writer.write_event(Event::Start(BytesStart::new("span")))?;
                writer.write_event(Event::Text(BytesText::new(nav.label.as_str())))?;
                writer.write_event(Event::End(BytesEnd::new("span")))?;
            }

            if !nav.children.is_empty() {
                Self::make_nav(writer, &nav.children)?;
            }

            writer.write_event(Event::End(BytesEnd::new("li")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("ol")))?;

        Ok(())
    }

    /// Check that every spine item references a manifest item
    fn validate_spine(&self) -> Result<(), EpubError> {
        for item in &self.spine {
            if !self.manifest.contains_key(&item.idref) {
                return Err(EpubBuilderError::ManifestNotFound {
                    manifest_id: item.idref.clone(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Validate navigation list items
    ///
    /// The navigation document is generated by `make`, so no added
    /// resource may claim the `nav` property.
    fn validate_manifest_nav(&self) -> Result<(), EpubError> {
        if self.manifest.values().any(|item| item.has_property("nav")) {
            return Err(EpubBuilderError::TooManyNavFlags.into());
        }

        Ok(())
    }
}
