//! EPUB assembly
//!
//! Turns a parsed [ArticleXml] into an [EpubPackage]: the extracted metadata
//! is set on an owned package, then a generated cover page is prepended to
//! the reading order together with the cover logo, when it can be read.
//!
//! The assembler never touches the network; the only I/O is the read of the
//! configured cover image.

use std::{
    fs,
    io::{Cursor, ErrorKind},
    path::{Path, PathBuf},
};

use log::{info, warn};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::{
    article::{ArticleMetadata, ArticleXml},
    error::EpubError,
    package::{DEFAULT_TITLE, EpubPackage},
    types::{ManifestItem, NavPoint, SpineItem},
};

pub const DEFAULT_COVER_IMAGE_PATH: &str = "banners/logo-nihpa.png";

const COVER_ID: &str = "cover";
const COVER_PATH: &str = "cover.xhtml";
const COVER_IMAGE_ID: &str = "cover-image";

const COVER_STYLE: &str = "
body { font-family: Arial, sans-serif; text-align: center; margin: 0; padding: 30px; }
.logo { margin-bottom: 30px; }
.logo img { max-width: 200px; height: auto; }
h1 { font-size: 2.2em; margin-bottom: 20px; color: #333; line-height: 1.3; }
.authors { font-size: 1.2em; color: #666; margin-bottom: 25px; line-height: 1.4; }
.doi { font-size: 1em; color: #999; margin-top: 30px; font-style: italic; }
.separator { width: 80%; height: 2px; background-color: #ddd; margin: 20px auto; }
";

/// Settings for the assembly stage
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Local image embedded as the cover logo
    pub cover_image_path: PathBuf,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            cover_image_path: PathBuf::from(DEFAULT_COVER_IMAGE_PATH),
        }
    }
}

impl AssemblerConfig {
    pub fn with_cover_image_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cover_image_path = path.into();
        self
    }
}

/// Builds EPUB packages from article documents
#[derive(Debug, Clone, Default)]
pub struct Assembler {
    config: AssemblerConfig,
}

impl Assembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Assembles a complete package from a parsed article
    ///
    /// Missing optional fields never fail assembly, and neither does an
    /// unreadable cover image.
    ///
    /// # Return
    /// - `Ok(EpubPackage)`: metadata set, cover page first in the spine
    /// - `Err(EpubError)`: the cover page could not be generated
    pub fn assemble(&self, doc: &ArticleXml) -> Result<EpubPackage, EpubError> {
        let metadata = ArticleMetadata::extract(doc);

        let mut package = EpubPackage::new();
        self.apply_metadata(&mut package, &metadata);
        self.attach_cover(&mut package)?;

        info!(
            "Assembled \"{}\"",
            package.title().unwrap_or(DEFAULT_TITLE)
        );
        Ok(package)
    }

    /// Sets language, identifier, creator and title on the package
    ///
    /// All authors are recorded as one creator value. Absent identifier,
    /// authors or title leave the package untouched for that field.
    pub fn apply_metadata(&self, package: &mut EpubPackage, metadata: &ArticleMetadata) {
        package.set_language(&metadata.language);

        if let Some(identifier) = &metadata.identifier {
            package.set_identifier(identifier);
        }
        if let Some(authors) = metadata.author_line() {
            package.add_author(&authors);
        }
        if let Some(title) = &metadata.title {
            package.set_title(title);
            package.set_catalog_title(title);
        }
    }

    /// Adds the cover page and makes it the first spine and navigation entry
    ///
    /// The page shows the logo, the package title (or the generic default),
    /// the first creator and the identifier. The logo is embedded only if
    /// the configured image can be read; otherwise a warning is logged and
    /// the page is generated without it.
    pub fn attach_cover(&self, package: &mut EpubPackage) -> Result<(), EpubError> {
        let image = self.load_cover_image();
        let image_path = image.as_ref().map(|(item, _)| item.path.clone());

        let page = make_cover_page(package, image_path.as_deref())?;
        package.add_resource(
            ManifestItem::new(COVER_ID, COVER_PATH)?.set_mime("application/xhtml+xml"),
            page,
        )?;

        if let Some((item, data)) = image {
            package.add_resource(item, data)?;
        }

        package.prepend_spine(SpineItem::new(COVER_ID));
        package.prepend_catalog_item(NavPoint::new("Cover").with_content(COVER_PATH));
        Ok(())
    }

    fn load_cover_image(&self) -> Option<(ManifestItem, Vec<u8>)> {
        let path = &self.config.cover_image_path;
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("Cover image not found at {}, continuing without it", path.display());
                return None;
            }
            Err(err) => {
                warn!("Could not read cover image {}: {}", path.display(), err);
                return None;
            }
        };

        let (mime, extension) = media_type_for_path(path);
        let item = ManifestItem::new(COVER_IMAGE_ID, &format!("images/logo-nihpa.{}", extension))
            .ok()?
            .set_mime(mime)
            .append_property("cover-image");

        Some((item, data))
    }
}

/// Assembles a package with the default configuration
pub fn assemble(doc: &ArticleXml) -> Result<EpubPackage, EpubError> {
    Assembler::default().assemble(doc)
}

/// Infers the media type and stored extension of an image from its file name
///
/// `.png` maps to `image/png`, `.jpg` and `.jpeg` to `image/jpeg`, anything
/// else is treated as png.
pub fn media_type_for_path(path: &Path) -> (&'static str, &'static str) {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => ("image/jpeg", "jpg"),
        _ => ("image/png", "png"),
    }
}

fn make_cover_page(package: &EpubPackage, image_path: Option<&str>) -> Result<Vec<u8>, EpubError> {
    let title = package.title().unwrap_or(DEFAULT_TITLE);
    let author = package.creators().first().copied().unwrap_or_default();
    let identifier = package.identifier().unwrap_or_default();
    let language = package.language().unwrap_or("en");

    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("html").with_attributes([
        ("xmlns", "http://www.w3.org/1999/xhtml"),
        ("xml:lang", language),
        ("lang", language),
    ])))?;

    writer.write_event(Event::Start(BytesStart::new("head")))?;
    write_text_element(&mut writer, BytesStart::new("title"), "Cover")?;
    write_text_element(&mut writer, BytesStart::new("style"), COVER_STYLE)?;
    writer.write_event(Event::End(BytesEnd::new("head")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;

    if let Some(src) = image_path {
        writer.write_event(Event::Start(
            BytesStart::new("div").with_attributes([("class", "logo")]),
        ))?;
        writer.write_event(Event::Empty(
            BytesStart::new("img").with_attributes([("src", src), ("alt", "NIH Logo")]),
        ))?;
        writer.write_event(Event::End(BytesEnd::new("div")))?;
    }

    write_separator(&mut writer)?;
    write_text_element(&mut writer, BytesStart::new("h1"), title)?;
    write_text_element(
        &mut writer,
        BytesStart::new("div").with_attributes([("class", "authors")]),
        author,
    )?;
    write_separator(&mut writer)?;
    write_text_element(
        &mut writer,
        BytesStart::new("div").with_attributes([("class", "doi")]),
        identifier,
    )?;

    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("html")))?;

    Ok(writer.into_inner().into_inner())
}

fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    start: BytesStart,
    text: &str,
) -> Result<(), EpubError> {
    let end = start.to_end().into_owned();
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(end))?;
    Ok(())
}

fn write_separator(writer: &mut Writer<Cursor<Vec<u8>>>) -> Result<(), EpubError> {
    writer.write_event(Event::Start(
        BytesStart::new("div").with_attributes([("class", "separator")]),
    ))?;
    writer.write_event(Event::End(BytesEnd::new("div")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use crate::{
        article::ArticleXml,
        assembler::{Assembler, AssemblerConfig, media_type_for_path},
        package::{DEFAULT_TITLE, EpubPackage},
        types::{ManifestItem, NavPoint, SpineItem},
    };

    const ARTICLE: &str = r#"<pmc-articleset><article xml:lang="fr"><front><article-meta>
        <article-id pub-id-type="doi">10.3390/biom13020339</article-id>
        <title-group><article-title>Effects of <italic>p53</italic> &amp; Friends</article-title></title-group>
        <contrib-group>
            <contrib contrib-type="author"><name><surname>Smith</surname><given-names>Jane</given-names></name></contrib>
            <contrib contrib-type="author"><name><surname>Doe</surname><given-names>John</given-names></name></contrib>
        </contrib-group>
    </article-meta></front></article></pmc-articleset>"#;

    /// Assembler whose cover image lives in `dir`, written there unless `name` is None
    fn assembler_with_image(dir: &Path, name: Option<&str>) -> Assembler {
        let path = match name {
            Some(name) => {
                let path = dir.join(name);
                fs::write(&path, b"\x89PNG\r\n\x1a\nfake image").unwrap();
                path
            }
            None => dir.join("missing.png"),
        };
        Assembler::new(AssemblerConfig::default().with_cover_image_path(path))
    }

    fn cover_html(package: &EpubPackage) -> String {
        String::from_utf8(package.resource("cover").unwrap().to_vec()).unwrap()
    }

    #[test]
    fn test_media_type_for_path() {
        assert_eq!(media_type_for_path(Path::new("logo.png")), ("image/png", "png"));
        assert_eq!(media_type_for_path(Path::new("logo.JPG")), ("image/jpeg", "jpg"));
        assert_eq!(media_type_for_path(Path::new("a/logo.jpeg")), ("image/jpeg", "jpg"));
        assert_eq!(media_type_for_path(Path::new("logo.gif")), ("image/png", "png"));
        assert_eq!(media_type_for_path(Path::new("logo")), ("image/png", "png"));
    }

    #[test]
    fn test_assemble_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ArticleXml::parse(ARTICLE).unwrap();
        let package = assembler_with_image(dir.path(), Some("logo.png"))
            .assemble(&doc)
            .unwrap();

        assert_eq!(package.language(), Some("fr"));
        assert_eq!(package.identifier(), Some("10.3390/biom13020339"));
        assert_eq!(package.title(), Some("Effects of p53 & Friends"));
        assert_eq!(package.creators(), vec!["Smith, Jane; Doe, John"]);
    }

    #[test]
    fn test_assemble_default_language() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ArticleXml::parse("<article><front/></article>").unwrap();
        let package = assembler_with_image(dir.path(), None).assemble(&doc).unwrap();

        assert_eq!(package.language(), Some("en"));
        assert_eq!(package.identifier(), None);
        assert_eq!(package.title(), None);
        assert!(package.creators().is_empty());
    }

    /// Test that the cover page shows title, first creator and identifier
    #[test]
    fn test_cover_page_content() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ArticleXml::parse(ARTICLE).unwrap();
        let package = assembler_with_image(dir.path(), Some("logo.png"))
            .assemble(&doc)
            .unwrap();
        let html = cover_html(&package);

        assert!(html.contains("<h1>Effects of p53 &amp; Friends</h1>"));
        assert!(html.contains(r#"<div class="authors">Smith, Jane; Doe, John</div>"#));
        assert!(html.contains(r#"<div class="doi">10.3390/biom13020339</div>"#));
        assert!(html.contains(r#"<img src="images/logo-nihpa.png" alt="NIH Logo"/>"#));
        assert!(html.contains(r#"xml:lang="fr""#));
    }

    #[test]
    fn test_cover_page_default_title() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ArticleXml::parse("<article/>").unwrap();
        let package = assembler_with_image(dir.path(), None).assemble(&doc).unwrap();

        assert!(cover_html(&package).contains(&format!("<h1>{}</h1>", DEFAULT_TITLE)));
    }

    #[test]
    fn test_cover_image_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ArticleXml::parse(ARTICLE).unwrap();
        let package = assembler_with_image(dir.path(), Some("logo.jpeg"))
            .assemble(&doc)
            .unwrap();

        let image = package.manifest_item("cover-image").unwrap();
        assert_eq!(image.mime, "image/jpeg");
        assert_eq!(image.path, "images/logo-nihpa.jpg");
        assert!(image.has_property("cover-image"));
        assert_eq!(package.resource("cover-image").unwrap(), b"\x89PNG\r\n\x1a\nfake image");
    }

    /// Test that a missing cover image is not fatal and embeds nothing
    #[test]
    fn test_missing_cover_image() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ArticleXml::parse(ARTICLE).unwrap();
        let package = assembler_with_image(dir.path(), None).assemble(&doc).unwrap();

        assert!(package.manifest_item("cover-image").is_none());
        assert!(package.manifest_item("cover").is_some());
        assert!(!cover_html(&package).contains("<img"));
        assert_eq!(package.spine()[0].idref, "cover");
    }

    /// Test that the cover goes first even when content was added before it
    #[test]
    fn test_cover_first_in_spine() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = assembler_with_image(dir.path(), None);

        let mut package = EpubPackage::new();
        package
            .add_resource(
                ManifestItem::new("body", "body.xhtml")
                    .unwrap()
                    .set_mime("application/xhtml+xml"),
                b"<html/>".to_vec(),
            )
            .unwrap();
        package.add_spine(SpineItem::new("body"));
        package.add_catalog_item(NavPoint::new("Body").with_content("body.xhtml"));

        assembler.attach_cover(&mut package).unwrap();

        let spine = package
            .spine()
            .iter()
            .map(|item| item.idref.as_str())
            .collect::<Vec<_>>();
        assert_eq!(spine, vec!["cover", "body"]);
        assert_eq!(package.catalog()[0].label, "Cover");
    }
}
