//! EPUB writer. Turns an ordered chapter list into an EPUB 3 package (mimetype, container, OPF,
//! nav, NCX, one XHTML document per chapter) and writes it to disk in one step.

mod render;

pub use render::{render_paragraphs, xml_escape, EMPTY_PARAGRAPH};

use crate::flat::{split_chapters, ParseError};
use crate::model::{BookMetadata, ChapterRecord};
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTAINER_XML: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n  <rootfiles>\n    <rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/>\n  </rootfiles>\n</container>";

const MIMETYPE: &[u8] = b"application/epub+zip";
const OEBPS_PREFIX: &str = "OEBPS/";

/// Errors from the converter. Any of them means no output file was written.
#[derive(Debug, Error)]
pub enum EpubError {
    #[error("No chapters found in input file")]
    NoChapters,

    #[error("Cannot read input {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build EPUB archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Cannot write EPUB {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ParseError> for EpubError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::NoChaptersFound => EpubError::NoChapters,
        }
    }
}

impl From<std::io::Error> for EpubError {
    fn from(e: std::io::Error) -> Self {
        EpubError::Zip(zip::result::ZipError::Io(e))
    }
}

/// Manifest id and file name of the chapter at 0-based position `i`: `chapter_0001`, ...
pub fn chapter_id(i: usize) -> String {
    format!("chapter_{:04}", i + 1)
}

/// Read a flat text file, split it into chapters and write the EPUB. Returns the chapter count.
pub fn convert_file(input: &Path, output: &Path, meta: &BookMetadata) -> Result<usize, EpubError> {
    let content = std::fs::read_to_string(input).map_err(|e| EpubError::ReadInput {
        path: input.to_path_buf(),
        source: e,
    })?;
    let chapters = split_chapters(&content)?;
    tracing::info!("Found {} chapters", chapters.len());
    write_epub(&chapters, meta, output)?;
    Ok(chapters.len())
}

/// Build the package in memory, then move it into place at `path` with a temp-file rename.
pub fn write_epub(
    chapters: &[ChapterRecord],
    meta: &BookMetadata,
    path: &Path,
) -> Result<(), EpubError> {
    let bytes = build_epub(chapters, meta)?;
    let write_err = |e: std::io::Error| EpubError::Write {
        path: path.to_path_buf(),
        source: e,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(&bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    tracing::info!("EPUB written to {}", path.display());
    Ok(())
}

/// Serialize `chapters` (in the given order) plus metadata into EPUB bytes.
pub fn build_epub(chapters: &[ChapterRecord], meta: &BookMetadata) -> Result<Vec<u8>, EpubError> {
    if chapters.is_empty() {
        return Err(EpubError::NoChapters);
    }
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let options_stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    let options_deflate = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    // Mimetype first, uncompressed
    zip.start_file("mimetype", options_stored)?;
    zip.write_all(MIMETYPE)?;

    zip.start_file("META-INF/container.xml", options_deflate)?;
    zip.write_all(CONTAINER_XML)?;

    let identifier = format!("urn:uuid:{}", uuid::Uuid::new_v4());
    write_opf(chapters, meta, &identifier, &mut zip, options_deflate)?;
    write_nav_xhtml(chapters, meta, &mut zip, options_deflate)?;
    write_ncx(chapters, meta, &identifier, &mut zip, options_deflate)?;
    write_chapters(chapters, meta, &mut zip, options_deflate)?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

fn write_opf(
    chapters: &[ChapterRecord],
    meta: &BookMetadata,
    identifier: &str,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut manifest = String::from(
        r#"    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
"#,
    );
    let mut spine = String::from("    <itemref idref=\"nav\"/>\n");
    for i in 0..chapters.len() {
        let id = chapter_id(i);
        manifest.push_str(&format!(
            "    <item id=\"{id}\" href=\"{id}.xhtml\" media-type=\"application/xhtml+xml\"/>\n"
        ));
        spine.push_str(&format!("    <itemref idref=\"{id}\"/>\n"));
    }

    let modified = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="book-id" version="3.0" xml:lang="{lang}">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:creator>{creator}</dc:creator>
    <dc:language>{lang}</dc:language>
    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>
"#,
        id = xml_escape(identifier),
        title = xml_escape(&meta.title),
        creator = xml_escape(&meta.author),
        lang = xml_escape(&meta.language),
        modified = modified,
        manifest = manifest,
        spine = spine,
    );

    zip.start_file(format!("{}content.opf", OEBPS_PREFIX), options)?;
    zip.write_all(opf.as_bytes())?;
    Ok(())
}

fn write_nav_xhtml(
    chapters: &[ChapterRecord],
    meta: &BookMetadata,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut nav_links = String::new();
    for (i, ch) in chapters.iter().enumerate() {
        nav_links.push_str(&format!(
            "      <li><a href=\"{}.xhtml\">{}</a></li>\n",
            chapter_id(i),
            xml_escape(&ch.title)
        ));
    }
    let lang = xml_escape(&meta.language);
    let nav = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <title>{title}</title>
</head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>{title}</h1>
    <ol>
{links}    </ol>
  </nav>
</body>
</html>
"#,
        lang = lang,
        title = xml_escape(&meta.title),
        links = nav_links
    );
    zip.start_file(format!("{}nav.xhtml", OEBPS_PREFIX), options)?;
    zip.write_all(nav.as_bytes())?;
    Ok(())
}

fn write_ncx(
    chapters: &[ChapterRecord],
    meta: &BookMetadata,
    identifier: &str,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut nav_points = String::new();
    for (i, ch) in chapters.iter().enumerate() {
        nav_points.push_str(&format!(
            r#"    <navPoint id="navpoint-{n}" playOrder="{n}">
      <navLabel><text>{label}</text></navLabel>
      <content src="{id}.xhtml"/>
    </navPoint>
"#,
            n = i + 1,
            label = xml_escape(&ch.title),
            id = chapter_id(i)
        ));
    }
    let ncx = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
  </head>
  <docTitle>
    <text>{}</text>
  </docTitle>
  <navMap>
{}  </navMap>
</ncx>
"#,
        xml_escape(identifier),
        xml_escape(&meta.title),
        nav_points
    );
    zip.start_file(format!("{}toc.ncx", OEBPS_PREFIX), options)?;
    zip.write_all(ncx.as_bytes())?;
    Ok(())
}

/// Standalone XHTML document for one chapter: escaped title in head and `<h1>`, then the body.
pub fn chapter_document(chapter: &ChapterRecord, language: &str) -> String {
    let title = xml_escape(&chapter.title);
    let lang = xml_escape(language);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" lang="{lang}" xml:lang="{lang}">
<head>
  <title>{title}</title>
</head>
<body>
<h1>{title}</h1>
{body}
</body>
</html>
"#,
        lang = lang,
        title = title,
        body = render_paragraphs(&chapter.body)
    )
}

fn write_chapters(
    chapters: &[ChapterRecord],
    meta: &BookMetadata,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    for (i, ch) in chapters.iter().enumerate() {
        let html = chapter_document(ch, &meta.language);
        let name = format!("{}{}.xhtml", OEBPS_PREFIX, chapter_id(i));
        zip.start_file(name, options)?;
        zip.write_all(html.as_bytes())?;
    }
    Ok(())
}
