use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use futures::future::BoxFuture;
use regex::Regex;
use serde_json::json;
use tracing::debug;

use nodeweave_core::error::{NodeweaveError, Result};
use nodeweave_core::traits::DocumentProcessor;
use nodeweave_core::types::{Metadata, ProcessedDocument};

/// Built-in extractor for the formats the ingest router sends to heavy processing.
///
/// Markdown, CSV, JSON and plain text are read as-is. Markup is tag-stripped.
/// PDFs go through `pdf-extract`; Office documents are unpacked with `zip` and
/// their XML parts flattened to text. Images need OCR and are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub const NAME: &'static str = "nodeweave-extract";

    pub fn new() -> Self {
        Self
    }
}

impl DocumentProcessor for ContentExtractor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ProcessedDocument>> {
        let path = path.to_path_buf();

        Box::pin(async move {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();

            let (text, document_type) = match ext.as_str() {
                "md" | "markdown" => (read_text(&path).await?, "markdown"),
                "csv" => (read_text(&path).await?, "csv"),
                "json" => (read_text(&path).await?, "json"),
                "txt" => (read_text(&path).await?, "text"),
                "html" | "htm" => (strip_markup(&read_text(&path).await?), "html"),
                "xml" => (strip_markup(&read_text(&path).await?), "xml"),
                "pdf" => (blocking(path.clone(), extract_pdf).await?, "pdf"),
                "docx" => (blocking(path.clone(), extract_docx).await?, "docx"),
                "pptx" => (blocking(path.clone(), extract_pptx).await?, "pptx"),
                "xlsx" => (blocking(path.clone(), extract_xlsx).await?, "xlsx"),
                "png" | "jpg" | "jpeg" => {
                    return Err(NodeweaveError::UnsupportedDocument(format!(
                        "{} (image text extraction needs OCR)",
                        path.display()
                    )))
                }
                _ => return Err(NodeweaveError::UnsupportedDocument(path.display().to_string())),
            };

            if text.trim().is_empty() {
                return Err(NodeweaveError::Extraction {
                    path: path.display().to_string(),
                    message: "no text content".into(),
                });
            }

            debug!(path = %path.display(), document_type, chars = text.len(), "Extracted document");

            let mut metadata = Metadata::new();
            metadata.insert("source".into(), json!(path.display().to_string()));
            metadata.insert("document_type".into(), json!(document_type));
            metadata.insert("processed_with".into(), json!(Self::NAME));

            Ok(ProcessedDocument {
                text,
                document_type: document_type.to_string(),
                metadata,
            })
        })
    }
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| extraction_err(path, e))
}

async fn blocking(path: PathBuf, f: fn(&Path) -> Result<String>) -> Result<String> {
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || f(&path))
        .await
        .map_err(|e| NodeweaveError::Extraction {
            path: display,
            message: e.to_string(),
        })?
}

fn extraction_err(path: &Path, e: impl std::fmt::Display) -> NodeweaveError {
    NodeweaveError::Extraction {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn extract_pdf(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path).map_err(|e| extraction_err(path, e))
}

fn extract_docx(path: &Path) -> Result<String> {
    let mut archive = open_archive(path)?;
    let xml = read_part(&mut archive, path, "word/document.xml")?;
    Ok(flatten_office_xml(&xml))
}

fn extract_pptx(path: &Path) -> Result<String> {
    let mut archive = open_archive(path)?;
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slides.sort();

    let mut text = Vec::with_capacity(slides.len());
    for (_, name) in slides {
        let xml = read_part(&mut archive, path, &name)?;
        text.push(flatten_office_xml(&xml));
    }
    Ok(text.join("\n\n"))
}

/// Spreadsheets keep their cell text in the shared-strings table.
fn extract_xlsx(path: &Path) -> Result<String> {
    let mut archive = open_archive(path)?;
    let xml = read_part(&mut archive, path, "xl/sharedStrings.xml")?;
    Ok(flatten_office_xml(&xml.replace("</si>", "</si>\n")))
}

fn open_archive(path: &Path) -> Result<zip::ZipArchive<std::fs::File>> {
    let file = std::fs::File::open(path).map_err(|e| extraction_err(path, e))?;
    zip::ZipArchive::new(file).map_err(|e| extraction_err(path, e))
}

fn read_part(
    archive: &mut zip::ZipArchive<std::fs::File>,
    path: &Path,
    name: &str,
) -> Result<String> {
    let mut part = archive
        .by_name(name)
        .map_err(|e| extraction_err(path, format!("{}: {}", name, e)))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| extraction_err(path, e))?;
    Ok(xml)
}

/// Paragraph ends become newlines, everything else is tag-stripped.
fn flatten_office_xml(xml: &str) -> String {
    let with_breaks = xml
        .replace("</w:p>", "\n")
        .replace("</a:p>", "\n")
        .replace("<w:tab/>", "\t");
    strip_markup(&with_breaks)
}

fn strip_markup(input: &str) -> String {
    static PATTERNS: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();
    let Some((blocks, tags)) = PATTERNS
        .get_or_init(|| {
            let blocks = Regex::new(r"(?is)<(script|style)\b.*?</(script|style)>").ok()?;
            let tags = Regex::new(r"(?s)<[^>]*>").ok()?;
            Some((blocks, tags))
        })
        .as_ref()
    else {
        return input.to_string();
    };

    let without_blocks = blocks.replace_all(input, " ");
    let without_tags = tags.replace_all(&without_blocks, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_strip_markup_drops_scripts_and_entities() {
        let html = "<html><head><style>p { color: red }</style></head>\n<body><p>Fish &amp; chips</p>\n<script>alert(1)</script><p>done</p></body></html>";
        assert_eq!(strip_markup(html), "Fish & chips\ndone");
    }

    #[tokio::test]
    async fn test_markdown_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Title\n\nBody").unwrap();

        let doc = ContentExtractor.process(&path).await.unwrap();
        assert_eq!(doc.text, "# Title\n\nBody");
        assert_eq!(doc.document_type, "markdown");
        assert_eq!(doc.metadata["processed_with"], ContentExtractor::NAME);
        assert_eq!(doc.metadata["source"], path.display().to_string());
    }

    #[tokio::test]
    async fn test_docx_paragraphs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.docx");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(
            br#"<w:document><w:body><w:p><w:r><w:t>First line</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r></w:p></w:body></w:document>"#,
        )
        .unwrap();
        zip.finish().unwrap();

        let doc = ContentExtractor.process(&path).await.unwrap();
        assert_eq!(doc.text, "First line\nSecond");
        assert_eq!(doc.document_type, "docx");
    }

    #[tokio::test]
    async fn test_images_are_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let err = ContentExtractor.process(&path).await.unwrap_err();
        assert!(matches!(err, NodeweaveError::UnsupportedDocument(_)));
    }

    #[tokio::test]
    async fn test_empty_document_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.html");
        std::fs::write(&path, "<html><body>   </body></html>").unwrap();

        let err = ContentExtractor.process(&path).await.unwrap_err();
        assert!(matches!(err, NodeweaveError::Extraction { .. }));
    }
}
