//! Text extraction for each supported file type

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::types::FileType;

/// Turns raw document bytes into plain text
pub trait DocumentLoader: Send + Sync {
    fn load(&self, data: &[u8]) -> Result<String>;
}

/// PDF text via `pdf-extract`
pub struct PdfLoader;

/// Word (.docx) paragraphs via `docx-rs`
pub struct DocxLoader;

/// Visible HTML body text via `scraper`
pub struct HtmlLoader;

/// UTF-8 text, lossy on invalid sequences
pub struct TextLoader;

impl FileType {
    /// Loader implementation for this file type
    pub fn loader(&self) -> &'static dyn DocumentLoader {
        match self {
            FileType::Pdf => &PdfLoader,
            FileType::Docx => &DocxLoader,
            FileType::Html => &HtmlLoader,
            FileType::Txt => &TextLoader,
        }
    }
}

/// Extract text on the blocking pool; PDF and DOCX parsing is CPU-bound
pub async fn load_text(file_type: FileType, data: Vec<u8>) -> Result<String> {
    tokio::task::spawn_blocking(move || file_type.loader().load(&data))
        .await
        .map_err(|e| Error::internal(format!("Loader task failed: {}", e)))?
}

impl DocumentLoader for PdfLoader {
    fn load(&self, data: &[u8]) -> Result<String> {
        let raw = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| Error::parse("pdf", e.to_string()))?;

        let content = normalize_lines(&raw.replace('\0', "").replace('\u{00A0}', " "));
        if content.is_empty() {
            return Err(Error::parse("pdf", "No text content could be extracted from PDF"));
        }
        Ok(content)
    }
}

impl DocumentLoader for DocxLoader {
    fn load(&self, data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data).map_err(|e| Error::parse("docx", e.to_string()))?;

        let mut content = String::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                content.push_str(&t.text);
                            }
                        }
                    }
                }
                content.push('\n');
            }
        }

        Ok(collapse_blank_lines(content.trim()))
    }
}

impl DocumentLoader for HtmlLoader {
    fn load(&self, data: &[u8]) -> Result<String> {
        let html = String::from_utf8_lossy(data);
        let document = scraper::Html::parse_document(&html);
        let body_selector = scraper::Selector::parse("body")
            .map_err(|e| Error::parse("html", format!("{:?}", e)))?;

        let root = match document.select(&body_selector).next() {
            Some(body) => body,
            None => document.root_element(),
        };

        let mut lines = Vec::new();
        for node in root.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element())
                .map(|el| matches!(el.name(), "script" | "style" | "noscript" | "template"))
                .unwrap_or(false);
            if hidden {
                continue;
            }
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(collapse_spaces(trimmed));
            }
        }

        Ok(lines.join("\n"))
    }
}

impl DocumentLoader for TextLoader {
    fn load(&self, data: &[u8]) -> Result<String> {
        let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
        match std::str::from_utf8(data) {
            Ok(text) => Ok(text.to_string()),
            Err(e) => {
                tracing::warn!("Text document is not valid UTF-8 ({}), decoding lossily", e);
                Ok(String::from_utf8_lossy(data).into_owned())
            }
        }
    }
}

fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_spaces(text: &str) -> String {
    static SPACES: OnceLock<Option<Regex>> = OnceLock::new();
    match SPACES.get_or_init(|| Regex::new(r"\s+").ok()) {
        Some(re) => re.replace_all(text, " ").into_owned(),
        None => text.to_string(),
    }
}

fn collapse_blank_lines(text: &str) -> String {
    static BLANKS: OnceLock<Option<Regex>> = OnceLock::new();
    match BLANKS.get_or_init(|| Regex::new(r"\n{3,}").ok()) {
        Some(re) => re.replace_all(text, "\n\n").into_owned(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_loader_strips_bom() {
        let text = TextLoader.load(b"\xEF\xBB\xBFhello").unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_text_loader_is_lossy() {
        let text = TextLoader.load(&[b'o', b'k', 0xFF]).unwrap();
        assert!(text.starts_with("ok"));
    }

    #[test]
    fn test_html_skips_scripts_and_styles() {
        let html = br#"<html><head><title>T</title><style>p { color: red; }</style></head>
            <body><h1>Heading</h1><script>var x = 1;</script>
            <p>First   paragraph
            text.</p><p>Second.</p></body></html>"#;

        let text = HtmlLoader.load(html).unwrap();
        assert_eq!(text, "Heading\nFirst paragraph text.\nSecond.");
    }

    #[test]
    fn test_corrupt_pdf_is_parse_error() {
        let err = PdfLoader.load(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_corrupt_docx_is_parse_error() {
        let err = DocxLoader.load(b"PK not really a zip").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[tokio::test]
    async fn test_load_text_dispatches_by_type() {
        let text = load_text(FileType::Html, b"<body><p>hi</p></body>".to_vec())
            .await
            .unwrap();
        assert_eq!(text, "hi");

        let text = load_text(FileType::Txt, b"plain".to_vec()).await.unwrap();
        assert_eq!(text, "plain");
    }
}
