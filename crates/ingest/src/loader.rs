//! Document loading: bytes in, page texts out.

use paperchat_core::{Error, Result};
use tracing::debug;

const FORM_FEED: char = '\x0c';

/// Accepted document formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
    Markdown,
}

impl DocumentKind {
    /// Classify an upload by its extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some("txt") => Ok(Self::Text),
            Some("md") | Some("markdown") => Ok(Self::Markdown),
            _ => Err(Error::invalid_input(format!(
                "Only PDF, TXT and MD files are allowed (got '{filename}')"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "text",
            Self::Markdown => "markdown",
        }
    }
}

/// Text of one page. Plain-text documents are a single unnumbered page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub number: Option<u32>,
    pub text: String,
}

/// Extract page texts from a document.
///
/// Fails with `InvalidInput` when the bytes cannot be decoded or contain no
/// text at all.
pub async fn load(kind: DocumentKind, bytes: Vec<u8>) -> Result<Vec<Page>> {
    let pages = match kind {
        DocumentKind::Pdf => load_pdf(bytes).await?,
        DocumentKind::Text | DocumentKind::Markdown => {
            let text = String::from_utf8(bytes)
                .map_err(|e| Error::invalid_input(format!("document is not valid UTF-8: {e}")))?;
            vec![Page { number: None, text }]
        }
    };

    if pages.iter().all(|p| p.text.trim().is_empty()) {
        return Err(Error::invalid_input(
            "document contains no extractable text",
        ));
    }
    debug!(kind = kind.as_str(), pages = pages.len(), "Loaded document");
    Ok(pages)
}

async fn load_pdf(bytes: Vec<u8>) -> Result<Vec<Page>> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| Error::invalid_input(format!("PDF extraction aborted: {e}")))?
        .map_err(|e| Error::invalid_input(format!("could not read PDF: {e}")))?;

    Ok(split_pages(&text))
}

/// Split extracted PDF text on form feeds into 1-based pages, dropping
/// blank pages but keeping the numbering of the rest.
fn split_pages(text: &str) -> Vec<Page> {
    text.split(FORM_FEED)
        .enumerate()
        .filter(|(_, t)| !t.trim().is_empty())
        .map(|(i, t)| Page {
            number: Some(i as u32 + 1),
            text: t.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperchat_core::ErrorKind;

    #[test]
    fn kind_from_extension() {
        assert_eq!(DocumentKind::from_filename("paper.PDF").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("notes.txt").unwrap(), DocumentKind::Text);
        assert_eq!(DocumentKind::from_filename("README.md").unwrap(), DocumentKind::Markdown);
    }

    #[test]
    fn unsupported_extension_rejected() {
        for name in ["image.png", "archive.tar.gz", "noext", ""] {
            let err = DocumentKind::from_filename(name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{name}");
        }
    }

    #[test]
    fn form_feeds_become_pages() {
        let pages = split_pages("first\x0c\x0cthird\x0c");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, Some(1));
        assert_eq!(pages[1].number, Some(3));
        assert_eq!(pages[1].text, "third");
    }

    #[tokio::test]
    async fn text_is_one_page() {
        let pages = load(DocumentKind::Text, b"hello world".to_vec()).await.unwrap();
        assert_eq!(pages, vec![Page { number: None, text: "hello world".into() }]);
    }

    #[tokio::test]
    async fn blank_text_rejected() {
        let err = load(DocumentKind::Text, b"  \n ".to_vec()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn invalid_utf8_rejected() {
        let err = load(DocumentKind::Markdown, vec![0xff, 0xfe, 0x00]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn garbage_pdf_rejected() {
        let err = load(DocumentKind::Pdf, b"not a pdf".to_vec()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
