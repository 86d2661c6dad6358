//! PDF extraction.
//!
//! Pages are read individually with `lopdf` so chunks can carry page numbers.
//! When that yields nothing (unusual encodings, damaged xref tables) the whole
//! document goes through `pdf-extract` as a fallback.

use super::{ExtractedText, Extractor, Format, TextBuilder};
use crate::error::{KnowledgeError, KnowledgeResult};

pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn format(&self) -> Format {
        Format::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> KnowledgeResult<ExtractedText> {
        if !bytes.starts_with(b"%PDF") {
            return Err(KnowledgeError::CorruptInput(
                "missing PDF header".to_string(),
            ));
        }

        match lopdf::Document::load_mem(bytes) {
            Ok(doc) => {
                let paged = extract_pages(&doc);
                if !paged.text.trim().is_empty() {
                    return Ok(paged);
                }
                tracing::debug!("Per-page extraction produced no text, trying fallback");
                extract_whole(bytes)
            }
            Err(e) => {
                tracing::debug!(error = %e, "lopdf could not load document, trying fallback");
                extract_whole(bytes)
            }
        }
    }
}

fn extract_pages(doc: &lopdf::Document) -> ExtractedText {
    let mut builder = TextBuilder::default();

    for page_number in doc.get_pages().keys().copied() {
        match doc.extract_text(&[page_number]) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                builder.mark_page(page_number);
                builder.push_str(text);
                builder.push_str("\n\n");
            }
            Err(e) => {
                tracing::debug!(page = page_number, error = %e, "Skipping unreadable page");
            }
        }
    }

    builder.finish()
}

fn extract_whole(bytes: &[u8]) -> KnowledgeResult<ExtractedText> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| KnowledgeError::CorruptInput(format!("unreadable PDF: {}", e)))?;
    split_pages(&text)
}

fn split_pages(text: &str) -> KnowledgeResult<ExtractedText> {
    // Form feeds, when present, separate pages
    let mut builder = TextBuilder::default();
    for (idx, page) in text.split('\u{c}').enumerate() {
        let page = page.trim();
        if page.is_empty() {
            continue;
        }
        builder.mark_page(idx as u32 + 1);
        builder.push_str(page);
        builder.push_str("\n\n");
    }

    builder.finish_non_blank(Format::Pdf)
}
