//! DOCX extraction via `docx-rs`.

use super::{ExtractedText, Extractor, Format, TextBuilder};
use crate::error::{KnowledgeError, KnowledgeResult};

pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn format(&self) -> Format {
        Format::Docx
    }

    fn extract(&self, bytes: &[u8]) -> KnowledgeResult<ExtractedText> {
        let doc = docx_rs::read_docx(bytes)
            .map_err(|e| KnowledgeError::CorruptInput(format!("unreadable DOCX: {}", e)))?;

        let mut builder = TextBuilder::default();

        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                let mut line = String::new();
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                line.push_str(&t.text);
                            }
                        }
                    }
                }
                let line = line.trim();
                if !line.is_empty() {
                    builder.push_line(line);
                }
            }
        }

        builder.finish_non_blank(Format::Docx)
    }
}
