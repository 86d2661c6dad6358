//! CSV extraction: each row becomes one `header: value` line.

use super::text::decode_text;
use super::{ExtractedText, Extractor, Format, TextBuilder};
use crate::error::{KnowledgeError, KnowledgeResult};

pub struct CsvExtractor;

impl Extractor for CsvExtractor {
    fn format(&self) -> Format {
        Format::Csv
    }

    fn extract(&self, bytes: &[u8]) -> KnowledgeResult<ExtractedText> {
        let text = decode_text(bytes)?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| KnowledgeError::CorruptInput(format!("unreadable CSV header: {}", e)))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut builder = TextBuilder::default();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                KnowledgeError::CorruptInput(format!("unreadable CSV row {}: {}", row + 1, e))
            })?;

            let fields: Vec<String> = record
                .iter()
                .enumerate()
                .filter(|(_, value)| !value.trim().is_empty())
                .map(|(i, value)| match headers.get(i).filter(|h| !h.is_empty()) {
                    Some(header) => format!("{}: {}", header, value.trim()),
                    None => value.trim().to_string(),
                })
                .collect();

            if !fields.is_empty() {
                builder.push_line(&fields.join("; "));
            }
        }

        builder.finish_non_blank(Format::Csv)
    }
}
