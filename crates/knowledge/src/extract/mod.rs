//! Document text extraction.
//!
//! Formats form a closed set ([`Format`]). Each one maps to an [`Extractor`]
//! through a lookup table built once when the [`ExtractorRegistry`] is
//! created. Extraction is pure: bytes in, text out, no files touched.

mod docx;
mod pdf;
mod tabular;
mod text;

pub use docx::DocxExtractor;
pub use pdf::PdfExtractor;
pub use tabular::CsvExtractor;
pub use text::{HtmlExtractor, MarkdownExtractor, PlainTextExtractor};

use crate::error::{KnowledgeError, KnowledgeResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Docx,
    Txt,
    Markdown,
    Csv,
    Html,
}

impl Format {
    pub const ALL: [Format; 6] = [
        Format::Pdf,
        Format::Docx,
        Format::Txt,
        Format::Markdown,
        Format::Csv,
        Format::Html,
    ];

    /// Map a declared file extension to a format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match normalize_extension(extension).as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "text" => Some(Self::Txt),
            "md" | "markdown" => Some(Self::Markdown),
            "csv" => Some(Self::Csv),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }

    /// Extensions recognised for this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Pdf => &["pdf"],
            Self::Docx => &["docx"],
            Self::Txt => &["txt", "text"],
            Self::Markdown => &["md", "markdown"],
            Self::Csv => &["csv"],
            Self::Html => &["html", "htm"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
            Self::Markdown => "markdown",
            Self::Csv => "csv",
            Self::Html => "html",
        }
    }
}

/// Lowercase an extension and strip any leading dot.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// A positional marker at a character offset into extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker<T> {
    pub offset: usize,
    pub value: T,
}

/// Plain text recovered from a document, with optional page and section marks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub pages: Vec<Marker<u32>>,
    pub sections: Vec<Marker<String>>,
}

impl ExtractedText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Page containing the character at `offset`, if the extractor tracked pages.
    pub fn page_at(&self, offset: usize) -> Option<u32> {
        last_at(&self.pages, offset).copied()
    }

    /// Nearest preceding section heading for the character at `offset`.
    pub fn section_at(&self, offset: usize) -> Option<&str> {
        last_at(&self.sections, offset).map(String::as_str)
    }
}

fn last_at<T>(markers: &[Marker<T>], offset: usize) -> Option<&T> {
    let idx = markers.partition_point(|m| m.offset <= offset);
    idx.checked_sub(1).map(|i| &markers[i].value)
}

/// Incrementally builds an [`ExtractedText`], tracking char offsets.
#[derive(Debug, Default)]
pub(crate) struct TextBuilder {
    out: ExtractedText,
    chars: usize,
}

impl TextBuilder {
    pub fn push_str(&mut self, s: &str) {
        self.chars += s.chars().count();
        self.out.text.push_str(s);
    }

    pub fn push_line(&mut self, s: &str) {
        self.push_str(s);
        self.push_str("\n");
    }

    pub fn mark_page(&mut self, number: u32) {
        self.out.pages.push(Marker {
            offset: self.chars,
            value: number,
        });
    }

    pub fn mark_section(&mut self, title: impl Into<String>) {
        self.out.sections.push(Marker {
            offset: self.chars,
            value: title.into(),
        });
    }

    pub fn is_blank(&self) -> bool {
        self.out.text.trim().is_empty()
    }

    /// Finish, reporting a document that yielded no text as `EmptyInput`.
    pub fn finish_non_blank(self, format: Format) -> KnowledgeResult<ExtractedText> {
        if self.is_blank() {
            return Err(KnowledgeError::EmptyInput(format!(
                "{} document has no extractable text",
                format.as_str()
            )));
        }
        Ok(self.finish())
    }

    pub fn finish(mut self) -> ExtractedText {
        let trimmed_len = self.out.text.trim_end().len();
        self.out.text.truncate(trimmed_len);
        self.out
    }
}

/// Converts the raw bytes of one format into text.
pub trait Extractor: Send + Sync {
    fn format(&self) -> Format;

    fn extract(&self, bytes: &[u8]) -> KnowledgeResult<ExtractedText>;
}

/// Lookup table from declared extension to extractor, gated by an allow-list.
pub struct ExtractorRegistry {
    extractors: HashMap<Format, Arc<dyn Extractor>>,
    allowed: HashSet<String>,
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut allowed: Vec<&String> = self.allowed.iter().collect();
        allowed.sort();
        f.debug_struct("ExtractorRegistry")
            .field("formats", &self.extractors.keys().collect::<Vec<_>>())
            .field("allowed", &allowed)
            .finish()
    }
}

impl ExtractorRegistry {
    /// Build a registry with every built-in extractor, accepting only the
    /// given extensions.
    pub fn new<S: AsRef<str>>(allowed_extensions: &[S]) -> Self {
        let mut registry = Self {
            extractors: HashMap::new(),
            allowed: allowed_extensions
                .iter()
                .map(|e| normalize_extension(e.as_ref()))
                .collect(),
        };
        registry.register(PdfExtractor);
        registry.register(DocxExtractor);
        registry.register(PlainTextExtractor);
        registry.register(MarkdownExtractor);
        registry.register(CsvExtractor);
        registry.register(HtmlExtractor);
        registry
    }

    /// A registry accepting every extension of every known format.
    pub fn with_all_formats() -> Self {
        let all: Vec<&str> = Format::ALL
            .iter()
            .flat_map(|f| f.extensions().iter().copied())
            .collect();
        Self::new(&all)
    }

    pub fn register<E: Extractor + 'static>(&mut self, extractor: E) {
        self.extractors.insert(extractor.format(), Arc::new(extractor));
    }

    pub fn is_allowed(&self, extension: &str) -> bool {
        self.allowed.contains(&normalize_extension(extension))
    }

    /// Resolve the extractor for a declared extension.
    pub fn resolve(&self, extension: &str) -> KnowledgeResult<Arc<dyn Extractor>> {
        let ext = normalize_extension(extension);
        if !self.allowed.contains(&ext) {
            return Err(KnowledgeError::UnsupportedFormat(format!(
                "extension '{}' is not allowed",
                ext
            )));
        }
        Format::from_extension(&ext)
            .and_then(|format| self.extractors.get(&format).cloned())
            .ok_or_else(|| {
                KnowledgeError::UnsupportedFormat(format!("no extractor for '{}'", ext))
            })
    }

    /// Extract text from `bytes` declared as `extension`.
    ///
    /// A parser panic on hostile input is reported as `CorruptInput`.
    pub fn extract(&self, bytes: &[u8], extension: &str) -> KnowledgeResult<ExtractedText> {
        let extractor = self.resolve(extension)?;
        if bytes.is_empty() {
            return Err(KnowledgeError::EmptyInput("document has no bytes".to_string()));
        }

        let format = extractor.format();
        match catch_unwind(AssertUnwindSafe(|| extractor.extract(bytes))) {
            Ok(result) => {
                if let Ok(extracted) = &result {
                    tracing::debug!(
                        format = format.as_str(),
                        bytes = bytes.len(),
                        chars = extracted.text.len(),
                        pages = extracted.pages.len(),
                        "Extracted text"
                    );
                }
                result
            }
            Err(_) => Err(KnowledgeError::CorruptInput(format!(
                "{} parser aborted on malformed input",
                format.as_str()
            ))),
        }
    }
}
