//! Extractors for text-based formats: plain text, Markdown and HTML.

use super::{ExtractedText, Extractor, Format, TextBuilder};
use crate::error::{KnowledgeError, KnowledgeResult};

/// Decode bytes as UTF-8 text, tolerating stray invalid sequences.
///
/// NUL bytes, or a decode that is mostly replacement characters, mean the
/// payload is binary.
pub(crate) fn decode_text(bytes: &[u8]) -> KnowledgeResult<String> {
    if bytes.contains(&0) {
        return Err(KnowledgeError::CorruptInput(
            "binary content in a text document".to_string(),
        ));
    }

    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = String::from_utf8_lossy(bytes);

    let total = text.chars().count();
    let replaced = text.chars().filter(|&c| c == char::REPLACEMENT_CHARACTER).count();
    if total > 0 && replaced * 10 > total {
        return Err(KnowledgeError::CorruptInput(
            "document is not valid UTF-8 text".to_string(),
        ));
    }

    Ok(text.into_owned())
}

pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn format(&self) -> Format {
        Format::Txt
    }

    fn extract(&self, bytes: &[u8]) -> KnowledgeResult<ExtractedText> {
        decode_text(bytes).map(ExtractedText::plain)
    }
}

/// Markdown: strips heading markers, fences and rules; headings become sections.
pub struct MarkdownExtractor;

impl Extractor for MarkdownExtractor {
    fn format(&self) -> Format {
        Format::Markdown
    }

    fn extract(&self, bytes: &[u8]) -> KnowledgeResult<ExtractedText> {
        Ok(clean_markdown(&decode_text(bytes)?))
    }
}

fn clean_markdown(text: &str) -> ExtractedText {
    let mut builder = TextBuilder::default();

    for line in text.lines() {
        let stripped = line.trim();

        if stripped.starts_with("---") || stripped.starts_with("```") || stripped.starts_with("~~~") {
            continue;
        }

        if stripped.starts_with('#') {
            let title = stripped.trim_start_matches('#').trim();
            if !title.is_empty() {
                builder.mark_section(title);
                builder.push_line(title);
            }
            continue;
        }

        if !stripped.is_empty() {
            builder.push_line(stripped);
        }
    }

    builder.finish()
}

/// HTML: drops tags and the bodies of `<script>` and `<style>`.
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn format(&self) -> Format {
        Format::Html
    }

    fn extract(&self, bytes: &[u8]) -> KnowledgeResult<ExtractedText> {
        Ok(ExtractedText::plain(clean_html(&decode_text(bytes)?)))
    }
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    for (i, ch) in text.char_indices() {
        if ch == '<' {
            in_tag = true;
            let rest = &text[i..];
            if starts_with_ignore_case(rest, "<script") {
                in_script = true;
            } else if starts_with_ignore_case(rest, "</script") {
                in_script = false;
            } else if starts_with_ignore_case(rest, "<style") {
                in_style = true;
            } else if starts_with_ignore_case(rest, "</style") {
                in_style = false;
            }
        } else if ch == '>' {
            in_tag = false;
            // Tag boundaries separate words
            result.push(' ');
        } else if !in_tag && !in_script && !in_style {
            result.push(ch);
        }
    }

    decode_entities(&result.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_nul_bytes() {
        let err = decode_text(b"PK\x03\x04\x00\x00binary").unwrap_err();
        assert!(matches!(err, KnowledgeError::CorruptInput(_)));
    }

    #[test]
    fn test_decode_tolerates_stray_invalid_bytes() {
        let mut bytes = b"The sky is blue. ".repeat(4);
        bytes.push(0xFF);
        let text = decode_text(&bytes).unwrap();
        assert!(text.starts_with("The sky is blue."));
    }

    #[test]
    fn test_decode_rejects_mostly_garbage() {
        let bytes = vec![0xFFu8; 64];
        assert!(decode_text(&bytes).is_err());
    }

    #[test]
    fn test_decode_strips_bom() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFhello").unwrap(), "hello");
    }

    #[test]
    fn test_clean_markdown() {
        let input = "# Résumé\n\nSome text\n\n```rust\ncode\n```\n\n## Détails\nMore text";
        let output = clean_markdown(input);
        assert!(output.text.contains("Résumé"));
        assert!(output.text.contains("Some text"));
        assert!(output.text.contains("More text"));
        assert!(!output.text.contains("```"));
        assert!(!output.text.contains('#'));

        let byte = output.text.find("More text").unwrap();
        let more = output.text[..byte].chars().count();
        assert_eq!(output.section_at(more), Some("Détails"));
        assert_eq!(output.section_at(0), Some("Résumé"));
        assert_eq!(output.sections.len(), 2);
    }

    #[test]
    fn test_clean_html() {
        let input = "<html><body><p>Hello <b>world</b></p></body></html>";
        assert_eq!(clean_html(input), "Hello world");
    }

    #[test]
    fn test_clean_html_skips_script_and_style() {
        let input = "<head><STYLE>p { color: red }</STYLE><script>alert(1)</script></head><p>Visible &amp; kept</p>";
        assert_eq!(clean_html(input), "Visible & kept");
    }

    #[test]
    fn test_clean_html_non_ascii() {
        let input = "<p>Café été</p><p>naïve</p>";
        assert_eq!(clean_html(input), "Café été naïve");
    }
}
