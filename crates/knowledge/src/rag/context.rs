//! Context assembly for the answer prompt.

use crate::types::ScoredChunk;

/// Separator placed between excerpts.
const SEPARATOR: &str = "\n\n---\n\n";

/// Retrieved chunks rendered into prompt context.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub text: String,

    /// Hits that made it into `text`, best first
    pub used: Vec<ScoredChunk>,

    /// Lower-ranked hits left out for lack of budget
    pub dropped: usize,
}

/// Render hits (best first) as `[document] text` excerpts within
/// `max_chars` characters.
///
/// Excerpts are added in rank order until the next one would overflow the
/// budget, so the lowest-ranked hits are the ones dropped. The best hit is
/// always kept; if it alone exceeds the budget its text is cut short.
pub fn assemble_context(hits: &[ScoredChunk], max_chars: usize) -> AssembledContext {
    let mut text = String::new();
    let mut chars = 0usize;
    let mut used = Vec::new();

    for hit in hits {
        let excerpt = format_excerpt(hit);
        let sep = if used.is_empty() { 0 } else { SEPARATOR.len() };
        let len = excerpt.chars().count();

        if chars + sep + len > max_chars {
            if used.is_empty() {
                text = excerpt.chars().take(max_chars).collect();
                used.push(hit.clone());
            }
            break;
        }

        if sep > 0 {
            text.push_str(SEPARATOR);
        }
        text.push_str(&excerpt);
        chars += sep + len;
        used.push(hit.clone());
    }

    AssembledContext {
        dropped: hits.len() - used.len(),
        text,
        used,
    }
}

fn format_excerpt(hit: &ScoredChunk) -> String {
    match hit.chunk.page {
        Some(page) => format!(
            "[{} p.{}]\n{}",
            hit.chunk.source_document_name, page, hit.chunk.text
        ),
        None => format!("[{}]\n{}", hit.chunk.source_document_name, hit.chunk.text),
    }
}

/// Cut `text` to at most `max_chars` characters at a word boundary.
pub(crate) fn truncate_snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => {
            let truncated = &text[..cut];
            match truncated.rfind(char::is_whitespace) {
                Some(space) if space > 0 => format!("{}...", truncated[..space].trim_end()),
                _ => format!("{}...", truncated),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndexedChunk;

    fn hit(id: u64, doc: &str, text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: IndexedChunk {
                id,
                text: text.to_string(),
                source_document_name: doc.to_string(),
                source_document_id: format!("id-{}", doc),
                position: 0,
                page: None,
                section: None,
            },
            score,
        }
    }

    #[test]
    fn test_context_keeps_rank_order() {
        let hits = vec![
            hit(0, "a.txt", "First chunk", 0.9),
            hit(1, "b.txt", "Second chunk", 0.7),
        ];
        let ctx = assemble_context(&hits, 1000);

        assert_eq!(ctx.text, "[a.txt]\nFirst chunk\n\n---\n\n[b.txt]\nSecond chunk");
        assert_eq!(ctx.used.len(), 2);
        assert_eq!(ctx.dropped, 0);
    }

    #[test]
    fn test_budget_drops_lowest_ranked() {
        let hits = vec![
            hit(0, "a.txt", &"x".repeat(40), 0.9),
            hit(1, "b.txt", &"y".repeat(40), 0.8),
            hit(2, "c.txt", &"z".repeat(40), 0.7),
        ];
        // Room for two excerpts (48 chars each) and one separator
        let ctx = assemble_context(&hits, 48 * 2 + SEPARATOR.len());

        assert_eq!(ctx.used.len(), 2);
        assert_eq!(ctx.dropped, 1);
        assert!(ctx.text.contains("[b.txt]"));
        assert!(!ctx.text.contains("[c.txt]"));
        assert!(ctx.text.chars().count() <= 48 * 2 + SEPARATOR.len());
    }

    #[test]
    fn test_oversized_best_hit_is_truncated() {
        let hits = vec![hit(0, "big.txt", &"w".repeat(500), 0.9), hit(1, "b.txt", "tail", 0.5)];
        let ctx = assemble_context(&hits, 100);

        assert_eq!(ctx.used.len(), 1);
        assert_eq!(ctx.text.chars().count(), 100);
        assert!(ctx.text.starts_with("[big.txt]"));
    }

    #[test]
    fn test_page_in_excerpt_header() {
        let mut h = hit(0, "manual.pdf", "Press the red button.", 0.9);
        h.chunk.page = Some(4);
        let ctx = assemble_context(&[h], 1000);
        assert!(ctx.text.starts_with("[manual.pdf p.4]\n"));
    }

    #[test]
    fn test_truncate_snippet() {
        assert_eq!(truncate_snippet("Short text", 100), "Short text");

        let long = "This is a very long text that needs to be truncated at some point";
        let result = truncate_snippet(long, 30);
        assert!(result.chars().count() <= 33);
        assert!(result.ends_with("..."));

        // Multi-byte text is cut on char boundaries
        let accented = "é".repeat(50);
        assert_eq!(truncate_snippet(&accented, 10), format!("{}...", "é".repeat(10)));
    }
}
