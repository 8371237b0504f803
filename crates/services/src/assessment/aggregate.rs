//! Context assembly for research-grounded grading.
//!
//! Scraped pages are cleaned and concatenated into a single prompt context
//! under a fixed character budget. Sources are taken in order; the one that
//! crosses the budget is truncated to fit and everything after it is
//! skipped.

use super::scrape::ScrapedSource;

/// Overall character budget for the aggregated context.
pub const CONTEXT_BUDGET_CHARS: usize = 20_000;

/// Per-source character cap applied during cleanup.
pub const SOURCE_CAP_CHARS: usize = 15_000;

/// The assembled context plus the URLs that contributed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedContext {
    pub text: String,
    pub source_urls: Vec<String>,
}

impl AggregatedContext {
    /// Length in characters, which is what the budget is counted in.
    #[must_use]
    pub fn chars(&self) -> usize {
        self.text.chars().count()
    }
}

/// Normalizes scraped page text for prompt use.
///
/// Drops `{...}` and `[...]` fragments (stray scripts, templates and
/// footnote markers), collapses all whitespace runs to single spaces, and
/// caps the result at [`SOURCE_CAP_CHARS`] characters.
#[must_use]
pub fn clean_source_text(raw: &str) -> String {
    let stripped = strip_delimited(&strip_delimited(raw, '{', '}'), '[', ']');
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > SOURCE_CAP_CHARS {
        collapsed.chars().take(SOURCE_CAP_CHARS).collect()
    } else {
        collapsed
    }
}

/// Concatenates cleaned sources into one tagged context string, spending at
/// most `budget_chars` characters.
#[must_use]
pub fn aggregate_sources(sources: &[ScrapedSource], budget_chars: usize) -> AggregatedContext {
    let mut text = String::new();
    let mut used_chars = 0usize;
    let mut source_urls = Vec::new();

    for source in sources {
        if used_chars >= budget_chars {
            break;
        }
        let cleaned = clean_source_text(&source.text);
        if cleaned.is_empty() {
            continue;
        }

        let block = format!("\n\n=== SOURCE: {} ===\n{}\n", source.url, cleaned);
        let block_chars = block.chars().count();
        let available = budget_chars - used_chars;
        if block_chars <= available {
            text.push_str(&block);
            used_chars += block_chars;
        } else {
            text.extend(block.chars().take(available));
            used_chars += available;
        }
        source_urls.push(source.url.clone());
    }

    AggregatedContext { text, source_urls }
}

// Removes shortest `open`..`close` spans left to right, like a non-greedy
// regex would. An unmatched opener is kept as-is.
fn strip_delimited(text: &str, open: char, close: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        let Some(offset) = rest[start..].find(close) else {
            break;
        };
        out.push_str(&rest[..start]);
        rest = &rest[start + offset + close.len_utf8()..];
    }
    out.push_str(rest);
    out
}

//
// ─── TESTS ──────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: &str, text: String) -> ScrapedSource {
        ScrapedSource {
            url: url.to_string(),
            text,
        }
    }

    #[test]
    fn cleanup_collapses_whitespace_and_strips_fragments() {
        let raw = "A  poem\n\n\nabout {var x = 1;} loss [12] and memory.";
        assert_eq!(clean_source_text(raw), "A poem about loss and memory.");
    }

    #[test]
    fn cleanup_keeps_an_unmatched_opener() {
        assert_eq!(clean_source_text("left { open"), "left { open");
    }

    #[test]
    fn cleanup_caps_source_length() {
        let raw = "x".repeat(SOURCE_CAP_CHARS + 500);
        assert_eq!(clean_source_text(&raw).chars().count(), SOURCE_CAP_CHARS);
    }

    #[test]
    fn budget_truncates_the_crossing_source_and_skips_the_rest() {
        let sources = vec![
            source("https://s1.example", "a".repeat(9_000)),
            source("https://s2.example", "b".repeat(9_000)),
            source("https://s3.example", "c".repeat(9_000)),
            source("https://s4.example", "d".repeat(9_000)),
        ];

        let context = aggregate_sources(&sources, CONTEXT_BUDGET_CHARS);

        assert_eq!(context.chars(), CONTEXT_BUDGET_CHARS);
        assert!(context.text.contains("=== SOURCE: https://s1.example ==="));
        assert!(context.text.contains("=== SOURCE: https://s2.example ==="));
        assert!(context.text.contains("=== SOURCE: https://s3.example ==="));
        assert!(!context.text.contains("s4.example"));
        assert_eq!(
            context.source_urls,
            vec![
                "https://s1.example".to_string(),
                "https://s2.example".to_string(),
                "https://s3.example".to_string(),
            ]
        );
    }

    #[test]
    fn sources_that_clean_to_nothing_are_skipped() {
        let sources = vec![
            source("https://empty.example", "   {only a script}  ".to_string()),
            source("https://real.example", "useful text".to_string()),
        ];

        let context = aggregate_sources(&sources, CONTEXT_BUDGET_CHARS);

        assert_eq!(context.source_urls, vec!["https://real.example".to_string()]);
        assert!(context.text.contains("useful text"));
    }

    #[test]
    fn small_sources_fit_untouched() {
        let sources = vec![source("https://s1.example", "short note".to_string())];
        let context = aggregate_sources(&sources, CONTEXT_BUDGET_CHARS);
        assert_eq!(
            context.text,
            "\n\n=== SOURCE: https://s1.example ===\nshort note\n"
        );
    }
}
