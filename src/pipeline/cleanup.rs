//! Deterministic cleanup of backend-produced text.
//!
//! Generative backends wrap JSON answers in code fences despite being told
//! not to, emit `\r\n`, and sprinkle zero-width characters into OCR output.
//! These rules fix the quirks without touching content. Each is a pure
//! `&str → String` function and independently testable.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all text rules to one area's extracted text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 1
/// 5. Trim the whole block
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Response fences ──────────────────────────────────────────────────────────

static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\n(.*?)\n[ \t]*```").unwrap());

/// Return the body of the first fenced block, or the trimmed input when
/// there is none.
pub fn strip_code_fences(input: &str) -> String {
    let normalised = normalise_line_endings(input);
    match RE_FENCED.captures(&normalised) {
        Some(caps) => caps[1].trim().to_string(),
        None => normalised.trim().to_string(),
    }
}

// ── Line endings ─────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Trailing whitespace ──────────────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Blank lines ──────────────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Invisible Unicode ────────────────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fence() {
        let input = "```json\n[{\"text\": \"a\"}]\n```";
        assert_eq!(strip_code_fences(input), "[{\"text\": \"a\"}]");
    }

    #[test]
    fn test_strip_fence_with_preamble() {
        let input = "Here are the blocks:\n```\n[]\n```\nDone.";
        assert_eq!(strip_code_fences(input), "[]");
    }

    #[test]
    fn test_strip_fence_crlf() {
        let input = "```json\r\n[1]\r\n```";
        assert_eq!(strip_code_fences(input), "[1]");
    }

    #[test]
    fn test_no_fence_passthrough() {
        assert_eq!(strip_code_fences("  [1, 2]\n"), "[1, 2]");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_clean_text_full_pipeline() {
        let input = "  Title  \r\n\r\n\r\n\r\nBody\u{200B} text   \n";
        assert_eq!(clean_text(input), "Title\n\nBody text");
    }
}
