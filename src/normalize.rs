//! Normalisation of extracted document text before caching.
//!
//! PDF text extraction and OCR both produce structurally noisy output —
//! carriage returns, runs of blank lines between columns, trailing spaces
//! where line boxes ended, and the occasional zero-width character baked
//! into the source document. Cleaning that up *before* the text enters the
//! cache means every later request sees the same canonical form, and the
//! assembled context wastes no completion-service tokens on whitespace.
//!
//! Each rule is a pure `&str → String` function; they run in a fixed order
//! (line endings first so later line-based rules see `\n` only, final
//! newline last).

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all normalisation rules to raw extractor output.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Trim trailing whitespace per line
/// 3. Collapse 3+ consecutive blank lines down to 2
/// 4. Strip invisible Unicode (zero-width spaces, BOM, word joiners)
/// 5. Ensure the text ends with exactly one newline
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 3: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 4: Strip invisible Unicode ──────────────────────────────────────────

const INVISIBLE: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

fn remove_invisible_chars(input: &str) -> String {
    input.chars().filter(|c| !INVISIBLE.contains(c)).collect()
}

// ── Rule 5: Ensure single final newline ──────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}
