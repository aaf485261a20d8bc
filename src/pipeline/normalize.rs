//! Text normalisation: deterministic cleanup of recognised text.
//!
//! Tesseract makes the same handful of mistakes on screenshots of quizzes,
//! forms and spreadsheets: empty answer bubbles read as `©` or `Oo`, option
//! letters picked up with a stray `I`/`l` in front, `1` read as `l`/`i`/`t`
//! next to a capital. Those are fixed by a fixed table of regex rules.
//!
//! When a table was detected, two further passes rebuild rows the engine
//! flattened: a run of short tokens on separate lines is regrouped into
//! columns, and lines with wide gaps are split into cells.
//!
//! ## Pass Order
//!
//! 1. [`fix_recognition_errors`]: substitutions and noise-line removal
//! 2. flat-token regrouping *(tables only)*
//! 3. whitespace-delimited row splitting *(tables only)*
//! 4. blank-line collapse and trailing-space trim
//!
//! Every pass is idempotent, so `normalize(normalize(t)) == normalize(t)`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Column counts tried for flat token lists, most preferred first.
pub const DEFAULT_COLUMN_PREFERENCE: [usize; 3] = [3, 2, 4];

const MAX_TOKEN_CHARS: usize = 8;
const MIN_FLAT_TOKENS: usize = 4;
const MAX_CELL_CHARS: usize = 24;
const MIN_SENTENCE_WORDS: usize = 5;

/// Normalise recognised text with the default column preference.
pub fn normalize(text: &str, is_table: bool) -> String {
    normalize_with(text, is_table, &DEFAULT_COLUMN_PREFERENCE)
}

/// Normalise recognised text.
///
/// `is_table` gates the row-reconstruction passes so ordinary prose with
/// wide spacing is never turned into a table.
pub fn normalize_with(text: &str, is_table: bool, column_preference: &[usize]) -> String {
    let s = fix_recognition_errors(text);
    let s = if is_table {
        let s = regroup_flat_tokens(&s, column_preference);
        split_whitespace_rows(&s)
    } else {
        s
    };
    let s = collapse_blank_lines(&s);
    trim_trailing_whitespace(&s).trim().to_string()
}

// ── Pass 1: Recognition fixes ────────────────────────────────────────────────

/// Empty-bubble markers in front of a number: `©2`, `© 12`.
static RE_CIRCLE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"©\s*(\d+)").unwrap());
static RE_CIRCLE_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"©\s*\)").unwrap());
static RE_CIRCLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"©\s*").unwrap());
/// `Ia`, `lb`, `Ic` → option letter alone.
static RE_PREFIXED_OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[Il]([abc])\b").unwrap());
static RE_EMPTY_BUBBLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bOo\b").unwrap());
static RE_BUBBLE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bOs(\d+)\b").unwrap());
/// `l7`, `O3` → digit.
static RE_PREFIXED_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[lO](\d)\b").unwrap());
static RE_I_ZERO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bI0\b").unwrap());
static RE_I_ONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bI1\b").unwrap());
/// A lone capital followed by `i`/`l`/`t` on its own line is capital + `1`.
static RE_LETTER_ONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^([A-HJ-Z])[ilt]$").unwrap());

/// Apply the fixed substitution table, then drop noise lines.
///
/// Lines are trimmed first so the line-anchored rules see what the caller
/// will finally see. The table is re-applied until the text stops changing:
/// a substitution can expose another match (`Ol` → `O1` → `1`), and every
/// rule shortens the text or turns a letter into a digit, so this ends.
///
/// Noise lines hold a single non-alphanumeric character. Blank lines are
/// kept only as single separators after content.
pub fn fix_recognition_errors(text: &str) -> String {
    let mut current = fix_once(text);
    loop {
        let next = fix_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn fix_once(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let s = text.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    let s = RE_CIRCLE_NUMBER.replace_all(&s, "$1");
    let s = RE_CIRCLE_PAREN.replace_all(&s, ")");
    let s = RE_CIRCLE.replace_all(&s, "");
    let s = RE_PREFIXED_OPTION.replace_all(&s, "$1");
    let s = RE_EMPTY_BUBBLE.replace_all(&s, "");
    let s = RE_BUBBLE_NUMBER.replace_all(&s, "$1");
    let s = RE_LETTER_ONE.replace_all(&s, "${1}1");
    let s = RE_PREFIXED_DIGIT.replace_all(&s, "$1");
    let s = RE_I_ZERO.replace_all(&s, "10");
    let s = RE_I_ONE.replace_all(&s, "11");
    drop_noise_lines(&s).trim().to_string()
}

fn drop_noise_lines(input: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for line in input.lines() {
        let stripped = line.trim();
        let mut chars = stripped.chars();
        let meaningful = match (chars.next(), chars.next()) {
            (Some(c), None) => c.is_alphanumeric(),
            (Some(_), Some(_)) => true,
            (None, _) => false,
        };
        if meaningful {
            kept.push(line);
        } else if stripped.is_empty() && kept.last().is_some_and(|l| !l.trim().is_empty()) {
            kept.push(line);
        }
    }
    kept.join("\n")
}

// ── Pass 2: Flat token regrouping ────────────────────────────────────────────

/// Regroup a list of short single-token lines into pipe-delimited rows.
///
/// Applies only when every non-empty line is a token of at most 8
/// characters without whitespace and there are at least 4 of them.
fn regroup_flat_tokens(input: &str, column_preference: &[usize]) -> String {
    let tokens: Vec<&str> = input
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let is_flat = tokens.len() >= MIN_FLAT_TOKENS
        && tokens.iter().all(|t| {
            t.chars().count() <= MAX_TOKEN_CHARS && !t.contains(char::is_whitespace) && !t.contains('|')
        });
    if !is_flat {
        return input.to_string();
    }
    let Some(columns) = pick_column_count(tokens.len(), column_preference) else {
        return input.to_string();
    };

    tokens
        .chunks(columns)
        .map(format_row)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Column count with the smallest remainder; ties go to the earlier preference.
pub fn pick_column_count(token_count: usize, column_preference: &[usize]) -> Option<usize> {
    column_preference
        .iter()
        .copied()
        .filter(|&c| c >= 2 && c <= token_count)
        .enumerate()
        .min_by_key(|&(rank, c)| (token_count % c, rank))
        .map(|(_, c)| c)
}

/// `["a", "b"]` → `"| a | b |"`.
pub fn format_row<S: AsRef<str>>(cells: &[S]) -> String {
    let inner = cells
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(" | ");
    format!("| {} |", inner)
}

// ── Pass 3: Whitespace-delimited rows ────────────────────────────────────────

static RE_WIDE_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{3,}|\t").unwrap());
static RE_CELL_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}|\t+").unwrap());

fn split_whitespace_rows(input: &str) -> String {
    input
        .lines()
        .map(|line| {
            if line.contains('|') || !RE_WIDE_GAP.is_match(line) {
                return line.to_string();
            }
            let parts: Vec<&str> = RE_CELL_SPLIT
                .split(line)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            let row_like = (2..=6).contains(&parts.len())
                && parts
                    .iter()
                    .all(|p| p.chars().count() <= MAX_CELL_CHARS && !is_sentence(p));
            if row_like {
                format_row(&parts)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_sentence(part: &str) -> bool {
    part.split_whitespace().count() >= MIN_SENTENCE_WORDS || part.ends_with(['.', '?', '!'])
}

// ── Pass 4: Whitespace cleanup ───────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Tests ────────────────────────────────────────────────────────────────────
