//! Text similarity used for de-duplication and reconciliation.
//!
//! Two texts are *similar* when, after normalisation (lower-case, pipes
//! dropped, whitespace collapsed), either
//!
//! * one contains the other and the shorter is at least `threshold` of the
//!   longer's length ([`containment_ratio`]), or
//! * their word sets overlap by at least `threshold` ([`word_jaccard`]).
//!
//! Containment catches an OCR pass that read a strict subset of another;
//! Jaccard catches two passes that read the same words with small
//! differences in spacing or ordering.

use std::collections::HashSet;

/// Lower-case, drop table pipes and collapse whitespace.
pub fn normalize_for_compare(text: &str) -> String {
    text.to_lowercase()
        .replace('|', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `len(shorter) / len(longer)` when the longer contains the shorter, else 0.
///
/// Inputs are compared as given; call [`normalize_for_compare`] first.
pub fn containment_ratio(a: &str, b: &str) -> f32 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let long_len = long.chars().count();
    if long_len == 0 || short.is_empty() || !long.contains(short) {
        return 0.0;
    }
    short.chars().count() as f32 / long_len as f32
}

/// Jaccard index of the whitespace-separated word sets.
pub fn word_jaccard(a: &str, b: &str) -> f32 {
    let wa: HashSet<&str> = a.split_whitespace().collect();
    let wb: HashSet<&str> = b.split_whitespace().collect();
    if wa.is_empty() && wb.is_empty() {
        return 0.0;
    }
    let inter = wa.intersection(&wb).count();
    let union = wa.union(&wb).count();
    inter as f32 / union as f32
}

/// Whether `a` and `b` are near-duplicates at `threshold` (0.0–1.0).
pub fn similar(a: &str, b: &str, threshold: f32) -> bool {
    let na = normalize_for_compare(a);
    let nb = normalize_for_compare(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    if na == nb {
        return true;
    }
    containment_ratio(&na, &nb) >= threshold || word_jaccard(&na, &nb) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_after_normalisation() {
        assert!(similar("Hello   World", "hello world", 0.99));
        assert!(similar("| a | 1 |", "a 1", 0.99));
    }

    #[test]
    fn containment_requires_substring() {
        assert_eq!(containment_ratio("abc", "xyzabc"), 0.5);
        assert_eq!(containment_ratio("abd", "xyzabc"), 0.0);
        assert_eq!(containment_ratio("", "abc"), 0.0);
    }

    #[test]
    fn unrelated_lengths_are_not_similar() {
        // Same length, no shared words: a pure length ratio would call these equal.
        assert!(!similar("alpha beta gamma", "delta omega kappa", 0.7));
    }

    #[test]
    fn jaccard_counts_shared_words() {
        let j = word_jaccard("the quick brown fox", "the quick red fox");
        assert!((j - 0.6).abs() < 1e-6, "got {j}");
        assert!(similar("the quick brown fox", "the quick red fox", 0.5));
        assert!(!similar("the quick brown fox", "the quick red fox", 0.7));
    }

    #[test]
    fn empty_text_is_never_similar() {
        assert!(!similar("", "", 0.1));
        assert!(!similar("abc", "   ", 0.1));
    }

    #[test]
    fn subset_reading_is_similar() {
        let full = "Invoice 2024 total amount due 450 EUR";
        let part = "total amount due 450 EUR";
        assert!(similar(full, part, 0.6));
    }
}
