//! Merge table text and whole-image text into one result.
//!
//! Which text wins depends on what the detectors found:
//!
//! | State             | Table text | Output                                   |
//! |-------------------|------------|------------------------------------------|
//! | `NoTable`         | -          | page text, no table heuristics           |
//! | bordered/borderless | empty    | page text, table heuristics enabled      |
//! | bordered/borderless | present  | table text, page text in front if it adds something |
//!
//! Page text that merely re-reads the table (similar at the caption
//! threshold) is dropped. Otherwise it is usually a question or caption
//! printed above the table and is placed first.

use crate::pipeline::similarity::similar;
use serde::{Deserialize, Serialize};

/// Table structure found in one screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    NoTable,
    /// Found by the ruled-line detector.
    BorderedTable,
    /// Found by the aligned-text-block fallback.
    BorderlessTable,
}

impl TableKind {
    /// Two or more ruled cells win over a borderless match.
    pub fn classify(bordered_cells: usize, borderless_valid: bool) -> Self {
        if bordered_cells >= 2 {
            TableKind::BorderedTable
        } else if borderless_valid {
            TableKind::BorderlessTable
        } else {
            TableKind::NoTable
        }
    }

    pub fn has_table(self) -> bool {
        !matches!(self, TableKind::NoTable)
    }
}

/// Merged text plus whether table heuristics apply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub text: String,
    pub is_table: bool,
}

/// Choose between (or combine) table and page text.
pub fn reconcile(kind: TableKind, table_text: &str, page_text: &str, threshold: f32) -> Reconciled {
    let table_text = table_text.trim();
    let page_text = page_text.trim();

    if !kind.has_table() {
        return Reconciled {
            text: page_text.to_string(),
            is_table: false,
        };
    }
    if table_text.is_empty() {
        return Reconciled {
            text: page_text.to_string(),
            is_table: true,
        };
    }

    let text = if page_text.is_empty() || similar(table_text, page_text, threshold) {
        table_text.to_string()
    } else {
        format!("{page_text}\n\n{table_text}")
    };
    Reconciled {
        text,
        is_table: true,
    }
}
