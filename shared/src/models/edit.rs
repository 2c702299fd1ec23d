//! Edit-in-place scratch buffer for the stock adjustment screen.
//!
//! Users change historical quantities in the buffer; history itself is never
//! rewritten. What gets posted is one compensating adjustment carrying the
//! net difference across every edited row, on any page.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::MovementEntry;

/// One edited history row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowEdit {
    pub row_key: String,
    pub original: i64,
    pub edited: i64,
}

impl RowEdit {
    pub fn delta(&self) -> i64 {
        self.edited - self.original
    }
}

/// Pending edits keyed by history row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditBuffer {
    edits: BTreeMap<String, RowEdit>,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a buffer from edits submitted all at once.
    ///
    /// A later edit of the same row replaces an earlier one but keeps the
    /// first recorded original.
    pub fn from_edits<I>(edits: I) -> Self
    where
        I: IntoIterator<Item = RowEdit>,
    {
        let mut buffer = Self::new();
        for edit in edits {
            buffer.stage(edit.row_key, edit.original, edit.edited);
        }
        buffer
    }

    /// Record a new quantity for a row.
    ///
    /// Editing a row back to its original value removes it from the buffer.
    pub fn stage(&mut self, row_key: impl Into<String>, original: i64, edited: i64) {
        let row_key = row_key.into();
        let original = self
            .edits
            .get(&row_key)
            .map(|e| e.original)
            .unwrap_or(original);

        if edited == original {
            self.edits.remove(&row_key);
        } else {
            self.edits.insert(
                row_key.clone(),
                RowEdit {
                    row_key,
                    original,
                    edited,
                },
            );
        }
    }

    /// Stage an edit for a history entry
    pub fn stage_entry(&mut self, entry: &MovementEntry, edited: i64) {
        self.stage(entry.row_key(), entry.quantity, edited);
    }

    pub fn is_dirty(&self) -> bool {
        !self.edits.is_empty()
    }

    pub fn edits(&self) -> impl Iterator<Item = &RowEdit> {
        self.edits.values()
    }

    /// `sum(edited) - sum(original)` across all edited rows
    pub fn net_delta(&self) -> i64 {
        self.edits.values().map(RowEdit::delta).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_net_delta_of_single_edit() {
        let mut buffer = EditBuffer::new();
        buffer.stage("SUP-1/1@7", 10, 12);
        buffer.stage("SALE-2/4@7", -3, -3);
        buffer.stage("SUP-3/9@7", 5, 5);

        assert_eq!(buffer.net_delta(), 2);
        assert_eq!(buffer.edits().count(), 1);
    }

    #[test]
    fn test_reverting_an_edit_clears_it() {
        let mut buffer = EditBuffer::new();
        buffer.stage("row", 4, 9);
        assert!(buffer.is_dirty());

        buffer.stage("row", 4, 4);
        assert!(!buffer.is_dirty());
        assert_eq!(buffer.net_delta(), 0);
    }

    #[test]
    fn test_repeated_edits_keep_first_original() {
        let mut buffer = EditBuffer::new();
        buffer.stage("row", 4, 9);
        buffer.stage("row", 9, 6);

        let edit = buffer.edits().next().unwrap();
        assert_eq!(edit.original, 4);
        assert_eq!(edit.edited, 6);
        assert_eq!(buffer.net_delta(), 2);
    }

    #[test]
    fn test_edits_across_pages_accumulate() {
        let buffer = EditBuffer::from_edits(vec![
            RowEdit { row_key: "page1-row".into(), original: -2, edited: -5 },
            RowEdit { row_key: "page3-row".into(), original: 20, edited: 24 },
        ]);
        assert_eq!(buffer.net_delta(), 1);
    }

    proptest! {
        #[test]
        fn prop_net_delta_is_sum_of_row_deltas(
            rows in prop::collection::vec((-100i64..100, -100i64..100), 0..20),
        ) {
            let mut buffer = EditBuffer::new();
            for (i, (original, edited)) in rows.iter().enumerate() {
                buffer.stage(format!("row-{}", i), *original, *edited);
            }
            let expected: i64 = rows.iter().map(|(o, e)| e - o).sum();
            prop_assert_eq!(buffer.net_delta(), expected);
        }
    }
}
