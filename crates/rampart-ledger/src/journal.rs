//! The append-only journal of balance movements.
//!
//! Entries are never modified or deleted. Each carries a monotonically
//! increasing sequence number and the balance it left behind, which lets
//! [`reconcile`](crate::reconcile) detect both missing entries and drifted
//! counters.

use serde::{Deserialize, Serialize};

use rampart_types::{PlayerId, StructureCategory};

/// What kind of movement a journal entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalKind {
    /// Account opened with a starting balance.
    Open,
    /// Points spent on a placement.
    Spend,
    /// Points returned or awarded.
    Credit,
}

/// One balance movement in one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the journal, starting at 0.
    pub sequence: u64,
    /// Whose balance moved.
    pub player: PlayerId,
    /// Which pool moved.
    pub category: StructureCategory,
    /// Direction of the movement.
    pub kind: JournalKind,
    /// Points moved (or the opening balance).
    pub amount: u32,
    /// Balance after the movement.
    pub balance_after: u32,
}

/// Append-only list of [`JournalEntry`] values.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Create an empty journal.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Return the number of entries.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return whether the journal has no entries.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a movement, stamping it with the next sequence number.
    pub fn record(
        &mut self,
        player: PlayerId,
        category: StructureCategory,
        kind: JournalKind,
        amount: u32,
        balance_after: u32,
    ) {
        let sequence = u64::try_from(self.entries.len()).unwrap_or(u64::MAX);
        self.entries.push(JournalEntry {
            sequence,
            player,
            category,
            kind,
            amount,
            balance_after,
        });
    }

    /// All entries, in insertion order.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }
}
