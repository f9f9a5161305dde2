//! Journal reconciliation.
//!
//! Replays every journal entry per (player, category) starting from the
//! opening balance and checks two things:
//!
//! 1. each entry's recorded `balance_after` matches the replayed value, and
//! 2. the final replayed value matches the live counter.
//!
//! Both hold by construction. The check exists to catch counter drift if a
//! future code path writes balances without journaling.

use std::collections::BTreeMap;

use rampart_types::{Budget, PlayerId, StructureCategory};

use crate::LedgerAnomaly;
use crate::journal::{JournalEntry, JournalKind};

/// Compare live balances against a replay of `entries`.
///
/// # Errors
///
/// Returns a [`LedgerAnomaly`] listing every mismatched counter.
pub fn reconcile(
    accounts: &BTreeMap<PlayerId, Budget>,
    entries: &[JournalEntry],
) -> Result<(), LedgerAnomaly> {
    let mut replayed: BTreeMap<(PlayerId, StructureCategory), i64> = BTreeMap::new();
    let mut mismatches: BTreeMap<(PlayerId, StructureCategory), (i64, u32)> = BTreeMap::new();

    for entry in entries {
        let key = (entry.player, entry.category);
        let amount = i64::from(entry.amount);
        let value = replayed.entry(key).or_insert(0);
        *value = match entry.kind {
            JournalKind::Open => amount,
            JournalKind::Spend => value.saturating_sub(amount),
            JournalKind::Credit => value.saturating_add(amount),
        };
        if *value != i64::from(entry.balance_after) {
            mismatches.insert(key, (*value, entry.balance_after));
        }
    }

    for (&player, budget) in accounts {
        for category in StructureCategory::BUDGETED {
            let actual = budget.get(category).unwrap_or(0);
            let expected = replayed.get(&(player, category)).copied().unwrap_or(0);
            if expected != i64::from(actual) {
                mismatches.insert((player, category), (expected, actual));
            }
        }
    }

    if mismatches.is_empty() {
        Ok(())
    } else {
        let count = mismatches.len();
        Err(LedgerAnomaly {
            mismatches,
            message: format!("LEDGER_ANOMALY: {count} budget counter(s) disagree with the journal"),
        })
    }
}
