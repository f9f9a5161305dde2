//! Per-player category budgets for the Rampart build phase.
//!
//! Every budget point a player spends or receives passes through the
//! [`EconomyLedger`]. Balances are unsigned and spends are all-or-nothing
//! across the categories one request touches, so a balance can never go
//! negative and a rejected spend leaves no trace.
//!
//! # Architecture
//!
//! - [`ledger`] -- The [`EconomyLedger`]: accounts, spends, credits.
//! - [`journal`] -- The append-only [`Journal`] of every balance movement.
//! - [`reconcile`] -- Replays the journal against live balances.
//!
//! # Reconciliation
//!
//! For every player P and category C:
//!
//! ```text
//! balance(P, C) == opening(P, C) - sum(spends for P, C) + sum(credits for P, C)
//! ```
//!
//! A violation produces a [`LedgerAnomaly`]. The ledger never panics; it
//! returns errors.
//!
//! # Usage
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use rampart_ledger::EconomyLedger;
//! use rampart_types::{Budget, PlayerId, StructureCategory};
//!
//! let mut ledger = EconomyLedger::new();
//! let player = PlayerId::new();
//! ledger.open_account(player, Budget::new(10, 6, 6, 3)).ok();
//!
//! let costs = BTreeMap::from([(StructureCategory::Wall, 4)]);
//! assert!(ledger.try_spend(player, &costs).is_ok());
//! assert_eq!(ledger.balance(player, StructureCategory::Wall), Some(6));
//! assert!(ledger.reconcile().is_ok());
//! ```

pub mod journal;
pub mod ledger;
pub mod reconcile;

// Re-export primary types at crate root.
pub use journal::{Journal, JournalEntry, JournalKind};
pub use ledger::EconomyLedger;

use std::collections::BTreeMap;

use rampart_types::{PlayerId, StructureCategory};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when moving budget points.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The player has no account.
    #[error("no budget account for player {0}")]
    UnknownPlayer(PlayerId),

    /// The player already has an account.
    #[error("budget account for player {0} already exists")]
    AccountExists(PlayerId),

    /// The player cannot cover the requested amount.
    #[error("insufficient {category:?} budget: requested {requested}, available {available}")]
    Insufficient {
        /// The category that fell short.
        category: StructureCategory,
        /// Points requested.
        requested: u32,
        /// Points available.
        available: u32,
    },

    /// The category has no player budget pool.
    #[error("category {0:?} has no budget pool")]
    NoBudgetPool(StructureCategory),

    /// A credit would overflow the counter.
    #[error("{category:?} balance would overflow")]
    Overflow {
        /// The category that would overflow.
        category: StructureCategory,
    },
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A mismatch between the journal and the live balances.
///
/// Produced by [`EconomyLedger::reconcile`]. Under correct operation this
/// never happens; when it does, callers log it at `error` level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnomaly {
    /// Per-account mismatch: (`expected_from_journal`, `actual_balance`).
    pub mismatches: BTreeMap<(PlayerId, StructureCategory), (i64, u32)>,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
