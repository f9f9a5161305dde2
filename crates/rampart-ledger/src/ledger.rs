//! The economy ledger: per-player category counters plus their journal.
//!
//! # Design
//!
//! - **Unsigned**: balances are `u32`; there is no representation of debt.
//! - **Atomic**: [`EconomyLedger::try_spend`] checks every category before
//!   touching any counter, so a multi-category spend either fully applies or
//!   leaves the ledger untouched.
//! - **Journaled**: every movement lands in the [`Journal`].

use std::collections::BTreeMap;

use tracing::{debug, error};

use rampart_types::{Budget, BudgetChange, PlayerId, StructureCategory};

use crate::journal::{Journal, JournalKind};
use crate::reconcile::reconcile;
use crate::{LedgerAnomaly, LedgerError};

/// Per-player budget accounts for one match.
#[derive(Debug, Default)]
pub struct EconomyLedger {
    /// Live balances, keyed by player.
    accounts: BTreeMap<PlayerId, Budget>,
    /// Every movement, in order.
    journal: Journal,
}

impl EconomyLedger {
    /// Create a ledger with no accounts.
    pub const fn new() -> Self {
        Self {
            accounts: BTreeMap::new(),
            journal: Journal::new(),
        }
    }

    /// Open an account with a starting budget.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountExists`] if the player already has one.
    pub fn open_account(
        &mut self,
        player: PlayerId,
        opening: Budget,
    ) -> Result<Vec<BudgetChange>, LedgerError> {
        if self.accounts.contains_key(&player) {
            return Err(LedgerError::AccountExists(player));
        }
        self.accounts.insert(player, opening);

        let mut changes = Vec::with_capacity(StructureCategory::BUDGETED.len());
        for category in StructureCategory::BUDGETED {
            let value = opening.get(category).unwrap_or(0);
            self.journal
                .record(player, category, JournalKind::Open, value, value);
            changes.push(BudgetChange {
                player,
                category,
                new_value: value,
            });
        }
        debug!(player = %player, ?opening, "Budget account opened");
        Ok(changes)
    }

    /// The player's full budget.
    pub fn budget(&self, player: PlayerId) -> Option<Budget> {
        self.accounts.get(&player).copied()
    }

    /// The player's balance in one category.
    pub fn balance(&self, player: PlayerId, category: StructureCategory) -> Option<u32> {
        self.accounts.get(&player).and_then(|b| b.get(category))
    }

    /// Whether the player could afford `costs` right now.
    ///
    /// # Errors
    ///
    /// Returns the same error [`try_spend`](Self::try_spend) would.
    pub fn check_affordable(
        &self,
        player: PlayerId,
        costs: &BTreeMap<StructureCategory, u32>,
    ) -> Result<(), LedgerError> {
        let budget = self
            .accounts
            .get(&player)
            .ok_or(LedgerError::UnknownPlayer(player))?;
        for (&category, &requested) in costs {
            let available = budget
                .get(category)
                .ok_or(LedgerError::NoBudgetPool(category))?;
            if available < requested {
                return Err(LedgerError::Insufficient {
                    category,
                    requested,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Spend points across one or more categories, all or nothing.
    ///
    /// Zero-cost categories are checked but produce no journal entry or
    /// change record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownPlayer`], [`LedgerError::NoBudgetPool`],
    /// or [`LedgerError::Insufficient`]. On error no balance has changed.
    pub fn try_spend(
        &mut self,
        player: PlayerId,
        costs: &BTreeMap<StructureCategory, u32>,
    ) -> Result<Vec<BudgetChange>, LedgerError> {
        self.check_affordable(player, costs)?;

        let budget = self
            .accounts
            .get_mut(&player)
            .ok_or(LedgerError::UnknownPlayer(player))?;

        let mut changes = Vec::with_capacity(costs.len());
        for (&category, &amount) in costs {
            if amount == 0 {
                continue;
            }
            let Some(slot) = budget.get_mut(category) else {
                // check_affordable already rejected pool-less categories.
                error!(player = %player, ?category, "Spend reached a category without a pool");
                continue;
            };
            let new_value = slot.saturating_sub(amount);
            *slot = new_value;
            self.journal
                .record(player, category, JournalKind::Spend, amount, new_value);
            changes.push(BudgetChange {
                player,
                category,
                new_value,
            });
        }

        debug!(player = %player, ?costs, "Budget spent");
        Ok(changes)
    }

    /// Add points to one category.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownPlayer`], [`LedgerError::NoBudgetPool`],
    /// or [`LedgerError::Overflow`].
    pub fn credit(
        &mut self,
        player: PlayerId,
        category: StructureCategory,
        amount: u32,
    ) -> Result<BudgetChange, LedgerError> {
        let budget = self
            .accounts
            .get_mut(&player)
            .ok_or(LedgerError::UnknownPlayer(player))?;
        let slot = budget
            .get_mut(category)
            .ok_or(LedgerError::NoBudgetPool(category))?;
        let new_value = slot
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { category })?;
        *slot = new_value;
        self.journal
            .record(player, category, JournalKind::Credit, amount, new_value);

        debug!(player = %player, ?category, amount, new_value, "Budget credited");
        Ok(BudgetChange {
            player,
            category,
            new_value,
        })
    }

    /// Read-only access to the journal.
    pub const fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Number of open accounts.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Replay the journal and compare it with live balances.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerAnomaly`] describing every mismatched counter.
    pub fn reconcile(&self) -> Result<(), LedgerAnomaly> {
        reconcile(&self.accounts, self.journal.entries())
    }
}
