use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use assetbook_core::{JournalRef, Money};

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

/// Account identifier + metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub code: String, // e.g. "6100"
    pub name: String, // e.g. "Depreciation expense"
    pub kind: AccountKind,
}

impl Account {
    pub fn new(code: impl Into<String>, name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind,
        }
    }
}

/// One side of a journal entry (immutable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryLine {
    pub account: Account,
    /// Positive amount.
    pub amount: Money,
    /// true = debit, false = credit.
    pub is_debit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    #[error("journal entry must have lines")]
    Empty,

    #[error("amount on account {account} must be positive, got {amount}")]
    NonPositiveAmount { account: String, amount: Money },

    #[error("debits ({debits}) must equal credits ({credits})")]
    Unbalanced { debits: Money, credits: Money },

    #[error("journal unavailable: {0}")]
    Unavailable(String),
}

/// A validated, balanced journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalRef,
    pub description: String,
    pub lines: Vec<JournalEntryLine>,
    pub posted_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Build an entry, rejecting empty, non-positive or unbalanced line sets.
    pub fn balanced(
        description: impl Into<String>,
        lines: Vec<JournalEntryLine>,
        posted_at: DateTime<Utc>,
    ) -> Result<Self, JournalError> {
        if lines.is_empty() {
            return Err(JournalError::Empty);
        }

        let mut debits = Money::ZERO;
        let mut credits = Money::ZERO;
        for line in &lines {
            if !line.amount.is_positive() {
                return Err(JournalError::NonPositiveAmount {
                    account: line.account.code.clone(),
                    amount: line.amount,
                });
            }
            if line.is_debit {
                debits += line.amount;
            } else {
                credits += line.amount;
            }
        }

        if debits != credits {
            return Err(JournalError::Unbalanced { debits, credits });
        }

        Ok(Self {
            id: JournalRef::new(),
            description: description.into(),
            lines,
            posted_at,
        })
    }
}

/// Destination for posted entries (the general ledger).
pub trait Journal: Send + Sync {
    fn post(&self, entry: JournalEntry) -> Result<JournalRef, JournalError>;

    fn get(&self, id: JournalRef) -> Result<Option<JournalEntry>, JournalError>;
}

/// Process-local journal, used by tests and the in-memory deployment.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    entries: RwLock<HashMap<JournalRef, JournalEntry>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Journal for InMemoryJournal {
    fn post(&self, entry: JournalEntry) -> Result<JournalRef, JournalError> {
        let mut map = self
            .entries
            .write()
            .map_err(|_| JournalError::Unavailable("journal lock poisoned".to_string()))?;
        let id = entry.id;
        map.insert(id, entry);
        Ok(id)
    }

    fn get(&self, id: JournalRef) -> Result<Option<JournalEntry>, JournalError> {
        let map = self
            .entries
            .read()
            .map_err(|_| JournalError::Unavailable("journal lock poisoned".to_string()))?;
        Ok(map.get(&id).cloned())
    }
}

/// Accounts a depreciation period is posted against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepreciationAccounts {
    pub expense: Account,
    pub accumulated: Account,
}

impl DepreciationAccounts {
    pub fn new(expense_code: impl Into<String>, accumulated_code: impl Into<String>) -> Self {
        Self {
            expense: Account::new(expense_code, "Depreciation expense", AccountKind::Expense),
            // Contra-asset: carried as an asset account with a credit balance.
            accumulated: Account::new(
                accumulated_code,
                "Accumulated depreciation",
                AccountKind::Asset,
            ),
        }
    }

    /// Debit expense, credit accumulated depreciation.
    pub fn lines_for(&self, amount: Money) -> Vec<JournalEntryLine> {
        vec![
            JournalEntryLine {
                account: self.expense.clone(),
                amount,
                is_debit: true,
            },
            JournalEntryLine {
                account: self.accumulated.clone(),
                amount,
                is_debit: false,
            },
        ]
    }
}
