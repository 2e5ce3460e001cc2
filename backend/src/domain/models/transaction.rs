//! Domain model for a ledger transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(TransactionType::Deposit),
            "expense" => Some(TransactionType::Expense),
            _ => None,
        }
    }
}

/// A single immutable posting to a child's ledger. `amount` is always
/// positive; the sign is carried by `transaction_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub date: DateTime<Utc>,
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub description: String,
    /// Category name; present exactly for expenses.
    pub category: Option<String>,
    pub child_id: String,
}

impl Transaction {
    /// Generate a unique transaction ID.
    /// Format: `<dep|exp>-<timestamp_ms>-<random_suffix>`
    /// Example: `dep-1625846400123-af3c`
    pub fn generate_id(transaction_type: TransactionType, timestamp_ms: u64) -> String {
        let kind = match transaction_type {
            TransactionType::Deposit => "dep",
            TransactionType::Expense => "exp",
        };
        format!("{}-{}-{}", kind, timestamp_ms, Self::generate_random_suffix(4))
    }

    /// Signed contribution of this transaction to the balance.
    pub fn delta(&self) -> f64 {
        match self.transaction_type {
            TransactionType::Deposit => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }

    fn generate_random_suffix(len: usize) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        format!("{:x}", now % (16_u128.pow(len as u32)))
            .chars()
            .take(len)
            .collect()
    }
}
