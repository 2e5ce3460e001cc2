//! Domain model for a child and their recurring-payment settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllowanceType {
    Weekly,
    Monthly,
}

impl AllowanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllowanceType::Weekly => "weekly",
            AllowanceType::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(AllowanceType::Weekly),
            "monthly" => Some(AllowanceType::Monthly),
            _ => None,
        }
    }
}

/// A savings target a child is working towards. Informational only; it does
/// not constrain the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsGoal {
    pub name: String,
    pub target_amount: f64,
}

/// A child owned by a family. The transaction list is insertion-ordered and
/// `balance` is maintained incrementally alongside it; the pair is only ever
/// mutated through the store's atomic append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    pub id: String,
    pub name: String,
    /// Normalized phone for child sign-in; unique system-wide when present.
    pub phone: Option<String>,
    pub balance: f64,
    pub cash_box_balance: f64,
    pub transactions: Vec<Transaction>,
    pub weekly_allowance: f64,
    pub allowance_type: AllowanceType,
    /// 0-6 (Sunday-Saturday) for weekly, 1-31 for monthly.
    pub allowance_day: u32,
    /// "HH:mm" in the reference timezone.
    pub allowance_time: String,
    /// Percent per week; interest accrues daily at rate/7.
    pub weekly_interest_rate: f64,
    pub last_allowance_payment: Option<DateTime<Utc>>,
    pub last_interest_calculation: Option<DateTime<Utc>>,
    pub total_interest_earned: f64,
    pub savings_goal: Option<SavingsGoal>,
    pub created_at: DateTime<Utc>,
}

impl Child {
    /// Generate a unique ID for a child. The ordinal disambiguates children
    /// created within the same millisecond.
    pub fn generate_id(timestamp_millis: u64, ordinal: usize) -> String {
        format!("child-{}-{}", timestamp_millis, ordinal)
    }

    /// New child with no balance, no allowance and no interest.
    pub fn new(id: String, name: String, phone: Option<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            phone,
            balance: 0.0,
            cash_box_balance: 0.0,
            transactions: Vec::new(),
            weekly_allowance: 0.0,
            allowance_type: AllowanceType::Weekly,
            allowance_day: 0,
            allowance_time: "08:00".to_string(),
            weekly_interest_rate: 0.0,
            last_allowance_payment: None,
            last_interest_calculation: None,
            total_interest_earned: 0.0,
            savings_goal: None,
            created_at,
        }
    }

    /// Parse `allowance_time` ("HH:mm") into hour and minute.
    pub fn allowance_hour_minute(&self) -> Option<(u32, u32)> {
        parse_hour_minute(&self.allowance_time)
    }
}

/// Parse an "HH:mm" string. Rejects out-of-range components.
pub fn parse_hour_minute(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}
