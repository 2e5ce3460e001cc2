//! Domain models for chores and the payment-request state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A choreable task a child can complete for a fixed price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub price: f64,
    /// Child ids allowed to request payment for this task.
    pub active_for: Vec<String>,
}

impl Task {
    pub fn generate_id(timestamp_millis: u64, ordinal: usize) -> String {
        format!("task-{}-{}", timestamp_millis, ordinal)
    }

    pub fn is_active_for(&self, child_id: &str) -> bool {
        self.active_for.iter().any(|id| id == child_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRequestStatus::Pending => "pending",
            PaymentRequestStatus::Approved => "approved",
            PaymentRequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentRequestStatus::Pending),
            "approved" => Some(PaymentRequestStatus::Approved),
            "rejected" => Some(PaymentRequestStatus::Rejected),
            _ => None,
        }
    }
}

/// A child's claim that a task was completed. Name and price are snapshotted
/// at creation so later task edits don't change what was promised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: String,
    pub task_id: String,
    pub task_name: String,
    pub task_price: f64,
    pub child_id: String,
    pub note: Option<String>,
    /// Base64-encoded proof image; size-capped at creation.
    pub image: Option<String>,
    pub status: PaymentRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaymentRequest {
    pub fn generate_id(timestamp_millis: u64, ordinal: usize) -> String {
        format!("payreq-{}-{}", timestamp_millis, ordinal)
    }
}
