//! Domain-level command and result types.
//!
//! These structs are used by services inside the domain layer and are not
//! exposed over the public API; the REST layer maps the wire DTOs from the
//! `shared` crate to these internal types.

pub mod auth {
    /// Result of issuing a one-time code.
    #[derive(Debug, Clone)]
    pub struct RequestCodeResult {
        /// Whether the phone already belongs to a family.
        pub is_existing_family: bool,
        /// Whether the code was handed to the delivery collaborator.
        pub delivered: bool,
    }

    /// An authenticated principal after OTP verification.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Session {
        pub family_id: String,
        pub is_child: bool,
        pub child_id: Option<String>,
        pub is_additional_parent: bool,
        /// True when verification provisioned a brand-new family.
        pub is_new_family: bool,
    }
}

pub mod children {
    /// Input for adding a child to a family.
    #[derive(Debug, Clone)]
    pub struct AddChildCommand {
        pub family_id: String,
        pub name: String,
        /// Raw phone as entered; normalized and claimed before storage.
        pub phone: Option<String>,
    }
}

pub mod allowance {
    /// Input for updating a child's recurring-payment settings.
    #[derive(Debug, Clone)]
    pub struct UpdateAllowanceCommand {
        pub family_id: String,
        pub child_id: String,
        pub weekly_allowance: f64,
        /// "weekly" or "monthly".
        pub allowance_type: String,
        pub allowance_day: u32,
        /// "HH:mm" in the reference timezone.
        pub allowance_time: String,
        pub weekly_interest_rate: Option<f64>,
    }
}

pub mod transactions {
    use crate::domain::models::TransactionType;

    /// Input for posting a transaction to a child's ledger.
    #[derive(Debug, Clone)]
    pub struct ApplyTransactionCommand {
        pub family_id: String,
        pub child_id: String,
        pub transaction_type: TransactionType,
        pub amount: f64,
        pub description: String,
        pub category: Option<String>,
    }
}

pub mod tasks {
    /// Input for creating or updating a task.
    #[derive(Debug, Clone)]
    pub struct UpsertTaskCommand {
        pub family_id: String,
        /// None creates a new task.
        pub task_id: Option<String>,
        pub name: String,
        pub price: f64,
        pub active_for: Vec<String>,
    }

    /// Input for a child requesting payment for a completed task.
    #[derive(Debug, Clone)]
    pub struct RequestPaymentCommand {
        pub family_id: String,
        pub task_id: String,
        pub child_id: String,
        pub note: Option<String>,
        /// Base64-encoded proof image.
        pub image: Option<String>,
    }
}
