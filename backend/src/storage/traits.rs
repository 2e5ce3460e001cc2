//! Storage abstraction for family aggregates.
//!
//! The domain layer only talks to [`FamilyStorage`], so the in-process
//! document map can later be swapped for an external document store without
//! touching the services. Every mutating method is a single atomic step
//! against one family document; in particular the transaction-append +
//! balance-increment pair is one operation, never a read-modify-write in the
//! caller.

use chrono::{DateTime, Utc};

use crate::domain::error::DomainResult;
use crate::domain::models::{
    AdditionalParent, AllowanceType, Category, Child, Family, PaymentRequest,
    PaymentRequestStatus, SavingsGoal, Task, Transaction,
};

/// Recurring-payment settings applied to a child in one step.
#[derive(Debug, Clone)]
pub struct AllowanceSettings {
    pub weekly_allowance: f64,
    pub allowance_type: AllowanceType,
    pub allowance_day: u32,
    pub allowance_time: String,
    pub weekly_interest_rate: f64,
}

pub trait FamilyStorage: Send + Sync {
    /// Insert a new family document. Fails if the id is taken.
    fn insert_family(&self, family: &Family) -> DomainResult<()>;

    /// Fetch a full family aggregate.
    fn get_family(&self, family_id: &str) -> DomainResult<Option<Family>>;

    /// All family documents; used by the phone registry and the scheduler.
    fn list_families(&self) -> DomainResult<Vec<Family>>;

    /// Append a transaction to a child's ledger AND increment the balance by
    /// its delta, as one atomic step. Returns the balance after the append.
    /// Concurrent calls against the same child must never lose an update.
    fn append_transaction(
        &self,
        family_id: &str,
        child_id: &str,
        transaction: Transaction,
    ) -> DomainResult<f64>;

    /// Reverse an approved payment request as one atomic step: check the
    /// request is still `Approved` (else `NotPending`), remove the most
    /// recent deposit matching description and amount while decrementing
    /// the balance, and flip the request to `Rejected` stamping
    /// `completed_at`. When no deposit matches, fails `Validation` and
    /// leaves the request, ledger and balance untouched. Returns the
    /// updated request.
    fn reject_approved_request(
        &self,
        family_id: &str,
        request_id: &str,
        description: &str,
        amount: f64,
        completed_at: DateTime<Utc>,
    ) -> DomainResult<PaymentRequest>;

    /// A child's transactions in insertion order (callers sort for display).
    fn list_child_transactions(
        &self,
        family_id: &str,
        child_id: &str,
    ) -> DomainResult<Vec<Transaction>>;

    /// Explicit repair path: recompute the balance as the algebraic sum of
    /// the stored transactions and persist it. Returns the repaired balance.
    fn recompute_balance(&self, family_id: &str, child_id: &str) -> DomainResult<f64>;

    fn add_child(&self, family_id: &str, child: Child) -> DomainResult<()>;

    fn add_additional_parent(
        &self,
        family_id: &str,
        parent: AdditionalParent,
    ) -> DomainResult<()>;

    fn update_allowance_settings(
        &self,
        family_id: &str,
        child_id: &str,
        settings: AllowanceSettings,
    ) -> DomainResult<()>;

    fn set_savings_goal(
        &self,
        family_id: &str,
        child_id: &str,
        goal: Option<SavingsGoal>,
    ) -> DomainResult<()>;

    /// Record that the allowance for the current period was posted.
    fn mark_allowance_paid(
        &self,
        family_id: &str,
        child_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<()>;

    /// Record an interest posting: stamps the calculation time and adds the
    /// posted amount to the child's running interest total.
    fn mark_interest_posted(
        &self,
        family_id: &str,
        child_id: &str,
        at: DateTime<Utc>,
        amount: f64,
    ) -> DomainResult<()>;

    /// Insert or replace a category by id.
    fn upsert_category(&self, family_id: &str, category: Category) -> DomainResult<()>;

    /// Returns true if the category existed.
    fn delete_category(&self, family_id: &str, category_id: &str) -> DomainResult<bool>;

    /// Insert or replace a task by id.
    fn upsert_task(&self, family_id: &str, task: Task) -> DomainResult<()>;

    /// Returns true if the task existed.
    fn delete_task(&self, family_id: &str, task_id: &str) -> DomainResult<bool>;

    fn insert_payment_request(
        &self,
        family_id: &str,
        request: PaymentRequest,
    ) -> DomainResult<()>;

    /// Atomically check a payment request's current status against
    /// `expected` and move it to `new_status`, stamping `completed_at`.
    /// Fails `NotPending` when the current status differs from `expected`.
    /// Returns the updated request.
    fn transition_payment_request(
        &self,
        family_id: &str,
        request_id: &str,
        expected: PaymentRequestStatus,
        new_status: PaymentRequestStatus,
        completed_at: DateTime<Utc>,
    ) -> DomainResult<PaymentRequest>;

    fn touch_last_login(&self, family_id: &str, at: DateTime<Utc>) -> DomainResult<()>;
}
