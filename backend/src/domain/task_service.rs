//! Chore tasks and the payment-request state machine.
//!
//! Normal lifecycle: `pending -> approved | rejected`, closed by a parent.
//! A documented administrative override from the history screen also allows
//! `rejected -> approved` (re-posts the deposit) and `approved -> rejected`
//! (removes the matching deposit again). The reversal re-derives the
//! deposit by description and amount; when several equal-priced payouts
//! exist for the same task and child, the most recent one is removed —
//! the request does not keep a reference to its transaction.

use std::sync::Arc;

use tracing::info;

use crate::domain::clock::SharedClock;
use crate::domain::commands::tasks::{RequestPaymentCommand, UpsertTaskCommand};
use crate::domain::commands::transactions::ApplyTransactionCommand;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::family_service::FamilyService;
use crate::domain::ledger_service::LedgerService;
use crate::domain::models::{PaymentRequest, PaymentRequestStatus, Task, TransactionType};
use crate::storage::FamilyStorage;

/// Cap on the base64 proof image attached to a payment request.
pub const MAX_IMAGE_BYTES: usize = 700 * 1024;

/// Ledger description for an approved task payout.
pub fn payout_label(task_name: &str) -> String {
    format!("Task completed: {}", task_name)
}

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn FamilyStorage>,
    families: FamilyService,
    ledger: LedgerService,
    clock: SharedClock,
}

impl TaskService {
    pub fn new(
        store: Arc<dyn FamilyStorage>,
        families: FamilyService,
        ledger: LedgerService,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            families,
            ledger,
            clock,
        }
    }

    pub fn create_task(&self, command: UpsertTaskCommand) -> DomainResult<Task> {
        self.validate_task_fields(&command)?;
        let family = self.families.get_family_uncached(&command.family_id)?;
        let task = Task {
            id: Task::generate_id(self.clock.now().timestamp_millis() as u64, family.tasks.len()),
            name: command.name.trim().to_string(),
            price: command.price,
            active_for: command.active_for,
        };
        self.store.upsert_task(&command.family_id, task.clone())?;
        self.families.invalidate(&command.family_id);
        info!(family_id = %command.family_id, task_id = %task.id, "created task");
        Ok(task)
    }

    pub fn update_task(&self, command: UpsertTaskCommand) -> DomainResult<Task> {
        self.validate_task_fields(&command)?;
        let task_id = command
            .task_id
            .as_deref()
            .ok_or_else(|| DomainError::Validation("task id required for update".into()))?;
        let family = self.families.get_family_uncached(&command.family_id)?;
        if family.task(task_id).is_none() {
            return Err(DomainError::NotFound(format!("task {}", task_id)));
        }
        let task = Task {
            id: task_id.to_string(),
            name: command.name.trim().to_string(),
            price: command.price,
            active_for: command.active_for,
        };
        self.store.upsert_task(&command.family_id, task.clone())?;
        self.families.invalidate(&command.family_id);
        Ok(task)
    }

    pub fn delete_task(&self, family_id: &str, task_id: &str) -> DomainResult<()> {
        if !self.store.delete_task(family_id, task_id)? {
            return Err(DomainError::NotFound(format!("task {}", task_id)));
        }
        self.families.invalidate(family_id);
        Ok(())
    }

    /// A child claims a task as done, opening a pending request with the
    /// task's name and price snapshotted.
    pub fn request_payment(&self, command: RequestPaymentCommand) -> DomainResult<PaymentRequest> {
        if let Some(image) = &command.image {
            if image.len() > MAX_IMAGE_BYTES {
                return Err(DomainError::Validation(format!(
                    "image exceeds the {} byte cap",
                    MAX_IMAGE_BYTES
                )));
            }
        }
        let family = self.families.get_family_uncached(&command.family_id)?;
        if family.child(&command.child_id).is_none() {
            return Err(DomainError::NotFound(format!("child {}", command.child_id)));
        }
        let task = family
            .task(&command.task_id)
            .ok_or_else(|| DomainError::NotFound(format!("task {}", command.task_id)))?;
        if !task.is_active_for(&command.child_id) {
            return Err(DomainError::Validation(format!(
                "task {} is not available for this child",
                task.name
            )));
        }

        let now = self.clock.now();
        let request = PaymentRequest {
            id: PaymentRequest::generate_id(
                now.timestamp_millis() as u64,
                family.payment_requests.len(),
            ),
            task_id: task.id.clone(),
            task_name: task.name.clone(),
            task_price: task.price,
            child_id: command.child_id.clone(),
            note: command.note,
            image: command.image,
            status: PaymentRequestStatus::Pending,
            requested_at: now,
            completed_at: None,
        };
        self.store
            .insert_payment_request(&command.family_id, request.clone())?;
        self.families.invalidate(&command.family_id);
        info!(family_id = %command.family_id, request_id = %request.id,
              task = %request.task_name, "payment requested");
        Ok(request)
    }

    /// Approve a pending request and pay the snapshotted price.
    pub fn approve(&self, family_id: &str, request_id: &str) -> DomainResult<PaymentRequest> {
        let request = self.store.transition_payment_request(
            family_id,
            request_id,
            PaymentRequestStatus::Pending,
            PaymentRequestStatus::Approved,
            self.clock.now(),
        )?;
        self.post_payout(family_id, &request)?;
        self.families.invalidate(family_id);
        Ok(request)
    }

    /// Reject a pending request. No ledger effect.
    pub fn reject(&self, family_id: &str, request_id: &str) -> DomainResult<PaymentRequest> {
        let request = self.store.transition_payment_request(
            family_id,
            request_id,
            PaymentRequestStatus::Pending,
            PaymentRequestStatus::Rejected,
            self.clock.now(),
        )?;
        self.families.invalidate(family_id);
        info!(family_id, request_id, "payment request rejected");
        Ok(request)
    }

    /// Administrative correction from the history screen: flip a closed
    /// request between approved and rejected with a compensating ledger
    /// entry. Also accepts a still-pending request, behaving like
    /// approve/reject.
    pub fn set_status(
        &self,
        family_id: &str,
        request_id: &str,
        new_status: PaymentRequestStatus,
    ) -> DomainResult<PaymentRequest> {
        let family = self.families.get_family_uncached(family_id)?;
        let current = family
            .payment_request(request_id)
            .ok_or_else(|| DomainError::NotFound(format!("payment request {}", request_id)))?
            .status;

        match (current, new_status) {
            (PaymentRequestStatus::Pending, PaymentRequestStatus::Approved) => {
                self.approve(family_id, request_id)
            }
            (PaymentRequestStatus::Pending, PaymentRequestStatus::Rejected) => {
                self.reject(family_id, request_id)
            }
            (PaymentRequestStatus::Rejected, PaymentRequestStatus::Approved) => {
                let request = self.store.transition_payment_request(
                    family_id,
                    request_id,
                    PaymentRequestStatus::Rejected,
                    PaymentRequestStatus::Approved,
                    self.clock.now(),
                )?;
                self.post_payout(family_id, &request)?;
                self.families.invalidate(family_id);
                info!(family_id, request_id, "override: rejected -> approved");
                Ok(request)
            }
            (PaymentRequestStatus::Approved, PaymentRequestStatus::Rejected) => {
                // One atomic store step: status gate, deposit removal and the
                // flip to rejected all succeed or fail together, so a missing
                // deposit or a concurrent flip leaves everything untouched.
                let request = family
                    .payment_request(request_id)
                    .cloned()
                    .ok_or_else(|| DomainError::NotFound(format!("payment request {}", request_id)))?;
                let request = self.store.reject_approved_request(
                    family_id,
                    request_id,
                    &payout_label(&request.task_name),
                    request.task_price,
                    self.clock.now(),
                )?;
                self.families.invalidate(family_id);
                info!(family_id, request_id, "override: approved -> rejected, payout reversed");
                Ok(request)
            }
            (current, requested) => Err(DomainError::Validation(format!(
                "cannot change payment request from {} to {}",
                current.as_str(),
                requested.as_str()
            ))),
        }
    }

    fn post_payout(&self, family_id: &str, request: &PaymentRequest) -> DomainResult<()> {
        let (_, new_balance) = self.ledger.apply_transaction(ApplyTransactionCommand {
            family_id: family_id.to_string(),
            child_id: request.child_id.clone(),
            transaction_type: TransactionType::Deposit,
            amount: request.task_price,
            description: payout_label(&request.task_name),
            category: None,
        })?;
        info!(family_id, request_id = %request.id, amount = request.task_price,
              new_balance, "task payout posted");
        Ok(())
    }

    fn validate_task_fields(&self, command: &UpsertTaskCommand) -> DomainResult<()> {
        if command.name.trim().is_empty() {
            return Err(DomainError::Validation("task name must not be empty".into()));
        }
        if command.price <= 0.0 {
            return Err(DomainError::Validation(format!(
                "task price must be positive, got {}",
                command.price
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;
    use crate::domain::commands::children::AddChildCommand;
    use crate::domain::phone::PhoneRegistry;
    use crate::storage::MemoryFamilyStore;
    use chrono::{TimeZone, Utc};

    struct Fixture {
        tasks: TaskService,
        store: Arc<MemoryFamilyStore>,
        family_id: String,
        child_id: String,
        task_id: String,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryFamilyStore::new());
        let registry = PhoneRegistry::new(store.clone() as Arc<dyn FamilyStorage>, "+972");
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap(),
        ));
        let families = FamilyService::new(store.clone(), registry, clock.clone());
        let ledger = LedgerService::new(store.clone(), families.clone(), clock.clone());
        let tasks = TaskService::new(store.clone(), families.clone(), ledger, clock);

        let family = families.create_family("+972521111111", "Noa").unwrap();
        let child = families
            .add_child(AddChildCommand {
                family_id: family.id.clone(),
                name: "Dana".into(),
                phone: None,
            })
            .unwrap();
        let task = tasks
            .create_task(UpsertTaskCommand {
                family_id: family.id.clone(),
                task_id: None,
                name: "Dishes".into(),
                price: 20.0,
                active_for: vec![child.id.clone()],
            })
            .unwrap();
        Fixture {
            tasks,
            store,
            family_id: family.id,
            child_id: child.id,
            task_id: task.id,
        }
    }

    fn balance(f: &Fixture) -> f64 {
        let family = f.store.get_family(&f.family_id).unwrap().unwrap();
        family.child(&f.child_id).unwrap().balance
    }

    fn open_request(f: &Fixture) -> PaymentRequest {
        f.tasks
            .request_payment(RequestPaymentCommand {
                family_id: f.family_id.clone(),
                task_id: f.task_id.clone(),
                child_id: f.child_id.clone(),
                note: Some("done!".into()),
                image: None,
            })
            .unwrap()
    }

    #[test]
    fn test_create_task_validates_price() {
        let f = fixture();
        let result = f.tasks.create_task(UpsertTaskCommand {
            family_id: f.family_id.clone(),
            task_id: None,
            name: "Freebie".into(),
            price: 0.0,
            active_for: vec![],
        });
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_update_and_delete_task() {
        let f = fixture();
        let updated = f
            .tasks
            .update_task(UpsertTaskCommand {
                family_id: f.family_id.clone(),
                task_id: Some(f.task_id.clone()),
                name: "Dishes and drying".into(),
                price: 25.0,
                active_for: vec![f.child_id.clone()],
            })
            .unwrap();
        assert_eq!(updated.price, 25.0);

        f.tasks.delete_task(&f.family_id, &f.task_id).unwrap();
        assert!(matches!(
            f.tasks.delete_task(&f.family_id, &f.task_id),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn test_request_payment_snapshots_task() {
        let f = fixture();
        let request = open_request(&f);
        assert_eq!(request.status, PaymentRequestStatus::Pending);
        assert_eq!(request.task_name, "Dishes");
        assert_eq!(request.task_price, 20.0);

        // Later task edits don't change the promised price.
        f.tasks
            .update_task(UpsertTaskCommand {
                family_id: f.family_id.clone(),
                task_id: Some(f.task_id.clone()),
                name: "Dishes".into(),
                price: 99.0,
                active_for: vec![f.child_id.clone()],
            })
            .unwrap();
        f.tasks.approve(&f.family_id, &request.id).unwrap();
        assert_eq!(balance(&f), 20.0);
    }

    #[test]
    fn test_request_payment_requires_active_task() {
        let f = fixture();
        f.tasks
            .update_task(UpsertTaskCommand {
                family_id: f.family_id.clone(),
                task_id: Some(f.task_id.clone()),
                name: "Dishes".into(),
                price: 20.0,
                active_for: vec![],
            })
            .unwrap();
        let result = f.tasks.request_payment(RequestPaymentCommand {
            family_id: f.family_id.clone(),
            task_id: f.task_id.clone(),
            child_id: f.child_id.clone(),
            note: None,
            image: None,
        });
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_request_payment_caps_image_size() {
        let f = fixture();
        let result = f.tasks.request_payment(RequestPaymentCommand {
            family_id: f.family_id.clone(),
            task_id: f.task_id.clone(),
            child_id: f.child_id.clone(),
            note: None,
            image: Some("x".repeat(MAX_IMAGE_BYTES + 1)),
        });
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_approve_pays_and_is_single_shot() {
        let f = fixture();
        let request = open_request(&f);
        let approved = f.tasks.approve(&f.family_id, &request.id).unwrap();
        assert_eq!(approved.status, PaymentRequestStatus::Approved);
        assert!(approved.completed_at.is_some());
        assert_eq!(balance(&f), 20.0);

        let again = f.tasks.approve(&f.family_id, &request.id);
        assert!(matches!(again, Err(DomainError::NotPending(_))));
        assert_eq!(balance(&f), 20.0);
    }

    #[test]
    fn test_reject_has_no_ledger_effect() {
        let f = fixture();
        let request = open_request(&f);
        let rejected = f.tasks.reject(&f.family_id, &request.id).unwrap();
        assert_eq!(rejected.status, PaymentRequestStatus::Rejected);
        assert_eq!(balance(&f), 0.0);

        assert!(matches!(
            f.tasks.reject(&f.family_id, &request.id),
            Err(DomainError::NotPending(_))
        ));
    }

    #[test]
    fn test_override_rejected_to_approved_posts_payout() {
        let f = fixture();
        let request = open_request(&f);
        f.tasks.reject(&f.family_id, &request.id).unwrap();

        let flipped = f
            .tasks
            .set_status(&f.family_id, &request.id, PaymentRequestStatus::Approved)
            .unwrap();
        assert_eq!(flipped.status, PaymentRequestStatus::Approved);
        assert_eq!(balance(&f), 20.0);
    }

    #[test]
    fn test_override_approved_to_rejected_reverses_payout() {
        let f = fixture();
        let request = open_request(&f);
        f.tasks.approve(&f.family_id, &request.id).unwrap();
        assert_eq!(balance(&f), 20.0);

        let flipped = f
            .tasks
            .set_status(&f.family_id, &request.id, PaymentRequestStatus::Rejected)
            .unwrap();
        assert_eq!(flipped.status, PaymentRequestStatus::Rejected);
        assert_eq!(balance(&f), 0.0);

        let family = f.store.get_family(&f.family_id).unwrap().unwrap();
        assert!(family.child(&f.child_id).unwrap().transactions.is_empty());
    }

    #[test]
    fn test_override_fails_cleanly_when_payout_is_gone() {
        let f = fixture();
        // An approved request whose payout never made it to the ledger.
        let orphan = PaymentRequest {
            id: "payreq-orphan".into(),
            task_id: f.task_id.clone(),
            task_name: "Dishes".into(),
            task_price: 20.0,
            child_id: f.child_id.clone(),
            note: None,
            image: None,
            status: PaymentRequestStatus::Approved,
            requested_at: Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap(),
            completed_at: None,
        };
        f.store
            .insert_payment_request(&f.family_id, orphan)
            .unwrap();

        let result = f
            .tasks
            .set_status(&f.family_id, "payreq-orphan", PaymentRequestStatus::Rejected);
        assert!(matches!(result, Err(DomainError::Validation(_))));
        // Request status and balance must be untouched.
        let family = f.store.get_family(&f.family_id).unwrap().unwrap();
        assert_eq!(
            family.payment_request("payreq-orphan").unwrap().status,
            PaymentRequestStatus::Approved
        );
        assert_eq!(balance(&f), 0.0);
    }

    #[test]
    fn test_set_status_rejects_no_op_and_pending_target() {
        let f = fixture();
        let request = open_request(&f);
        f.tasks.approve(&f.family_id, &request.id).unwrap();
        let result = f
            .tasks
            .set_status(&f.family_id, &request.id, PaymentRequestStatus::Approved);
        assert!(matches!(result, Err(DomainError::Validation(_))));
        let result = f
            .tasks
            .set_status(&f.family_id, &request.id, PaymentRequestStatus::Pending);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
