//! In-memory implementation of [`FamilyStorage`].
//!
//! Family documents live in one mutex-guarded map. Every trait method is a
//! single critical section over the map, which is exactly what makes the
//! append-transaction-and-increment-balance pair atomic: two concurrent
//! postings to the same child serialize on the lock and each sees the
//! other's balance increment.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::models::{
    AdditionalParent, Category, Child, Family, PaymentRequest, PaymentRequestStatus, SavingsGoal,
    Task, Transaction, TransactionType,
};

use super::traits::{AllowanceSettings, FamilyStorage};

#[derive(Clone, Default)]
pub struct MemoryFamilyStore {
    families: Arc<Mutex<HashMap<String, Family>>>,
}

impl MemoryFamilyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> DomainResult<std::sync::MutexGuard<'_, HashMap<String, Family>>> {
        self.families
            .lock()
            .map_err(|_| DomainError::Store("family map lock poisoned".to_string()))
    }

    fn with_family_mut<R>(
        &self,
        family_id: &str,
        f: impl FnOnce(&mut Family) -> DomainResult<R>,
    ) -> DomainResult<R> {
        let mut families = self.lock()?;
        let family = families
            .get_mut(family_id)
            .ok_or_else(|| DomainError::NotFound(format!("family {}", family_id)))?;
        f(family)
    }
}

fn child_mut<'a>(family: &'a mut Family, child_id: &str) -> DomainResult<&'a mut Child> {
    family
        .child_mut(child_id)
        .ok_or_else(|| DomainError::NotFound(format!("child {}", child_id)))
}

impl FamilyStorage for MemoryFamilyStore {
    fn insert_family(&self, family: &Family) -> DomainResult<()> {
        let mut families = self.lock()?;
        if families.contains_key(&family.id) {
            return Err(DomainError::Validation(format!(
                "family {} already exists",
                family.id
            )));
        }
        families.insert(family.id.clone(), family.clone());
        Ok(())
    }

    fn get_family(&self, family_id: &str) -> DomainResult<Option<Family>> {
        Ok(self.lock()?.get(family_id).cloned())
    }

    fn list_families(&self) -> DomainResult<Vec<Family>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn append_transaction(
        &self,
        family_id: &str,
        child_id: &str,
        transaction: Transaction,
    ) -> DomainResult<f64> {
        self.with_family_mut(family_id, |family| {
            let child = child_mut(family, child_id)?;
            let delta = transaction.delta();
            child.transactions.push(transaction);
            child.balance += delta;
            Ok(child.balance)
        })
    }

    fn reject_approved_request(
        &self,
        family_id: &str,
        request_id: &str,
        description: &str,
        amount: f64,
        completed_at: DateTime<Utc>,
    ) -> DomainResult<PaymentRequest> {
        self.with_family_mut(family_id, |family| {
            let index = family
                .payment_requests
                .iter()
                .position(|r| r.id == request_id)
                .ok_or_else(|| DomainError::NotFound(format!("payment request {}", request_id)))?;
            if family.payment_requests[index].status != PaymentRequestStatus::Approved {
                return Err(DomainError::NotPending(
                    family.payment_requests[index].status.as_str().to_string(),
                ));
            }
            let child_id = family.payment_requests[index].child_id.clone();
            let child = child_mut(family, &child_id)?;
            // Most recent match wins; ties on equal description+amount are
            // otherwise indistinguishable.
            let position = child
                .transactions
                .iter()
                .rposition(|tx| {
                    tx.transaction_type == TransactionType::Deposit
                        && tx.description == description
                        && tx.amount == amount
                })
                .ok_or_else(|| {
                    DomainError::Validation(
                        "matching payout transaction not found; request left approved".to_string(),
                    )
                })?;
            let removed = child.transactions.remove(position);
            child.balance -= removed.amount;
            let request = &mut family.payment_requests[index];
            request.status = PaymentRequestStatus::Rejected;
            request.completed_at = Some(completed_at);
            Ok(request.clone())
        })
    }

    fn list_child_transactions(
        &self,
        family_id: &str,
        child_id: &str,
    ) -> DomainResult<Vec<Transaction>> {
        self.with_family_mut(family_id, |family| {
            let child = child_mut(family, child_id)?;
            Ok(child.transactions.clone())
        })
    }

    fn recompute_balance(&self, family_id: &str, child_id: &str) -> DomainResult<f64> {
        self.with_family_mut(family_id, |family| {
            let child = child_mut(family, child_id)?;
            child.balance = child.transactions.iter().map(Transaction::delta).sum();
            Ok(child.balance)
        })
    }

    fn add_child(&self, family_id: &str, child: Child) -> DomainResult<()> {
        self.with_family_mut(family_id, |family| {
            family.children.push(child);
            Ok(())
        })
    }

    fn add_additional_parent(
        &self,
        family_id: &str,
        parent: AdditionalParent,
    ) -> DomainResult<()> {
        self.with_family_mut(family_id, |family| {
            family.additional_parents.push(parent);
            Ok(())
        })
    }

    fn update_allowance_settings(
        &self,
        family_id: &str,
        child_id: &str,
        settings: AllowanceSettings,
    ) -> DomainResult<()> {
        self.with_family_mut(family_id, |family| {
            let child = child_mut(family, child_id)?;
            child.weekly_allowance = settings.weekly_allowance;
            child.allowance_type = settings.allowance_type;
            child.allowance_day = settings.allowance_day;
            child.allowance_time = settings.allowance_time;
            child.weekly_interest_rate = settings.weekly_interest_rate;
            Ok(())
        })
    }

    fn set_savings_goal(
        &self,
        family_id: &str,
        child_id: &str,
        goal: Option<SavingsGoal>,
    ) -> DomainResult<()> {
        self.with_family_mut(family_id, |family| {
            let child = child_mut(family, child_id)?;
            child.savings_goal = goal;
            Ok(())
        })
    }

    fn mark_allowance_paid(
        &self,
        family_id: &str,
        child_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.with_family_mut(family_id, |family| {
            let child = child_mut(family, child_id)?;
            child.last_allowance_payment = Some(at);
            Ok(())
        })
    }

    fn mark_interest_posted(
        &self,
        family_id: &str,
        child_id: &str,
        at: DateTime<Utc>,
        amount: f64,
    ) -> DomainResult<()> {
        self.with_family_mut(family_id, |family| {
            let child = child_mut(family, child_id)?;
            child.last_interest_calculation = Some(at);
            child.total_interest_earned += amount;
            Ok(())
        })
    }

    fn upsert_category(&self, family_id: &str, category: Category) -> DomainResult<()> {
        self.with_family_mut(family_id, |family| {
            match family.categories.iter_mut().find(|c| c.id == category.id) {
                Some(existing) => *existing = category,
                None => family.categories.push(category),
            }
            Ok(())
        })
    }

    fn delete_category(&self, family_id: &str, category_id: &str) -> DomainResult<bool> {
        self.with_family_mut(family_id, |family| {
            let before = family.categories.len();
            family.categories.retain(|c| c.id != category_id);
            Ok(family.categories.len() < before)
        })
    }

    fn upsert_task(&self, family_id: &str, task: Task) -> DomainResult<()> {
        self.with_family_mut(family_id, |family| {
            match family.tasks.iter_mut().find(|t| t.id == task.id) {
                Some(existing) => *existing = task,
                None => family.tasks.push(task),
            }
            Ok(())
        })
    }

    fn delete_task(&self, family_id: &str, task_id: &str) -> DomainResult<bool> {
        self.with_family_mut(family_id, |family| {
            let before = family.tasks.len();
            family.tasks.retain(|t| t.id != task_id);
            Ok(family.tasks.len() < before)
        })
    }

    fn insert_payment_request(
        &self,
        family_id: &str,
        request: PaymentRequest,
    ) -> DomainResult<()> {
        self.with_family_mut(family_id, |family| {
            family.payment_requests.push(request);
            Ok(())
        })
    }

    fn transition_payment_request(
        &self,
        family_id: &str,
        request_id: &str,
        expected: PaymentRequestStatus,
        new_status: PaymentRequestStatus,
        completed_at: DateTime<Utc>,
    ) -> DomainResult<PaymentRequest> {
        self.with_family_mut(family_id, |family| {
            let request = family
                .payment_requests
                .iter_mut()
                .find(|r| r.id == request_id)
                .ok_or_else(|| DomainError::NotFound(format!("payment request {}", request_id)))?;
            if request.status != expected {
                return Err(DomainError::NotPending(request.status.as_str().to_string()));
            }
            request.status = new_status;
            request.completed_at = Some(completed_at);
            Ok(request.clone())
        })
    }

    fn touch_last_login(&self, family_id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        self.with_family_mut(family_id, |family| {
            family.last_login_at = at;
            Ok(())
        })
    }
}
