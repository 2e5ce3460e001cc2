//! The ledger engine: the only gateway for posting transactions.
//!
//! Every money movement in the system — manual postings, allowance and
//! interest runs, task payouts — goes through [`LedgerService::apply_transaction`],
//! which delegates to the store's atomic append-and-increment primitive.
//! Nothing here reads a balance, does arithmetic in memory and writes it
//! back; that read-modify-write pattern loses updates under concurrency.

use std::sync::Arc;

use tracing::info;

use crate::domain::clock::SharedClock;
use crate::domain::commands::transactions::ApplyTransactionCommand;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::family_service::FamilyService;
use crate::domain::models::{Transaction, TransactionType};
use crate::storage::FamilyStorage;

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn FamilyStorage>,
    families: FamilyService,
    clock: SharedClock,
}

impl LedgerService {
    pub fn new(store: Arc<dyn FamilyStorage>, families: FamilyService, clock: SharedClock) -> Self {
        Self {
            store,
            families,
            clock,
        }
    }

    /// Validate and post a transaction, returning it together with the
    /// balance immediately after the posting (old balance + delta at the
    /// time of the append, not a re-read).
    pub fn apply_transaction(
        &self,
        command: ApplyTransactionCommand,
    ) -> DomainResult<(Transaction, f64)> {
        if command.amount <= 0.0 {
            return Err(DomainError::Validation(format!(
                "amount must be positive, got {}",
                command.amount
            )));
        }
        if command.description.trim().is_empty() {
            return Err(DomainError::Validation("description must not be empty".into()));
        }

        let category = match command.transaction_type {
            TransactionType::Expense => {
                let name = command.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
                let name = name.ok_or_else(|| {
                    DomainError::Validation("expense requires a category".into())
                })?;
                self.validate_category(&command.family_id, &command.child_id, name)?;
                Some(name.to_string())
            }
            TransactionType::Deposit => None,
        };

        let now = self.clock.now();
        let transaction = Transaction {
            id: Transaction::generate_id(command.transaction_type, now.timestamp_millis() as u64),
            date: now,
            transaction_type: command.transaction_type,
            amount: command.amount,
            description: command.description.trim().to_string(),
            category,
            child_id: command.child_id.clone(),
        };

        let new_balance =
            self.store
                .append_transaction(&command.family_id, &command.child_id, transaction.clone())?;
        self.families.invalidate(&command.family_id);

        info!(
            family_id = %command.family_id,
            child_id = %command.child_id,
            transaction_id = %transaction.id,
            kind = transaction.transaction_type.as_str(),
            amount = transaction.amount,
            new_balance,
            "posted transaction"
        );
        Ok((transaction, new_balance))
    }

    /// A child's transactions ordered by date descending. The limit
    /// truncates after sorting, never before.
    pub fn list_transactions(
        &self,
        family_id: &str,
        child_id: &str,
        limit: Option<usize>,
    ) -> DomainResult<Vec<Transaction>> {
        let mut transactions = self.store.list_child_transactions(family_id, child_id)?;
        transactions.sort_by(|a, b| b.date.cmp(&a.date));
        if let Some(limit) = limit {
            transactions.truncate(limit);
        }
        Ok(transactions)
    }

    /// The expense category must be active for the child. Fresh read; the
    /// cache could hide a just-deleted category.
    fn validate_category(&self, family_id: &str, child_id: &str, name: &str) -> DomainResult<()> {
        let family = self.families.get_family_uncached(family_id)?;
        if family.child(child_id).is_none() {
            return Err(DomainError::NotFound(format!("child {}", child_id)));
        }
        let active = family
            .categories_for_child(child_id)
            .iter()
            .any(|c| c.name == name);
        if !active {
            return Err(DomainError::InvalidCategory(name.to_string()));
        }
        Ok(())
    }
}
