//! Family aggregate management and the read-through cache.
//!
//! Reads go through two TTL caches (by-id: 2 minutes, by-phone: 5 minutes).
//! Every successful mutation invalidates the family's by-id entry and
//! clears the whole by-phone cache; the phone-to-id mapping is not tracked
//! separately, so coarse invalidation is the price of correctness. A family
//! document that has grown past the size threshold is served as a
//! projection without transaction arrays and image blobs; transaction
//! history is fetched through the ledger instead.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::clock::SharedClock;
use crate::domain::commands::allowance::UpdateAllowanceCommand;
use crate::domain::commands::children::AddChildCommand;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::models::child::parse_hour_minute;
use crate::domain::models::{
    AdditionalParent, AllowanceType, Category, Child, Family, SavingsGoal,
};
use crate::domain::phone::PhoneRegistry;
use crate::storage::{AllowanceSettings, FamilyStorage, TtlCache};

const BY_ID_TTL: Duration = Duration::from_secs(2 * 60);
const BY_PHONE_TTL: Duration = Duration::from_secs(5 * 60);

/// Above this serialized size a family read degrades to a projection.
const MAX_FULL_READ_BYTES: usize = 1_000_000;

#[derive(Clone)]
pub struct FamilyService {
    store: Arc<dyn FamilyStorage>,
    registry: PhoneRegistry,
    clock: SharedClock,
    by_id: Arc<TtlCache<Family>>,
    by_phone: Arc<TtlCache<Family>>,
    max_full_read_bytes: usize,
}

impl FamilyService {
    pub fn new(store: Arc<dyn FamilyStorage>, registry: PhoneRegistry, clock: SharedClock) -> Self {
        Self {
            store,
            registry,
            clock,
            by_id: Arc::new(TtlCache::new(BY_ID_TTL)),
            by_phone: Arc::new(TtlCache::new(BY_PHONE_TTL)),
            max_full_read_bytes: MAX_FULL_READ_BYTES,
        }
    }

    #[cfg(test)]
    pub fn with_max_full_read_bytes(mut self, bytes: usize) -> Self {
        self.max_full_read_bytes = bytes;
        self
    }

    /// Read a family through the by-id cache.
    pub fn get_family(&self, family_id: &str) -> DomainResult<Family> {
        if let Some(family) = self.by_id.get(family_id) {
            return Ok(family);
        }
        let family = self
            .store
            .get_family(family_id)?
            .ok_or_else(|| DomainError::NotFound(format!("family {}", family_id)))?;
        let family = self.slim_if_oversized(family);
        self.by_id.insert(family_id.to_string(), family.clone());
        Ok(family)
    }

    /// Read a family through the by-phone cache. The raw phone is
    /// normalized first.
    pub fn get_family_by_phone(&self, raw_phone: &str) -> DomainResult<Option<Family>> {
        let phone = self.registry.normalize(raw_phone);
        if let Some(family) = self.by_phone.get(&phone) {
            return Ok(Some(family));
        }
        match self.registry.resolve(&phone)? {
            Some(resolved) => {
                let family = self.slim_if_oversized(resolved.family);
                self.by_phone.insert(phone, family.clone());
                Ok(Some(family))
            }
            None => Ok(None),
        }
    }

    /// Drop the by-id entry for one family and the entire by-phone cache.
    pub fn invalidate(&self, family_id: &str) {
        self.by_id.remove(family_id);
        self.by_phone.clear();
    }

    /// Create a new family around a normalized main phone, seeded with the
    /// default categories.
    pub fn create_family(&self, main_phone: &str, parent_name: &str) -> DomainResult<Family> {
        let now = self.clock.now();
        let family = Family::new(
            Family::generate_id(now.timestamp_millis() as u64),
            main_phone.to_string(),
            parent_name.to_string(),
            now,
        );
        self.store.insert_family(&family)?;
        self.invalidate(&family.id);
        info!(family_id = %family.id, "created family");
        Ok(family)
    }

    /// Add a child, claiming their phone system-wide first.
    pub fn add_child(&self, command: AddChildCommand) -> DomainResult<Child> {
        let name = command.name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation("child name must not be empty".into()));
        }
        let family = self
            .store
            .get_family(&command.family_id)?
            .ok_or_else(|| DomainError::NotFound(format!("family {}", command.family_id)))?;

        let phone = match command.phone.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let normalized = self.registry.normalize(raw);
                self.registry.claim(&normalized, Some(&command.family_id))?;
                Some(normalized)
            }
            _ => None,
        };

        let now = self.clock.now();
        let child = Child::new(
            Child::generate_id(now.timestamp_millis() as u64, family.children.len()),
            name.to_string(),
            phone,
            now,
        );
        self.store.add_child(&command.family_id, child.clone())?;
        self.invalidate(&command.family_id);
        info!(family_id = %command.family_id, child_id = %child.id, "added child");
        Ok(child)
    }

    /// Attach a second parent, claiming their phone system-wide first.
    pub fn add_additional_parent(
        &self,
        family_id: &str,
        raw_phone: &str,
        name: &str,
    ) -> DomainResult<AdditionalParent> {
        if name.trim().is_empty() {
            return Err(DomainError::Validation("parent name must not be empty".into()));
        }
        let normalized = self.registry.normalize(raw_phone);
        self.registry.claim(&normalized, Some(family_id))?;
        let parent = AdditionalParent {
            phone: normalized,
            name: name.trim().to_string(),
        };
        self.store.add_additional_parent(family_id, parent.clone())?;
        self.invalidate(family_id);
        Ok(parent)
    }

    /// Children of a family without their transaction history; summaries
    /// for listing endpoints.
    pub fn children_overview(&self, family_id: &str) -> DomainResult<Vec<Child>> {
        let family = self.get_family(family_id)?;
        Ok(family
            .children
            .into_iter()
            .map(|mut child| {
                child.transactions = Vec::new();
                child
            })
            .collect())
    }

    /// Update a child's recurring-payment settings.
    pub fn update_allowance(&self, command: UpdateAllowanceCommand) -> DomainResult<()> {
        let allowance_type = AllowanceType::parse(&command.allowance_type).ok_or_else(|| {
            DomainError::Validation(format!(
                "allowance type must be weekly or monthly, got {}",
                command.allowance_type
            ))
        })?;
        let day_valid = match allowance_type {
            AllowanceType::Weekly => command.allowance_day <= 6,
            AllowanceType::Monthly => (1..=31).contains(&command.allowance_day),
        };
        if !day_valid {
            return Err(DomainError::Validation(format!(
                "allowance day {} is out of range for {} allowance",
                command.allowance_day,
                allowance_type.as_str()
            )));
        }
        if parse_hour_minute(&command.allowance_time).is_none() {
            return Err(DomainError::Validation(format!(
                "allowance time must be HH:mm, got {}",
                command.allowance_time
            )));
        }
        if command.weekly_allowance < 0.0 {
            return Err(DomainError::Validation(
                "allowance amount cannot be negative".into(),
            ));
        }
        let rate = command.weekly_interest_rate.unwrap_or(0.0);
        if rate < 0.0 {
            return Err(DomainError::Validation(
                "interest rate cannot be negative".into(),
            ));
        }

        self.store.update_allowance_settings(
            &command.family_id,
            &command.child_id,
            AllowanceSettings {
                weekly_allowance: command.weekly_allowance,
                allowance_type,
                allowance_day: command.allowance_day,
                allowance_time: command.allowance_time.clone(),
                weekly_interest_rate: rate,
            },
        )?;
        self.invalidate(&command.family_id);
        info!(family_id = %command.family_id, child_id = %command.child_id,
              amount = command.weekly_allowance, "updated allowance settings");
        Ok(())
    }

    /// Set or clear a child's savings goal.
    pub fn set_savings_goal(
        &self,
        family_id: &str,
        child_id: &str,
        goal: Option<SavingsGoal>,
    ) -> DomainResult<()> {
        if let Some(goal) = &goal {
            if goal.target_amount <= 0.0 {
                return Err(DomainError::Validation(
                    "savings goal target must be positive".into(),
                ));
            }
            if goal.name.trim().is_empty() {
                return Err(DomainError::Validation(
                    "savings goal name must not be empty".into(),
                ));
            }
        }
        self.store.set_savings_goal(family_id, child_id, goal)?;
        self.invalidate(family_id);
        Ok(())
    }

    pub fn add_category(
        &self,
        family_id: &str,
        name: &str,
        active_for: Vec<String>,
    ) -> DomainResult<Category> {
        if name.trim().is_empty() {
            return Err(DomainError::Validation("category name must not be empty".into()));
        }
        let family = self.get_family_uncached(family_id)?;
        let category = Category {
            id: Category::generate_id(
                self.clock.now().timestamp_millis() as u64,
                family.categories.len(),
            ),
            name: name.trim().to_string(),
            active_for,
        };
        self.store.upsert_category(family_id, category.clone())?;
        self.invalidate(family_id);
        Ok(category)
    }

    pub fn update_category(
        &self,
        family_id: &str,
        category_id: &str,
        name: &str,
        active_for: Vec<String>,
    ) -> DomainResult<Category> {
        let family = self.get_family_uncached(family_id)?;
        if !family.categories.iter().any(|c| c.id == category_id) {
            return Err(DomainError::NotFound(format!("category {}", category_id)));
        }
        let category = Category {
            id: category_id.to_string(),
            name: name.trim().to_string(),
            active_for,
        };
        self.store.upsert_category(family_id, category.clone())?;
        self.invalidate(family_id);
        Ok(category)
    }

    pub fn delete_category(&self, family_id: &str, category_id: &str) -> DomainResult<()> {
        if !self.store.delete_category(family_id, category_id)? {
            return Err(DomainError::NotFound(format!("category {}", category_id)));
        }
        self.invalidate(family_id);
        Ok(())
    }

    /// Explicit repair: resum the transaction history into the balance.
    /// The only full-recomputation path in the system.
    pub fn repair_balance(&self, family_id: &str, child_id: &str) -> DomainResult<f64> {
        let repaired = self.store.recompute_balance(family_id, child_id)?;
        self.invalidate(family_id);
        warn!(family_id, child_id, balance = repaired, "balance repaired by full recompute");
        Ok(repaired)
    }

    /// Stamp a successful parent sign-in.
    pub fn record_login(&self, family_id: &str) -> DomainResult<()> {
        self.store.touch_last_login(family_id, self.clock.now())?;
        self.invalidate(family_id);
        Ok(())
    }

    /// Fresh read bypassing both caches (write paths and duplicate checks).
    pub fn get_family_uncached(&self, family_id: &str) -> DomainResult<Family> {
        self.store
            .get_family(family_id)?
            .ok_or_else(|| DomainError::NotFound(format!("family {}", family_id)))
    }

    /// Degrade an oversized aggregate to a projection without transaction
    /// arrays and image blobs rather than failing the read.
    fn slim_if_oversized(&self, family: Family) -> Family {
        let size = serde_json::to_vec(&family).map(|v| v.len()).unwrap_or(0);
        if size <= self.max_full_read_bytes {
            return family;
        }
        warn!(family_id = %family.id, size, "family document oversized, serving projection");
        let mut slim = family;
        for child in &mut slim.children {
            child.transactions = Vec::new();
        }
        for request in &mut slim.payment_requests {
            request.image = None;
        }
        slim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::{ManualClock, SystemClock};
    use crate::domain::models::{PaymentRequestStatus, Transaction, TransactionType};
    use crate::storage::MemoryFamilyStore;
    use chrono::Utc;

    fn service() -> (FamilyService, Arc<MemoryFamilyStore>) {
        let store = Arc::new(MemoryFamilyStore::new());
        let registry = PhoneRegistry::new(store.clone(), "+972");
        let clock = Arc::new(SystemClock);
        (FamilyService::new(store.clone(), registry, clock), store)
    }

    fn seeded_family(service: &FamilyService) -> Family {
        service.create_family("+972521111111", "Noa").unwrap()
    }

    #[test]
    fn test_create_family_has_default_categories() {
        let (service, _) = service();
        let family = seeded_family(&service);
        assert_eq!(family.categories.len(), 5);
        assert_eq!(family.main_phone, "+972521111111");
    }

    #[test]
    fn test_add_child_normalizes_and_claims_phone() {
        let (service, _) = service();
        let family = seeded_family(&service);
        let child = service
            .add_child(AddChildCommand {
                family_id: family.id.clone(),
                name: "Dana".into(),
                phone: Some("0523333333".into()),
            })
            .unwrap();
        assert_eq!(child.phone.as_deref(), Some("+972523333333"));

        // Same phone for a second family fails.
        let other = service.create_family("+972529999999", "Amir").unwrap();
        let result = service.add_child(AddChildCommand {
            family_id: other.id,
            name: "Tom".into(),
            phone: Some("0523333333".into()),
        });
        assert!(matches!(result, Err(DomainError::DuplicatePhone(_))));
    }

    #[test]
    fn test_add_child_rejects_empty_name() {
        let (service, _) = service();
        let family = seeded_family(&service);
        let result = service.add_child(AddChildCommand {
            family_id: family.id,
            name: "   ".into(),
            phone: None,
        });
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_get_family_reads_through_cache() {
        let (service, store) = service();
        let family = seeded_family(&service);
        // Prime the cache, then mutate the store behind the service's back.
        service.get_family(&family.id).unwrap();
        store
            .add_child(&family.id, Child::new("child-x".into(), "X".into(), None, Utc::now()))
            .unwrap();
        // Cached read does not see the new child until invalidation.
        assert!(service.get_family(&family.id).unwrap().children.is_empty());
        service.invalidate(&family.id);
        assert_eq!(service.get_family(&family.id).unwrap().children.len(), 1);
    }

    #[test]
    fn test_get_family_by_phone_caches_and_invalidates() {
        let (service, _) = service();
        let family = seeded_family(&service);
        let hit = service.get_family_by_phone("0521111111").unwrap().unwrap();
        assert_eq!(hit.id, family.id);
        assert!(service.get_family_by_phone("0529999999").unwrap().is_none());
    }

    #[test]
    fn test_update_allowance_validates_day_range() {
        let (service, _) = service();
        let family = seeded_family(&service);
        let child = service
            .add_child(AddChildCommand {
                family_id: family.id.clone(),
                name: "Dana".into(),
                phone: None,
            })
            .unwrap();

        let mut command = UpdateAllowanceCommand {
            family_id: family.id.clone(),
            child_id: child.id.clone(),
            weekly_allowance: 50.0,
            allowance_type: "weekly".into(),
            allowance_day: 7,
            allowance_time: "08:00".into(),
            weekly_interest_rate: None,
        };
        assert!(matches!(
            service.update_allowance(command.clone()),
            Err(DomainError::Validation(_))
        ));

        command.allowance_day = 1;
        service.update_allowance(command.clone()).unwrap();
        let stored = service.get_family(&family.id).unwrap();
        let stored_child = stored.child(&child.id).unwrap();
        assert_eq!(stored_child.weekly_allowance, 50.0);
        assert_eq!(stored_child.allowance_day, 1);

        // Monthly day 0 is invalid, 31 is fine.
        command.allowance_type = "monthly".into();
        command.allowance_day = 0;
        assert!(matches!(
            service.update_allowance(command.clone()),
            Err(DomainError::Validation(_))
        ));
        command.allowance_day = 31;
        service.update_allowance(command).unwrap();
    }

    #[test]
    fn test_update_allowance_rejects_bad_time() {
        let (service, _) = service();
        let family = seeded_family(&service);
        let child = service
            .add_child(AddChildCommand {
                family_id: family.id.clone(),
                name: "Dana".into(),
                phone: None,
            })
            .unwrap();
        let command = UpdateAllowanceCommand {
            family_id: family.id,
            child_id: child.id,
            weekly_allowance: 10.0,
            allowance_type: "weekly".into(),
            allowance_day: 1,
            allowance_time: "25:00".into(),
            weekly_interest_rate: None,
        };
        assert!(matches!(
            service.update_allowance(command),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_oversized_family_degrades_to_projection() {
        let store = Arc::new(MemoryFamilyStore::new());
        let registry = PhoneRegistry::new(store.clone(), "+972");
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service =
            FamilyService::new(store.clone(), registry, clock).with_max_full_read_bytes(512);

        let family = service.create_family("+972521111111", "Noa").unwrap();
        let child = service
            .add_child(AddChildCommand {
                family_id: family.id.clone(),
                name: "Dana".into(),
                phone: None,
            })
            .unwrap();
        for i in 0..20 {
            store
                .append_transaction(
                    &family.id,
                    &child.id,
                    Transaction {
                        id: format!("dep-{}-0000", i),
                        date: Utc::now(),
                        transaction_type: TransactionType::Deposit,
                        amount: 1.0,
                        description: "filler to push the document over the limit".into(),
                        category: None,
                        child_id: child.id.clone(),
                    },
                )
                .unwrap();
        }
        store
            .insert_payment_request(
                &family.id,
                crate::domain::models::PaymentRequest {
                    id: "payreq-1".into(),
                    task_id: "task-1".into(),
                    task_name: "Dishes".into(),
                    task_price: 5.0,
                    child_id: child.id.clone(),
                    note: None,
                    image: Some("x".repeat(4096)),
                    status: PaymentRequestStatus::Pending,
                    requested_at: Utc::now(),
                    completed_at: None,
                },
            )
            .unwrap();
        service.invalidate(&family.id);

        let projected = service.get_family(&family.id).unwrap();
        let projected_child = projected.child(&child.id).unwrap();
        assert!(projected_child.transactions.is_empty());
        assert_eq!(projected_child.balance, 20.0);
        assert!(projected.payment_requests[0].image.is_none());

        // The store itself still holds the full document.
        let raw = store.get_family(&family.id).unwrap().unwrap();
        assert_eq!(raw.child(&child.id).unwrap().transactions.len(), 20);
    }

    #[test]
    fn test_repair_balance_resums_history() {
        let (service, store) = service();
        let family = seeded_family(&service);
        let child = service
            .add_child(AddChildCommand {
                family_id: family.id.clone(),
                name: "Dana".into(),
                phone: None,
            })
            .unwrap();
        store
            .append_transaction(
                &family.id,
                &child.id,
                Transaction {
                    id: "dep-1-0000".into(),
                    date: Utc::now(),
                    transaction_type: TransactionType::Deposit,
                    amount: 30.0,
                    description: "gift".into(),
                    category: None,
                    child_id: child.id.clone(),
                },
            )
            .unwrap();
        let repaired = service.repair_balance(&family.id, &child.id).unwrap();
        assert_eq!(repaired, 30.0);
    }

    #[test]
    fn test_category_crud() {
        let (service, _) = service();
        let family = seeded_family(&service);
        let category = service
            .add_category(&family.id, "Comics", vec!["child-1".into()])
            .unwrap();
        let updated = service
            .update_category(&family.id, &category.id, "Graphic novels", vec![])
            .unwrap();
        assert_eq!(updated.name, "Graphic novels");
        service.delete_category(&family.id, &category.id).unwrap();
        assert!(matches!(
            service.delete_category(&family.id, &category.id),
            Err(DomainError::NotFound(_))
        ));
    }
}
