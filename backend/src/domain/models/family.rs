//! Domain model for the family aggregate.
//!
//! A family document exclusively owns its children, categories, tasks and
//! payment requests; nothing is shared between families except the
//! system-wide phone uniqueness constraint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::{Category, DEFAULT_CATEGORY_NAMES};
use super::child::Child;
use super::task::{PaymentRequest, Task};

/// A second parent attached to a family, identified by their own phone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalParent {
    pub phone: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub id: String,
    /// Normalized phone of the main parent.
    pub main_phone: String,
    pub parent_name: String,
    pub additional_parents: Vec<AdditionalParent>,
    pub children: Vec<Child>,
    pub categories: Vec<Category>,
    pub tasks: Vec<Task>,
    pub payment_requests: Vec<PaymentRequest>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl Family {
    pub fn generate_id(timestamp_millis: u64) -> String {
        format!("family-{}", timestamp_millis)
    }

    /// New family with the five default categories and no children.
    /// Categories start active for nobody; they light up as children are
    /// added.
    pub fn new(id: String, main_phone: String, parent_name: String, now: DateTime<Utc>) -> Self {
        let millis = now.timestamp_millis() as u64;
        let categories = DEFAULT_CATEGORY_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| Category {
                id: Category::generate_id(millis, i),
                name: (*name).to_string(),
                active_for: Vec::new(),
            })
            .collect();
        Self {
            id,
            main_phone,
            parent_name,
            additional_parents: Vec::new(),
            children: Vec::new(),
            categories,
            tasks: Vec::new(),
            payment_requests: Vec::new(),
            created_at: now,
            last_login_at: now,
        }
    }

    pub fn child(&self, child_id: &str) -> Option<&Child> {
        self.children.iter().find(|c| c.id == child_id)
    }

    pub fn child_mut(&mut self, child_id: &str) -> Option<&mut Child> {
        self.children.iter_mut().find(|c| c.id == child_id)
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn payment_request(&self, request_id: &str) -> Option<&PaymentRequest> {
        self.payment_requests.iter().find(|r| r.id == request_id)
    }

    /// Categories usable by a given child.
    pub fn categories_for_child(&self, child_id: &str) -> Vec<&Category> {
        self.categories
            .iter()
            .filter(|c| c.is_active_for(child_id))
            .collect()
    }
}
