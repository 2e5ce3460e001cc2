//! Domain layer: models, commands and the core services.
//!
//! Service dependency order: `PhoneRegistry` -> `FamilyService` ->
//! `LedgerService` -> { `RecurrenceScheduler`, `TaskService` };
//! `AuthService` sits on the registry and the family service.

pub mod auth_service;
pub mod clock;
pub mod commands;
pub mod error;
pub mod family_service;
pub mod ledger_service;
pub mod models;
pub mod phone;
pub mod scheduler;
pub mod task_service;

pub use auth_service::{AuthService, InMemoryOtpStore, LogDelivery, OtpDelivery, OtpStorage};
pub use clock::{Clock, SharedClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use family_service::FamilyService;
pub use ledger_service::LedgerService;
pub use phone::{PhoneRegistry, Principal};
pub use scheduler::RecurrenceScheduler;
pub use task_service::TaskService;
