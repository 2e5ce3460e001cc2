//! One-time-code authentication.
//!
//! OTP state lives behind [`OtpStorage`], constructed once at startup and
//! injected — in-memory for a single instance, replaceable with an external
//! store if the service is ever scaled out. Delivery of the code (SMS or
//! email) is an external collaborator behind [`OtpDelivery`]; a failed send
//! is logged and reported, never fatal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{info, warn};

use crate::domain::clock::SharedClock;
use crate::domain::commands::auth::{RequestCodeResult, Session};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::family_service::FamilyService;
use crate::domain::phone::{PhoneRegistry, Principal};

pub const OTP_TTL_MINUTES: i64 = 10;

/// A pending one-time code, keyed by normalized phone. Reissuing a code for
/// the same phone overwrites the previous entry.
#[derive(Debug, Clone)]
pub struct PendingOtp {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    /// Family the phone resolved to at issue time, if any.
    pub family_id: Option<String>,
    pub is_child: bool,
    pub child_id: Option<String>,
    pub is_additional_parent: bool,
}

/// Storage for pending codes.
pub trait OtpStorage: Send + Sync {
    fn put(&self, phone: &str, otp: PendingOtp) -> DomainResult<()>;
    fn get(&self, phone: &str) -> DomainResult<Option<PendingOtp>>;
    fn remove(&self, phone: &str) -> DomainResult<()>;
    /// Drop every entry whose expiry is in the past.
    fn sweep_expired(&self, now: DateTime<Utc>) -> DomainResult<usize>;
}

#[derive(Default)]
pub struct InMemoryOtpStore {
    entries: Mutex<HashMap<String, PendingOtp>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> DomainResult<std::sync::MutexGuard<'_, HashMap<String, PendingOtp>>> {
        self.entries
            .lock()
            .map_err(|_| DomainError::Store("otp map lock poisoned".to_string()))
    }
}

impl OtpStorage for InMemoryOtpStore {
    fn put(&self, phone: &str, otp: PendingOtp) -> DomainResult<()> {
        self.lock()?.insert(phone.to_string(), otp);
        Ok(())
    }

    fn get(&self, phone: &str) -> DomainResult<Option<PendingOtp>> {
        Ok(self.lock()?.get(phone).cloned())
    }

    fn remove(&self, phone: &str) -> DomainResult<()> {
        self.lock()?.remove(phone);
        Ok(())
    }

    fn sweep_expired(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, otp| otp.expires_at > now);
        Ok(before - entries.len())
    }
}

/// External SMS/email collaborator. The transport itself is out of scope.
pub trait OtpDelivery: Send + Sync {
    fn send_code(&self, phone: &str, code: &str) -> DomainResult<()>;
}

/// Default delivery that only logs. Useful for development and tests; the
/// real SMS provider plugs in behind the same trait.
#[derive(Debug, Clone, Default)]
pub struct LogDelivery;

impl OtpDelivery for LogDelivery {
    fn send_code(&self, phone: &str, _code: &str) -> DomainResult<()> {
        info!(phone, "otp issued (log-only delivery)");
        Ok(())
    }
}

#[derive(Clone)]
pub struct AuthService {
    registry: PhoneRegistry,
    families: FamilyService,
    otp_store: Arc<dyn OtpStorage>,
    delivery: Arc<dyn OtpDelivery>,
    clock: SharedClock,
}

impl AuthService {
    pub fn new(
        registry: PhoneRegistry,
        families: FamilyService,
        otp_store: Arc<dyn OtpStorage>,
        delivery: Arc<dyn OtpDelivery>,
        clock: SharedClock,
    ) -> Self {
        Self {
            registry,
            families,
            otp_store,
            delivery,
            clock,
        }
    }

    /// Issue a 6-digit code for a phone, overwriting any prior pending code
    /// for the same number.
    pub fn request_code(&self, raw_phone: &str) -> DomainResult<RequestCodeResult> {
        let phone = self.registry.normalize(raw_phone);
        if phone.len() < 8 {
            return Err(DomainError::Validation(format!(
                "phone number too short: {}",
                raw_phone
            )));
        }
        let now = self.clock.now();
        self.otp_store.sweep_expired(now)?;

        let resolved = self.registry.resolve(&phone)?;
        let (family_id, is_child, child_id, is_additional_parent) = match &resolved {
            Some(hit) => match &hit.principal {
                Principal::Child { child_id } => {
                    (Some(hit.family.id.clone()), true, Some(child_id.clone()), false)
                }
                Principal::MainParent => (Some(hit.family.id.clone()), false, None, false),
                Principal::AdditionalParent => (Some(hit.family.id.clone()), false, None, true),
            },
            None => (None, false, None, false),
        };

        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
        self.otp_store.put(
            &phone,
            PendingOtp {
                code: code.clone(),
                expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
                family_id: family_id.clone(),
                is_child,
                child_id,
                is_additional_parent,
            },
        )?;

        let delivered = match self.delivery.send_code(&phone, &code) {
            Ok(()) => true,
            Err(e) => {
                warn!(phone = %phone, error = %e, "otp delivery failed");
                false
            }
        };
        info!(phone = %phone, existing = family_id.is_some(), "otp requested");
        Ok(RequestCodeResult {
            is_existing_family: family_id.is_some(),
            delivered,
        })
    }

    /// Verify a code. On success the stored code is consumed; a mismatch
    /// leaves it in place until its original expiry. An unknown phone
    /// provisions a brand-new family on first successful verification.
    pub fn verify_code(&self, raw_phone: &str, code: &str) -> DomainResult<Session> {
        let phone = self.registry.normalize(raw_phone);
        let now = self.clock.now();

        let pending = self
            .otp_store
            .get(&phone)?
            .ok_or_else(|| DomainError::Auth("code expired or invalid".to_string()))?;
        if now > pending.expires_at {
            self.otp_store.remove(&phone)?;
            return Err(DomainError::Auth("code expired or invalid".to_string()));
        }
        if pending.code != code {
            // Failed attempts do not consume the code.
            return Err(DomainError::Auth("code mismatch".to_string()));
        }
        // Single use.
        self.otp_store.remove(&phone)?;

        match pending.family_id {
            Some(family_id) => {
                if !pending.is_child {
                    self.families.record_login(&family_id)?;
                }
                info!(phone = %phone, family_id = %family_id, is_child = pending.is_child, "otp verified");
                Ok(Session {
                    family_id,
                    is_child: pending.is_child,
                    child_id: pending.child_id,
                    is_additional_parent: pending.is_additional_parent,
                    is_new_family: false,
                })
            }
            None => {
                let family = self.families.create_family(&phone, "")?;
                info!(phone = %phone, family_id = %family.id, "otp verified, new family provisioned");
                Ok(Session {
                    family_id: family.id,
                    is_child: false,
                    child_id: None,
                    is_additional_parent: false,
                    is_new_family: true,
                })
            }
        }
    }
}
