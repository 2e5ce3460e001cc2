//! Time-driven posting of allowance and interest.
//!
//! A single periodic tick walks every family and every child with an
//! allowance or interest rate configured, decides what is due in a fixed
//! reference timezone, and posts through the ledger engine. A failure in
//! one family is logged and never aborts the tick for the others.
//!
//! Known limitation: due-instant matching works at tick granularity. Under
//! clock drift or a process restart around the scheduled minute a period
//! can be paid late or, if the process is down past the boundary, matched
//! on a later tick of the same day. The duplicate guard (same local day,
//! allowance label, scheduled hour, plus the last-payment stamp) is a
//! heuristic, not a distributed exactly-once guarantee; a second running
//! instance is out of scope.

use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use tracing::{error, info, warn};

use crate::domain::clock::SharedClock;
use crate::domain::commands::transactions::ApplyTransactionCommand;
use crate::domain::error::DomainResult;
use crate::domain::ledger_service::LedgerService;
use crate::domain::models::{AllowanceType, Child, Family, TransactionType};
use crate::storage::FamilyStorage;

pub const WEEKLY_ALLOWANCE_LABEL: &str = "Weekly allowance";
pub const MONTHLY_ALLOWANCE_LABEL: &str = "Monthly allowance";

/// Description for an interest posting, parameterized by the weekly rate.
pub fn interest_label(weekly_rate: f64) -> String {
    format!("Interest ({:.2}% weekly)", weekly_rate)
}

pub struct RecurrenceScheduler {
    store: Arc<dyn FamilyStorage>,
    ledger: LedgerService,
    clock: SharedClock,
    /// Fixed reference timezone for all due-instant math.
    timezone: FixedOffset,
}

impl RecurrenceScheduler {
    pub fn new(
        store: Arc<dyn FamilyStorage>,
        ledger: LedgerService,
        clock: SharedClock,
        timezone: FixedOffset,
    ) -> Self {
        Self {
            store,
            ledger,
            clock,
            timezone,
        }
    }

    /// Drive ticks forever at the given interval.
    pub async fn run(self: Arc<Self>, interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "recurrence scheduler started");
        loop {
            ticker.tick().await;
            self.tick();
        }
    }

    /// One pass over all families. Never panics outward; per-family errors
    /// are logged and the pass continues.
    pub fn tick(&self) {
        let families = match self.store.list_families() {
            Ok(families) => families,
            Err(e) => {
                error!(error = %e, "scheduler tick could not list families");
                return;
            }
        };
        for family in &families {
            if let Err(e) = self.process_family(family) {
                error!(family_id = %family.id, error = %e, "scheduler failed for family, continuing");
            }
        }
    }

    fn process_family(&self, family: &Family) -> DomainResult<()> {
        for child in &family.children {
            if child.weekly_allowance <= 0.0 && child.weekly_interest_rate <= 0.0 {
                continue;
            }
            self.process_allowance(family, child)?;
            self.process_interest(family, child)?;
        }
        Ok(())
    }

    fn process_allowance(&self, family: &Family, child: &Child) -> DomainResult<()> {
        if child.weekly_allowance <= 0.0 {
            return Ok(());
        }
        let Some((scheduled_hour, scheduled_minute)) = child.allowance_hour_minute() else {
            warn!(child_id = %child.id, time = %child.allowance_time,
                  "unparseable allowance time, skipping");
            return Ok(());
        };

        let now = self.clock.now();
        let local = now.with_timezone(&self.timezone);

        let day_matches = match child.allowance_type {
            AllowanceType::Weekly => local.weekday().num_days_from_sunday() == child.allowance_day,
            AllowanceType::Monthly => local.day() == child.allowance_day,
        };
        let time_reached =
            (local.hour(), local.minute()) >= (scheduled_hour, scheduled_minute);
        if !day_matches || !time_reached {
            return Ok(());
        }

        let label = match child.allowance_type {
            AllowanceType::Weekly => WEEKLY_ALLOWANCE_LABEL,
            AllowanceType::Monthly => MONTHLY_ALLOWANCE_LABEL,
        };
        if self.already_paid_today(child, local, label, scheduled_hour) {
            return Ok(());
        }

        let (transaction, new_balance) = self.ledger.apply_transaction(ApplyTransactionCommand {
            family_id: family.id.clone(),
            child_id: child.id.clone(),
            transaction_type: TransactionType::Deposit,
            amount: child.weekly_allowance,
            description: label.to_string(),
            category: None,
        })?;
        self.store.mark_allowance_paid(&family.id, &child.id, now)?;
        info!(
            family_id = %family.id,
            child_id = %child.id,
            transaction_id = %transaction.id,
            amount = child.weekly_allowance,
            new_balance,
            "allowance posted"
        );
        Ok(())
    }

    /// Duplicate guard: an allowance transaction on the current local day
    /// whose description is the allowance label and whose hour is the
    /// scheduled hour, or a last-payment stamp from the same local day.
    fn already_paid_today(
        &self,
        child: &Child,
        local_now: DateTime<FixedOffset>,
        label: &str,
        scheduled_hour: u32,
    ) -> bool {
        let today = local_now.date_naive();
        let by_transaction = child.transactions.iter().any(|tx| {
            let tx_local = tx.date.with_timezone(&self.timezone);
            tx_local.date_naive() == today
                && tx.description == label
                && tx_local.hour() == scheduled_hour
        });
        let by_stamp = child
            .last_allowance_payment
            .map(|at| at.with_timezone(&self.timezone).date_naive() == today)
            .unwrap_or(false);
        by_transaction || by_stamp
    }

    fn process_interest(&self, family: &Family, child: &Child) -> DomainResult<()> {
        if child.weekly_interest_rate <= 0.0 || child.balance <= 0.0 {
            return Ok(());
        }
        let now = self.clock.now();
        let due = match child.last_interest_calculation {
            None => true,
            Some(last) => now - last >= chrono::Duration::hours(24),
        };
        if !due {
            return Ok(());
        }

        let daily_rate = child.weekly_interest_rate / 7.0;
        let interest_amount = child.balance * daily_rate / 100.0;
        if interest_amount <= 0.0 {
            return Ok(());
        }

        let (transaction, new_balance) = self.ledger.apply_transaction(ApplyTransactionCommand {
            family_id: family.id.clone(),
            child_id: child.id.clone(),
            transaction_type: TransactionType::Deposit,
            amount: interest_amount,
            description: interest_label(child.weekly_interest_rate),
            category: None,
        })?;
        self.store
            .mark_interest_posted(&family.id, &child.id, now, interest_amount)?;
        info!(
            family_id = %family.id,
            child_id = %child.id,
            transaction_id = %transaction.id,
            amount = interest_amount,
            new_balance,
            "interest posted"
        );
        Ok(())
    }
}
