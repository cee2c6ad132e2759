use chrono::{DateTime, NaiveDate};

use crate::model::{BusinessProfile, Ms};

// ── Subscription entitlement ─────────────────────────────────────

/// Trial length granted while no due date is on file. The canonical value;
/// applied everywhere a due date is missing.
pub const DEFAULT_TRIAL_DAYS: i64 = 15;

/// Days until a tenant is within the pre-due warning window.
const DUE_SOON_WINDOW_DAYS: i64 = 3;

/// Calendar-day difference between the payment due date and `today`,
/// both reduced to their date part (UTC). Negative once the due date has
/// passed. Absent due date → the default trial length.
pub fn due_days(payment_due_date: Option<Ms>, today: NaiveDate) -> i64 {
    match payment_due_date {
        Some(ms) => {
            let due = DateTime::from_timestamp_millis(ms)
                .map(|dt| dt.date_naive())
                .unwrap_or(today);
            (due - today).num_days()
        }
        None => DEFAULT_TRIAL_DAYS,
    }
}

pub fn is_blocked(due_days: i64) -> bool {
    due_days < 0
}

pub fn is_due_soon(due_days: i64) -> bool {
    (0..=DUE_SOON_WINDOW_DAYS).contains(&due_days)
}

/// Read-only view of a tenant's subscription standing. Pure computation
/// over the profile's due date; recomputed on every read, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitlementState {
    pub due_days: i64,
    pub is_paid: bool,
    pub payment_method: Option<String>,
}

impl EntitlementState {
    pub fn derive(profile: &BusinessProfile, today: NaiveDate) -> Self {
        Self {
            due_days: due_days(profile.payment_due_date, today),
            is_paid: profile.is_paid,
            payment_method: profile.payment_method.clone(),
        }
    }

    pub fn blocked(&self) -> bool {
        is_blocked(self.due_days)
    }

    pub fn due_soon(&self) -> bool {
        is_due_soon(self.due_days)
    }
}
