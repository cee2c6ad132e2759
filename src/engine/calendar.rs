use chrono::{Datelike, NaiveDate};

use crate::model::{BusinessProfile, SlotTime};

// ── Working-hours calendar ───────────────────────────────────────

/// Whether the business takes bookings on `date`.
///
/// Only an explicit `false` for the weekday closes the day; unset weekdays
/// are open so a tenant with a half-filled settings document stays bookable.
pub fn is_open(profile: &BusinessProfile, date: NaiveDate) -> bool {
    profile.work_days.is_open_on(date.weekday())
}

/// The raw half-hour grid for one working day: every hour from the opening
/// hour up to (excluding) the closing hour, split into :00 and :30.
///
/// Only the hour component of `work_start`/`work_end` is consulted;
/// configured minutes are ignored. A start of 09:00 and end of 19:00 yield
/// the 20 labels 09:00, 09:30, .. 18:00, 18:30.
pub fn hour_grid(profile: &BusinessProfile) -> Vec<SlotTime> {
    let start = profile.work_start.hour;
    let end = profile.work_end.hour;
    let mut grid = Vec::new();
    for hour in start..end {
        grid.push(SlotTime::new(hour, 0));
        grid.push(SlotTime::new(hour, 30));
    }
    grid
}
