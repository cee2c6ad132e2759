use std::collections::HashSet;

use crate::model::{SlotBuckets, SlotTime};

// ── Free-slot computation ────────────────────────────────────────

/// Presentation bucket for a slot label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Morning,
    Afternoon,
    Evening,
}

impl Bucket {
    pub fn of(time: SlotTime) -> Self {
        if time.hour < 12 {
            Bucket::Morning
        } else if time.hour < 18 {
            Bucket::Afternoon
        } else {
            Bucket::Evening
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Morning => "morning",
            Bucket::Afternoon => "afternoon",
            Bucket::Evening => "evening",
        }
    }
}

/// Partition the day's grid into free slots, grouped morning/afternoon/
/// evening, chronological within each bucket.
///
/// A shadow-banned viewer gets the empty partition regardless of actual
/// capacity — success-shaped, so the restriction is not observable. A
/// closed day is expressed by the caller passing an empty grid.
pub fn free_slots(
    grid: &[SlotTime],
    booked: &HashSet<SlotTime>,
    shadow_banned: bool,
) -> SlotBuckets {
    let mut buckets = SlotBuckets::default();
    if shadow_banned {
        return buckets;
    }
    for &slot in grid {
        if booked.contains(&slot) {
            continue;
        }
        match Bucket::of(slot) {
            Bucket::Morning => buckets.morning.push(slot),
            Bucket::Afternoon => buckets.afternoon.push(slot),
            Bucket::Evening => buckets.evening.push(slot),
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::calendar::hour_grid;
    use crate::model::BusinessProfile;

    fn t(s: &str) -> SlotTime {
        s.parse().unwrap()
    }

    fn default_grid() -> Vec<SlotTime> {
        hour_grid(&BusinessProfile::default())
    }

    #[test]
    fn bucket_thresholds() {
        assert_eq!(Bucket::of(t("09:00")), Bucket::Morning);
        assert_eq!(Bucket::of(t("11:30")), Bucket::Morning);
        assert_eq!(Bucket::of(t("12:00")), Bucket::Afternoon);
        assert_eq!(Bucket::of(t("17:30")), Bucket::Afternoon);
        assert_eq!(Bucket::of(t("18:00")), Bucket::Evening);
        assert_eq!(Bucket::of(t("23:30")), Bucket::Evening);
    }

    #[test]
    fn empty_day_partitions_six_twelve_two() {
        let buckets = free_slots(&default_grid(), &HashSet::new(), false);
        assert_eq!(buckets.morning.len(), 6); // 09:00..11:30
        assert_eq!(buckets.afternoon.len(), 12); // 12:00..17:30
        assert_eq!(buckets.evening.len(), 2); // 18:00, 18:30
        assert_eq!(buckets.total(), 20);
    }

    #[test]
    fn booked_times_drop_out() {
        let booked: HashSet<SlotTime> = [t("09:00"), t("12:30"), t("18:00")].into();
        let buckets = free_slots(&default_grid(), &booked, false);
        assert!(!buckets.morning.contains(&t("09:00")));
        assert!(!buckets.afternoon.contains(&t("12:30")));
        assert!(!buckets.evening.contains(&t("18:00")));
        assert_eq!(buckets.total(), 17);
    }

    #[test]
    fn shadow_ban_empties_everything() {
        let buckets = free_slots(&default_grid(), &HashSet::new(), true);
        assert!(buckets.is_empty());
    }

    #[test]
    fn booked_time_off_grid_is_ignored() {
        // Staff free-entry can put an appointment at 09:15; the half-hour
        // grid simply doesn't contain that label.
        let booked: HashSet<SlotTime> = [t("09:15")].into();
        let buckets = free_slots(&default_grid(), &booked, false);
        assert_eq!(buckets.total(), 20);
    }

    #[test]
    fn buckets_stay_chronological() {
        let booked: HashSet<SlotTime> = [t("10:00"), t("14:30")].into();
        let buckets = free_slots(&default_grid(), &booked, false);
        for bucket in [&buckets.morning, &buckets.afternoon, &buckets.evening] {
            for pair in bucket.windows(2) {
                assert!(pair[0] < pair[1]);
            }
        }
    }

    #[test]
    fn idempotent_over_same_inputs() {
        let booked: HashSet<SlotTime> = [t("09:30")].into();
        let a = free_slots(&default_grid(), &booked, false);
        let b = free_slots(&default_grid(), &booked, false);
        assert_eq!(a, b);
    }

    #[test]
    fn morning_only_business() {
        let profile = BusinessProfile {
            work_start: t("09:00"),
            work_end: t("11:00"),
            ..BusinessProfile::default()
        };
        let buckets = free_slots(&hour_grid(&profile), &HashSet::new(), false);
        let labels: Vec<String> = buckets.morning.iter().map(|s| s.to_string()).collect();
        assert_eq!(labels, vec!["09:00", "09:30", "10:00", "10:30"]);
        assert!(buckets.afternoon.is_empty());
        assert!(buckets.evening.is_empty());
    }

    #[test]
    fn fully_booked_day_is_empty_but_not_banned_shaped() {
        let booked: HashSet<SlotTime> = default_grid().into_iter().collect();
        let buckets = free_slots(&default_grid(), &booked, false);
        // Same observable shape as the shadow-ban case, on purpose.
        assert!(buckets.is_empty());
    }
}
