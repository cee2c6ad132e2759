use std::collections::HashSet;

use chrono::NaiveDate;

use crate::model::*;

use super::entitlement::EntitlementState;
use super::{calendar, slots, Engine};

/// Who is asking for availability. The staff surface sees the truth; the
/// public surface carries the session's phone and gets the shadow-ban
/// treatment when it matches a blocked client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer<'a> {
    Staff,
    Public { phone: &'a str },
}

impl Engine {
    pub async fn profile_snapshot(&self) -> BusinessProfile {
        self.profile.read().await.clone()
    }

    /// Derived subscription standing; recomputed on every call.
    pub async fn entitlement(&self, today: NaiveDate) -> EntitlementState {
        let profile = self.profile.read().await;
        EntitlementState::derive(&profile, today)
    }

    pub fn list_services(&self) -> Vec<Service> {
        let mut services: Vec<Service> =
            self.services.iter().map(|e| e.value().clone()).collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services
    }

    pub fn list_clients(&self) -> Vec<Client> {
        let mut clients: Vec<Client> = self.clients.iter().map(|e| e.value().clone()).collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        clients
    }

    /// All appointments of a day, time-sorted, every status included —
    /// the staff agenda shows cancelled and completed records too.
    pub async fn day_appointments(&self, date: NaiveDate) -> Vec<Appointment> {
        match self.day_if_exists(date) {
            Some(day) => day.read().await.appointments.clone(),
            None => Vec::new(),
        }
    }

    /// Times holding a non-cancelled appointment on the day. Always derived
    /// from current appointment state, never from a cached slot ledger.
    pub async fn booked_times(&self, date: NaiveDate) -> HashSet<SlotTime> {
        match self.day_if_exists(date) {
            Some(day) => day.read().await.booked_times(),
            None => HashSet::new(),
        }
    }

    /// The bookable half-hour slots of a day as seen by `viewer`: closed
    /// days and shadow-banned viewers get the empty partition, everyone
    /// else the live free set.
    pub async fn free_slots_for(&self, date: NaiveDate, viewer: Viewer<'_>) -> SlotBuckets {
        let profile = self.profile.read().await.clone();
        if !calendar::is_open(&profile, date) {
            return SlotBuckets::default();
        }
        let shadow_banned = match viewer {
            Viewer::Staff => false,
            Viewer::Public { phone } => self.client_is_blocked(phone),
        };
        let booked = self.booked_times(date).await;
        slots::free_slots(&calendar::hour_grid(&profile), &booked, shadow_banned)
    }
}
