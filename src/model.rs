use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only instant type.
pub type Ms = i64;

// ── Wall-clock slot labels ───────────────────────────────────────

/// A wall-clock time label ("HH:MM") within a business day.
///
/// Ordering is chronological; display is always zero-padded, matching the
/// labels the booking surfaces render and store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime {
    pub hour: u8,
    pub minute: u8,
}

impl SlotTime {
    pub fn new(hour: u8, minute: u8) -> Self {
        debug_assert!(hour < 24 && minute < 60, "SlotTime out of range");
        Self { hour, minute }
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for SlotTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| format!("bad time {s:?}: expected HH:MM"))?;
        let hour: u8 = h.parse().map_err(|_| format!("bad hour in {s:?}"))?;
        let minute: u8 = m.parse().map_err(|_| format!("bad minute in {s:?}"))?;
        if hour >= 24 || minute >= 60 {
            return Err(format!("time {s:?} out of range"));
        }
        Ok(Self { hour, minute })
    }
}

impl TryFrom<String> for SlotTime {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SlotTime> for String {
    fn from(t: SlotTime) -> String {
        t.to_string()
    }
}

// ── Working-hours policy ─────────────────────────────────────────

/// Per-weekday open/closed flags, indexed Sunday=0..Saturday=6.
///
/// An unset day is OPEN: only an explicit `false` closes it. Freshly
/// provisioned tenants have no entries at all and must be bookable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkDays([Option<bool>; 7]);

impl WorkDays {
    pub fn is_open_on(&self, weekday: Weekday) -> bool {
        self.0[weekday.num_days_from_sunday() as usize] != Some(false)
    }

    pub fn set(&mut self, day: usize, open: bool) {
        debug_assert!(day < 7, "weekday index out of range");
        self.0[day] = Some(open);
    }

    /// Parse from a JSON object mapping weekday index to bool,
    /// e.g. `{"0": false, "6": true}`. Unknown keys are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| "work_days: expected a JSON object".to_string())?;
        let mut days = WorkDays::default();
        for (key, val) in obj {
            let idx: usize = key
                .parse()
                .map_err(|_| format!("work_days: bad weekday key {key:?}"))?;
            if idx >= 7 {
                return Err(format!("work_days: weekday {idx} out of range"));
            }
            let open = val
                .as_bool()
                .ok_or_else(|| format!("work_days[{key}]: expected bool"))?;
            days.0[idx] = Some(open);
        }
        Ok(days)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for (idx, entry) in self.0.iter().enumerate() {
            if let Some(open) = entry {
                obj.insert(idx.to_string(), serde_json::Value::Bool(*open));
            }
        }
        serde_json::Value::Object(obj)
    }
}

// ── Tenant profile ───────────────────────────────────────────────

/// Per-tenant settings document. Booking fields are mutated through
/// profile updates; payment fields only through billing updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub work_start: SlotTime,
    pub work_end: SlotTime,
    pub work_days: WorkDays,
    pub monthly_goal: Option<f64>,
    pub is_paid: bool,
    pub payment_due_date: Option<Ms>,
    pub payment_method: Option<String>,
}

impl Default for BusinessProfile {
    fn default() -> Self {
        Self {
            work_start: SlotTime::new(9, 0),
            work_end: SlotTime::new(19, 0),
            work_days: WorkDays::default(),
            monthly_goal: None,
            is_paid: true,
            payment_due_date: None,
            payment_method: None,
        }
    }
}

// ── Catalog & clients ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Ulid,
    pub name: String,
    pub price: f64,
    pub duration_min: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: Ulid,
    pub name: String,
    pub phone: String,
    pub is_blocked: bool,
}

// ── Appointments ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingOrigin {
    Staff,
    OnlineBooking,
}

impl BookingOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingOrigin::Staff => "staff",
            BookingOrigin::OnlineBooking => "online_booking",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "staff" => Some(BookingOrigin::Staff),
            "online_booking" | "online" => Some(BookingOrigin::OnlineBooking),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub duration_min: u32,
    pub client_name: String,
    pub client_phone: String,
    pub client_id: Option<Ulid>,
    pub service_name: String,
    pub service_price: f64,
    pub status: AppointmentStatus,
    pub origin: BookingOrigin,
    pub is_recurrence: bool,
    pub created_at: Ms,
}

/// One calendar day of a tenant's agenda, sorted by time.
/// This is the only shared mutable state of the booking core; all writes
/// to it happen under its `RwLock`.
#[derive(Debug, Clone)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub appointments: Vec<Appointment>,
}

impl DaySchedule {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            appointments: Vec::new(),
        }
    }

    /// Insert maintaining sort order by time.
    pub fn insert(&mut self, appt: Appointment) {
        let pos = self.appointments.partition_point(|a| a.time <= appt.time);
        self.appointments.insert(pos, appt);
    }

    pub fn get_mut(&mut self, id: Ulid) -> Option<&mut Appointment> {
        self.appointments.iter_mut().find(|a| a.id == id)
    }

    /// True if a non-cancelled appointment already holds this time.
    pub fn slot_taken(&self, time: SlotTime) -> bool {
        self.appointments
            .iter()
            .any(|a| a.time == time && a.status != AppointmentStatus::Cancelled)
    }

    /// Times currently occupied (cancelled appointments free their slot).
    pub fn booked_times(&self) -> HashSet<SlotTime> {
        self.appointments
            .iter()
            .filter(|a| a.status != AppointmentStatus::Cancelled)
            .map(|a| a.time)
            .collect()
    }
}

// ── Booking requests ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Weekly,
    Biweekly,
}

impl Cadence {
    pub fn step_days(&self) -> u64 {
        match self {
            Cadence::Weekly => 7,
            Cadence::Biweekly => 14,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(Cadence::Weekly),
            "biweekly" => Some(Cadence::Biweekly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recurrence {
    pub cadence: Cadence,
    pub count: u32,
}

/// Service selection on a booking: a catalog reference (public surface)
/// or free-form entry (staff surface).
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceChoice {
    Catalog(Ulid),
    Inline {
        name: String,
        price: f64,
        duration_min: u32,
    },
}

/// Transient input to a booking commit; never persisted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub id: Ulid,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub client_name: String,
    pub client_phone: String,
    pub client_id: Option<Ulid>,
    pub service: ServiceChoice,
    pub recurrence: Option<Recurrence>,
}

/// Per-instance result of a (possibly recurring) booking commit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeriesOutcome {
    pub created: Vec<(NaiveDate, Ulid)>,
    pub conflicts: Vec<NaiveDate>,
}

// ── Free-slot buckets ────────────────────────────────────────────

/// Free half-hour labels for one day, grouped for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlotBuckets {
    pub morning: Vec<SlotTime>,
    pub afternoon: Vec<SlotTime>,
    pub evening: Vec<SlotTime>,
}

impl SlotBuckets {
    pub fn is_empty(&self) -> bool {
        self.morning.is_empty() && self.afternoon.is_empty() && self.evening.is_empty()
    }

    pub fn total(&self) -> usize {
        self.morning.len() + self.afternoon.len() + self.evening.len()
    }
}

// ── WAL events ───────────────────────────────────────────────────

/// The event types — flat, no nesting. This is the WAL record format and
/// the notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    ProfileUpdated {
        work_start: SlotTime,
        work_end: SlotTime,
        work_days: WorkDays,
        monthly_goal: Option<f64>,
    },
    /// Written only by the billing collaborator; the booking core never
    /// produces this event.
    BillingUpdated {
        is_paid: bool,
        payment_due_date: Option<Ms>,
        payment_method: Option<String>,
    },
    ServiceUpserted {
        service: Service,
    },
    ServiceRemoved {
        id: Ulid,
    },
    ClientUpserted {
        client: Client,
    },
    ClientRemoved {
        id: Ulid,
    },
    AppointmentBooked {
        appointment: Appointment,
    },
    AppointmentCancelled {
        id: Ulid,
        date: NaiveDate,
    },
    AppointmentCompleted {
        id: Ulid,
        date: NaiveDate,
    },
}
