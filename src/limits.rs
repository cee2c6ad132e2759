//! Hard bounds on tenant-supplied data. All enforced at the engine
//! boundary before anything reaches the WAL.

pub const MAX_TENANTS: usize = 1000;
pub const MAX_TENANT_NAME_LEN: usize = 128;

pub const MAX_SERVICES_PER_TENANT: usize = 500;
pub const MAX_CLIENTS_PER_TENANT: usize = 50_000;
pub const MAX_APPOINTMENTS_PER_DAY: usize = 500;

pub const MAX_NAME_LEN: usize = 120;
pub const MAX_PHONE_LEN: usize = 32;

/// Longest recurrence series a single request may create (one year weekly).
pub const MAX_RECURRENCE_COUNT: u32 = 52;

/// Booking validation thresholds.
pub const MIN_CLIENT_NAME_CHARS: usize = 3;
pub const MIN_PHONE_DIGITS: usize = 9;
