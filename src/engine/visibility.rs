use crate::model::Client;

use super::Engine;

// ── Shadow-ban policy ────────────────────────────────────────────

/// True if any record in `clients` carries exactly this phone string with
/// the blocked flag set. Exact match only — no normalization of phone
/// formatting is applied, matching how the records are entered.
pub fn phone_is_blocked<'a, I>(clients: I, phone: &str) -> bool
where
    I: IntoIterator<Item = &'a Client>,
{
    clients
        .into_iter()
        .any(|c| c.is_blocked && c.phone == phone)
}

impl Engine {
    /// Derive the shadow-ban flag for a booking session. Callers evaluate
    /// this once per session, at identification time; it is never cached
    /// across sessions because the flag can change between visits.
    pub fn client_is_blocked(&self, phone: &str) -> bool {
        self.clients
            .iter()
            .any(|entry| entry.value().is_blocked && entry.value().phone == phone)
    }
}
