use chrono::{Days, NaiveDate};
use tokio::sync::OwnedRwLockWriteGuard;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

// ── Booking transaction ──────────────────────────────────────────

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

fn digit_count(phone: &str) -> usize {
    phone.chars().filter(|c| c.is_ascii_digit()).count()
}

/// Input checks that must pass before anything is written.
pub(crate) fn validate_request(req: &BookingRequest) -> Result<(), EngineError> {
    if req.client_name.trim().chars().count() < MIN_CLIENT_NAME_CHARS {
        return Err(EngineError::Validation("client name too short"));
    }
    if req.client_name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("client name too long"));
    }
    if req.client_phone.len() > MAX_PHONE_LEN {
        return Err(EngineError::LimitExceeded("client phone too long"));
    }
    if digit_count(&req.client_phone) < MIN_PHONE_DIGITS {
        return Err(EngineError::Validation("client phone too short"));
    }
    if let Some(rec) = &req.recurrence {
        if rec.count == 0 {
            return Err(EngineError::Validation("recurrence count must be positive"));
        }
        if rec.count > MAX_RECURRENCE_COUNT {
            return Err(EngineError::LimitExceeded("recurrence series too long"));
        }
    }
    if let ServiceChoice::Inline { name, .. } = &req.service {
        if name.trim().is_empty() {
            return Err(EngineError::Validation("service name is empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("service name too long"));
        }
    }
    Ok(())
}

/// The dated instances a request expands to: the start date, then
/// `count - 1` further dates at the cadence's spacing. Ascending.
pub(crate) fn series_dates(start: NaiveDate, recurrence: Option<Recurrence>) -> Vec<NaiveDate> {
    match recurrence {
        None => vec![start],
        Some(rec) => (0..rec.count as u64)
            .map(|k| start + Days::new(k * rec.cadence.step_days()))
            .collect(),
    }
}

impl Engine {
    /// Validate and commit a booking, expanding a recurrence into dated
    /// instances. Each instance is conflict-checked independently under its
    /// day lock: free instances commit, conflicting dates are reported in
    /// the outcome. A single (non-recurring) conflict fails outright.
    ///
    /// Online-origin requests re-check the shadow-ban at the write path and
    /// fail with the same error a genuine conflict produces.
    pub async fn book(
        &self,
        req: BookingRequest,
        origin: BookingOrigin,
    ) -> Result<SeriesOutcome, EngineError> {
        validate_request(&req)?;

        let (service_name, service_price, duration_min) = match &req.service {
            ServiceChoice::Catalog(id) => {
                let service = self
                    .services
                    .get(id)
                    .ok_or(EngineError::NotFound("service", *id))?;
                (
                    service.name.clone(),
                    service.price,
                    service.duration_min,
                )
            }
            ServiceChoice::Inline {
                name,
                price,
                duration_min,
            } => (name.clone(), *price, *duration_min),
        };

        if origin == BookingOrigin::OnlineBooking && self.client_is_blocked(&req.client_phone) {
            // Same variant and message as a real conflict: the restriction
            // must not be observable.
            return Err(EngineError::SlotUnavailable {
                date: req.date,
                time: req.time,
            });
        }

        let dates = series_dates(req.date, req.recurrence);

        // Acquire day locks in date order (already ascending) so two
        // overlapping series never deadlock.
        let mut guards: Vec<(NaiveDate, OwnedRwLockWriteGuard<DaySchedule>)> =
            Vec::with_capacity(dates.len());
        for &date in &dates {
            let day = self.day(date);
            let guard = day.write_owned().await;
            if guard.appointments.len() >= MAX_APPOINTMENTS_PER_DAY {
                return Err(EngineError::LimitExceeded("day is full"));
            }
            guards.push((date, guard));
        }

        let now = now_ms();
        let mut outcome = SeriesOutcome::default();

        for (k, (date, guard)) in guards.iter_mut().enumerate() {
            if guard.slot_taken(req.time) {
                outcome.conflicts.push(*date);
                continue;
            }
            let appointment = Appointment {
                id: if k == 0 { req.id } else { ulid::Ulid::new() },
                date: *date,
                time: req.time,
                duration_min,
                client_name: req.client_name.clone(),
                client_phone: req.client_phone.clone(),
                client_id: req.client_id,
                service_name: service_name.clone(),
                service_price,
                status: AppointmentStatus::Scheduled,
                origin,
                is_recurrence: k > 0,
                created_at: now,
            };
            let id = appointment.id;
            let event = Event::AppointmentBooked { appointment };
            self.persist_and_apply_day(*date, guard, &event).await?;
            outcome.created.push((*date, id));
        }

        metrics::counter!(crate::observability::BOOKINGS_TOTAL)
            .increment(outcome.created.len() as u64);
        metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL)
            .increment(outcome.conflicts.len() as u64);

        if req.recurrence.is_none() && outcome.created.is_empty() {
            return Err(EngineError::SlotUnavailable {
                date: req.date,
                time: req.time,
            });
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn request(name: &str, phone: &str) -> BookingRequest {
        BookingRequest {
            id: Ulid::new(),
            date: date("2024-01-02"),
            time: "10:00".parse().unwrap(),
            client_name: name.into(),
            client_phone: phone.into(),
            client_id: None,
            service: ServiceChoice::Inline {
                name: "Corte".into(),
                price: 50.0,
                duration_min: 30,
            },
            recurrence: None,
        }
    }

    #[test]
    fn short_name_rejected() {
        let req = request("Al", "11999990000");
        assert!(matches!(
            validate_request(&req),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn name_trimmed_before_length_check() {
        let req = request("  Al  ", "11999990000");
        assert!(validate_request(&req).is_err());
        let req = request("  Ana  ", "11999990000");
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn phone_needs_nine_digits() {
        assert!(validate_request(&request("Ana Souza", "12345678")).is_err());
        assert!(validate_request(&request("Ana Souza", "123456789")).is_ok());
        // Formatting characters don't count
        assert!(validate_request(&request("Ana Souza", "(11) 9999-0000")).is_ok());
        assert!(validate_request(&request("Ana Souza", "(12) 345-678")).is_err());
    }

    #[test]
    fn zero_count_recurrence_rejected() {
        let mut req = request("Ana Souza", "11999990000");
        req.recurrence = Some(Recurrence {
            cadence: Cadence::Weekly,
            count: 0,
        });
        assert!(matches!(
            validate_request(&req),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn oversized_series_rejected() {
        let mut req = request("Ana Souza", "11999990000");
        req.recurrence = Some(Recurrence {
            cadence: Cadence::Weekly,
            count: crate::limits::MAX_RECURRENCE_COUNT + 1,
        });
        assert!(matches!(
            validate_request(&req),
            Err(EngineError::LimitExceeded(_))
        ));
    }

    #[test]
    fn single_booking_is_one_date() {
        assert_eq!(series_dates(date("2024-01-02"), None), vec![date("2024-01-02")]);
    }

    #[test]
    fn weekly_series_dates() {
        let dates = series_dates(
            date("2024-01-02"),
            Some(Recurrence {
                cadence: Cadence::Weekly,
                count: 3,
            }),
        );
        assert_eq!(
            dates,
            vec![date("2024-01-02"), date("2024-01-09"), date("2024-01-16")]
        );
    }

    #[test]
    fn biweekly_series_dates() {
        let dates = series_dates(
            date("2024-01-02"),
            Some(Recurrence {
                cadence: Cadence::Biweekly,
                count: 3,
            }),
        );
        assert_eq!(
            dates,
            vec![date("2024-01-02"), date("2024-01-16"), date("2024-01-30")]
        );
    }

    #[test]
    fn series_crosses_month_boundary() {
        let dates = series_dates(
            date("2024-01-30"),
            Some(Recurrence {
                cadence: Cadence::Weekly,
                count: 2,
            }),
        );
        assert_eq!(dates, vec![date("2024-01-30"), date("2024-02-06")]);
    }
}
