use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

// ── Settings, catalog and status mutations ───────────────────────
//
// Everything here follows the same shape: check limits, write the event to
// the WAL, apply it in memory. Appointment status transitions additionally
// notify the day channel; settings and catalog changes do not feed the
// live agenda.

impl Engine {
    /// Update the booking-relevant settings. `None` leaves a field
    /// unchanged. Payment fields are not reachable from here.
    pub async fn update_profile(
        &self,
        work_start: Option<SlotTime>,
        work_end: Option<SlotTime>,
        work_days: Option<WorkDays>,
        monthly_goal: Option<f64>,
    ) -> Result<(), EngineError> {
        let mut profile = self.profile.write().await;
        let event = Event::ProfileUpdated {
            work_start: work_start.unwrap_or(profile.work_start),
            work_end: work_end.unwrap_or(profile.work_end),
            work_days: work_days.unwrap_or(profile.work_days),
            monthly_goal: monthly_goal.or(profile.monthly_goal),
        };
        self.wal_append(&event).await?;
        if let Event::ProfileUpdated {
            work_start,
            work_end,
            work_days,
            monthly_goal,
        } = event
        {
            profile.work_start = work_start;
            profile.work_end = work_end;
            profile.work_days = work_days;
            profile.monthly_goal = monthly_goal;
        }
        Ok(())
    }

    /// The billing collaborator's entry point (webhook-driven). The only
    /// path that writes payment fields; `None` leaves a field unchanged,
    /// `Some(None)` clears the due date.
    pub async fn update_billing(
        &self,
        is_paid: Option<bool>,
        payment_due_date: Option<Option<Ms>>,
        payment_method: Option<String>,
    ) -> Result<(), EngineError> {
        let mut profile = self.profile.write().await;
        let event = Event::BillingUpdated {
            is_paid: is_paid.unwrap_or(profile.is_paid),
            payment_due_date: payment_due_date.unwrap_or(profile.payment_due_date),
            payment_method: payment_method.or_else(|| profile.payment_method.clone()),
        };
        self.wal_append(&event).await?;
        if let Event::BillingUpdated {
            is_paid,
            payment_due_date,
            payment_method,
        } = event
        {
            profile.is_paid = is_paid;
            profile.payment_due_date = payment_due_date;
            profile.payment_method = payment_method;
        }
        Ok(())
    }

    pub async fn upsert_service(&self, service: Service) -> Result<(), EngineError> {
        if service.name.trim().is_empty() {
            return Err(EngineError::Validation("service name is empty"));
        }
        if service.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("service name too long"));
        }
        if !self.services.contains_key(&service.id)
            && self.services.len() >= MAX_SERVICES_PER_TENANT
        {
            return Err(EngineError::LimitExceeded("too many services"));
        }
        let event = Event::ServiceUpserted {
            service: service.clone(),
        };
        self.wal_append(&event).await?;
        self.services.insert(service.id, service);
        Ok(())
    }

    pub async fn remove_service(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.services.contains_key(&id) {
            return Err(EngineError::NotFound("service", id));
        }
        let event = Event::ServiceRemoved { id };
        self.wal_append(&event).await?;
        self.services.remove(&id);
        Ok(())
    }

    pub async fn upsert_client(&self, client: Client) -> Result<(), EngineError> {
        if client.name.trim().is_empty() {
            return Err(EngineError::Validation("client name is empty"));
        }
        if client.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("client name too long"));
        }
        if client.phone.len() > MAX_PHONE_LEN {
            return Err(EngineError::LimitExceeded("client phone too long"));
        }
        if !self.clients.contains_key(&client.id) && self.clients.len() >= MAX_CLIENTS_PER_TENANT
        {
            return Err(EngineError::LimitExceeded("too many clients"));
        }
        let event = Event::ClientUpserted {
            client: client.clone(),
        };
        self.wal_append(&event).await?;
        self.clients.insert(client.id, client);
        Ok(())
    }

    pub async fn remove_client(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.clients.contains_key(&id) {
            return Err(EngineError::NotFound("client", id));
        }
        let event = Event::ClientRemoved { id };
        self.wal_append(&event).await?;
        self.clients.remove(&id);
        Ok(())
    }

    /// scheduled → cancelled. Soft: the record stays in the day, its slot
    /// is free again on the next availability computation.
    pub async fn cancel_appointment(&self, id: Ulid) -> Result<NaiveDate, EngineError> {
        self.transition_appointment(id, AppointmentStatus::Cancelled)
            .await
    }

    /// scheduled → completed (checkout).
    pub async fn complete_appointment(&self, id: Ulid) -> Result<NaiveDate, EngineError> {
        self.transition_appointment(id, AppointmentStatus::Completed)
            .await
    }

    async fn transition_appointment(
        &self,
        id: Ulid,
        target: AppointmentStatus,
    ) -> Result<NaiveDate, EngineError> {
        let date = self
            .day_of_appointment(&id)
            .ok_or(EngineError::NotFound("appointment", id))?;
        let day = self
            .day_if_exists(date)
            .ok_or(EngineError::NotFound("appointment", id))?;
        let mut guard = day.write_owned().await;
        let current = guard
            .get_mut(id)
            .ok_or(EngineError::NotFound("appointment", id))?
            .status;

        if current == target {
            return Ok(date); // idempotent
        }
        if current != AppointmentStatus::Scheduled {
            return Err(EngineError::Validation("appointment is not scheduled"));
        }

        let event = match target {
            AppointmentStatus::Cancelled => Event::AppointmentCancelled { id, date },
            AppointmentStatus::Completed => Event::AppointmentCompleted { id, date },
            AppointmentStatus::Scheduled => unreachable!(),
        };
        self.persist_and_apply_day(date, &mut guard, &event).await?;
        Ok(date)
    }
}
