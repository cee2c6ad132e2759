pub mod calendar;
pub mod entitlement;
pub mod slots;
pub mod visibility;

mod booking;
mod error;
mod mutations;
mod queries;

pub use error::EngineError;
pub use queries::Viewer;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedDaySchedule = Arc<RwLock<DaySchedule>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                                .record(batch.len() as f64);
                            let flush_start = std::time::Instant::now();
                            let result = flush_batch(&mut wal, &mut batch);
                            metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                                .record(flush_start.elapsed().as_secs_f64());
                            respond_batch(&mut batch, &result);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                        .record(batch.len() as f64);
                    let flush_start = std::time::Instant::now();
                    let result = flush_batch(&mut wal, &mut batch);
                    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                        .record(flush_start.elapsed().as_secs_f64());
                    respond_batch(&mut batch, &result);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

// ── Engine ───────────────────────────────────────────────

/// One tenant's scheduling state: settings document, service catalog,
/// client registry and the per-day agenda shards, all rebuilt from the WAL
/// on startup.
pub struct Engine {
    pub profile: RwLock<BusinessProfile>,
    pub services: DashMap<Ulid, Service>,
    pub clients: DashMap<Ulid, Client>,
    pub days: DashMap<NaiveDate, SharedDaySchedule>,
    /// Reverse lookup: appointment id → calendar day.
    pub(super) appointment_days: DashMap<Ulid, NaiveDate>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
}

/// Apply an appointment event to a DaySchedule (no locking — caller holds
/// the day's lock).
fn apply_to_day(day: &mut DaySchedule, event: &Event, index: &DashMap<Ulid, NaiveDate>) {
    match event {
        Event::AppointmentBooked { appointment } => {
            index.insert(appointment.id, appointment.date);
            day.insert(appointment.clone());
        }
        Event::AppointmentCancelled { id, .. } => {
            if let Some(appt) = day.get_mut(*id) {
                appt.status = AppointmentStatus::Cancelled;
            }
        }
        Event::AppointmentCompleted { id, .. } => {
            if let Some(appt) = day.get_mut(*id) {
                appt.status = AppointmentStatus::Completed;
            }
        }
        // Non-appointment events are applied at the engine level.
        _ => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            profile: RwLock::new(BusinessProfile::default()),
            services: DashMap::new(),
            clients: DashMap::new(),
            days: DashMap::new(),
            appointment_days: DashMap::new(),
            wal_tx,
            notify,
        };

        // Replay events — we're the sole owner of the locks here, so
        // try_write always succeeds instantly (no contention). Never use
        // blocking_write because this may run inside an async context
        // (lazy tenant creation).
        for event in &events {
            match event {
                Event::ProfileUpdated {
                    work_start,
                    work_end,
                    work_days,
                    monthly_goal,
                } => {
                    let mut profile =
                        engine.profile.try_write().expect("replay: uncontended write");
                    profile.work_start = *work_start;
                    profile.work_end = *work_end;
                    profile.work_days = *work_days;
                    profile.monthly_goal = *monthly_goal;
                }
                Event::BillingUpdated {
                    is_paid,
                    payment_due_date,
                    payment_method,
                } => {
                    let mut profile =
                        engine.profile.try_write().expect("replay: uncontended write");
                    profile.is_paid = *is_paid;
                    profile.payment_due_date = *payment_due_date;
                    profile.payment_method = payment_method.clone();
                }
                Event::ServiceUpserted { service } => {
                    engine.services.insert(service.id, service.clone());
                }
                Event::ServiceRemoved { id } => {
                    engine.services.remove(id);
                }
                Event::ClientUpserted { client } => {
                    engine.clients.insert(client.id, client.clone());
                }
                Event::ClientRemoved { id } => {
                    engine.clients.remove(id);
                }
                Event::AppointmentBooked { appointment } => {
                    let day = engine.day(appointment.date);
                    let mut guard = day.try_write().expect("replay: uncontended write");
                    apply_to_day(&mut guard, event, &engine.appointment_days);
                }
                Event::AppointmentCancelled { date, .. }
                | Event::AppointmentCompleted { date, .. } => {
                    if let Some(day) = engine.day_if_exists(*date) {
                        let mut guard = day.try_write().expect("replay: uncontended write");
                        apply_to_day(&mut guard, event, &engine.appointment_days);
                    }
                }
            }
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// Get or lazily create the agenda shard for a day.
    pub fn day(&self, date: NaiveDate) -> SharedDaySchedule {
        self.days
            .entry(date)
            .or_insert_with(|| Arc::new(RwLock::new(DaySchedule::new(date))))
            .value()
            .clone()
    }

    pub fn day_if_exists(&self, date: NaiveDate) -> Option<SharedDaySchedule> {
        self.days.get(&date).map(|e| e.value().clone())
    }

    pub fn day_of_appointment(&self, id: &Ulid) -> Option<NaiveDate> {
        self.appointment_days.get(id).map(|e| *e.value())
    }

    /// WAL-append + apply + notify in one call, for appointment events.
    /// The caller holds the day's write lock.
    pub(super) async fn persist_and_apply_day(
        &self,
        date: NaiveDate,
        day: &mut DaySchedule,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_day(day, event, &self.appointment_days);
        self.notify.send(date, event);
        Ok(())
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        {
            let profile = self.profile.read().await;
            events.push(Event::ProfileUpdated {
                work_start: profile.work_start,
                work_end: profile.work_end,
                work_days: profile.work_days,
                monthly_goal: profile.monthly_goal,
            });
            events.push(Event::BillingUpdated {
                is_paid: profile.is_paid,
                payment_due_date: profile.payment_due_date,
                payment_method: profile.payment_method.clone(),
            });
        }

        for entry in self.services.iter() {
            events.push(Event::ServiceUpserted {
                service: entry.value().clone(),
            });
        }
        for entry in self.clients.iter() {
            events.push(Event::ClientUpserted {
                client: entry.value().clone(),
            });
        }

        // Appointments carry their current status, so one Booked event per
        // record reproduces cancelled/completed state on replay.
        let dates: Vec<NaiveDate> = self.days.iter().map(|e| *e.key()).collect();
        for date in dates {
            if let Some(day) = self.day_if_exists(date) {
                let guard = day.read().await;
                for appt in &guard.appointments {
                    events.push(Event::AppointmentBooked {
                        appointment: appt.clone(),
                    });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
