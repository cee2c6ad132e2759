use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::{stream, Sink, SinkExt};
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::response::NotificationResponse;
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::auth::AzuriAuthSource;
use crate::engine::slots::Bucket;
use crate::engine::{Engine, Viewer};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command};
use crate::tenant::TenantManager;

/// Channel prefix for the per-day live feed: `day_YYYY-MM-DD`.
const DAY_CHANNEL_PREFIX: &str = "day_";

fn channel_for(date: NaiveDate) -> String {
    format!("{DAY_CHANNEL_PREFIX}{date}")
}

fn date_of_channel(channel: &str) -> PgWireResult<NaiveDate> {
    let rest = channel.strip_prefix(DAY_CHANNEL_PREFIX).ok_or_else(|| {
        PgWireError::UserError(Box::new(ErrorInfo::new(
            "ERROR".into(),
            "42000".into(),
            format!("invalid channel: {channel} (expected day_YYYY-MM-DD)"),
        )))
    })?;
    rest.parse().map_err(|_| {
        PgWireError::UserError(Box::new(ErrorInfo::new(
            "ERROR".into(),
            "42000".into(),
            format!("bad date in channel: {channel}"),
        )))
    })
}

/// One connection's handler: the shared tenant registry plus this
/// connection's LISTEN subscriptions. Pending day events are drained into
/// NotificationResponse frames at the next protocol round-trip.
pub struct AzuriHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<AzuriQueryParser>,
    subscriptions: Mutex<HashMap<NaiveDate, broadcast::Receiver<Event>>>,
}

impl AzuriHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(AzuriQueryParser),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    /// Collect pending events from every subscribed day channel.
    fn drain_pending(&self) -> Vec<(String, String)> {
        let mut frames = Vec::new();
        let mut subs = self.subscriptions.lock().expect("subscriptions poisoned");
        for (date, rx) in subs.iter_mut() {
            loop {
                match rx.try_recv() {
                    Ok(event) => {
                        let payload = serde_json::to_string(&event)
                            .unwrap_or_else(|_| "{}".to_string());
                        frames.push((channel_for(*date), payload));
                    }
                    Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
        }
        frames
    }

    /// Flush buffered day events to the client socket.
    async fn flush_notifications<C>(&self, client: &mut C) -> PgWireResult<()>
    where
        C: Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        for (channel, payload) in self.drain_pending() {
            client
                .send(PgWireBackendMessage::NotificationResponse(
                    NotificationResponse::new(0, channel, payload),
                ))
                .await?;
        }
        Ok(())
    }

    async fn execute_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let start = std::time::Instant::now();
        let result = self.dispatch(engine, cmd).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        metrics::counter!(
            observability::QUERIES_TOTAL,
            "command" => label,
            "status" => if result.is_ok() { "ok" } else { "error" }
        )
        .increment(1);
        result
    }

    async fn dispatch(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::UpdateProfile {
                work_start,
                work_end,
                work_days,
                monthly_goal,
            } => {
                engine
                    .update_profile(work_start, work_end, work_days, monthly_goal)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::UpdateBilling {
                is_paid,
                payment_due_date,
                payment_method,
            } => {
                engine
                    .update_billing(is_paid, payment_due_date, payment_method)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::InsertService { service } => {
                engine.upsert_service(service).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::DeleteService { id } => {
                engine.remove_service(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertClient { client } => {
                engine.upsert_client(client).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::DeleteClient { id } => {
                engine.remove_client(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertAppointment { request, origin } => {
                let recurring = request.recurrence.is_some();
                let time = request.time;
                let outcome = engine.book(request, origin).await.map_err(engine_err)?;
                if recurring {
                    Ok(vec![series_response(&outcome, time)])
                } else {
                    Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
                }
            }
            Command::UpdateAppointmentStatus { id, status } => {
                match status {
                    AppointmentStatus::Cancelled => {
                        engine.cancel_appointment(id).await.map_err(engine_err)?;
                    }
                    AppointmentStatus::Completed => {
                        engine.complete_appointment(id).await.map_err(engine_err)?;
                    }
                    AppointmentStatus::Scheduled => {
                        return Err(PgWireError::UserError(Box::new(ErrorInfo::new(
                            "ERROR".into(),
                            "22023".into(),
                            "appointments cannot be re-scheduled via status".into(),
                        ))));
                    }
                }
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::SelectProfile => {
                let profile = engine.profile_snapshot().await;
                Ok(vec![profile_response(&profile)])
            }
            Command::SelectEntitlement => {
                let state = engine.entitlement(Utc::now().date_naive()).await;
                Ok(vec![entitlement_response(&state)])
            }
            Command::SelectServices => {
                let services = engine.list_services();
                Ok(vec![services_response(&services)])
            }
            Command::SelectClients => {
                let clients = engine.list_clients();
                Ok(vec![clients_response(&clients)])
            }
            Command::SelectAppointments { date } => {
                let appointments = engine.day_appointments(date).await;
                Ok(vec![appointments_response(&appointments)])
            }
            Command::SelectSlots { date, phone } => {
                let viewer = match &phone {
                    Some(phone) => Viewer::Public {
                        phone: phone.as_str(),
                    },
                    None => Viewer::Staff,
                };
                let buckets = engine.free_slots_for(date, viewer).await;
                Ok(vec![slots_response(&buckets)])
            }
            Command::Listen { channel } => {
                let date = date_of_channel(&channel)?;
                let rx = engine.notify.subscribe(date);
                self.subscriptions
                    .lock()
                    .expect("subscriptions poisoned")
                    .entry(date)
                    .or_insert(rx);
                Ok(vec![Response::Execution(Tag::new("LISTEN"))])
            }
            Command::Unlisten { channel } => {
                let date = date_of_channel(&channel)?;
                self.subscriptions
                    .lock()
                    .expect("subscriptions poisoned")
                    .remove(&date);
                Ok(vec![Response::Execution(Tag::new("UNLISTEN"))])
            }
            Command::UnlistenAll => {
                self.subscriptions
                    .lock()
                    .expect("subscriptions poisoned")
                    .clear();
                Ok(vec![Response::Execution(Tag::new("UNLISTEN"))])
            }
        }
    }
}

// ── Result schemas ───────────────────────────────────────────────

fn varchar(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn profile_schema() -> Vec<FieldInfo> {
    vec![
        varchar("work_start"),
        varchar("work_end"),
        varchar("work_days"),
        FieldInfo::new("monthly_goal".into(), None, None, Type::FLOAT8, FieldFormat::Text),
        FieldInfo::new("is_paid".into(), None, None, Type::BOOL, FieldFormat::Text),
        FieldInfo::new("payment_due_date".into(), None, None, Type::INT8, FieldFormat::Text),
        varchar("payment_method"),
    ]
}

fn entitlement_schema() -> Vec<FieldInfo> {
    vec![
        FieldInfo::new("due_days".into(), None, None, Type::INT8, FieldFormat::Text),
        FieldInfo::new("is_paid".into(), None, None, Type::BOOL, FieldFormat::Text),
        FieldInfo::new("blocked".into(), None, None, Type::BOOL, FieldFormat::Text),
        FieldInfo::new("due_soon".into(), None, None, Type::BOOL, FieldFormat::Text),
        varchar("payment_method"),
    ]
}

fn services_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("name"),
        FieldInfo::new("price".into(), None, None, Type::FLOAT8, FieldFormat::Text),
        FieldInfo::new("duration".into(), None, None, Type::INT4, FieldFormat::Text),
    ]
}

fn clients_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("name"),
        varchar("phone"),
        FieldInfo::new("is_blocked".into(), None, None, Type::BOOL, FieldFormat::Text),
    ]
}

fn appointments_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("date"),
        varchar("time"),
        varchar("client_name"),
        varchar("client_phone"),
        varchar("service"),
        FieldInfo::new("price".into(), None, None, Type::FLOAT8, FieldFormat::Text),
        FieldInfo::new("duration".into(), None, None, Type::INT4, FieldFormat::Text),
        varchar("status"),
        varchar("origin"),
        FieldInfo::new("is_recurrence".into(), None, None, Type::BOOL, FieldFormat::Text),
    ]
}

fn slots_schema() -> Vec<FieldInfo> {
    vec![varchar("bucket"), varchar("time")]
}

fn series_schema() -> Vec<FieldInfo> {
    vec![varchar("date"), varchar("time"), varchar("status"), varchar("id")]
}

fn schema_for_statement(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    if upper.contains("SELECT") {
        if upper.contains("SLOTS") {
            return slots_schema();
        }
        if upper.contains("APPOINTMENTS") {
            return appointments_schema();
        }
        if upper.contains("SERVICES") {
            return services_schema();
        }
        if upper.contains("CLIENTS") {
            return clients_schema();
        }
        if upper.contains("ENTITLEMENT") {
            return entitlement_schema();
        }
        if upper.contains("PROFILE") {
            return profile_schema();
        }
    }
    if upper.contains("INSERT") && upper.contains("REPEAT") {
        return series_schema();
    }
    Vec::new()
}

// ── Row encoding ─────────────────────────────────────────────────

fn rows_response(
    schema: Arc<Vec<FieldInfo>>,
    rows: Vec<PgWireResult<pgwire::messages::data::DataRow>>,
) -> Response {
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn profile_response(profile: &BusinessProfile) -> Response {
    let schema = Arc::new(profile_schema());
    let mut encoder = DataRowEncoder::new(schema.clone());
    let row = (|| {
        encoder.encode_field(&profile.work_start.to_string())?;
        encoder.encode_field(&profile.work_end.to_string())?;
        encoder.encode_field(&profile.work_days.to_json().to_string())?;
        encoder.encode_field(&profile.monthly_goal)?;
        encoder.encode_field(&profile.is_paid)?;
        encoder.encode_field(&profile.payment_due_date)?;
        encoder.encode_field(&profile.payment_method)?;
        Ok(encoder.take_row())
    })();
    Response::Query(QueryResponse::new(schema, stream::iter(vec![row])))
}

fn entitlement_response(state: &crate::engine::entitlement::EntitlementState) -> Response {
    let schema = Arc::new(entitlement_schema());
    let mut encoder = DataRowEncoder::new(schema.clone());
    let row = (|| {
        encoder.encode_field(&state.due_days)?;
        encoder.encode_field(&state.is_paid)?;
        encoder.encode_field(&state.blocked())?;
        encoder.encode_field(&state.due_soon())?;
        encoder.encode_field(&state.payment_method)?;
        Ok(encoder.take_row())
    })();
    Response::Query(QueryResponse::new(schema, stream::iter(vec![row])))
}

fn services_response(services: &[Service]) -> Response {
    let schema = Arc::new(services_schema());
    let rows: Vec<_> = services
        .iter()
        .map(|service| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&service.id.to_string())?;
            encoder.encode_field(&service.name)?;
            encoder.encode_field(&service.price)?;
            encoder.encode_field(&(service.duration_min as i32))?;
            Ok(encoder.take_row())
        })
        .collect();
    rows_response(schema, rows)
}

fn clients_response(clients: &[Client]) -> Response {
    let schema = Arc::new(clients_schema());
    let rows: Vec<_> = clients
        .iter()
        .map(|client| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&client.id.to_string())?;
            encoder.encode_field(&client.name)?;
            encoder.encode_field(&client.phone)?;
            encoder.encode_field(&client.is_blocked)?;
            Ok(encoder.take_row())
        })
        .collect();
    rows_response(schema, rows)
}

fn appointments_response(appointments: &[Appointment]) -> Response {
    let schema = Arc::new(appointments_schema());
    let rows: Vec<_> = appointments
        .iter()
        .map(|appt| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&appt.id.to_string())?;
            encoder.encode_field(&appt.date.to_string())?;
            encoder.encode_field(&appt.time.to_string())?;
            encoder.encode_field(&appt.client_name)?;
            encoder.encode_field(&appt.client_phone)?;
            encoder.encode_field(&appt.service_name)?;
            encoder.encode_field(&appt.service_price)?;
            encoder.encode_field(&(appt.duration_min as i32))?;
            encoder.encode_field(&appt.status.as_str())?;
            encoder.encode_field(&appt.origin.as_str())?;
            encoder.encode_field(&appt.is_recurrence)?;
            Ok(encoder.take_row())
        })
        .collect();
    rows_response(schema, rows)
}

fn slots_response(buckets: &SlotBuckets) -> Response {
    let schema = Arc::new(slots_schema());
    let labelled = [
        (Bucket::Morning.as_str(), &buckets.morning),
        (Bucket::Afternoon.as_str(), &buckets.afternoon),
        (Bucket::Evening.as_str(), &buckets.evening),
    ];
    let rows: Vec<_> = labelled
        .iter()
        .flat_map(|(bucket, slots)| slots.iter().map(move |slot| (*bucket, *slot)))
        .map(|(bucket, slot)| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&bucket)?;
            encoder.encode_field(&slot.to_string())?;
            Ok(encoder.take_row())
        })
        .collect();
    rows_response(schema, rows)
}

/// Per-instance rows for a recurring booking: which dates were created and
/// which conflicted.
fn series_response(outcome: &SeriesOutcome, time: SlotTime) -> Response {
    let schema = Arc::new(series_schema());
    let mut entries: Vec<(NaiveDate, &'static str, Option<String>)> = Vec::new();
    for (date, id) in &outcome.created {
        entries.push((*date, "created", Some(id.to_string())));
    }
    for date in &outcome.conflicts {
        entries.push((*date, "conflict", None));
    }
    entries.sort_by_key(|(date, _, _)| *date);

    let rows: Vec<_> = entries
        .into_iter()
        .map(|(date, status, id)| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&date.to_string())?;
            encoder.encode_field(&time.to_string())?;
            encoder.encode_field(&status)?;
            encoder.encode_field(&id)?;
            Ok(encoder.take_row())
        })
        .collect();
    rows_response(schema, rows)
}

// ── Simple Query Protocol ────────────────────────────────────────

#[async_trait]
impl SimpleQueryHandler for AzuriHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        self.flush_notifications(client).await?;
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute_command(&engine, cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct AzuriQueryParser;

#[async_trait]
impl QueryParser for AzuriQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema_for_statement(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for AzuriHandler {
    type Statement = String;
    type QueryParser = AzuriQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        self.flush_notifications(client).await?;
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.execute_command(&engine, cmd).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            schema_for_statement(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema_for_statement(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    if n > max {
                        max = n;
                    }
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let sql = portal.statement.statement.to_string();
    let params = &portal.parameters;
    let mut result = sql;

    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory & connection entry ───────────────────────────────────

pub struct AzuriFactory {
    handler: Arc<AzuriHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<AzuriAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl AzuriFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = AzuriAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(AzuriHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for AzuriFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection. A fresh factory per socket keeps the
/// LISTEN subscription set connection-local.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = AzuriFactory::new(tenant_manager, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: crate::engine::EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "P0001".into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_round_trip() {
        let date: NaiveDate = "2024-01-02".parse().unwrap();
        let channel = channel_for(date);
        assert_eq!(channel, "day_2024-01-02");
        assert_eq!(date_of_channel(&channel).unwrap(), date);
    }

    #[test]
    fn bad_channel_rejected() {
        assert!(date_of_channel("resource_xyz").is_err());
        assert!(date_of_channel("day_notadate").is_err());
    }

    #[test]
    fn count_params_finds_max() {
        assert_eq!(count_params("SELECT * FROM slots WHERE date = $1"), 1);
        assert_eq!(count_params("... $2 ... $1 ..."), 2);
        assert_eq!(count_params("no params"), 0);
    }

    #[test]
    fn statement_schemas_detected() {
        assert_eq!(
            schema_for_statement("SELECT * FROM slots WHERE date = '2024-01-02'").len(),
            2
        );
        assert_eq!(
            schema_for_statement("SELECT * FROM appointments WHERE date = '2024-01-02'").len(),
            11
        );
        assert!(schema_for_statement("DELETE FROM clients WHERE id = 'x'").is_empty());
    }
}
