use std::collections::HashMap;

use chrono::NaiveDate;
use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    UpdateProfile {
        work_start: Option<SlotTime>,
        work_end: Option<SlotTime>,
        work_days: Option<WorkDays>,
        monthly_goal: Option<f64>,
    },
    UpdateBilling {
        is_paid: Option<bool>,
        payment_due_date: Option<Option<Ms>>,
        payment_method: Option<String>,
    },
    InsertService {
        service: Service,
    },
    DeleteService {
        id: Ulid,
    },
    InsertClient {
        client: Client,
    },
    DeleteClient {
        id: Ulid,
    },
    InsertAppointment {
        request: BookingRequest,
        origin: BookingOrigin,
    },
    UpdateAppointmentStatus {
        id: Ulid,
        status: AppointmentStatus,
    },
    SelectProfile,
    SelectEntitlement,
    SelectServices,
    SelectClients,
    SelectAppointments {
        date: NaiveDate,
    },
    SelectSlots {
        date: NaiveDate,
        phone: Option<String>,
    },
    Listen {
        channel: String,
    },
    Unlisten {
        channel: String,
    },
    UnlistenAll,
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim();
    let upper = trimmed.to_uppercase();
    if upper.starts_with("LISTEN ") {
        let channel = trimmed[7..].trim().trim_matches(';').to_string();
        return Ok(Command::Listen { channel });
    }
    if upper.starts_with("UNLISTEN") {
        let channel = trimmed[8..].trim().trim_matches(';').to_string();
        if channel == "*" {
            return Ok(Command::UnlistenAll);
        }
        if channel.is_empty() {
            return Err(SqlError::Parse("UNLISTEN needs a channel or *".into()));
        }
        return Ok(Command::Unlisten { channel });
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(table, assignments, selection),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── INSERT ────────────────────────────────────────────────────

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = named_insert_values(insert)?;

    match table.as_str() {
        "services" => {
            let service = Service {
                id: parse_ulid(required(&values, "services", "id")?)?,
                name: parse_string(required(&values, "services", "name")?)?,
                price: parse_f64(required(&values, "services", "price")?)?,
                duration_min: parse_u32(required(&values, "services", "duration")?)?,
            };
            Ok(Command::InsertService { service })
        }
        "clients" => {
            let client = Client {
                id: parse_ulid(required(&values, "clients", "id")?)?,
                name: parse_string(required(&values, "clients", "name")?)?,
                phone: parse_string(required(&values, "clients", "phone")?)?,
                is_blocked: match values.get("is_blocked") {
                    Some(expr) => parse_bool(expr)?,
                    None => false,
                },
            };
            Ok(Command::InsertClient { client })
        }
        "appointments" => parse_insert_appointment(&values),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_insert_appointment(values: &HashMap<String, Expr>) -> Result<Command, SqlError> {
    let service = match (values.get("service_id"), values.get("service")) {
        (Some(expr), _) => ServiceChoice::Catalog(parse_ulid(expr)?),
        (None, Some(name)) => ServiceChoice::Inline {
            name: parse_string(name)?,
            price: match values.get("price") {
                Some(expr) => parse_f64(expr)?,
                None => 0.0,
            },
            duration_min: match values.get("duration") {
                Some(expr) => parse_u32(expr)?,
                None => 30,
            },
        },
        (None, None) => return Err(SqlError::MissingColumn("appointments", "service")),
    };

    let recurrence = match (values.get("repeat"), values.get("count")) {
        (Some(repeat), Some(count)) => {
            let cadence_str = parse_string(repeat)?;
            let cadence = Cadence::parse(&cadence_str)
                .ok_or_else(|| SqlError::Parse(format!("bad repeat cadence: {cadence_str}")))?;
            Some(Recurrence {
                cadence,
                count: parse_u32(count)?,
            })
        }
        (Some(_), None) => return Err(SqlError::MissingColumn("appointments", "count")),
        (None, Some(_)) => return Err(SqlError::MissingColumn("appointments", "repeat")),
        (None, None) => None,
    };

    let origin_str = parse_string(required(values, "appointments", "origin")?)?;
    let origin = BookingOrigin::parse(&origin_str)
        .ok_or_else(|| SqlError::Parse(format!("bad origin: {origin_str}")))?;

    let request = BookingRequest {
        id: parse_ulid(required(values, "appointments", "id")?)?,
        date: parse_date(required(values, "appointments", "date")?)?,
        time: parse_time(required(values, "appointments", "time")?)?,
        client_name: parse_string(required(values, "appointments", "client_name")?)?,
        client_phone: parse_string(required(values, "appointments", "client_phone")?)?,
        client_id: match values.get("client_id") {
            Some(expr) => parse_ulid_or_null(expr)?,
            None => None,
        },
        service,
        recurrence,
    };

    Ok(Command::InsertAppointment { request, origin })
}

// ── DELETE ────────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "services" => Ok(Command::DeleteService { id }),
        "clients" => Ok(Command::DeleteClient { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── UPDATE ────────────────────────────────────────────────────

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    let mut set: HashMap<String, &Expr> = HashMap::new();
    for assignment in assignments {
        let col = assignment_column(assignment)?;
        set.insert(col, &assignment.value);
    }

    match table.as_str() {
        "profile" => Ok(Command::UpdateProfile {
            work_start: set.get("work_start").map(|e| parse_time(e)).transpose()?,
            work_end: set.get("work_end").map(|e| parse_time(e)).transpose()?,
            work_days: set
                .get("work_days")
                .map(|e| parse_work_days(e))
                .transpose()?,
            monthly_goal: set
                .get("monthly_goal")
                .map(|e| parse_f64(e))
                .transpose()?,
        }),
        "billing" => Ok(Command::UpdateBilling {
            is_paid: set.get("is_paid").map(|e| parse_bool(e)).transpose()?,
            payment_due_date: set
                .get("payment_due_date")
                .map(|e| parse_i64_or_null(e))
                .transpose()?,
            payment_method: set
                .get("payment_method")
                .map(|e| parse_string(e))
                .transpose()?,
        }),
        "appointments" => {
            let id = extract_where_id(selection)?;
            let status_expr = set
                .get("status")
                .ok_or(SqlError::MissingColumn("appointments", "status"))?;
            let status_str = parse_string(status_expr)?;
            let status = AppointmentStatus::parse(&status_str)
                .ok_or_else(|| SqlError::Parse(format!("bad status: {status_str}")))?;
            Ok(Command::UpdateAppointmentStatus { id, status })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters: HashMap<String, &Expr> = HashMap::new();
    if let Some(selection) = &select.selection {
        extract_eq_filters(selection, &mut filters)?;
    }

    match table.as_str() {
        "profile" => Ok(Command::SelectProfile),
        "entitlement" => Ok(Command::SelectEntitlement),
        "services" => Ok(Command::SelectServices),
        "clients" => Ok(Command::SelectClients),
        "appointments" => {
            let date = filters
                .get("date")
                .ok_or(SqlError::MissingFilter("date"))?;
            Ok(Command::SelectAppointments {
                date: parse_date(date)?,
            })
        }
        "slots" => {
            let date = filters
                .get("date")
                .ok_or(SqlError::MissingFilter("date"))?;
            Ok(Command::SelectSlots {
                date: parse_date(date)?,
                phone: filters.get("phone").map(|e| parse_string(e)).transpose()?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Collect `col = value` terms joined by AND.
fn extract_eq_filters<'a>(
    expr: &'a Expr,
    filters: &mut HashMap<String, &'a Expr>,
) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp { left, op, right } => match op {
            ast::BinaryOperator::And => {
                extract_eq_filters(left, filters)?;
                extract_eq_filters(right, filters)?;
            }
            ast::BinaryOperator::Eq => {
                if let Some(col) = expr_column_name(left) {
                    filters.insert(col, right);
                }
            }
            _ => {}
        },
        Expr::Nested(inner) => extract_eq_filters(inner, filters)?,
        _ => {}
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

/// Zip the INSERT's explicit column list with its single VALUES row.
/// All write surfaces name their columns, so positional inserts are
/// rejected outright.
fn named_insert_values(insert: &ast::Insert) -> Result<HashMap<String, Expr>, SqlError> {
    if insert.columns.is_empty() {
        return Err(SqlError::Parse("INSERT requires an explicit column list".into()));
    }
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    let rows = match body.body.as_ref() {
        SetExpr::Values(values) => &values.rows,
        _ => return Err(SqlError::Parse("expected VALUES".into())),
    };
    if rows.is_empty() {
        return Err(SqlError::Parse("empty VALUES".into()));
    }
    if rows.len() > 1 {
        return Err(SqlError::Parse(
            "multi-row INSERT unsupported; use repeat/count for series".into(),
        ));
    }
    let row = &rows[0];
    if row.len() != insert.columns.len() {
        return Err(SqlError::WrongArity(
            "INSERT",
            insert.columns.len(),
            row.len(),
        ));
    }
    Ok(insert
        .columns
        .iter()
        .zip(row.iter())
        .map(|(col, expr)| (col.value.to_lowercase(), expr.clone()))
        .collect())
}

fn required<'a>(
    values: &'a HashMap<String, Expr>,
    table: &'static str,
    column: &'static str,
) -> Result<&'a Expr, SqlError> {
    values.get(column).ok_or(SqlError::MissingColumn(table, column))
}

fn assignment_column(assignment: &ast::Assignment) -> Result<String, SqlError> {
    match &assignment.target {
        ast::AssignmentTarget::ColumnName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))
        }
        other => Err(SqlError::Parse(format!("unsupported SET target: {other}"))),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            if expr_column_name(left).as_deref() == Some("id") {
                parse_ulid(right)
            } else {
                Err(SqlError::MissingFilter("id"))
            }
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) => Ok(s.clone()),
            Value::Number(s, _) => Ok(s.clone()),
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
}

fn parse_ulid_or_null(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(None);
    }
    parse_ulid(expr).map(Some)
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    s.parse()
        .map_err(|_| SqlError::Parse(format!("bad date {s:?}: expected YYYY-MM-DD")))
}

fn parse_time(expr: &Expr) -> Result<SlotTime, SqlError> {
    let s = parse_string(expr)?;
    s.parse().map_err(SqlError::Parse)
}

fn parse_work_days(expr: &Expr) -> Result<WorkDays, SqlError> {
    let s = parse_string(expr)?;
    let value: serde_json::Value =
        serde_json::from_str(&s).map_err(|e| SqlError::Parse(format!("bad work_days JSON: {e}")))?;
    WorkDays::from_json(&value).map_err(SqlError::Parse)
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_i64_or_null(expr: &Expr) -> Result<Option<i64>, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(None);
    }
    parse_i64_expr(expr).map(Some)
}

fn parse_f64(expr: &Expr) -> Result<f64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad number: {e}"))),
            Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad number: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_f64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64_expr(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::SingleQuotedString(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
            },
            Value::Number(n, _) => Ok(n != "0"),
            _ => Err(SqlError::Parse(format!("expected bool, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingColumn(&'static str, &'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(t, col) => write!(f, "{t}: missing column {col}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
