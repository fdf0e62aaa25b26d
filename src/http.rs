//! HTTP surface: machine CRUD, statement reports, CSV export, print view.
//!
//! All handlers go through the injected `Arc<dyn RecordStore>`; nothing
//! constructs a store by itself. Errors are converted to JSON bodies with
//! 400/404/500 at this boundary; the page endpoints render them inline
//! instead.

use std::{str::FromStr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, Duration, Month, OffsetDateTime};

use rentledger_core::{
    ClientRecord, MachineRecord, MachineStatus, MachineUpdate, NewMachine, RecordStore,
    Statement, StoreError,
};

use crate::export::{to_csv, CsvRecord, CsvValue};
use crate::statement::{build_statement, format_money};

/// Statement pages and exports default to the last 30 days ending today.
const DEFAULT_LOOKBACK_DAYS: i64 = 30;

pub type SharedStore = Arc<dyn RecordStore>;

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/machines", get(list_machines).post(create_machine))
        .route(
            "/api/machines/:code",
            get(get_machine).put(update_machine).delete(delete_machine),
        )
        .route("/api/clients", get(list_clients))
        .route("/api/statement", get(statement_json))
        .route("/export/csv", get(export_csv))
        .route("/statement", get(statement_page))
        .route("/statement/print", get(statement_print))
        .with_state(store)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upstream(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invalid(e) => ApiError::Validation(e.to_string()),
            StoreError::DuplicateCode(_) => ApiError::Validation(err.to_string()),
            StoreError::MachineNotFound(_) | StoreError::ClientNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            StoreError::Backend(_) | StoreError::Io(_) => ApiError::Upstream(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::warn!(error = %self, "Upstream failure");
        }
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Machines

#[derive(Serialize)]
struct MachineDto {
    id: String,
    code: String,
    name: String,
    brand: Option<String>,
    model: Option<String>,
    serial: Option<String>,
    status: String,
    location: Option<String>,
    daily_rate: String,
    notes: Option<String>,
    created_at: i64,
}

fn machine_dto(record: &MachineRecord) -> MachineDto {
    MachineDto {
        id: record.id.to_string(),
        code: record.code.clone(),
        name: record.name.clone(),
        brand: record.brand.clone(),
        model: record.model.clone(),
        serial: record.serial.clone(),
        status: record.status.to_string(),
        location: record.location.clone(),
        daily_rate: format_money(record.daily_rate),
        notes: record.notes.clone(),
        created_at: record.created_at.unix_timestamp(),
    }
}

#[derive(Debug, Deserialize)]
struct MachinePayload {
    code: Option<String>,
    name: Option<String>,
    brand: Option<String>,
    model: Option<String>,
    serial: Option<String>,
    status: Option<String>,
    location: Option<String>,
    daily_rate: Option<serde_json::Value>,
    notes: Option<String>,
}

fn parse_status(s: &str) -> Result<MachineStatus, ApiError> {
    MachineStatus::from_str(s).map_err(|e| ApiError::Validation(e.to_string()))
}

/// Rates arrive as a JSON string from forms and as a number from API
/// clients; both are parsed through `Decimal` to avoid float drift.
fn parse_rate(value: &serde_json::Value) -> Result<Decimal, ApiError> {
    let text = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        other => return Err(ApiError::Validation(format!("invalid daily_rate: {}", other))),
    };
    Decimal::from_str(&text).map_err(|_| ApiError::Validation(format!("invalid daily_rate: {}", text)))
}

async fn list_machines(State(store): State<SharedStore>) -> Result<impl IntoResponse, ApiError> {
    let machines = store.list_machines()?;
    Ok(Json(machines.iter().map(machine_dto).collect::<Vec<_>>()))
}

async fn create_machine(
    State(store): State<SharedStore>,
    Json(payload): Json<MachinePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let code = payload.code.unwrap_or_default();
    let machine = NewMachine {
        name: payload.name.unwrap_or_else(|| code.clone()),
        code,
        brand: payload.brand,
        model: payload.model,
        serial: payload.serial,
        status: match payload.status.as_deref() {
            Some(s) => parse_status(s)?,
            None => MachineStatus::Disponible,
        },
        location: payload.location,
        daily_rate: match payload.daily_rate.as_ref() {
            Some(v) => parse_rate(v)?,
            None => Decimal::ZERO,
        },
        notes: payload.notes,
    };
    let record = store.create_machine(&machine)?;
    tracing::info!(code = %record.code, "Machine registered");
    Ok((StatusCode::CREATED, Json(machine_dto(&record))))
}

async fn get_machine(
    State(store): State<SharedStore>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = store.get_machine(&code)?;
    Ok(Json(machine_dto(&record)))
}

async fn update_machine(
    State(store): State<SharedStore>,
    Path(code): Path<String>,
    Json(payload): Json<MachinePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let update = MachineUpdate {
        name: payload.name,
        brand: payload.brand,
        model: payload.model,
        serial: payload.serial,
        status: match payload.status.as_deref() {
            Some(s) => Some(parse_status(s)?),
            None => None,
        },
        location: payload.location,
        daily_rate: match payload.daily_rate.as_ref() {
            Some(v) => Some(parse_rate(v)?),
            None => None,
        },
        notes: payload.notes,
    };
    let record = store.update_machine(&code, &update)?;
    tracing::info!(code = %record.code, "Machine updated");
    Ok(Json(machine_dto(&record)))
}

async fn delete_machine(
    State(store): State<SharedStore>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    store.delete_machine(&code)?;
    tracing::info!(code = %code, "Machine deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Clients

#[derive(Serialize)]
struct ClientDto {
    id: i64,
    name: String,
    email: Option<String>,
    phone: Option<String>,
}

fn client_dto(record: &ClientRecord) -> ClientDto {
    ClientDto {
        id: record.id,
        name: record.name.clone(),
        email: record.email.clone(),
        phone: record.phone.clone(),
    }
}

async fn list_clients(State(store): State<SharedStore>) -> Result<impl IntoResponse, ApiError> {
    let clients = store.list_clients()?;
    Ok(Json(clients.iter().map(client_dto).collect::<Vec<_>>()))
}

// ---------------------------------------------------------------------------
// Statements

#[derive(Debug, Default, Deserialize)]
struct StatementParams {
    entity: Option<String>,
    code: Option<String>,
    client: Option<String>,
    from: Option<String>,
    to: Option<String>,
    start: Option<String>,
    end: Option<String>,
    auto: Option<String>,
}

/// A resolved statement request: the account it belongs to, the window, and
/// the computed rows.
struct StatementReport {
    entity: &'static str,
    account: String,
    label: String,
    from: Date,
    to: Date,
    statement: Statement,
}

fn fmt_date(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), d.month() as u8, d.day())
}

fn parse_date(s: &str) -> Result<Date, ApiError> {
    let bad = || ApiError::Validation(format!("invalid date: {}", s));
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 3 {
        return Err(bad());
    }
    let year = parts[0].parse::<i32>().map_err(|_| bad())?;
    let month = parts[1].parse::<u8>().map_err(|_| bad())?;
    let day = parts[2].parse::<u8>().map_err(|_| bad())?;
    let month = Month::try_from(month).map_err(|_| bad())?;
    Date::from_calendar_date(year, month, day).map_err(|_| bad())
}

fn resolve_window(params: &StatementParams) -> Result<(Date, Date), ApiError> {
    let today = OffsetDateTime::now_utc().date();
    let from = match params.from.as_deref().or(params.start.as_deref()) {
        Some(s) => parse_date(s)?,
        None => today - Duration::days(DEFAULT_LOOKBACK_DAYS),
    };
    let to = match params.to.as_deref().or(params.end.as_deref()) {
        Some(s) => parse_date(s)?,
        None => today,
    };
    Ok((from, to))
}

fn resolve_report(store: &dyn RecordStore, params: &StatementParams) -> Result<StatementReport, ApiError> {
    let (from, to) = resolve_window(params)?;

    let entity = match params.entity.as_deref() {
        Some("machine") => "machine",
        Some("client") => "client",
        Some(other) => {
            return Err(ApiError::Validation(format!("unknown entity: {}", other)));
        }
        None if params.code.is_some() => "machine",
        None if params.client.is_some() => "client",
        None => {
            return Err(ApiError::Validation(
                "missing account: provide code or client".to_string(),
            ));
        }
    };

    let (account, label, lines) = match entity {
        "machine" => {
            let code = params
                .code
                .as_deref()
                .ok_or_else(|| ApiError::Validation("missing machine code".to_string()))?;
            let machine = store.get_machine(code)?;
            let lines = store.machine_statement_lines(code, from, to)?;
            (machine.code.clone(), machine.name.clone(), lines)
        }
        _ => {
            let raw = params
                .client
                .as_deref()
                .ok_or_else(|| ApiError::Validation("missing client id".to_string()))?;
            let id = raw
                .parse::<i64>()
                .map_err(|_| ApiError::Validation(format!("invalid client id: {}", raw)))?;
            let client = store.get_client(id)?;
            let lines = store.client_statement_lines(id, from, to)?;
            (client.id.to_string(), client.name.clone(), lines)
        }
    };

    Ok(StatementReport {
        entity,
        account,
        label,
        from,
        to,
        statement: build_statement(lines),
    })
}

#[derive(Serialize)]
struct StatementRowDto {
    date: String,
    source: Option<String>,
    description: Option<String>,
    debit: String,
    credit: String,
    balance: String,
}

#[derive(Serialize)]
struct StatementDto {
    entity: String,
    account: String,
    name: String,
    from: String,
    to: String,
    rows: Vec<StatementRowDto>,
    total_debit: String,
    total_credit: String,
    net_balance: String,
}

fn statement_dto(report: &StatementReport) -> StatementDto {
    StatementDto {
        entity: report.entity.to_string(),
        account: report.account.clone(),
        name: report.label.clone(),
        from: fmt_date(report.from),
        to: fmt_date(report.to),
        rows: report
            .statement
            .rows
            .iter()
            .map(|row| StatementRowDto {
                date: fmt_date(row.line.date),
                source: row.line.source.clone(),
                description: row.line.description.clone(),
                debit: format_money(row.line.debit),
                credit: format_money(row.line.credit),
                balance: format_money(row.balance),
            })
            .collect(),
        total_debit: format_money(report.statement.total_debit),
        total_credit: format_money(report.statement.total_credit),
        net_balance: format_money(report.statement.net_balance),
    }
}

async fn statement_json(
    State(store): State<SharedStore>,
    Query(params): Query<StatementParams>,
) -> Result<impl IntoResponse, ApiError> {
    let report = resolve_report(store.as_ref(), &params)?;
    Ok(Json(statement_dto(&report)))
}

// ---------------------------------------------------------------------------
// CSV export

fn statement_records(report: &StatementReport) -> Vec<CsvRecord> {
    report
        .statement
        .rows
        .iter()
        .map(|row| {
            vec![
                ("date".to_string(), CsvValue::Date(row.line.date)),
                (
                    "source".to_string(),
                    row.line.source.clone().map(CsvValue::Text).unwrap_or(CsvValue::Null),
                ),
                (
                    "description".to_string(),
                    row.line
                        .description
                        .clone()
                        .map(CsvValue::Text)
                        .unwrap_or(CsvValue::Null),
                ),
                ("debit".to_string(), CsvValue::Money(row.line.debit)),
                ("credit".to_string(), CsvValue::Money(row.line.credit)),
                ("balance".to_string(), CsvValue::Money(row.balance)),
            ]
        })
        .collect()
}

async fn export_csv(
    State(store): State<SharedStore>,
    Query(params): Query<StatementParams>,
) -> Result<impl IntoResponse, ApiError> {
    let report = resolve_report(store.as_ref(), &params)?;
    let body = to_csv(&statement_records(&report))
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let filename = format!(
        "estado_{}_{}_a_{}.csv",
        report.account,
        fmt_date(report.from),
        fmt_date(report.to)
    );
    tracing::info!(entity = report.entity, account = %report.account, "Statement exported");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    ))
}

// ---------------------------------------------------------------------------
// Statement pages

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn statement_table(report: &StatementReport) -> String {
    let mut rows = String::new();
    for row in &report.statement.rows {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td>\
             <td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
            fmt_date(row.line.date),
            html_escape(row.line.source.as_deref().unwrap_or("")),
            html_escape(row.line.description.as_deref().unwrap_or("")),
            format_money(row.line.debit),
            format_money(row.line.credit),
            format_money(row.balance),
        ));
    }
    format!(
        "<table>\n\
         <thead><tr><th>Fecha</th><th>Origen</th><th>Descripcion</th>\
         <th>Cargo</th><th>Abono</th><th>Saldo</th></tr></thead>\n\
         <tbody>\n{}</tbody>\n\
         <tfoot><tr><th colspan=\"3\">Totales</th>\
         <th class=\"num\">{}</th><th class=\"num\">{}</th><th class=\"num\">{}</th></tr></tfoot>\n\
         </table>",
        rows,
        format_money(report.statement.total_debit),
        format_money(report.statement.total_credit),
        format_money(report.statement.net_balance),
    )
}

fn page_document(title: &str, body: &str, auto_print: bool) -> Html<String> {
    let script = if auto_print {
        "<script>window.addEventListener('load', function () { window.print(); });</script>"
    } else {
        ""
    };
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"es\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n</head>\n<body>\n{}\n{}\n</body>\n</html>\n",
        html_escape(title),
        body,
        script,
    ))
}

fn render_statement_page(
    store: &dyn RecordStore,
    params: &StatementParams,
    auto_print: bool,
) -> Html<String> {
    match resolve_report(store, params) {
        Ok(report) => {
            let title = format!("Estado de cuenta - {}", report.label);
            let heading = format!(
                "<h1>{}</h1>\n<p>{} {} &middot; {} a {}</p>",
                html_escape(&title),
                report.entity,
                html_escape(&report.account),
                fmt_date(report.from),
                fmt_date(report.to),
            );
            let body = format!("{}\n{}", heading, statement_table(&report));
            page_document(&title, &body, auto_print)
        }
        Err(e) => page_document(
            "Estado de cuenta",
            &format!("<p class=\"error\">{}</p>", html_escape(&e.to_string())),
            false,
        ),
    }
}

async fn statement_page(
    State(store): State<SharedStore>,
    Query(params): Query<StatementParams>,
) -> Html<String> {
    render_statement_page(store.as_ref(), &params, false)
}

async fn statement_print(
    State(store): State<SharedStore>,
    Query(params): Query<StatementParams>,
) -> Html<String> {
    let auto = params.auto.as_deref() == Some("1");
    render_statement_page(store.as_ref(), &params, auto)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentledger_memory::InMemoryStore;

    #[test]
    fn parse_date_accepts_iso_dates() {
        let d = parse_date("2025-08-01").unwrap();
        assert_eq!(fmt_date(d), "2025-08-01");
    }

    #[test]
    fn parse_date_rejects_malformed_input() {
        for input in ["no", "2025-08", "2025-13-01", "2025-02-30", "01/08/2025"] {
            assert!(
                matches!(parse_date(input), Err(ApiError::Validation(_))),
                "expected validation error for {:?}",
                input
            );
        }
    }

    #[test]
    fn report_without_account_selector_is_rejected() {
        let store = InMemoryStore::new();
        let result = resolve_report(&store, &StatementParams::default());
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn report_with_unknown_entity_is_rejected() {
        let store = InMemoryStore::new();
        let params = StatementParams {
            entity: Some("bodega".to_string()),
            code: Some("EXC01".to_string()),
            ..StatementParams::default()
        };
        assert!(matches!(
            resolve_report(&store, &params),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn report_with_non_numeric_client_is_rejected() {
        let store = InMemoryStore::new();
        let params = StatementParams {
            client: Some("rivera".to_string()),
            ..StatementParams::default()
        };
        assert!(matches!(
            resolve_report(&store, &params),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn report_with_malformed_window_is_rejected() {
        let store = InMemoryStore::new();
        let params = StatementParams {
            code: Some("EXC01".to_string()),
            from: Some("2025-13-01".to_string()),
            ..StatementParams::default()
        };
        assert!(matches!(
            resolve_report(&store, &params),
            Err(ApiError::Validation(_))
        ));
    }
}
