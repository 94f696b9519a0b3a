//! Purpose: Local emulator of the spreadsheet `values` API backed by `MemoryTable`.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum loopback server used for development and end-to-end tests.
//! Invariants: Routes and envelopes follow the v4 wire shape that `SheetsClient` speaks.
//! Invariants: Loopback-only unless explicitly allowed.
//! Invariants: Errors use the `{"error":{"code","message","status"}}` envelope.

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

use sheetstore::api::{CellRange, Error, ErrorKind, MemoryTable, RemoteTable, Row};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub token: Option<String>,
    pub spreadsheet_id: String,
    pub sheets: Vec<String>,
    pub allow_non_loopback: bool,
}

struct AppState {
    table: MemoryTable,
    spreadsheet_id: String,
    token: Option<String>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    let table = MemoryTable::new();
    for sheet in &config.sheets {
        table.add_sheet(sheet.as_str());
    }
    let state = Arc::new(AppState {
        table,
        spreadsheet_id: config.spreadsheet_id.clone(),
        token: config.token,
    });

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/v4/spreadsheets/:spreadsheet/values/*range",
            get(read_values).put(write_values).post(range_action),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    info!(
        bind = %config.bind,
        spreadsheet = %config.spreadsheet_id,
        sheets = ?config.sheets,
        "emulator listening"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }
    if config.spreadsheet_id.trim().is_empty() || config.spreadsheet_id.contains('/') {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--spreadsheet-id must be non-empty and contain no `/`"));
    }
    if config.sheets.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("at least one sheet is required")
            .with_hint("Pass --sheets Sheet1 (repeatable)."));
    }
    if let Some(sheet) = config.sheets.iter().find(|sheet| sheet.trim().is_empty()) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("invalid sheet name `{sheet}`")));
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), Error> {
    let Some(token) = state.token.as_ref() else {
        return Ok(());
    };
    let unauthenticated = |message: &str| {
        Error::new(ErrorKind::Transport)
            .with_status(StatusCode::UNAUTHORIZED.as_u16())
            .with_message(message.to_string())
    };
    let Some(value) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Err(unauthenticated(
            "Request is missing required authentication credential.",
        ));
    };
    let value = value.to_str().unwrap_or_default();
    if value != format!("Bearer {token}") {
        return Err(unauthenticated(
            "Request had invalid authentication credentials.",
        ));
    }
    Ok(())
}

fn check_spreadsheet(state: &AppState, spreadsheet: &str) -> Result<(), Error> {
    if spreadsheet == state.spreadsheet_id {
        return Ok(());
    }
    Err(Error::new(ErrorKind::NotFound)
        .with_status(StatusCode::NOT_FOUND.as_u16())
        .with_message("Requested entity was not found."))
}

#[derive(Debug, Default, Deserialize)]
struct ValuesBody {
    #[serde(default)]
    values: Vec<Row>,
}

/// Other query parameters (`valueRenderOption`, `insertDataOption`) are accepted and ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValuesQuery {
    value_input_option: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    range: String,
    major_dimension: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    values: Vec<Row>,
}

async fn healthz() -> Response {
    json_response(json!({ "ok": true }))
}

async fn read_values(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AxumPath((spreadsheet, range)): AxumPath<(String, String)>,
) -> Response {
    let result = authorize(&headers, &state)
        .and_then(|_| check_spreadsheet(&state, &spreadsheet))
        .and_then(|_| CellRange::parse(&range))
        .and_then(|range| {
            let values = state.table.read_range(&range)?;
            Ok(ValueRange {
                range: range.to_string(),
                major_dimension: "ROWS",
                values,
            })
        });
    match result {
        Ok(body) => json_response(json!(body)),
        Err(err) => error_response(err),
    }
}

async fn write_values(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AxumPath((spreadsheet, range)): AxumPath<(String, String)>,
    Query(query): Query<ValuesQuery>,
    Json(body): Json<ValuesBody>,
) -> Response {
    let result = authorize(&headers, &state)
        .and_then(|_| check_spreadsheet(&state, &spreadsheet))
        .and_then(|_| require_raw_input(&query))
        .and_then(|_| CellRange::parse(&range))
        .and_then(|range| {
            state.table.write_range(&range, &body.values)?;
            Ok(json!({
                "spreadsheetId": state.spreadsheet_id,
                "updatedRange": range.to_string(),
                "updatedRows": body.values.len(),
                "updatedCells": body.values.iter().map(Vec::len).sum::<usize>(),
            }))
        });
    match result {
        Ok(body) => json_response(body),
        Err(err) => error_response(err),
    }
}

/// `POST {range}:append` and `POST {range}:clear`.
async fn range_action(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AxumPath((spreadsheet, target)): AxumPath<(String, String)>,
    Query(query): Query<ValuesQuery>,
    Json(body): Json<ValuesBody>,
) -> Response {
    let result = authorize(&headers, &state)
        .and_then(|_| check_spreadsheet(&state, &spreadsheet))
        .and_then(|_| split_action(&target))
        .and_then(|(range, action)| {
            let range = CellRange::parse(range)?;
            match action {
                RangeAction::Append => {
                    require_raw_input(&query)?;
                    state.table.append_rows(&range, &body.values)?;
                    Ok(json!({
                        "spreadsheetId": state.spreadsheet_id,
                        "tableRange": range.to_string(),
                        "updates": {
                            "updatedRows": body.values.len(),
                            "updatedCells": body.values.iter().map(Vec::len).sum::<usize>(),
                        },
                    }))
                }
                RangeAction::Clear => {
                    state.table.clear_range(&range)?;
                    Ok(json!({
                        "spreadsheetId": state.spreadsheet_id,
                        "clearedRange": range.to_string(),
                    }))
                }
            }
        });
    match result {
        Ok(body) => json_response(body),
        Err(err) => error_response(err),
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RangeAction {
    Append,
    Clear,
}

fn split_action(target: &str) -> Result<(&str, RangeAction), Error> {
    let invalid = || {
        Error::new(ErrorKind::NotFound)
            .with_status(StatusCode::NOT_FOUND.as_u16())
            .with_message(format!("unsupported values action `{target}`"))
    };
    let (range, verb) = target.rsplit_once(':').ok_or_else(invalid)?;
    match verb {
        "append" => Ok((range, RangeAction::Append)),
        "clear" => Ok((range, RangeAction::Clear)),
        _ => Err(invalid()),
    }
}

fn require_raw_input(query: &ValuesQuery) -> Result<(), Error> {
    match query.value_input_option.as_deref() {
        Some("RAW") => Ok(()),
        Some(other) => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("emulator only supports valueInputOption=RAW, got {other}"))),
        None => Err(Error::new(ErrorKind::Usage)
            .with_message("'valueInputOption' is required but not specified")),
    }
}

fn json_response(payload: serde_json::Value) -> Response {
    Json(payload).into_response()
}

fn error_response(err: Error) -> Response {
    let status = err
        .status()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or_else(|| match err.kind() {
            ErrorKind::Usage | ErrorKind::Schema | ErrorKind::Validation => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Transport => StatusCode::BAD_GATEWAY,
            ErrorKind::Io | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        });
    let body = json!({
        "error": {
            "code": status.as_u16(),
            "message": err.message().unwrap_or("error"),
            "status": remote_status(status),
        }
    });
    (status, Json(body)).into_response()
}

fn remote_status(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "INVALID_ARGUMENT",
        StatusCode::UNAUTHORIZED => "UNAUTHENTICATED",
        StatusCode::FORBIDDEN => "PERMISSION_DENIED",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::CONFLICT => "ABORTED",
        _ => "INTERNAL",
    }
}
