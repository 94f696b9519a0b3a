//! Purpose: HTTP client for the spreadsheet `values` REST API (v4 wire shape).
//! Exports: `SheetsClient`, `TokenSupplier`, `StaticToken`, `TokenFile`.
//! Role: `RemoteTable` implementation used in production and against the local emulator.
//! Invariants: Every request carries `Authorization: Bearer <token>` from the supplier.
//! Invariants: Writes use RAW input; reads ask for unformatted values.
//! Invariants: Any non-2xx response becomes `ErrorKind::Transport` with the remote message.
#![allow(clippy::result_large_err)]

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::table::{ApiResult, RemoteTable};
use crate::core::error::{Error, ErrorKind};
use crate::core::range::CellRange;
use crate::core::schema::Row;

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// Source of the bearer credential; refresh is the implementor's business.
pub trait TokenSupplier: Send + Sync {
    fn bearer_token(&self) -> ApiResult<String>;
}

impl<F> TokenSupplier for F
where
    F: Fn() -> ApiResult<String> + Send + Sync,
{
    fn bearer_token(&self) -> ApiResult<String> {
        self()
    }
}

#[derive(Clone, Debug)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenSupplier for StaticToken {
    fn bearer_token(&self) -> ApiResult<String> {
        Ok(self.0.clone())
    }
}

/// Reads the token from a file on every call so an external refresher can rotate it.
#[derive(Clone, Debug)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenSupplier for TokenFile {
    fn bearer_token(&self) -> ApiResult<String> {
        let text = std::fs::read_to_string(&self.path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to read token file {}", self.path.display()))
                .with_source(err)
        })?;
        let token = text.trim();
        if token.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("token file {} is empty", self.path.display())));
        }
        Ok(token.to_string())
    }
}

#[derive(Clone)]
pub struct SheetsClient {
    inner: Arc<SheetsClientInner>,
}

struct SheetsClientInner {
    base_url: Url,
    spreadsheet_id: String,
    token: Option<Arc<dyn TokenSupplier>>,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Row>,
}

#[derive(Serialize)]
struct AppendRequest<'a> {
    values: &'a [Row],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    range: String,
    major_dimension: &'static str,
    values: &'a [Row],
}

#[derive(Serialize)]
struct ClearRequest {}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
    message: Option<String>,
    status: Option<String>,
}

impl SheetsClient {
    pub fn new(base_url: impl Into<String>, spreadsheet_id: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let spreadsheet_id = spreadsheet_id.into();
        if spreadsheet_id.trim().is_empty() || spreadsheet_id.contains('/') {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("spreadsheet id must be non-empty and contain no `/`"));
        }
        Ok(Self {
            inner: Arc::new(SheetsClientInner {
                base_url,
                spreadsheet_id,
                token: None,
                agent: ureq::AgentBuilder::new().build(),
            }),
        })
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.with_token_supplier(StaticToken::new(token))
    }

    pub fn with_token_supplier(mut self, supplier: impl TokenSupplier + 'static) -> Self {
        let supplier: Arc<dyn TokenSupplier> = Arc::new(supplier);
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.token = Some(supplier);
        } else {
            self.inner = Arc::new(SheetsClientInner {
                base_url: self.inner.base_url.clone(),
                spreadsheet_id: self.inner.spreadsheet_id.clone(),
                token: Some(supplier),
                agent: self.inner.agent.clone(),
            });
        }
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.inner.spreadsheet_id
    }

    fn values_url(&self, range: &CellRange, verb: Option<&str>) -> ApiResult<Url> {
        let target = match verb {
            Some(verb) => format!("{range}:{verb}"),
            None => range.to_string(),
        };
        let mut url = self.inner.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                Error::new(ErrorKind::Usage).with_message("sheets base url cannot be a base")
            })?;
            path.clear();
            path.extend(["v4", "spreadsheets", self.inner.spreadsheet_id.as_str(), "values"]);
            path.push(&target);
        }
        Ok(url)
    }

    fn request(&self, method: &str, url: &Url) -> ApiResult<ureq::Request> {
        let mut request = self
            .inner
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json");
        if let Some(supplier) = &self.inner.token {
            let token = supplier.bearer_token()?;
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        Ok(request)
    }

    fn send_json<T, R>(&self, method: &str, url: &Url, range: &CellRange, body: Option<&T>) -> ApiResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        debug!(method, range = %range, "sheets request");
        let request = self.request(method, url)?;
        let response = match body {
            None => request.call(),
            Some(body) => {
                let payload = serde_json::to_string(body).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode request json")
                        .with_source(err)
                })?;
                request
                    .set("Content-Type", "application/json")
                    .send_string(&payload)
            }
        };

        match response {
            Ok(resp) => read_json_response(resp),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Transport)
                .with_message("request failed")
                .with_source(err)),
        }
        .map_err(|err| err.with_range(range.to_string()))
    }
}

impl RemoteTable for SheetsClient {
    fn read_range(&self, range: &CellRange) -> ApiResult<Vec<Row>> {
        let mut url = self.values_url(range, None)?;
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE");
        let body: ValueRange = self.send_json::<(), _>("GET", &url, range, None)?;
        debug!(range = %range, rows = body.values.len(), "sheets read");
        Ok(body.values)
    }

    fn append_rows(&self, range: &CellRange, rows: &[Row]) -> ApiResult<()> {
        let mut url = self.values_url(range, Some("append"))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let _: serde_json::Value =
            self.send_json("POST", &url, range, Some(&AppendRequest { values: rows }))?;
        Ok(())
    }

    fn write_range(&self, range: &CellRange, rows: &[Row]) -> ApiResult<()> {
        let mut url = self.values_url(range, None)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let payload = UpdateRequest {
            range: range.to_string(),
            major_dimension: "ROWS",
            values: rows,
        };
        let _: serde_json::Value = self.send_json("PUT", &url, range, Some(&payload))?;
        Ok(())
    }

    fn clear_range(&self, range: &CellRange) -> ApiResult<()> {
        let url = self.values_url(range, Some("clear"))?;
        let _: serde_json::Value = self.send_json("POST", &url, range, Some(&ClearRequest {}))?;
        Ok(())
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid sheets base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("sheets base url must use http or https scheme"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(
            Error::new(ErrorKind::Usage).with_message("sheets base url must not include a path")
        );
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn read_json_response<R>(response: ureq::Response) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Transport)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid response json")
            .with_source(err)
    })
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    error_from_body(status, &body)
}

fn error_from_body(status: u16, body: &str) -> Error {
    let mut err = Error::new(ErrorKind::Transport).with_status(status);
    let remote = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let message = remote
        .as_ref()
        .and_then(|remote| remote.message.clone())
        .unwrap_or_else(|| format!("remote error status {status}"));
    err = err.with_message(message);
    if matches!(status, 401 | 403) {
        err = err.with_hint("The bearer token may be expired or lack spreadsheet access.");
    } else if let Some(code) = remote.and_then(|remote| remote.status) {
        err = err.with_hint(format!("remote status {code}"));
    }
    err
}

#[cfg(test)]
mod tests {
    use super::{SheetsClient, TokenFile, TokenSupplier, error_from_body, normalize_base_url};
    use crate::core::error::ErrorKind;
    use crate::core::range::CellRange;

    #[test]
    fn normalize_base_url_strips_trailing_slash_and_rejects_paths() {
        let url = normalize_base_url("https://sheets.googleapis.com".to_string()).expect("url");
        assert_eq!(url.as_str(), "https://sheets.googleapis.com/");
        let err = normalize_base_url("http://localhost:9800/v4".to_string()).expect_err("path");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = normalize_base_url("ftp://localhost".to_string()).expect_err("scheme");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn values_url_places_range_and_verb_in_last_segment() {
        let client = SheetsClient::new("http://127.0.0.1:9800", "sheet-123").expect("client");
        let read = client
            .values_url(&CellRange::from_row("Sheet1", 1, 14, 2), None)
            .expect("url");
        assert_eq!(
            read.as_str(),
            "http://127.0.0.1:9800/v4/spreadsheets/sheet-123/values/Sheet1!A2:N"
        );
        let clear = client
            .values_url(&CellRange::from_row("Data Karyawan", 1, 14, 2), Some("clear"))
            .expect("url");
        assert_eq!(
            clear.as_str(),
            "http://127.0.0.1:9800/v4/spreadsheets/sheet-123/values/'Data%20Karyawan'!A2:N:clear"
        );
    }

    #[test]
    fn rejects_blank_spreadsheet_id() {
        let err = SheetsClient::new("http://127.0.0.1:9800", " ").err().expect("blank id");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn error_envelope_message_is_preserved() {
        let body = r#"{"error":{"code":400,"message":"Unable to parse range: Nope!A2:N","status":"INVALID_ARGUMENT"}}"#;
        let err = error_from_body(400, body);
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.message(), Some("Unable to parse range: Nope!A2:N"));
        assert_eq!(err.hint(), Some("remote status INVALID_ARGUMENT"));
    }

    #[test]
    fn non_json_error_bodies_fall_back_to_status() {
        let err = error_from_body(502, "<html>bad gateway</html>");
        assert_eq!(err.message(), Some("remote error status 502"));
        let err = error_from_body(401, "");
        assert!(err.hint().unwrap_or_default().contains("expired"));
    }

    #[test]
    fn token_file_is_reread_and_trimmed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("token");
        std::fs::write(&path, "first\n").expect("write");
        let supplier = TokenFile::new(&path);
        assert_eq!(supplier.bearer_token().expect("token"), "first");
        std::fs::write(&path, "second").expect("rewrite");
        assert_eq!(supplier.bearer_token().expect("token"), "second");
        std::fs::write(&path, "  \n").expect("blank");
        assert_eq!(supplier.bearer_token().expect_err("blank").kind(), ErrorKind::Usage);
    }
}
