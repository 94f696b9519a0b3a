//! Purpose: `sheetstore` CLI entry point.
//! Role: Binary crate root; parses args, builds the store, emits JSON on stdout.
//! Invariants: Command results are JSON on stdout; logs and errors go to stderr.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Configuration flows from flags/env into `StoreConfig`; nothing is global.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod serve;

use sheetstore::api::{
    DEFAULT_BASE_URL, DEFAULT_ID_PREFIX, DEFAULT_SHEET, Employee, EmployeeDraft, Error, ErrorKind,
    IdStrategy, RecordStore, SeedMode, SheetsClient, StoreConfig, TokenFile, column_index,
    to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `sheetstore --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    init_tracing(match cli.command {
        Command::Serve(_) => "info",
        _ => "warn",
    });

    command_dispatch::dispatch_command(cli.command, cli.remote)
        .map_err(add_transport_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "sheetstore",
    version,
    about = "Employee records kept one-per-row in a spreadsheet range",
    long_about = None,
    after_help = r#"EXAMPLES
  $ export SHEETSTORE_SPREADSHEET_ID=1AbC...  SHEETSTORE_TOKEN=ya29...
  $ sheetstore init
  $ sheetstore seed --count 55
  $ sheetstore list --department IT --status Aktif
  $ echo '{"namaDepan":"Budi",...}' | sheetstore add
  $ sheetstore delete EMP0001

LOCAL EMULATOR
  $ sheetstore serve --bind 127.0.0.1:9800 --spreadsheet-id local
  $ sheetstore --base-url http://127.0.0.1:9800 --spreadsheet-id local list"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(flatten)]
    remote: RemoteArgs,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Debug)]
struct RemoteArgs {
    #[arg(
        long,
        env = "SHEETSTORE_BASE_URL",
        default_value = DEFAULT_BASE_URL,
        help = "Base URL of the values API",
        help_heading = "Remote"
    )]
    base_url: String,
    #[arg(
        long,
        env = "SHEETSTORE_SPREADSHEET_ID",
        help = "Spreadsheet holding the employee sheet",
        help_heading = "Remote"
    )]
    spreadsheet_id: Option<String>,
    #[arg(
        long,
        env = "SHEETSTORE_SHEET",
        default_value = DEFAULT_SHEET,
        help = "Sheet (tab) name",
        help_heading = "Remote"
    )]
    sheet: String,
    #[arg(
        long,
        env = "SHEETSTORE_TOKEN",
        hide_env_values = true,
        help = "Bearer token (prefer --token-file)",
        help_heading = "Authentication"
    )]
    token: Option<String>,
    #[arg(
        long,
        value_name = "PATH",
        env = "SHEETSTORE_TOKEN_FILE",
        help = "Read the bearer token from this file on every request",
        value_hint = ValueHint::FilePath,
        help_heading = "Authentication"
    )]
    token_file: Option<PathBuf>,
    #[arg(
        long,
        default_value = DEFAULT_ID_PREFIX,
        help = "Prefix for generated ids",
        help_heading = "Records"
    )]
    id_prefix: String,
    #[arg(
        long,
        value_enum,
        default_value = "counter",
        help = "Id allocation: counter|count|random",
        help_heading = "Records"
    )]
    id_strategy: IdStrategyCli,
    #[arg(
        long,
        default_value = "P",
        help = "Column letter of the id counter cell (row 1, outside A:N)",
        help_heading = "Records"
    )]
    counter_column: String,
    #[arg(
        long,
        help = "Verify the header row on every listing",
        help_heading = "Records"
    )]
    strict_schema: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum IdStrategyCli {
    Counter,
    /// Length of the current listing plus one (racy).
    Count,
    Random,
}

impl From<IdStrategyCli> for IdStrategy {
    fn from(value: IdStrategyCli) -> Self {
        match value {
            IdStrategyCli::Counter => IdStrategy::Counter,
            IdStrategyCli::Count => IdStrategy::ListingCount,
            IdStrategyCli::Random => IdStrategy::Random,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "List employees, optionally filtered")]
    List {
        #[arg(long, help = "Case-insensitive match on name, email, department, position")]
        search: Option<String>,
        #[arg(long, help = "Exact department")]
        department: Option<String>,
        #[arg(long, help = "Exact status (Aktif, Cuti, Resign, ...)")]
        status: Option<String>,
        #[arg(long, help = "Include each row's version for conditional updates")]
        versions: bool,
    },
    #[command(about = "Totals per status and number of departments")]
    Stats,
    #[command(about = "Add one employee (JSON from --json or stdin)")]
    Add {
        #[arg(long, help = "Employee JSON; read from stdin when omitted")]
        json: Option<String>,
    },
    #[command(about = "Overwrite the row of an employee (JSON from --json or stdin)")]
    Update {
        #[arg(help = "Employee id")]
        id: String,
        #[arg(long, help = "Employee JSON; read from stdin when omitted")]
        json: Option<String>,
        #[arg(long, value_name = "VERSION", help = "Fail with a conflict unless the row still has this version")]
        expect_version: Option<String>,
    },
    #[command(about = "Delete an employee and compact the sheet")]
    Delete {
        #[arg(help = "Employee id")]
        id: String,
        #[arg(long, value_name = "VERSION", help = "Fail with a conflict unless the row still has this version")]
        expect_version: Option<String>,
    },
    #[command(about = "Populate an empty sheet with generated employees")]
    Seed {
        #[arg(long, default_value_t = 55, help = "Number of employees")]
        count: usize,
        #[arg(long, help = "Random seed for reproducible data")]
        seed: Option<u64>,
        #[arg(long, help = "Append one row per request instead of one batch")]
        sequential: bool,
    },
    #[command(about = "Write the header row")]
    Init,
    #[command(about = "Verify the header row matches the column layout")]
    Check,
    #[command(about = "Run a local emulator of the values API")]
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    #[arg(
        long,
        default_value = "127.0.0.1:9800",
        help = "Bind address",
        help_heading = "Connection"
    )]
    bind: String,
    #[arg(
        long = "spreadsheet-id",
        default_value = "local",
        help = "Spreadsheet id served by the emulator",
        help_heading = "Connection"
    )]
    spreadsheet_id: String,
    #[arg(
        long,
        value_delimiter = ',',
        default_value = DEFAULT_SHEET,
        help = "Sheet names to create (comma separated or repeated)",
        help_heading = "Connection"
    )]
    sheets: Vec<String>,
    #[arg(
        long,
        help = "Require this bearer token (dev-only; prefer --token-file)",
        help_heading = "Authentication"
    )]
    token: Option<String>,
    #[arg(long, value_name = "PATH", help = "Read the required bearer token from file", value_hint = ValueHint::FilePath, help_heading = "Authentication")]
    token_file: Option<PathBuf>,
    #[arg(
        long,
        help = "Allow non-loopback binds",
        help_heading = "Safety"
    )]
    allow_non_loopback: bool,
}

fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn open_store(remote: &RemoteArgs, seed_mode: SeedMode) -> Result<RecordStore<SheetsClient>, Error> {
    let spreadsheet_id = remote.spreadsheet_id.clone().ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message("missing spreadsheet id")
            .with_hint("Pass --spreadsheet-id or set SHEETSTORE_SPREADSHEET_ID.")
    })?;
    let client = SheetsClient::new(remote.base_url.clone(), spreadsheet_id)?;
    let client = match token_source(remote.token.clone(), remote.token_file.clone())? {
        Some(TokenSource::Inline(token)) => client.with_token(token),
        Some(TokenSource::File(path)) => client.with_token_supplier(TokenFile::new(path)),
        None => client,
    };
    let config = store_config(remote, seed_mode)?;
    Ok(RecordStore::new(client, config))
}

fn store_config(remote: &RemoteArgs, seed_mode: SeedMode) -> Result<StoreConfig, Error> {
    let counter_column = column_index(&remote.counter_column).ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid counter column `{}`", remote.counter_column))
            .with_hint("Use a column letter past N, such as P.")
    })?;
    Ok(StoreConfig::new(remote.sheet.as_str())
        .with_id_prefix(remote.id_prefix.as_str())
        .with_id_strategy(remote.id_strategy.into())
        .with_seed_mode(seed_mode)
        .with_counter_column(counter_column)
        .with_strict_schema(remote.strict_schema))
}

fn read_token_file(path: &std::path::Path) -> Result<String, Error> {
    use sheetstore::api::TokenSupplier;
    TokenFile::new(path).bearer_token()
}

enum TokenSource {
    Inline(String),
    File(PathBuf),
}

/// Single place where `--token` and `--token-file` are reconciled.
fn token_source(
    token: Option<String>,
    token_file: Option<PathBuf>,
) -> Result<Option<TokenSource>, Error> {
    match (token, token_file) {
        (Some(_), Some(_)) => Err(Error::new(ErrorKind::Usage)
            .with_message("--token cannot be combined with --token-file")
            .with_hint("Use --token-file for safer handling, or pass --token for local/dev use.")),
        (Some(token), None) => Ok(Some(TokenSource::Inline(token))),
        (None, Some(path)) => Ok(Some(TokenSource::File(path))),
        (None, None) => Ok(None),
    }
}

/// Token value for the emulator, which compares it once per request.
fn resolve_token_value(
    token: Option<String>,
    token_file: Option<PathBuf>,
) -> Result<Option<String>, Error> {
    match token_source(token, token_file)? {
        Some(TokenSource::Inline(token)) => Ok(Some(token)),
        Some(TokenSource::File(path)) => read_token_file(&path).map(Some),
        None => Ok(None),
    }
}

/// JSON from `--json`, or all of stdin when the flag is absent.
fn read_input_json(inline: Option<String>) -> Result<Value, Error> {
    let text = match inline {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read stdin")
                    .with_source(err)
            })?;
            buf
        }
    };
    if text.trim().is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("missing employee json")
            .with_hint("Provide JSON via --json or pipe it to stdin."));
    }
    parse_inline_json(&text)
}

fn parse_inline_json(data: &str) -> Result<Value, Error> {
    serde_json::from_str(data).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid json")
            .with_hint("Provide a single JSON object (e.g. '{\"namaDepan\":\"Budi\"}').")
            .with_source(err)
    })
}

fn draft_from_json(value: Value) -> Result<EmployeeDraft, Error> {
    if !value.is_object() {
        return Err(Error::new(ErrorKind::Usage).with_message("employee json must be an object"));
    }
    serde_json::from_value(value).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("employee json does not match the record shape")
            .with_source(err)
    })
}

/// Replacement record for `update`; a missing `id` keeps the targeted one.
fn employee_from_json(id: &str, value: Value) -> Result<Employee, Error> {
    let stored_id = value
        .get("id")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .unwrap_or(id)
        .to_string();
    Ok(draft_from_json(value)?.with_id(stored_id))
}

fn add_transport_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Transport || err.hint().is_some() {
        return err;
    }
    if err.status().is_none() {
        return err.with_hint("Check --base-url and network connectivity.");
    }
    err
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Transport => "remote request failed".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Conflict => "row changed concurrently".to_string(),
        ErrorKind::Schema => "sheet layout mismatch".to_string(),
        ErrorKind::Validation => "invalid employee".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    if let Some(range) = err.range() {
        inner.insert("range".to_string(), json!(range));
    }
    if let Some(id) = err.record_id() {
        inner.insert("id".to_string(), json!(id));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }
    json!({ "error": Value::Object(inner) })
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(range) = err.range() {
        lines.push(format!(
            "{} {range}",
            colorize_label("range:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(id) = err.record_id() {
        lines.push(format!(
            "{} {id}",
            colorize_label("id:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

#[cfg(test)]
mod tests {
    use super::{
        Cli, Command, IdStrategyCli, SeedMode, employee_from_json, error_json, error_text,
        open_store, parse_inline_json, read_token_file, resolve_token_value, store_config,
    };
    use clap::{CommandFactory, Parser};
    use serde_json::json;
    use sheetstore::api::{Error, ErrorKind, IdStrategy};
    use tempfile::NamedTempFile;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_build_a_counter_store_config() {
        let cli = Cli::try_parse_from(["sheetstore", "--spreadsheet-id", "abc", "list"])
            .expect("parse");
        assert_eq!(cli.remote.id_strategy, IdStrategyCli::Counter);
        let config = store_config(&cli.remote, SeedMode::Batched).expect("config");
        assert_eq!(config.id_strategy, IdStrategy::Counter);
        assert_eq!(config.counter_column, 16);
        assert_eq!(config.id_prefix, "EMP");
        assert!(matches!(cli.command, Command::List { .. }));
    }

    #[test]
    fn counter_column_must_be_letters() {
        let cli = Cli::try_parse_from([
            "sheetstore",
            "--counter-column",
            "1A",
            "--id-strategy",
            "count",
            "stats",
        ])
        .expect("parse");
        let err = store_config(&cli.remote, SeedMode::Batched).expect_err("bad column");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn serve_sheets_accept_comma_lists() {
        let cli = Cli::try_parse_from(["sheetstore", "serve", "--sheets", "Sheet1,Arsip"])
            .expect("parse");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.sheets, ["Sheet1", "Arsip"]);
        assert_eq!(args.bind, "127.0.0.1:9800");
    }

    #[test]
    fn update_json_keeps_target_id_when_absent() {
        let value = parse_inline_json(r#"{"namaDepan":"Siti","gaji":7000000}"#).expect("json");
        let employee = employee_from_json("EMP0002", value).expect("employee");
        assert_eq!(employee.id, "EMP0002");
        assert_eq!(employee.first_name, "Siti");
        assert_eq!(employee.salary, 7_000_000);

        let renamed = employee_from_json("EMP0002", json!({"id": "EMP0099"})).expect("employee");
        assert_eq!(renamed.id, "EMP0099");
        assert!(employee_from_json("EMP0002", json!([1, 2])).is_err());
    }

    #[test]
    fn token_file_trims_and_reads() {
        let mut file = NamedTempFile::new().expect("tempfile");
        std::io::Write::write_all(&mut file, b"  secret-token \n").expect("write");
        let token = read_token_file(file.path()).expect("token");
        assert_eq!(token, "secret-token");
        let both = resolve_token_value(Some("x".to_string()), Some(file.path().to_path_buf()));
        assert_eq!(both.expect_err("conflict").kind(), ErrorKind::Usage);
        let from_file = resolve_token_value(None, Some(file.path().to_path_buf())).expect("file");
        assert_eq!(from_file.as_deref(), Some("secret-token"));
    }

    #[test]
    fn store_and_emulator_share_the_token_conflict_rule() {
        let cli = Cli::try_parse_from([
            "sheetstore",
            "--spreadsheet-id",
            "abc",
            "--token",
            "inline",
            "--token-file",
            "/nonexistent/token",
            "list",
        ])
        .expect("parse");
        let err = open_store(&cli.remote, SeedMode::Batched).err().expect("conflict");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let from_resolver = resolve_token_value(
            cli.remote.token.clone(),
            cli.remote.token_file.clone(),
        )
        .expect_err("conflict");
        assert_eq!(err.message(), from_resolver.message());
        assert_eq!(err.hint(), from_resolver.hint());

        let cli = Cli::try_parse_from(["sheetstore", "--spreadsheet-id", "abc", "list"])
            .expect("parse");
        assert!(open_store(&cli.remote, SeedMode::Batched).is_ok());
    }

    #[test]
    fn error_text_respects_color_flag() {
        let err = Error::new(ErrorKind::Usage).with_message("bad input");
        let colored = error_text(&err, true);
        let plain = error_text(&err, false);
        assert!(colored.contains("\u{1b}[31merror:\u{1b}[0m"));
        assert!(plain.contains("error:"));
        assert!(!plain.contains("\u{1b}["));
    }

    #[test]
    fn error_json_carries_context() {
        let err = Error::new(ErrorKind::NotFound)
            .with_message("record not found")
            .with_record_id("EMP0404");
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "NotFound");
        assert_eq!(value["error"]["id"], "EMP0404");
        assert!(value["error"].get("status").is_none());
    }
}
