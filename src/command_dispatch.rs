//! Purpose: Hold top-level CLI command dispatch for `sheetstore`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Each command makes one store call path and emits one JSON document.
//! Invariants: Input is validated here, before it reaches the store.

use super::*;
use sheetstore::api::{
    EmployeeFilter, HEADERS, RowVersion, SeedGenerator, Status, summarize, validate_draft,
};

pub(super) fn dispatch_command(command: Command, remote: RemoteArgs) -> Result<RunOutcome, Error> {
    match command {
        Command::List {
            search,
            department,
            status,
            versions,
        } => {
            let store = open_store(&remote, SeedMode::default())?;
            let filter = EmployeeFilter {
                search,
                department,
                status: status.as_deref().map(Status::from_cell),
            };
            if versions {
                let rows: Vec<_> = store
                    .list_versioned()?
                    .into_iter()
                    .filter(|found| filter.matches(&found.record))
                    .collect();
                emit_json(json!(rows));
            } else {
                emit_json(json!(filter.apply(store.list()?)));
            }
            Ok(RunOutcome::ok())
        }
        Command::Stats => {
            let store = open_store(&remote, SeedMode::default())?;
            emit_json(json!(summarize(&store.list()?)));
            Ok(RunOutcome::ok())
        }
        Command::Add { json } => {
            let draft = draft_from_json(read_input_json(json)?)?;
            validate_draft(&draft)?;
            let store = open_store(&remote, SeedMode::default())?;
            let employee = store.add(draft)?;
            emit_json(json!(employee));
            Ok(RunOutcome::ok())
        }
        Command::Update {
            id,
            json,
            expect_version,
        } => {
            let employee = employee_from_json(&id, read_input_json(json)?)?;
            validate_draft(&employee)?;
            let expected = expect_version.as_deref().map(parse_version).transpose()?;
            let store = open_store(&remote, SeedMode::default())?;
            let version = match expected {
                Some(expected) => store.update_versioned(&id, &expected, &employee)?,
                None => {
                    store.update(&id, &employee)?;
                    RowVersion::of(&employee)
                }
            };
            emit_json(json!({ "updated": employee, "version": version }));
            Ok(RunOutcome::ok())
        }
        Command::Delete { id, expect_version } => {
            let expected = expect_version.as_deref().map(parse_version).transpose()?;
            let store = open_store(&remote, SeedMode::default())?;
            match expected {
                Some(expected) => store.delete_versioned(&id, &expected)?,
                None => store.delete(&id)?,
            }
            emit_json(json!({ "deleted": id }));
            Ok(RunOutcome::ok())
        }
        Command::Seed {
            count,
            seed,
            sequential,
        } => {
            let mode = if sequential {
                SeedMode::Sequential
            } else {
                SeedMode::Batched
            };
            let store = open_store(&remote, mode)?;
            let mut generator = match seed {
                Some(seed) => SeedGenerator::from_seed(seed),
                None => SeedGenerator::from_entropy(),
            };
            let employees = store.seed_with(count, &mut generator)?;
            let ids: Vec<&str> = employees.iter().map(|e| e.id.as_str()).collect();
            emit_json(json!({ "seeded": employees.len(), "ids": ids }));
            Ok(RunOutcome::ok())
        }
        Command::Init => {
            let store = open_store(&remote, SeedMode::default())?;
            store.init_header()?;
            emit_json(json!({ "sheet": remote.sheet, "header": HEADERS }));
            Ok(RunOutcome::ok())
        }
        Command::Check => {
            let store = open_store(&remote, SeedMode::default())?;
            store.verify_schema()?;
            let records = store.list()?.len();
            emit_json(json!({ "ok": true, "sheet": remote.sheet, "records": records }));
            Ok(RunOutcome::ok())
        }
        Command::Serve(args) => {
            let bind = args.bind.parse::<std::net::SocketAddr>().map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid bind address `{}`", args.bind))
                    .with_source(err)
            })?;
            let config = serve::ServeConfig {
                bind,
                token: resolve_token_value(args.token, args.token_file)?,
                spreadsheet_id: args.spreadsheet_id,
                sheets: args.sheets,
                allow_non_loopback: args.allow_non_loopback,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
    }
}

fn parse_version(text: &str) -> Result<RowVersion, Error> {
    RowVersion::parse(text).ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid row version `{text}`"))
            .with_hint("Use a version from `sheetstore list --versions`.")
    })
}
