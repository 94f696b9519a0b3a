//! Purpose: Public surface of the employee record store.
//! Exports: Store, remote table implementations, query helpers, and shared domain types.
//! Role: The path callers (CLI, emulator, tests) use; core modules stay an implementation detail.
//! Invariants: Everything fallible returns `ApiResult` with the shared `Error`.

mod query;
mod sheets;
mod store;
mod table;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::ids::IdStrategy;
pub use crate::core::range::{CellRange, column_index, column_letters};
pub use crate::core::record::{Employee, EmployeeDraft, Status};
pub use crate::core::schema::{Cell, HEADERS, Row, RowVersion};
pub use crate::core::seed::SeedGenerator;
pub use crate::core::validate::{FieldIssue, draft_issues, validate_draft};
pub use query::{EmployeeFilter, Summary, summarize};
pub use sheets::{DEFAULT_BASE_URL, SheetsClient, StaticToken, TokenFile, TokenSupplier};
pub use store::{
    DEFAULT_COUNTER_COLUMN, DEFAULT_ID_PREFIX, DEFAULT_SHEET, RecordStore, SeedMode, StoreConfig,
    Versioned,
};
pub use table::{ApiResult, MemoryTable, RemoteTable};
