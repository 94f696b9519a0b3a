//! Purpose: Employee record store over a range-addressed remote table.
//! Exports: `RecordStore`, `StoreConfig`, `SeedMode`, `Versioned`.
//! Role: Maps records to positional rows and resolves ids to row numbers per call.
//! Invariants: Every operation re-reads the table; nothing is cached between calls.
//! Invariants: Listing index `i` is absolute row `i + 2`; row 1 holds the header.
//! Invariants: Appends target the data span, so row 1 is never written with a record.
//! Invariants: Only counter-based id allocation is serialized, and only in-process.
//! Invariants: `update`/`delete`/`rewrite_all` are read-then-write with no remote lock.
#![allow(clippy::result_large_err)]

use rand::Rng;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use super::table::{ApiResult, RemoteTable};
use crate::core::error::{Error, ErrorKind};
use crate::core::ids::{IdStrategy, block_end, format_sequential_id, next_sequence, random_id};
use crate::core::range::{CellRange, column_letters};
use crate::core::record::{Employee, EmployeeDraft};
use crate::core::schema::{
    Cell, FIRST_COLUMN, HEADER_ROW, LAST_COLUMN, ROW_OFFSET, Row, RowVersion, absolute_row,
    check_header, decode_row, decode_rows, encode_row, header_row,
};
use crate::core::seed::SeedGenerator;

pub const DEFAULT_SHEET: &str = "Sheet1";
pub const DEFAULT_ID_PREFIX: &str = "EMP";
/// Column `P`, one gap column past the data span.
pub const DEFAULT_COUNTER_COLUMN: u32 = 16;

/// How `seed` writes its generated rows.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SeedMode {
    /// One multi-row append.
    #[default]
    Batched,
    /// One append per record; stops at the first failure and keeps what landed.
    Sequential,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreConfig {
    pub sheet: String,
    pub id_prefix: String,
    pub id_strategy: IdStrategy,
    pub seed_mode: SeedMode,
    /// 1-based column of the counter cell in the header row.
    pub counter_column: u32,
    /// Read the header together with the data and reject a mismatching layout.
    pub strict_schema: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sheet: DEFAULT_SHEET.to_string(),
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            id_strategy: IdStrategy::default(),
            seed_mode: SeedMode::default(),
            counter_column: DEFAULT_COUNTER_COLUMN,
            strict_schema: false,
        }
    }
}

impl StoreConfig {
    pub fn new(sheet: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            ..Self::default()
        }
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    pub fn with_id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    pub fn with_seed_mode(mut self, mode: SeedMode) -> Self {
        self.seed_mode = mode;
        self
    }

    pub fn with_counter_column(mut self, column: u32) -> Self {
        self.counter_column = column;
        self
    }

    pub fn with_strict_schema(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }
}

/// A record paired with the version of the row it was read from.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Versioned<T> {
    pub version: RowVersion,
    #[serde(flatten)]
    pub record: T,
}

pub struct RecordStore<T> {
    table: T,
    config: StoreConfig,
    id_lock: Mutex<()>,
}

impl<T: RemoteTable> RecordStore<T> {
    pub fn new(table: T, config: StoreConfig) -> Self {
        Self {
            table,
            config,
            id_lock: Mutex::new(()),
        }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn list(&self) -> ApiResult<Vec<Employee>> {
        let range = self.data_range();
        let rows = self.fetch_rows()?;
        let records = decode_rows(&rows).map_err(|err| err.with_range(range.to_string()))?;
        debug!(sheet = %self.config.sheet, records = records.len(), "listed records");
        Ok(records)
    }

    pub fn list_versioned(&self) -> ApiResult<Vec<Versioned<Employee>>> {
        Ok(self.list()?.into_iter().map(versioned).collect())
    }

    pub fn get(&self, id: &str) -> ApiResult<Employee> {
        self.get_versioned(id).map(|found| found.record)
    }

    pub fn get_versioned(&self, id: &str) -> ApiResult<Versioned<Employee>> {
        self.list_versioned()?
            .into_iter()
            .find(|found| found.record.id == id)
            .ok_or_else(|| Error::not_found(id))
    }

    /// Assigns an id and appends one row; returns the record as stored.
    pub fn add(&self, draft: EmployeeDraft) -> ApiResult<Employee> {
        let id = self.allocate_ids(1)?.pop().ok_or_else(|| {
            Error::new(ErrorKind::Internal).with_message("id allocation returned no id")
        })?;
        let employee = draft.with_id(id);
        self.table
            .append_rows(&self.data_range(), &[encode_row(&employee)])?;
        info!(id = %employee.id, "added record");
        Ok(employee)
    }

    /// Overwrites the whole row currently holding `id` with `employee`.
    ///
    /// The row is resolved from a fresh listing and then written blind; a
    /// concurrent delete between the two calls shifts rows and the write lands
    /// on a different record.
    pub fn update(&self, id: &str, employee: &Employee) -> ApiResult<()> {
        let records = self.list()?;
        let index = position_of(&records, id)?;
        let range = self.row_range(index);
        self.table.write_range(&range, &[encode_row(employee)])?;
        info!(id, row = absolute_row(index), "updated record");
        Ok(())
    }

    /// Like `update`, but only when the row still matches `expected`.
    ///
    /// Returns the version of the row as written.
    pub fn update_versioned(
        &self,
        id: &str,
        expected: &RowVersion,
        employee: &Employee,
    ) -> ApiResult<RowVersion> {
        let records = self.list()?;
        let index = position_of(&records, id)?;
        check_version(id, expected, &RowVersion::of(&records[index]))?;

        let range = self.row_range(index);
        let current = self.table.read_range(&range)?;
        let row = current.first().map(Vec::as_slice).unwrap_or_default();
        let reread = decode_row(index, row).map_err(|err| err.with_range(range.to_string()))?;
        if reread.id != id {
            return Err(Error::new(ErrorKind::Conflict)
                .with_message(format!("row {} moved to `{}`", absolute_row(index), reread.id))
                .with_record_id(id));
        }
        check_version(id, expected, &RowVersion::of(&reread))?;

        self.table.write_range(&range, &[encode_row(employee)])?;
        info!(id, row = absolute_row(index), "updated record (versioned)");
        Ok(RowVersion::of(employee))
    }

    /// Read-apply-write loop on top of `update_versioned`, retried on `Conflict`.
    pub fn modify<F>(&self, id: &str, attempts: usize, mut apply: F) -> ApiResult<Employee>
    where
        F: FnMut(&mut Employee),
    {
        let attempts = attempts.max(1);
        let mut conflict = Error::new(ErrorKind::Conflict).with_record_id(id);
        for attempt in 1..=attempts {
            let current = self.get_versioned(id)?;
            let mut next = current.record;
            apply(&mut next);
            match self.update_versioned(id, &current.version, &next) {
                Ok(_) => return Ok(next),
                Err(err) if err.kind() == ErrorKind::Conflict => {
                    warn!(id, attempt, attempts, "concurrent change; retrying");
                    conflict = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(conflict.with_hint(format!("gave up after {attempts} attempts")))
    }

    /// Removes every row carrying `id` by rewriting the survivors.
    pub fn delete(&self, id: &str) -> ApiResult<()> {
        let records = self.list()?;
        let before = records.len();
        let survivors: Vec<Employee> = records.into_iter().filter(|e| e.id != id).collect();
        if survivors.len() == before {
            return Err(Error::not_found(id));
        }
        self.rewrite_all(&survivors)?;
        info!(id, remaining = survivors.len(), "deleted record");
        Ok(())
    }

    pub fn delete_versioned(&self, id: &str, expected: &RowVersion) -> ApiResult<()> {
        let records = self.list()?;
        let index = position_of(&records, id)?;
        check_version(id, expected, &RowVersion::of(&records[index]))?;
        let survivors: Vec<Employee> = records.into_iter().filter(|e| e.id != id).collect();
        self.rewrite_all(&survivors)?;
        info!(id, remaining = survivors.len(), "deleted record (versioned)");
        Ok(())
    }

    /// Clears the data span, then writes `records` from row 2.
    ///
    /// Not atomic: if the write fails the span stays cleared.
    pub fn rewrite_all(&self, records: &[Employee]) -> ApiResult<()> {
        let data = self.data_range();
        self.table.clear_range(&data)?;
        if records.is_empty() {
            return Ok(());
        }

        let last = ROW_OFFSET + records.len() as u32 - 1;
        let range = CellRange::rows(&self.config.sheet, FIRST_COLUMN, LAST_COLUMN, ROW_OFFSET, last);
        let rows: Vec<Row> = records.iter().map(encode_row).collect();
        if let Err(err) = self.table.write_range(&range, &rows) {
            error!(
                range = %range,
                lost = records.len(),
                "rewrite failed after clear; data rows are gone"
            );
            return Err(err.with_hint(format!(
                "{data} was cleared but {} rows were not written back",
                records.len()
            )));
        }
        Ok(())
    }

    pub fn seed(&self, count: usize) -> ApiResult<Vec<Employee>> {
        self.seed_with(count, &mut SeedGenerator::from_entropy())
    }

    /// Populates an empty store with `count` generated employees.
    pub fn seed_with<R: Rng>(
        &self,
        count: usize,
        generator: &mut SeedGenerator<R>,
    ) -> ApiResult<Vec<Employee>> {
        let existing = self.list()?.len();
        if existing > 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("store already holds {existing} records"))
                .with_hint("Seeding only populates an empty sheet."));
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let ids = self.allocate_ids(count)?;
        let employees: Vec<Employee> = generator
            .drafts(count)
            .into_iter()
            .zip(ids)
            .map(|(draft, id)| draft.with_id(id))
            .collect();

        let range = self.data_range();
        match self.config.seed_mode {
            SeedMode::Batched => {
                let rows: Vec<Row> = employees.iter().map(encode_row).collect();
                self.table.append_rows(&range, &rows)?;
            }
            SeedMode::Sequential => {
                for (appended, employee) in employees.iter().enumerate() {
                    if let Err(err) = self.table.append_rows(&range, &[encode_row(employee)]) {
                        warn!(appended, total = count, "sequential seed stopped");
                        return Err(err);
                    }
                }
            }
        }
        info!(count, mode = ?self.config.seed_mode, "seeded records");
        Ok(employees)
    }

    pub fn init_header(&self) -> ApiResult<()> {
        self.table
            .write_range(&self.header_range(), &[header_row()])?;
        info!(sheet = %self.config.sheet, "wrote header row");
        Ok(())
    }

    pub fn verify_schema(&self) -> ApiResult<()> {
        let range = self.header_range();
        let rows = self.table.read_range(&range)?;
        let header = rows.first().map(Vec::as_slice).unwrap_or_default();
        check_header(header).map_err(|err| err.with_range(range.to_string()))
    }

    /// Mints `count` ids under the configured strategy.
    pub fn allocate_ids(&self, count: usize) -> ApiResult<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let prefix = self.config.id_prefix.as_str();
        let count = count as u64;
        match self.config.id_strategy {
            IdStrategy::ListingCount => {
                let existing = self.list()?.len() as u64;
                Ok((1..=count)
                    .map(|offset| format_sequential_id(prefix, existing + offset))
                    .collect())
            }
            IdStrategy::Counter => {
                let _guard = self.id_lock.lock().unwrap_or_else(PoisonError::into_inner);
                let stored = self.read_counter()?;
                let live = self.list()?;
                let first = next_sequence(prefix, stored, live.iter().map(|e| e.id.as_str()))?;
                let last = block_end(prefix, first, count)?;
                self.write_counter(last)?;
                debug!(first, last, "reserved id block");
                Ok((first..=last)
                    .map(|number| format_sequential_id(prefix, number))
                    .collect())
            }
            IdStrategy::Random => (0..count).map(|_| random_id(prefix)).collect(),
        }
    }

    fn read_counter(&self) -> ApiResult<Option<u64>> {
        let range = self.counter_range()?;
        let rows = self.table.read_range(&range)?;
        match rows.first().and_then(|row| row.first()) {
            None => Ok(None),
            Some(Cell::Number(number)) if *number >= 0 => Ok(Some(*number as u64)),
            Some(Cell::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(Cell::Text(text)) if text.trim().parse::<u64>().is_ok() => {
                Ok(text.trim().parse().ok())
            }
            Some(other) => Err(Error::new(ErrorKind::Schema)
                .with_message(format!("id counter holds `{}`", other.as_text()))
                .with_range(range.to_string())
                .with_hint("The counter cell must be empty or a non-negative integer.")),
        }
    }

    fn write_counter(&self, value: u64) -> ApiResult<()> {
        let range = self.counter_range()?;
        let value = i64::try_from(value).map_err(|_| {
            Error::new(ErrorKind::Schema)
                .with_message(format!("id counter value {value} does not fit the counter cell"))
                .with_range(range.to_string())
        })?;
        self.table
            .write_range(&range, &[vec![Cell::Number(value)]])
    }

    fn fetch_rows(&self) -> ApiResult<Vec<Row>> {
        if !self.config.strict_schema {
            return self.table.read_range(&self.data_range());
        }
        let range = CellRange::from_row(&self.config.sheet, FIRST_COLUMN, LAST_COLUMN, HEADER_ROW);
        let mut rows = self.table.read_range(&range)?;
        let header = if rows.is_empty() {
            Vec::new()
        } else {
            rows.remove(0)
        };
        check_header(&header).map_err(|err| err.with_range(range.to_string()))?;
        Ok(rows)
    }

    fn data_range(&self) -> CellRange {
        CellRange::from_row(&self.config.sheet, FIRST_COLUMN, LAST_COLUMN, ROW_OFFSET)
    }

    fn header_range(&self) -> CellRange {
        CellRange::rows(&self.config.sheet, FIRST_COLUMN, LAST_COLUMN, HEADER_ROW, HEADER_ROW)
    }

    fn row_range(&self, index: usize) -> CellRange {
        let row = absolute_row(index);
        CellRange::rows(&self.config.sheet, FIRST_COLUMN, LAST_COLUMN, row, row)
    }

    fn counter_range(&self) -> ApiResult<CellRange> {
        let column = self.config.counter_column;
        if column <= LAST_COLUMN {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "counter column {} overlaps the data columns A:{}",
                column_letters(column),
                column_letters(LAST_COLUMN)
            )));
        }
        Ok(CellRange::cell(&self.config.sheet, column, HEADER_ROW))
    }
}

fn versioned(employee: Employee) -> Versioned<Employee> {
    Versioned {
        version: RowVersion::of(&employee),
        record: employee,
    }
}

fn position_of(records: &[Employee], id: &str) -> ApiResult<usize> {
    records
        .iter()
        .position(|employee| employee.id == id)
        .ok_or_else(|| Error::not_found(id))
}

fn check_version(id: &str, expected: &RowVersion, found: &RowVersion) -> ApiResult<()> {
    if expected == found {
        return Ok(());
    }
    Err(Error::new(ErrorKind::Conflict)
        .with_message(format!("row version is {found}, expected {expected}"))
        .with_record_id(id))
}
