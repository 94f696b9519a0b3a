//! Purpose: Shared fixtures for the store integration tests.
//! Exports: Draft builders and `RemoteTable` wrappers that count, fail, or gate calls.
//! Role: Test-only support code included via `mod common;`.
//! Invariants: Wrappers delegate to a real `MemoryTable`; injected failures change nothing.
#![allow(dead_code)]

use sheetstore::api::{
    ApiResult, CellRange, EmployeeDraft, Error, ErrorKind, IdStrategy, MemoryTable, RecordStore,
    RemoteTable, Row, Status, StoreConfig,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

pub type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

pub const SHEET: &str = "Sheet1";

pub fn draft(first: &str, last: &str) -> EmployeeDraft {
    EmployeeDraft {
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!(
            "{}.{}@perusahaan.co.id",
            first.to_lowercase(),
            last.to_lowercase()
        ),
        phone: "081234567890".to_string(),
        department: "IT".to_string(),
        position: "Software Developer".to_string(),
        salary: 9_500_000,
        hire_date: "2021-04-12".to_string(),
        status: Status::Aktif,
        address: "Jl. Sudirman No. 12".to_string(),
        city: "Jakarta".to_string(),
        province: "DKI Jakarta".to_string(),
        postal_code: "10220".to_string(),
    }
}

pub fn memory_store(strategy: IdStrategy) -> RecordStore<Arc<MemoryTable>> {
    let table = Arc::new(MemoryTable::new().with_sheet(SHEET));
    RecordStore::new(table, StoreConfig::new(SHEET).with_id_strategy(strategy))
}

fn injected(operation: &str) -> Error {
    Error::new(ErrorKind::Transport)
        .with_status(503)
        .with_message(format!("injected {operation} failure"))
}

/// Counts every call and fails selected ones.
#[derive(Default)]
pub struct FlakyTable {
    inner: MemoryTable,
    fail_writes: AtomicBool,
    /// 1-based append call that fails; 0 never fails.
    fail_append_call: AtomicUsize,
    reads: AtomicUsize,
    appends: AtomicUsize,
    writes: AtomicUsize,
    clears: AtomicUsize,
}

impl FlakyTable {
    pub fn new() -> Self {
        Self {
            inner: MemoryTable::new().with_sheet(SHEET),
            ..Self::default()
        }
    }

    pub fn fail_writes(&self, enabled: bool) {
        self.fail_writes.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_append_call(&self, call: usize) {
        self.fail_append_call.store(call, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl RemoteTable for FlakyTable {
    fn read_range(&self, range: &CellRange) -> ApiResult<Vec<Row>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_range(range)
    }

    fn append_rows(&self, range: &CellRange, rows: &[Row]) -> ApiResult<()> {
        let call = self.appends.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_append_call.load(Ordering::SeqCst) {
            return Err(injected("append"));
        }
        self.inner.append_rows(range, rows)
    }

    fn write_range(&self, range: &CellRange, rows: &[Row]) -> ApiResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        self.inner.write_range(range, rows)
    }

    fn clear_range(&self, range: &CellRange) -> ApiResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear_range(range)
    }
}

/// Holds the next `gated` reads at a barrier so callers observe the same snapshot.
pub struct GatedTable {
    inner: MemoryTable,
    barrier: Barrier,
    gated: AtomicUsize,
}

impl GatedTable {
    pub fn new(parties: usize) -> Self {
        Self {
            inner: MemoryTable::new().with_sheet(SHEET),
            barrier: Barrier::new(parties),
            gated: AtomicUsize::new(0),
        }
    }

    pub fn gate_next_reads(&self, count: usize) {
        self.gated.store(count, Ordering::SeqCst);
    }
}

impl RemoteTable for GatedTable {
    fn read_range(&self, range: &CellRange) -> ApiResult<Vec<Row>> {
        let rows = self.inner.read_range(range)?;
        let gated = self
            .gated
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if gated {
            self.barrier.wait();
        }
        Ok(rows)
    }

    fn append_rows(&self, range: &CellRange, rows: &[Row]) -> ApiResult<()> {
        self.inner.append_rows(range, rows)
    }

    fn write_range(&self, range: &CellRange, rows: &[Row]) -> ApiResult<()> {
        self.inner.write_range(range, rows)
    }

    fn clear_range(&self, range: &CellRange) -> ApiResult<()> {
        self.inner.clear_range(range)
    }
}
