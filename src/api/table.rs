//! Purpose: Range-addressed table abstraction plus an in-process implementation.
//! Exports: `RemoteTable`, `MemoryTable`.
//! Role: The seam between `RecordStore` and whatever actually holds the cells.
//! Invariants: Reads omit trailing empty cells per row and trailing empty rows.
//! Invariants: Appends land on the first row after the last non-empty row of the span.
//! Invariants: Unknown sheet names fail like an unparsable range (`Usage`).
//! Invariants: Writes never grow a sheet past `MAX_ROWS`; they fail with `Usage` instead.
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::error::{Error, ErrorKind};
use crate::core::range::CellRange;
use crate::core::schema::{Cell, Row};

pub type ApiResult<T> = Result<T, Error>;

/// A remote tabular service with no key lookup, no transactions, and no locking.
pub trait RemoteTable: Send + Sync {
    fn read_range(&self, range: &CellRange) -> ApiResult<Vec<Row>>;
    fn append_rows(&self, range: &CellRange, rows: &[Row]) -> ApiResult<()>;
    fn write_range(&self, range: &CellRange, rows: &[Row]) -> ApiResult<()>;
    fn clear_range(&self, range: &CellRange) -> ApiResult<()>;
}

impl<T: RemoteTable + ?Sized> RemoteTable for Arc<T> {
    fn read_range(&self, range: &CellRange) -> ApiResult<Vec<Row>> {
        (**self).read_range(range)
    }

    fn append_rows(&self, range: &CellRange, rows: &[Row]) -> ApiResult<()> {
        (**self).append_rows(range, rows)
    }

    fn write_range(&self, range: &CellRange, rows: &[Row]) -> ApiResult<()> {
        (**self).write_range(range, rows)
    }

    fn clear_range(&self, range: &CellRange) -> ApiResult<()> {
        (**self).clear_range(range)
    }
}

type Grid = Vec<Vec<Cell>>;

/// Row limit of one in-memory sheet.
pub const MAX_ROWS: u32 = 1_000_000;

/// Sheets held in memory; grid index 0 is row 1 and column A.
#[derive(Debug, Default)]
pub struct MemoryTable {
    sheets: RwLock<BTreeMap<String, Grid>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(self, name: impl Into<String>) -> Self {
        self.add_sheet(name);
        self
    }

    pub fn add_sheet(&self, name: impl Into<String>) {
        let mut sheets = self.sheets.write().unwrap_or_else(PoisonError::into_inner);
        sheets.entry(name.into()).or_default();
    }

    fn with_grid<R>(&self, range: &CellRange, f: impl FnOnce(&Grid) -> R) -> ApiResult<R> {
        let sheets = self.sheets.read().unwrap_or_else(PoisonError::into_inner);
        let grid = sheets.get(&range.sheet).ok_or_else(|| unknown_sheet(range))?;
        Ok(f(grid))
    }

    fn with_grid_mut<R>(
        &self,
        range: &CellRange,
        f: impl FnOnce(&mut Grid) -> ApiResult<R>,
    ) -> ApiResult<R> {
        let mut sheets = self.sheets.write().unwrap_or_else(PoisonError::into_inner);
        let grid = sheets.get_mut(&range.sheet).ok_or_else(|| unknown_sheet(range))?;
        f(grid)
    }
}

impl RemoteTable for MemoryTable {
    fn read_range(&self, range: &CellRange) -> ApiResult<Vec<Row>> {
        self.with_grid(range, |grid| {
            let first = range.first_row() as usize - 1;
            let last = range
                .last_row()
                .map_or(grid.len(), |row| (row as usize).min(grid.len()));
            let mut rows: Vec<Row> = (first..last.max(first))
                .map(|row| {
                    let mut cells: Row = (range.first_column()..=range.last_column())
                        .map(|column| cell_at(grid, row, column as usize - 1))
                        .collect();
                    while cells.last().is_some_and(Cell::is_empty) {
                        cells.pop();
                    }
                    cells
                })
                .collect();
            while rows.last().is_some_and(Vec::is_empty) {
                rows.pop();
            }
            rows
        })
    }

    fn append_rows(&self, range: &CellRange, rows: &[Row]) -> ApiResult<()> {
        check_width(range, rows)?;
        self.with_grid_mut(range, |grid| {
            let first = range.first_row() as usize - 1;
            let columns = range.first_column() as usize - 1..range.last_column() as usize;
            let next = (first..grid.len())
                .rev()
                .find(|row| columns.clone().any(|column| !cell_at(grid, *row, column).is_empty()))
                .map_or(first, |row| row + 1);
            check_rows(range, next, rows.len())?;
            for (offset, row) in rows.iter().enumerate() {
                put_row(grid, next + offset, columns.start, row);
            }
            Ok(())
        })
    }

    fn write_range(&self, range: &CellRange, rows: &[Row]) -> ApiResult<()> {
        check_width(range, rows)?;
        if let Some(last) = range.last_row() {
            let capacity = (last - range.first_row() + 1) as usize;
            if rows.len() > capacity {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!(
                        "Requested writing within range [{range}], but tried writing {} rows",
                        rows.len()
                    ))
                    .with_range(range.to_string()));
            }
        }
        check_rows(range, range.first_row() as usize - 1, rows.len())?;
        self.with_grid_mut(range, |grid| {
            let first = range.first_row() as usize - 1;
            for (offset, row) in rows.iter().enumerate() {
                put_row(grid, first + offset, range.first_column() as usize - 1, row);
            }
            Ok(())
        })
    }

    fn clear_range(&self, range: &CellRange) -> ApiResult<()> {
        self.with_grid_mut(range, |grid| {
            let first = range.first_row() as usize - 1;
            let last = range
                .last_row()
                .map_or(grid.len(), |row| (row as usize).min(grid.len()));
            for row in grid.iter_mut().take(last).skip(first) {
                let end = (range.last_column() as usize).min(row.len());
                for cell in row.iter_mut().take(end).skip(range.first_column() as usize - 1) {
                    *cell = Cell::empty();
                }
            }
            Ok(())
        })
    }
}

fn unknown_sheet(range: &CellRange) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message(format!("Unable to parse range: {range}"))
        .with_range(range.to_string())
}

fn check_width(range: &CellRange, rows: &[Row]) -> ApiResult<()> {
    match rows.iter().find(|row| row.len() > range.width()) {
        Some(row) => Err(Error::new(ErrorKind::Usage)
            .with_message(format!(
                "Requested writing within range [{range}], but tried writing {} columns",
                row.len()
            ))
            .with_range(range.to_string())),
        None => Ok(()),
    }
}

/// `first` is the 0-based row the first of `count` rows would land on.
fn check_rows(range: &CellRange, first: usize, count: usize) -> ApiResult<()> {
    if count == 0 || first + count <= MAX_ROWS as usize {
        return Ok(());
    }
    Err(Error::new(ErrorKind::Usage)
        .with_message(format!(
            "Range ({range}) exceeds grid limits. Max rows: {MAX_ROWS}"
        ))
        .with_range(range.to_string()))
}

fn cell_at(grid: &Grid, row: usize, column: usize) -> Cell {
    grid.get(row)
        .and_then(|cells| cells.get(column))
        .cloned()
        .unwrap_or_else(Cell::empty)
}

fn put_row(grid: &mut Grid, row: usize, first_column: usize, cells: &[Cell]) {
    if grid.len() <= row {
        grid.resize_with(row + 1, Vec::new);
    }
    let target = &mut grid[row];
    if target.len() < first_column + cells.len() {
        target.resize_with(first_column + cells.len(), Cell::empty);
    }
    for (offset, cell) in cells.iter().enumerate() {
        target[first_column + offset] = cell.clone();
    }
}
