//! Purpose: Positional codec between `Employee` and a 14-cell row, plus row versions.
//! Exports: `Cell`, `Row`, `RowVersion`, column/offset constants, encode/decode helpers.
//! Role: Single source of truth for column order; nothing else indexes into rows.
//! Invariants: Decoding is purely positional; header text never drives field mapping.
//! Invariants: Absent cells decode to defaults (empty text, zero, `Aktif`), never errors.
//! Invariants: A row wider than the schema is a `Schema` error, not silently truncated.
use serde::de::{Deserialize, Deserializer};
use serde::{Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

use super::error::{Error, ErrorKind};
use super::record::{Employee, EmployeeDraft, Status};

pub const COLUMN_COUNT: usize = 14;
pub const FIRST_COLUMN: u32 = 1;
pub const LAST_COLUMN: u32 = COLUMN_COUNT as u32;
pub const HEADER_ROW: u32 = 1;
/// Absolute row number of listing index 0.
pub const ROW_OFFSET: u32 = 2;

pub const HEADERS: [&str; COLUMN_COUNT] = [
    "ID",
    "Nama Depan",
    "Nama Belakang",
    "Email",
    "Telepon",
    "Departemen",
    "Jabatan",
    "Gaji",
    "Tanggal Masuk",
    "Status",
    "Alamat",
    "Kota",
    "Provinsi",
    "Kode Pos",
];

const SALARY_COLUMN: usize = 7;

/// One cell as exchanged with the remote table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Cell {
    Text(String),
    Number(i64),
}

pub type Row = Vec<Cell>;

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn empty() -> Self {
        Cell::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Text(text) if text.is_empty())
    }

    pub fn as_text(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Number(number) => number.to_string(),
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::empty(),
            Value::String(text) => Cell::Text(text.clone()),
            Value::Bool(flag) => Cell::Text(if *flag { "TRUE" } else { "FALSE" }.to_string()),
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    return Cell::Number(int);
                }
                match number.as_f64() {
                    Some(float)
                        if float.fract() == 0.0
                            && float >= i64::MIN as f64
                            && float <= i64::MAX as f64 =>
                    {
                        Cell::Number(float as i64)
                    }
                    _ => Cell::Text(number.to_string()),
                }
            }
            other => Cell::Text(other.to_string()),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Text(text) => serializer.serialize_str(text),
            Cell::Number(number) => serializer.serialize_i64(*number),
        }
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Cell::from_json(&value))
    }
}

/// Content fingerprint of one encoded row, used for optimistic concurrency checks.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RowVersion(String);

impl RowVersion {
    pub fn of(employee: &Employee) -> Self {
        let mut hasher = Sha256::new();
        for cell in encode_row(employee) {
            hasher.update(cell.as_text().as_bytes());
            hasher.update([0x1f]);
        }
        let digest = hasher.finalize();
        let mut out = String::with_capacity(16);
        for byte in &digest[..8] {
            out.push_str(&format!("{byte:02x}"));
        }
        Self(out)
    }

    pub fn parse(text: &str) -> Option<Self> {
        let valid = text.len() == 16 && text.chars().all(|ch| ch.is_ascii_hexdigit());
        valid.then(|| Self(text.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn absolute_row(index: usize) -> u32 {
    index as u32 + ROW_OFFSET
}

pub fn encode_row(employee: &Employee) -> Row {
    let fields = &employee.fields;
    vec![
        Cell::text(employee.id.as_str()),
        Cell::text(fields.first_name.as_str()),
        Cell::text(fields.last_name.as_str()),
        Cell::text(fields.email.as_str()),
        Cell::text(fields.phone.as_str()),
        Cell::text(fields.department.as_str()),
        Cell::text(fields.position.as_str()),
        Cell::Number(fields.salary),
        Cell::text(fields.hire_date.as_str()),
        Cell::text(fields.status.as_str()),
        Cell::text(fields.address.as_str()),
        Cell::text(fields.city.as_str()),
        Cell::text(fields.province.as_str()),
        Cell::text(fields.postal_code.as_str()),
    ]
}

/// Decodes the row found at listing position `index`.
///
/// A missing id cell falls back to `emp-{index + 1}` so every listed row stays
/// addressable by `update`/`delete`.
pub fn decode_row(index: usize, row: &[Cell]) -> Result<Employee, Error> {
    if row.len() > COLUMN_COUNT {
        return Err(Error::new(ErrorKind::Schema)
            .with_message(format!(
                "row {} has {} cells; the schema defines {COLUMN_COUNT}",
                absolute_row(index),
                row.len()
            ))
            .with_hint("Check that the sheet columns match the fixed employee layout."));
    }

    let text = |column: usize| row.get(column).map(Cell::as_text).unwrap_or_default();
    let id = match text(0) {
        id if id.is_empty() => format!("emp-{}", index + 1),
        id => id,
    };
    let salary = match row.get(SALARY_COLUMN) {
        Some(Cell::Number(number)) => *number,
        Some(Cell::Text(text)) => parse_leading_int(text),
        None => 0,
    };

    Ok(Employee {
        id,
        fields: EmployeeDraft {
            first_name: text(1),
            last_name: text(2),
            email: text(3),
            phone: text(4),
            department: text(5),
            position: text(6),
            salary,
            hire_date: text(8),
            status: Status::from_cell(&text(9)),
            address: text(10),
            city: text(11),
            province: text(12),
            postal_code: text(13),
        },
    })
}

pub fn decode_rows(rows: &[Row]) -> Result<Vec<Employee>, Error> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| decode_row(index, row))
        .collect()
}

pub fn header_row() -> Row {
    HEADERS.iter().map(|label| Cell::text(*label)).collect()
}

/// Compares a fetched header row to the schema labels (trimmed, case-sensitive).
pub fn check_header(row: &[Cell]) -> Result<(), Error> {
    if row.iter().all(Cell::is_empty) {
        return Err(Error::new(ErrorKind::Schema)
            .with_message("header row is empty")
            .with_hint("Run `sheetstore init` to write the header row."));
    }
    if row.len() > COLUMN_COUNT {
        return Err(Error::new(ErrorKind::Schema).with_message(format!(
            "header has {} cells; the schema defines {COLUMN_COUNT}",
            row.len()
        )));
    }
    for (column, expected) in HEADERS.iter().enumerate() {
        let found = row.get(column).map(Cell::as_text).unwrap_or_default();
        if found.trim() != *expected {
            return Err(Error::new(ErrorKind::Schema)
                .with_message(format!(
                    "header column {} is `{}`; expected `{expected}`",
                    column + 1,
                    found.trim()
                ))
                .with_hint("Columns are mapped by position; reorder the sheet to match."));
        }
    }
    Ok(())
}

/// Integer prefix of `text` (after leading whitespace); `0` when there is none.
pub fn parse_leading_int(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let mut value: i64 = 0;
    for byte in digits.bytes() {
        if !byte.is_ascii_digit() {
            break;
        }
        let digit = i64::from(byte - b'0');
        value = value.saturating_mul(10).saturating_add(digit);
    }
    if negative { -value } else { value }
}

#[cfg(test)]
mod tests {
    use super::{
        COLUMN_COUNT, Cell, RowVersion, absolute_row, check_header, decode_row, encode_row,
        header_row, parse_leading_int,
    };
    use crate::core::error::ErrorKind;
    use crate::core::record::{EmployeeDraft, Status};
    use serde_json::json;

    fn sample() -> crate::core::record::Employee {
        EmployeeDraft {
            first_name: "Budi".to_string(),
            last_name: "Santoso".to_string(),
            email: "budi.santoso@perusahaan.co.id".to_string(),
            phone: "081234567890".to_string(),
            department: "IT".to_string(),
            position: "DevOps Engineer".to_string(),
            salary: 12_000_000,
            hire_date: "2020-03-01".to_string(),
            status: Status::Aktif,
            address: "Jl. Sudirman No. 10".to_string(),
            city: "Jakarta".to_string(),
            province: "DKI Jakarta".to_string(),
            postal_code: "10210".to_string(),
        }
        .with_id("EMP0001")
    }

    #[test]
    fn encode_follows_fixed_column_order() {
        let row = encode_row(&sample());
        assert_eq!(row.len(), COLUMN_COUNT);
        assert_eq!(row[0], Cell::text("EMP0001"));
        assert_eq!(row[7], Cell::Number(12_000_000));
        assert_eq!(row[13], Cell::text("10210"));
        assert_eq!(decode_row(0, &row).expect("decode"), sample());
    }

    #[test]
    fn short_rows_decode_with_defaults() {
        let row = vec![Cell::text("EMP0009"), Cell::text("Siti")];
        let employee = decode_row(3, &row).expect("decode");
        assert_eq!(employee.id, "EMP0009");
        assert_eq!(employee.first_name, "Siti");
        assert_eq!(employee.salary, 0);
        assert_eq!(employee.status, Status::Aktif);
        assert_eq!(employee.postal_code, "");
    }

    #[test]
    fn missing_id_falls_back_to_position() {
        let employee = decode_row(4, &[]).expect("decode");
        assert_eq!(employee.id, "emp-5");
    }

    #[test]
    fn wide_rows_are_schema_errors() {
        let row = vec![Cell::empty(); COLUMN_COUNT + 1];
        let err = decode_row(0, &row).expect_err("too wide");
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn salary_text_uses_integer_prefix() {
        assert_eq!(parse_leading_int("5000000"), 5_000_000);
        assert_eq!(parse_leading_int("  42abc"), 42);
        assert_eq!(parse_leading_int("-7"), -7);
        assert_eq!(parse_leading_int("5.000.000"), 5);
        assert_eq!(parse_leading_int("Rp 5000"), 0);
        assert_eq!(parse_leading_int(""), 0);
    }

    #[test]
    fn cells_accept_json_numbers_and_strings() {
        assert_eq!(Cell::from_json(&json!(5)), Cell::Number(5));
        assert_eq!(Cell::from_json(&json!(5.0)), Cell::Number(5));
        assert_eq!(Cell::from_json(&json!(5.5)), Cell::text("5.5"));
        assert_eq!(Cell::from_json(&json!(null)), Cell::empty());
        assert_eq!(Cell::from_json(&json!("08123")), Cell::text("08123"));
        assert_eq!(serde_json::to_value(Cell::Number(3)).expect("json"), json!(3));
    }

    #[test]
    fn row_version_tracks_content() {
        let original = sample();
        let mut changed = original.clone();
        changed.salary += 1;
        assert_eq!(RowVersion::of(&original), RowVersion::of(&original.clone()));
        assert_ne!(RowVersion::of(&original), RowVersion::of(&changed));
        let version = RowVersion::of(&original);
        assert_eq!(RowVersion::parse(version.as_str()), Some(version.clone()));
        assert_eq!(RowVersion::parse("nope"), None);
    }

    #[test]
    fn header_check_is_positional() {
        check_header(&header_row()).expect("schema header");

        let mut swapped = header_row();
        swapped.swap(1, 2);
        let err = check_header(&swapped).expect_err("swapped");
        assert_eq!(err.kind(), ErrorKind::Schema);

        let err = check_header(&[]).expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn listing_index_maps_past_header() {
        assert_eq!(absolute_row(0), 2);
        assert_eq!(absolute_row(9), 11);
    }
}
