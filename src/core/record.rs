//! Purpose: Employee domain record and its input draft.
//! Exports: `Employee`, `EmployeeDraft`, `Status`.
//! Role: The single record kind persisted one-per-row by the store.
//! Invariants: Every attribute has a concrete default; nothing is nullable.
//! Invariants: JSON field names match the sheet's historical camelCase names.
use serde::{Deserialize, Serialize};
use std::fmt;
use time::{Date, Month};

/// Employment status. Unknown cell text is preserved verbatim in `Other`.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    #[default]
    Aktif,
    Cuti,
    Resign,
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Aktif => "Aktif",
            Status::Cuti => "Cuti",
            Status::Resign => "Resign",
            Status::Other(text) => text,
        }
    }

    /// Decodes a cell; an empty cell is `Aktif`.
    pub fn from_cell(text: &str) -> Self {
        match text {
            "" | "Aktif" => Status::Aktif,
            "Cuti" => Status::Cuti,
            "Resign" => Status::Resign,
            other => Status::Other(other.to_string()),
        }
    }
}

impl From<String> for Status {
    fn from(value: String) -> Self {
        Status::from_cell(&value)
    }
}

impl From<Status> for String {
    fn from(value: Status) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes of an employee before an id is assigned.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployeeDraft {
    #[serde(rename = "namaDepan")]
    pub first_name: String,
    #[serde(rename = "namaBelakang")]
    pub last_name: String,
    pub email: String,
    #[serde(rename = "telepon")]
    pub phone: String,
    #[serde(rename = "departemen")]
    pub department: String,
    #[serde(rename = "jabatan")]
    pub position: String,
    /// Monthly salary in whole rupiah.
    #[serde(rename = "gaji")]
    pub salary: i64,
    /// ISO `YYYY-MM-DD`, kept as text so it round-trips byte for byte.
    #[serde(rename = "tanggalMasuk")]
    pub hire_date: String,
    pub status: Status,
    #[serde(rename = "alamat")]
    pub address: String,
    #[serde(rename = "kota")]
    pub city: String,
    #[serde(rename = "provinsi")]
    pub province: String,
    #[serde(rename = "kodePos")]
    pub postal_code: String,
}

/// One persisted employee row.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub fields: EmployeeDraft,
}

impl EmployeeDraft {
    pub fn with_id(self, id: impl Into<String>) -> Employee {
        Employee {
            id: id.into(),
            fields: self,
        }
    }

    pub fn hire_date_parsed(&self) -> Option<Date> {
        parse_iso_date(&self.hire_date)
    }
}

impl std::ops::Deref for Employee {
    type Target = EmployeeDraft;

    fn deref(&self) -> &EmployeeDraft {
        &self.fields
    }
}

impl std::ops::DerefMut for Employee {
    fn deref_mut(&mut self) -> &mut EmployeeDraft {
        &mut self.fields
    }
}

/// Strict `YYYY-MM-DD`; anything else is `None`.
pub fn parse_iso_date(text: &str) -> Option<Date> {
    let mut parts = text.split('-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    let day: u8 = day.parse().ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

pub fn format_iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

#[cfg(test)]
mod tests {
    use super::{Employee, EmployeeDraft, Status, format_iso_date, parse_iso_date};
    use serde_json::json;

    #[test]
    fn status_decodes_known_and_unknown_text() {
        assert_eq!(Status::from_cell(""), Status::Aktif);
        assert_eq!(Status::from_cell("Cuti"), Status::Cuti);
        assert_eq!(Status::from_cell("Pensiun"), Status::Other("Pensiun".to_string()));
        assert_eq!(Status::Other("Pensiun".to_string()).as_str(), "Pensiun");
    }

    #[test]
    fn employee_json_uses_sheet_field_names() {
        let employee = EmployeeDraft {
            first_name: "Budi".to_string(),
            last_name: "Santoso".to_string(),
            salary: 7_500_000,
            status: Status::Cuti,
            ..EmployeeDraft::default()
        }
        .with_id("EMP0001");

        let value = serde_json::to_value(&employee).expect("json");
        assert_eq!(value["id"], json!("EMP0001"));
        assert_eq!(value["namaDepan"], json!("Budi"));
        assert_eq!(value["gaji"], json!(7_500_000));
        assert_eq!(value["status"], json!("Cuti"));

        let back: Employee = serde_json::from_value(value).expect("decode");
        assert_eq!(back, employee);
    }

    #[test]
    fn draft_json_fills_missing_fields_with_defaults() {
        let draft: EmployeeDraft =
            serde_json::from_value(json!({"namaDepan": "Siti"})).expect("draft");
        assert_eq!(draft.first_name, "Siti");
        assert_eq!(draft.salary, 0);
        assert_eq!(draft.status, Status::Aktif);
    }

    #[test]
    fn iso_dates_are_strict() {
        let date = parse_iso_date("2021-02-28").expect("valid");
        assert_eq!(format_iso_date(date), "2021-02-28");
        assert!(parse_iso_date("2021-02-30").is_none());
        assert!(parse_iso_date("2021-2-3").is_none());
        assert!(parse_iso_date("").is_none());
    }
}
