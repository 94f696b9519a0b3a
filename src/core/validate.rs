//! Purpose: Boundary validation for employee input before it reaches the store.
//! Exports: `FieldIssue`, `draft_issues`, `validate_draft`.
//! Role: Used by callers (the CLI) only; `RecordStore` never re-validates.
//! Invariants: All failing fields are reported together, in column order.
use super::error::{Error, ErrorKind};
use super::record::EmployeeDraft;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldIssue {
    /// JSON field name (`namaDepan`, `email`, ...).
    pub field: &'static str,
    pub reason: &'static str,
}

pub fn draft_issues(draft: &EmployeeDraft) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    let mut fail = |field, reason| issues.push(FieldIssue { field, reason });

    if draft.first_name.trim().is_empty() {
        fail("namaDepan", "required");
    }
    if draft.last_name.trim().is_empty() {
        fail("namaBelakang", "required");
    }
    if draft.email.trim().is_empty() {
        fail("email", "required");
    } else if !is_email(&draft.email) {
        fail("email", "invalid format");
    }
    if draft.phone.trim().is_empty() {
        fail("telepon", "required");
    } else if !is_local_phone(&draft.phone) {
        fail("telepon", "expected 08 followed by 8 to 11 digits");
    }
    if draft.department.trim().is_empty() {
        fail("departemen", "required");
    }
    if draft.position.trim().is_empty() {
        fail("jabatan", "required");
    }
    if draft.salary <= 0 {
        fail("gaji", "must be greater than zero");
    }
    if draft.hire_date.trim().is_empty() {
        fail("tanggalMasuk", "required");
    } else if draft.hire_date_parsed().is_none() {
        fail("tanggalMasuk", "expected YYYY-MM-DD");
    }
    if draft.address.trim().is_empty() {
        fail("alamat", "required");
    }
    if draft.city.trim().is_empty() {
        fail("kota", "required");
    }
    if draft.province.trim().is_empty() {
        fail("provinsi", "required");
    }
    if draft.postal_code.trim().is_empty() {
        fail("kodePos", "required");
    }
    issues
}

pub fn validate_draft(draft: &EmployeeDraft) -> Result<(), Error> {
    let issues = draft_issues(draft);
    if issues.is_empty() {
        return Ok(());
    }
    let summary = issues
        .iter()
        .map(|issue| format!("{}: {}", issue.field, issue.reason))
        .collect::<Vec<_>>()
        .join("; ");
    Err(Error::new(ErrorKind::Validation).with_message(summary))
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
fn is_email(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Digits only (separators ignored): `08` then 8 to 11 more digits.
fn is_local_phone(text: &str) -> bool {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.starts_with("08") && (10..=13).contains(&digits.len())
}
