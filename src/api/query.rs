//! Purpose: In-memory filtering and summaries over a fetched listing.
//! Exports: `EmployeeFilter`, `Summary`, `summarize`.
//! Role: Read-side helpers for the CLI; they never touch the remote table.
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::core::record::{Employee, Status};

/// All set criteria must hold; unset criteria match everything.
#[derive(Clone, Debug, Default)]
pub struct EmployeeFilter {
    /// Case-insensitive substring over names, email, department and position.
    pub search: Option<String>,
    /// Exact department.
    pub department: Option<String>,
    pub status: Option<Status>,
}

impl EmployeeFilter {
    pub fn is_empty(&self) -> bool {
        self.search.as_deref().is_none_or(str::is_empty)
            && self.department.is_none()
            && self.status.is_none()
    }

    pub fn matches(&self, employee: &Employee) -> bool {
        if let Some(department) = &self.department {
            if employee.department != *department {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if employee.status != *status {
                return false;
            }
        }
        match self.search.as_deref() {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                [
                    &employee.first_name,
                    &employee.last_name,
                    &employee.email,
                    &employee.department,
                    &employee.position,
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            }
        }
    }

    pub fn apply(&self, employees: Vec<Employee>) -> Vec<Employee> {
        if self.is_empty() {
            return employees;
        }
        employees.into_iter().filter(|e| self.matches(e)).collect()
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    /// Count per status label, including free-text statuses.
    pub by_status: BTreeMap<String, usize>,
    /// Number of distinct departments.
    pub departments: usize,
}

pub fn summarize(employees: &[Employee]) -> Summary {
    let mut by_status = BTreeMap::new();
    let mut departments = BTreeSet::new();
    for employee in employees {
        *by_status.entry(employee.status.to_string()).or_insert(0) += 1;
        departments.insert(employee.department.as_str());
    }
    Summary {
        total: employees.len(),
        by_status,
        departments: departments.len(),
    }
}
