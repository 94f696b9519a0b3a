//! Purpose: Model A1-notation ranges (`Sheet1!A2:N`, `'My Sheet'!A5:N5`, `Sheet1!P1`).
//! Exports: `CellRange`, `CellRef`, `column_letters`, `column_index`.
//! Role: The only addressing vocabulary the remote table understands.
//! Invariants: Columns and rows are 1-based; an absent end row means "to the last row".
//! Invariants: `CellRange::parse(r.to_string()) == r` for every range built here.
use std::fmt;

use super::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CellRef {
    pub column: u32,
    pub row: Option<u32>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CellRange {
    pub sheet: String,
    pub start: CellRef,
    pub end: Option<CellRef>,
}

impl CellRef {
    pub fn new(column: u32, row: Option<u32>) -> Self {
        Self { column, row }
    }
}

impl CellRange {
    /// Whole-column span such as `Sheet1!A:N`.
    pub fn columns(sheet: impl Into<String>, first: u32, last: u32) -> Self {
        Self {
            sheet: sheet.into(),
            start: CellRef::new(first, None),
            end: Some(CellRef::new(last, None)),
        }
    }

    /// Open-ended span starting at `row`, such as `Sheet1!A2:N`.
    pub fn from_row(sheet: impl Into<String>, first: u32, last: u32, row: u32) -> Self {
        Self {
            sheet: sheet.into(),
            start: CellRef::new(first, Some(row)),
            end: Some(CellRef::new(last, None)),
        }
    }

    /// Closed block of rows, such as `Sheet1!A5:N7`.
    pub fn rows(sheet: impl Into<String>, first: u32, last: u32, from: u32, to: u32) -> Self {
        Self {
            sheet: sheet.into(),
            start: CellRef::new(first, Some(from)),
            end: Some(CellRef::new(last, Some(to))),
        }
    }

    pub fn cell(sheet: impl Into<String>, column: u32, row: u32) -> Self {
        Self {
            sheet: sheet.into(),
            start: CellRef::new(column, Some(row)),
            end: None,
        }
    }

    pub fn first_column(&self) -> u32 {
        self.start.column
    }

    pub fn last_column(&self) -> u32 {
        self.end.map_or(self.start.column, |end| end.column)
    }

    pub fn first_row(&self) -> u32 {
        self.start.row.unwrap_or(1)
    }

    /// Last addressed row, or `None` when the range runs to the end of the sheet.
    pub fn last_row(&self) -> Option<u32> {
        match self.end {
            Some(end) => end.row,
            None => self.start.row,
        }
    }

    pub fn width(&self) -> usize {
        (self.last_column() - self.first_column() + 1) as usize
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        let invalid = || {
            Error::new(ErrorKind::Usage)
                .with_message(format!("Unable to parse range: {text}"))
                .with_range(text)
        };

        let (sheet, cells) = split_sheet(text).ok_or_else(invalid)?;
        if sheet.is_empty() || cells.is_empty() {
            return Err(invalid());
        }
        let (start, end) = match cells.split_once(':') {
            Some((start, end)) => (start, Some(end)),
            None => (cells, None),
        };
        let start = parse_cell_ref(start).ok_or_else(invalid)?;
        let end = match end {
            Some(end) => Some(parse_cell_ref(end).ok_or_else(invalid)?),
            None => None,
        };
        if end.is_none() && start.row.is_none() {
            return Err(invalid());
        }
        if let Some(end) = end {
            if end.column < start.column {
                return Err(invalid());
            }
            if let (Some(from), Some(to)) = (start.row, end.row) {
                if to < from {
                    return Err(invalid());
                }
            }
        }
        Ok(Self { sheet, start, end })
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sheet_name(f, &self.sheet)?;
        write!(f, "!")?;
        write_cell_ref(f, self.start)?;
        if let Some(end) = self.end {
            write!(f, ":")?;
            write_cell_ref(f, end)?;
        }
        Ok(())
    }
}

fn write_sheet_name(f: &mut fmt::Formatter<'_>, sheet: &str) -> fmt::Result {
    let plain = sheet
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if plain {
        write!(f, "{sheet}")
    } else {
        write!(f, "'{}'", sheet.replace('\'', "''"))
    }
}

fn write_cell_ref(f: &mut fmt::Formatter<'_>, cell: CellRef) -> fmt::Result {
    write!(f, "{}", column_letters(cell.column))?;
    if let Some(row) = cell.row {
        write!(f, "{row}")?;
    }
    Ok(())
}

fn split_sheet(text: &str) -> Option<(String, &str)> {
    if let Some(rest) = text.strip_prefix('\'') {
        let mut name = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((idx, ch)) = chars.next() {
            if ch != '\'' {
                name.push(ch);
                continue;
            }
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                name.push('\'');
                continue;
            }
            let tail = &rest[idx + 1..];
            return tail.strip_prefix('!').map(|cells| (name, cells));
        }
        return None;
    }
    let (sheet, cells) = text.rsplit_once('!')?;
    Some((sheet.to_string(), cells))
}

fn parse_cell_ref(text: &str) -> Option<CellRef> {
    let split = text
        .find(|ch: char| ch.is_ascii_digit())
        .unwrap_or(text.len());
    let (letters, digits) = text.split_at(split);
    let column = column_index(letters)?;
    let row = if digits.is_empty() {
        None
    } else {
        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(row)
    };
    Some(CellRef::new(column, row))
}

/// 1-based column number to letters: 1 -> A, 14 -> N, 27 -> AA.
pub fn column_letters(mut column: u32) -> String {
    let mut out = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        out.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Letters to 1-based column number; case-insensitive.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut column: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        column = column * 26 + digit;
    }
    Some(column)
}

#[cfg(test)]
mod tests {
    use super::{CellRange, CellRef, column_index, column_letters};
    use crate::core::error::ErrorKind;

    #[test]
    fn column_letters_round_trip_edges() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(14), "N");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_index("n"), Some(14));
        assert_eq!(column_index("AA"), Some(27));
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn formats_data_ranges() {
        assert_eq!(CellRange::from_row("Sheet1", 1, 14, 2).to_string(), "Sheet1!A2:N");
        assert_eq!(CellRange::rows("Sheet1", 1, 14, 5, 5).to_string(), "Sheet1!A5:N5");
        assert_eq!(CellRange::columns("Sheet1", 1, 14).to_string(), "Sheet1!A:N");
        assert_eq!(CellRange::cell("Sheet1", 16, 1).to_string(), "Sheet1!P1");
    }

    #[test]
    fn quotes_sheet_names_with_spaces_and_apostrophes() {
        let range = CellRange::rows("Data Karyawan", 1, 14, 2, 3);
        assert_eq!(range.to_string(), "'Data Karyawan'!A2:N3");
        let tricky = CellRange::cell("Budi's", 1, 1);
        assert_eq!(tricky.to_string(), "'Budi''s'!A1");
        assert_eq!(CellRange::parse(&tricky.to_string()).expect("parse"), tricky);
    }

    #[test]
    fn parse_reads_open_and_closed_ranges() {
        let open = CellRange::parse("Sheet1!A2:N").expect("open");
        assert_eq!(open.start, CellRef::new(1, Some(2)));
        assert_eq!(open.end, Some(CellRef::new(14, None)));
        assert_eq!(open.last_row(), None);
        assert_eq!(open.width(), 14);

        let single = CellRange::parse("Sheet1!P1").expect("cell");
        assert_eq!(single.first_row(), 1);
        assert_eq!(single.last_row(), Some(1));
        assert_eq!(single.width(), 1);

        let whole = CellRange::parse("Sheet1!A:N").expect("columns");
        assert_eq!(whole.first_row(), 1);
        assert_eq!(whole.last_row(), None);
    }

    #[test]
    fn parse_rejects_malformed_ranges() {
        for text in ["Sheet1", "Sheet1!", "!A1", "Sheet1!A0", "Sheet1!N2:A2", "Sheet1!A5:N2", "Sheet1!A"] {
            let err = CellRange::parse(text).expect_err(text);
            assert_eq!(err.kind(), ErrorKind::Usage, "{text}");
        }
    }
}
