//! Purpose: Record id formats and allocation strategies.
//! Exports: `IdStrategy`, `MAX_SEQUENCE`, `format_sequential_id`, `sequence_number`, `random_id`,
//!   `next_sequence`, `block_end`.
//! Role: Pure helpers; the store decides when and under which lock they run.
//! Invariants: Sequential ids are `PREFIX` + at least four zero-padded digits.
//! Invariants: `next_sequence` never returns a number used by a live id.
//! Invariants: Sequence numbers never exceed `MAX_SEQUENCE`; overflow is an error, never a wrap.
use getrandom::fill as fill_random;

use super::error::{Error, ErrorKind};

const SEQUENCE_WIDTH: usize = 4;
const RANDOM_ID_BYTES: usize = 6;

/// How `add` and `seed` assign ids.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum IdStrategy {
    /// `PREFIX + pad(len(list()) + 1)`.
    ///
    /// Two concurrent adds can read the same length and mint the same id, and an
    /// add after a delete can reissue the id of a surviving record.
    ListingCount,
    /// Monotonic counter persisted in a side-channel cell next to the header.
    #[default]
    Counter,
    /// `PREFIX-` followed by 12 random lowercase hex characters.
    Random,
}

impl IdStrategy {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "count" | "listing-count" => Some(IdStrategy::ListingCount),
            "counter" => Some(IdStrategy::Counter),
            "random" => Some(IdStrategy::Random),
            _ => None,
        }
    }
}

pub fn format_sequential_id(prefix: &str, number: u64) -> String {
    format!("{prefix}{number:0width$}", width = SEQUENCE_WIDTH)
}

/// Numeric suffix of a sequential id carrying `prefix`, if any.
pub fn sequence_number(prefix: &str, id: &str) -> Option<u64> {
    let digits = id.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Highest sequence number; the counter cell stores it as a signed 64-bit number.
pub const MAX_SEQUENCE: u64 = i64::MAX as u64;

/// Next counter value given the persisted counter and the ids currently live.
///
/// Fails with `Schema` when the highest number in use is already `MAX_SEQUENCE`.
pub fn next_sequence<'a>(
    prefix: &str,
    stored: Option<u64>,
    live_ids: impl IntoIterator<Item = &'a str>,
) -> Result<u64, Error> {
    let live_max = live_ids
        .into_iter()
        .filter_map(|id| sequence_number(prefix, id).map(|number| (number, id)))
        .max_by_key(|(number, _)| *number);
    let live_number = live_max.map_or(0, |(number, _)| number);
    let current = stored.unwrap_or(0).max(live_number);
    match current.checked_add(1) {
        Some(next) if next <= MAX_SEQUENCE => Ok(next),
        _ => {
            let holder = match live_max {
                Some((number, id)) if number == current => id.to_string(),
                _ => format_sequential_id(prefix, current),
            };
            Err(sequence_exhausted(&holder))
        }
    }
}

/// Last number of a block of `count` numbers starting at `first`.
pub fn block_end(prefix: &str, first: u64, count: u64) -> Result<u64, Error> {
    match first.checked_add(count.saturating_sub(1)) {
        Some(last) if last <= MAX_SEQUENCE => Ok(last),
        _ => Err(sequence_exhausted(&format_sequential_id(prefix, first))
            .with_message(format!(
                "reserving {count} ids from `{}` runs past the id sequence",
                format_sequential_id(prefix, first)
            ))),
    }
}

fn sequence_exhausted(id: &str) -> Error {
    Error::new(ErrorKind::Schema)
        .with_message(format!("id `{id}` exhausts the id sequence"))
        .with_record_id(id)
        .with_hint(format!(
            "Sequential ids stop at {MAX_SEQUENCE}; renumber the record or use --id-strategy random."
        ))
}

pub fn random_id(prefix: &str) -> Result<String, Error> {
    let mut bytes = [0u8; RANDOM_ID_BYTES];
    fill_random(&mut bytes).map_err(|err| {
        Error::new(ErrorKind::Internal).with_message(format!("failed to generate random id: {err}"))
    })?;
    let mut out = String::with_capacity(prefix.len() + 1 + RANDOM_ID_BYTES * 2);
    out.push_str(prefix);
    out.push('-');
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    Ok(out)
}
