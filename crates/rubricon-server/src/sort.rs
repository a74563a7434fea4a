//! Sort-key parsing for the list endpoints. A leading `-` flips the
//! order, e.g. `?sort=-created_at`.

use rubricon_core::model::{AttemptStatus, ItemStatus};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<'a> {
    pub key: &'a str,
    pub descending: bool,
}

pub fn parse_sort<'a>(
    raw: Option<&'a str>,
    allowed: &[&str],
    default: &'a str,
) -> Result<Sort<'a>, ApiError> {
    let raw = raw.unwrap_or(default);
    let (key, descending) = match raw.strip_prefix('-') {
        Some(key) => (key, true),
        None => (raw, false),
    };
    if !allowed.contains(&key) {
        return Err(ApiError::validation(
            "sort",
            format!("unknown sort key '{key}'; allowed: {}", allowed.join(", ")),
        ));
    }
    Ok(Sort { key, descending })
}

pub fn item_status_rank(status: ItemStatus) -> u8 {
    match status {
        ItemStatus::Draft => 0,
        ItemStatus::Active => 1,
        ItemStatus::Retired => 2,
    }
}

pub fn attempt_status_rank(status: AttemptStatus) -> u8 {
    match status {
        AttemptStatus::InProgress => 0,
        AttemptStatus::Completed => 1,
        AttemptStatus::Submitted => 2,
    }
}
