//! Offset pagination for the catalog listings and keyset pagination
//! for the response stream.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::envelope::Meta;
use crate::error::ApiError;

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

/// Query parameters shared by the offset-paginated list endpoints.
/// Endpoints ignore the filters that do not apply to them.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
}

impl ListParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }
}

/// Slices a fully sorted vector down to one page.
pub fn paginate<T>(rows: Vec<T>, page: u32, per_page: u32) -> (Vec<T>, Meta) {
    let total = rows.len() as u64;
    let start = (page as usize - 1).saturating_mul(per_page as usize);
    let page_rows: Vec<T> = rows.into_iter().skip(start).take(per_page as usize).collect();
    (
        page_rows,
        Meta::Offset {
            page,
            per_page,
            total,
        },
    )
}

/// Keyset cursor over `(created_at, id)`. Encoded as
/// `<micros>~<simple uuid>` so it survives a query string untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl Cursor {
    /// Builds a cursor key, truncating `created_at` to microseconds so
    /// in-memory keys compare equal to keys that round-tripped through
    /// [`Cursor::encode`]. Rows must be sorted by this same key.
    pub fn new(created_at: DateTime<Utc>, id: Uuid) -> Self {
        let truncated =
            DateTime::from_timestamp_micros(created_at.timestamp_micros()).unwrap_or(created_at);
        Self {
            created_at: truncated,
            id,
        }
    }

    pub fn encode(&self) -> String {
        format!("{}~{}", self.created_at.timestamp_micros(), self.id.simple())
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let (micros, id) = raw.split_once('~')?;
        let micros: i64 = micros.parse().ok()?;
        Some(Self {
            created_at: DateTime::from_timestamp_micros(micros)?,
            id: Uuid::parse_str(id).ok()?,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Next,
    Prev,
}

#[derive(Debug, Default, Deserialize)]
pub struct KeysetParams {
    pub cursor: Option<String>,
    #[serde(default)]
    pub direction: Direction,
    pub per_page: Option<u32>,
}

impl KeysetParams {
    pub fn per_page(&self) -> usize {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE) as usize
    }
}

#[derive(Debug)]
pub struct KeysetPage<T> {
    pub rows: Vec<T>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
}

/// Pages through `rows` (already sorted ascending by the cursor key)
/// relative to the caller's cursor. `Next` returns the window after
/// the cursor, `Prev` the window ending just before it.
pub fn keyset_page<T, F>(
    rows: Vec<T>,
    params: &KeysetParams,
    key: F,
) -> Result<KeysetPage<T>, ApiError>
where
    F: Fn(&T) -> Cursor,
{
    let per_page = params.per_page();
    let cursor = match &params.cursor {
        Some(raw) => Some(
            Cursor::decode(raw)
                .ok_or_else(|| ApiError::validation("cursor", "malformed cursor"))?,
        ),
        None => None,
    };
    let len = rows.len();
    let (start, end) = match (cursor, params.direction) {
        (None, _) => (0, per_page.min(len)),
        (Some(c), Direction::Next) => {
            let after = rows.partition_point(|row| key(row) <= c);
            (after, (after + per_page).min(len))
        }
        (Some(c), Direction::Prev) => {
            let before = rows.partition_point(|row| key(row) < c);
            (before.saturating_sub(per_page), before)
        }
    };
    let has_prev = start > 0;
    let has_next = end < len;
    let page: Vec<T> = rows
        .into_iter()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect();
    let prev_cursor = has_prev
        .then(|| page.first().map(|row| key(row).encode()))
        .flatten();
    let next_cursor = has_next
        .then(|| page.last().map(|row| key(row).encode()))
        .flatten();
    Ok(KeysetPage {
        rows: page,
        next_cursor,
        prev_cursor,
    })
}
