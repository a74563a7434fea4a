//! The response envelope every JSON endpoint speaks.

use serde::Serialize;

/// `{ success, data, meta, errors }` around every JSON payload.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: None,
            errors: Vec::new(),
        }
    }

    pub fn page(data: T, meta: Meta) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(meta),
            errors: Vec::new(),
        }
    }
}

/// List metadata. Offset listings report position and total; the keyset
/// listing reports opaque cursors instead.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Meta {
    Offset {
        page: u32,
        per_page: u32,
        total: u64,
    },
    Keyset {
        next_cursor: Option<String>,
        prev_cursor: Option<String>,
    },
}

/// One entry in the envelope's `errors` array. Validation errors name
/// the offending field; other failures carry a message alone.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}
