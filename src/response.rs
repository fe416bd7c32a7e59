use serde::Serialize;
use utoipa::ToSchema;

/// Envelope metadata. Collections report how many records they carry.
#[derive(Debug, Serialize, ToSchema, Clone, Default)]
pub struct Meta {
    pub total: Option<i64>,
}

impl Meta {
    pub fn total(count: usize) -> Self {
        Self {
            total: Some(i64::try_from(count).unwrap_or(i64::MAX)),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Body of every JSON response, including errors.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }

    /// Error envelope: `data` carries the details, `meta` stays empty.
    pub fn failure(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta: Some(Meta::empty()),
        }
    }
}
