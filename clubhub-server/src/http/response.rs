//! Response envelope
//!
//! Every body is `{code, msg, status, data}`: `code` is 0 on success and the
//! HTTP status otherwise, `data` is null on failure.

use axum::Json;
use serde::Serialize;

use super::error::ApiError;

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub msg: String,
    pub status: bool,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            status: true,
            data,
        }
    }
}

impl Envelope<()> {
    /// Failure body; `()` serializes as `null`.
    pub fn failure(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            status: false,
            data: (),
        }
    }
}

/// Handler result carrying an enveloped payload
pub type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

/// Wrap `data` in a success envelope.
pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope::ok(data)))
}
