//! API response envelope
//!
//! All endpoints answer with the same structure:
//! - code: 0 = success, non-zero = stable error code (see `ErrorKind`)
//! - msg: short message description
//! - data: payload (success only)

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Success with no payload.
    pub fn ok() -> ApiResponse<()> {
        ApiResponse {
            code: 0,
            msg: "ok".to_string(),
            data: None,
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}
