//! HTTP API
//!
//! Every endpoint answers with an [`ApiResponse`] envelope. Failed requests
//! also carry the structured [`MasterError`] so a forwarding node can hand it
//! back to its caller unchanged.

mod http;

pub use http::{status_code, HttpApi};

use serde::{Deserialize, Serialize};

use crate::error::{MasterError, MasterResult};

/// Response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<MasterError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            cause: None,
        }
    }

    pub fn err(error: MasterError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            cause: Some(error),
        }
    }

    /// Unwrap the envelope, restoring the remote error when present
    pub fn into_result(self) -> MasterResult<T> {
        match self {
            ApiResponse {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            ApiResponse {
                cause: Some(cause), ..
            } => Err(cause),
            ApiResponse { error, .. } => Err(MasterError::Transport(
                error.unwrap_or_else(|| "response carries no data".to_string()),
            )),
        }
    }
}
