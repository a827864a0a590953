//! Error types for the serving layer.
//!
//! Serving errors are isolated per request: a client-caused rejection is a
//! 400, an internal transform/model failure is a 500, and neither takes the
//! service out of the Ready state.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed or incomplete request; the message names the offending
    /// field.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Transform or model failure on a well-formed request.
    #[error("Inference error: {0}")]
    Inference(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Inference(msg) => {
                tracing::error!(detail = %msg, "Inference failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Prediction failed. Check server logs for details.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_keeps_field_name() {
        let err = ServerError::InvalidRequest("missing required field 'text'".to_string());
        assert!(err.to_string().contains("'text'"));
    }
}
