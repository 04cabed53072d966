//! Errors surfaced by the HTTP handlers.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::validation::ChainError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body could not be decoded.
    #[error("malformed request: {0}")]
    MalformedInput(#[from] JsonRejection),

    #[error("candidate chain refused: {0}")]
    InvalidChain(#[from] ChainError),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Body returned with every error status.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidChain(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request refused");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
