use axum::response::IntoResponse;
use axum::{Json, http::StatusCode};
use serde::Serialize;
use tracing::error;

/// Errors that can be translated directly into an HTTP response.
///
/// Configuration-fatal errors (missing/invalid config, unreachable database
/// at startup) never reach this type; they abort the process before the
/// server starts, per the error taxonomy in the coordinator's design notes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The placement store rejected or failed a query (§7 "Data-layer").
    #[error("placement store error")]
    Store(#[from] sqlx::Error),

    /// A broker RPC failed or timed out (§7 "Transient upstream").
    #[error("broker RPC failed: {0}")]
    Broker(#[from] crate::broker::BrokerError),

    /// First-time key assignment failed (§4.3); may be a broker RPC
    /// failure or a placement-store failure underneath.
    #[error("key assignment failed: {0}")]
    Assign(#[from] crate::placement::AssignError),

    /// An invariant the placement table is supposed to uphold was violated
    /// (§7 "Invariant violations").
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// The client's request body failed validation (§7 "Client malformed
    /// request").
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Broker(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Assign(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Invariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = Json(ErrorBody {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}
