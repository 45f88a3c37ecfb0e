use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Failures a dispatch reports back to its caller.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    InvalidPhone(String),

    #[error("{0}")]
    Unavailable(String),

    /// The caller asked for a channel this bridge does not know. This is an
    /// integration bug on the caller's side, not a user-facing failure.
    #[error("channel not implemented: {0}")]
    NotImplemented(String),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::InvalidPhone(_) => "INVALID_PHONE",
            DispatchError::Unavailable(_) => "UNAVAILABLE",
            DispatchError::NotImplemented(_) => "NOT_IMPLEMENTED",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            DispatchError::InvalidPhone(_) => StatusCode::BAD_REQUEST,
            DispatchError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

/// Failures raised by a transport collaborator. The router recovers from
/// these or maps them onto a [`DispatchError`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{program} could not be started: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: std::process::ExitStatus },

    #[error("no handler for {0}")]
    NoHandler(String),

    /// A multipart send stopped after `sent` of `total` parts went out.
    #[error("sent {sent} of {total} parts: {source}")]
    PartialSend {
        sent: usize,
        total: usize,
        #[source]
        source: Box<TransportError>,
    },

    #[error("{0}")]
    Other(String),
}

/// A request body that is present but does not describe a dispatch.
#[derive(Debug, thiserror::Error)]
#[error("invalid request body: {0}")]
pub struct InvalidBody(pub String);

pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = self.0.downcast_ref::<DispatchError>() {
            let body = Json(json!({
                "success": false,
                "error_kind": err.kind(),
                "error_message": err.to_string(),
            }));
            return (err.status(), body).into_response();
        }

        if let Some(err) = self.0.downcast_ref::<InvalidBody>() {
            let body = Json(json!({
                "success": false,
                "error_kind": "INVALID_BODY",
                "error_message": err.to_string(),
            }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error_kind": "INTERNAL",
                "error_message": self.0.to_string(),
            })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
