use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use log::{info, warn};
use serde::de::DeserializeOwned;

use crate::config::DispatchConfig;
use crate::error::{AppError, InvalidBody};
use crate::router::DispatchRouter;
use crate::types::{DispatchBody, DispatchResponse, HealthResponse, MethodCall};

pub struct AppState {
    pub router: DispatchRouter,
    pub config: DispatchConfig,
}

/// Decode a JSON body regardless of `content-type`. Only a body with no
/// content at all falls back to `T::default()`; anything else must parse.
fn parse_body<T>(bytes: &Bytes) -> Result<T, InvalidBody>
where
    T: DeserializeOwned + Default,
{
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| {
        warn!("Rejecting request body: {}", e);
        InvalidBody(e.to_string())
    })
}

pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let body: DispatchBody = parse_body(&body)?;
    info!("Dispatch request on channel {}", channel);

    let sent = state
        .router
        .dispatch_named(&channel, body.phone.as_deref(), body.message.as_deref())
        .await?;

    Ok((StatusCode::OK, Json(DispatchResponse::from(sent))))
}

pub async fn method_call(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let call: MethodCall = serde_json::from_slice(&body).map_err(|e| {
        warn!("Rejecting method call: {}", e);
        InvalidBody(e.to_string())
    })?;
    info!("Method call {}", call.method);

    let sent = state
        .router
        .dispatch_named(
            &call.method,
            call.arguments.phone.as_deref(),
            call.arguments.message.as_deref(),
        )
        .await?;

    Ok((StatusCode::OK, Json(DispatchResponse::from(sent))))
}

pub async fn health(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let sms_direct = state.router.sms_direct_available();
    let status = if sms_direct { "ok" } else { "compose_only" };
    Ok(Json(HealthResponse {
        status: status.to_string(),
        country_code: state.router.country_code().to_string(),
        sms_direct,
    }))
}
