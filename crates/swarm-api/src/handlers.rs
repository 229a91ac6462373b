//! Front-door handlers.
//!
//! Responses are plain text: the caller gets `<stem>:<result>` on success
//! and `Error: <message>` otherwise.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, info, warn};

use swarm_bridge::BridgeError;
use swarm_core::file_stem;

use crate::ApiState;

/// Multipart field carrying the upload.
pub const FILE_FIELD: &str = "inputFile";

/// Name used when the upload part carries no file name.
const FALLBACK_NAME: &str = "upload";

/// Map a bridge failure to its HTTP response.
pub fn error_response(err: &BridgeError) -> Response {
    match err {
        BridgeError::Timeout { .. } => {
            (StatusCode::GATEWAY_TIMEOUT, "Error: Response timeout".to_string()).into_response()
        }
        other => (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {other}")).into_response(),
    }
}

/// POST /
pub async fn submit(State(state): State<ApiState>, mut multipart: Multipart) -> Response {
    let upload = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(FILE_FIELD) => {
                let name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or(FALLBACK_NAME)
                    .to_string();
                match field.bytes().await {
                    Ok(bytes) => break Some((name, bytes)),
                    Err(e) => {
                        warn!(error = %e, "failed to read upload");
                        return (StatusCode::BAD_REQUEST, format!("Error: {e}")).into_response();
                    }
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break None,
            Err(e) => {
                warn!(error = %e, "malformed multipart body");
                return (StatusCode::BAD_REQUEST, format!("Error: {e}")).into_response();
            }
        }
    };

    let Some((file_name, bytes)) = upload else {
        return (StatusCode::BAD_REQUEST, "No file part").into_response();
    };

    info!(file = %file_name, size = bytes.len(), "upload received");
    match state.bridge.submit(&file_name, &bytes).await {
        Ok(result) => format!("{}:{}", file_stem(&file_name), result.result).into_response(),
        Err(e) => {
            error!(file = %file_name, error = %e, "request failed");
            error_response(&e)
        }
    }
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}
