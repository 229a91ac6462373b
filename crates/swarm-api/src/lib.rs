//! swarm-api — the HTTP front door.
//!
//! Callers upload a file and hold the connection open until the fabric has
//! produced a result for it; the [`Bridge`] turns that into a job on the
//! work queue and waits for the matching result.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/` | Multipart upload (`inputFile`); responds `<stem>:<result>` |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use swarm_bridge::Bridge;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Shared state for handlers.
#[derive(Clone)]
pub struct ApiState {
    pub bridge: Bridge,
}

/// Build the front-door router.
pub fn build_router(bridge: Bridge) -> Router {
    let state = ApiState { bridge };

    Router::new()
        .route("/", post(handlers::submit))
        .route("/healthz", get(handlers::healthz))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
