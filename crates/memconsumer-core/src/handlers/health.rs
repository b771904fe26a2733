//! Health probes for orchestrators
//!
//! Liveness only says the process answers. Readiness turns false once
//! graceful shutdown starts so load balancers stop routing here.

use crate::{AppState, Response, StatusCode};

/// Liveness probe - is the server alive?
pub fn liveness() -> Response {
    Response::text("OK\n")
}

/// Readiness probe - should the server receive traffic?
pub fn readiness(state: &AppState) -> Response {
    if state.is_ready() {
        Response::text("READY\n")
    } else {
        Response::error(StatusCode::SERVICE_UNAVAILABLE, "SHUTTING DOWN")
    }
}
