//! Greeting and system resource report

use crate::AppState;

/// Body of the status route
pub const GREETING: &str = "Hello World";

/// Status route: always the same greeting, no side effects
pub fn hello() -> &'static str {
    GREETING
}

/// Report the memory limit in whole MiB and the logical core count
pub fn system_resources(state: &AppState) -> String {
    let probe = state.probe();
    let memory_mb = probe.max_memory() / 1024 / 1024;
    let cores = probe.available_cores();

    tracing::info!(hostname = %state.hostname(), "/sysresources");

    format!(" Memory: {} Cores: {}\n", memory_mb, cores)
}
