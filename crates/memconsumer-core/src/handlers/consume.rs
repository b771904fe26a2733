//! Memory consuming handlers
//!
//! Both handlers block the calling thread and are meant to run on the
//! blocking pool. Out-of-memory is not handled: the allocator aborts the
//! process, which is the outcome these routes exist to provoke.

use crate::units::human_bytes;
use crate::{AppState, Error, Result};
use std::time::Instant;

/// Allocate one buffer of `bytes` bytes, retain it forever, and report free
/// memory before and after
pub fn consume_bytes(state: &AppState, bytes: u64) -> Result<String> {
    let size = usize::try_from(bytes)
        .ok()
        .filter(|&size| size <= isize::MAX as usize)
        .ok_or_else(|| Error::InvalidParam {
            name: "bytes".to_string(),
            reason: format!("{} exceeds the addressable size", bytes),
        })?;

    let probe = state.probe();
    let free_before = probe.free_memory()?;
    let buffers = state.ballast().allocate(size);
    let free_after = probe.free_memory()?;

    tracing::debug!(
        bytes,
        buffers,
        retained = state.ballast().retained_bytes(),
        "retained allocation"
    );

    Ok(format!(
        "Allocated {} ({} free before, {} free after)\n",
        human_bytes(bytes, false),
        human_bytes(free_before, false),
        human_bytes(free_after, false)
    ))
}

/// Grow a buffer until used memory reaches the configured share of the limit
///
/// Each round appends a timestamp followed by the whole buffer to itself, so
/// the buffer roughly doubles per round. There is no yield point, no
/// cancellation and no timeout; a client hanging up does not stop the loop.
/// The grown buffer is handed to the ballast so the memory stays resident.
pub fn consume_to_threshold(state: &AppState) -> Result<String> {
    tracing::info!(hostname = %state.hostname(), "/consume");

    let probe = state.probe();
    let max = probe.max_memory();
    let ratio = state.consume_ratio();
    let clock = Instant::now();

    let mut grown = String::new();
    let mut rounds: u64 = 0;
    let mut used = probe.used_memory()?;
    while !threshold_reached(used, max, ratio) {
        let chunk = format!("{}{}", clock.elapsed().as_nanos(), grown);
        grown.push_str(&chunk);
        rounds += 1;
        used = probe.used_memory()?;
    }

    if !grown.is_empty() {
        state.ballast().retain(grown.into_bytes().into_boxed_slice());
    }

    let msg = format!(
        "Allocated about {:.0}% ({}) of the max allowed memory size ({})",
        ratio * 100.0,
        human_bytes(used, false),
        human_bytes(max, false)
    );
    tracing::info!(rounds, "{}", msg);
    Ok(msg + "\n")
}

/// Whether `used` has reached `ratio` of `max`. A zero limit is always reached.
pub fn threshold_reached(used: u64, max: u64, ratio: f64) -> bool {
    max == 0 || used as f64 / max as f64 >= ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::testing::ScriptedProbe;
    use crate::memory::MemoryProbe;
    use crate::AppConfig;
    use std::sync::Arc;

    fn state_with(probe: ScriptedProbe) -> (AppState, Arc<ScriptedProbe>) {
        let probe = Arc::new(probe);
        let state = AppState::new(&AppConfig::default(), probe.clone());
        (state, probe)
    }

    #[test]
    fn test_consume_bytes_appends_one_buffer() {
        let (state, _) = state_with(ScriptedProbe::fixed(1 << 20, 0));

        let body = consume_bytes(&state, 1024).unwrap();
        assert_eq!(
            body,
            "Allocated 1.0 KiB (1.0 MiB free before, 1.0 MiB free after)\n"
        );
        assert_eq!(state.ballast().len(), 1);
        assert_eq!(state.ballast().last_len(), Some(1024));
    }

    #[test]
    fn test_consume_bytes_accumulates() {
        let (state, _) = state_with(ScriptedProbe::fixed(1 << 30, 0));

        for n in 1..=5u64 {
            consume_bytes(&state, n * 100).unwrap();
            assert_eq!(state.ballast().len(), n as usize);
        }
        assert_eq!(state.ballast().retained_bytes(), 1500);
    }

    #[test]
    fn test_consume_zero_bytes_still_appends() {
        let (state, _) = state_with(ScriptedProbe::fixed(1 << 30, 0));

        let body = consume_bytes(&state, 0).unwrap();
        assert!(body.starts_with("Allocated 0 B ("));
        assert_eq!(state.ballast().len(), 1);
        assert_eq!(state.ballast().last_len(), Some(0));
    }

    #[test]
    fn test_consume_bytes_rejects_unaddressable_size() {
        let (state, _) = state_with(ScriptedProbe::fixed(1 << 30, 0));

        let err = consume_bytes(&state, 1 << 63).unwrap_err();
        assert!(matches!(err, Error::InvalidParam { .. }));
        assert!(state.ballast().is_empty());
    }

    #[test]
    fn test_threshold_loop_stops_at_ratio() {
        let (state, probe) = state_with(ScriptedProbe::stepping(1000, 0, 100));

        let body = consume_to_threshold(&state).unwrap();
        assert_eq!(
            body,
            "Allocated about 80% (800 B) of the max allowed memory size (1000 B)\n"
        );

        let used = probe.last_used();
        assert!(used as f64 >= 0.8 * probe.max_memory() as f64);
        assert_eq!(state.ballast().len(), 1);
        assert!(state.ballast().retained_bytes() > 0);
    }

    #[test]
    fn test_threshold_already_reached() {
        let (state, _) = state_with(ScriptedProbe::fixed(1000, 900));

        let body = consume_to_threshold(&state).unwrap();
        assert_eq!(
            body,
            "Allocated about 80% (900 B) of the max allowed memory size (1000 B)\n"
        );
        assert!(state.ballast().is_empty());
    }

    #[test]
    fn test_threshold_uses_configured_ratio() {
        let probe = Arc::new(ScriptedProbe::stepping(1000, 0, 250));
        let config = AppConfig {
            consume_ratio: 0.5,
            ..AppConfig::default()
        };
        let state = AppState::new(&config, probe.clone());

        let body = consume_to_threshold(&state).unwrap();
        assert_eq!(
            body,
            "Allocated about 50% (500 B) of the max allowed memory size (1000 B)\n"
        );
    }

    #[test]
    fn test_threshold_reached() {
        assert!(threshold_reached(800, 1000, 0.8));
        assert!(threshold_reached(999, 1000, 0.8));
        assert!(!threshold_reached(799, 1000, 0.8));
        assert!(threshold_reached(0, 0, 0.8));
    }
}
