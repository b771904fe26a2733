//! Request handlers
//!
//! Handlers return plain values; the app turns them into text responses.

pub mod consume;
pub mod greeting;
pub mod health;

pub use consume::{consume_bytes, consume_to_threshold, threshold_reached};
pub use greeting::{hello, system_resources, GREETING};
pub use health::{liveness, readiness};
