//! memconsumer-core: memory consuming HTTP service
//!
//! A small service for exercising container memory limits. Its routes
//! report the memory limit and core count, allocate and retain buffers on
//! demand, and grow memory until a share of the limit is in use.
//!
//! ## Layout
//! - [`app`] - routes, shared state and request dispatch
//! - [`handlers`] - route handlers
//! - [`memory`] - memory probe and ballast
//! - [`server`] - hyper/tokio server loop and graceful shutdown

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod app;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod units;

// Re-exports
pub use app::{App, AppConfig, AppState, Route};
pub use error::{Error, Result};
pub use request::{Method, Request};
pub use response::{Response, StatusCode};

pub use memory::{Ballast, LimitSource, MemoryProbe, SystemProbe};
pub use middleware::{Middleware, MiddlewareChain};
pub use server::{bind, drain, serve, ConnectionTracker, ServerConfig};
