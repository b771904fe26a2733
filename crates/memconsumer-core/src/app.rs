//! The request-handling component
//!
//! [`App`] owns the route table, the middleware chain and the shared
//! [`AppState`]. Routes under the base path:
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `{base}` | greeting |
//! | GET | `{base}/sysresources` | memory limit and cores |
//! | GET | `{base}/consume/{bytes}` | retain one buffer |
//! | GET | `{base}/consume` | grow until the threshold |
//!
//! plus `/health/live` and `/health/ready`.

use crate::handlers;
use crate::memory::{Ballast, MemoryProbe};
use crate::middleware::{MiddlewareChain, RequestLog};
use crate::{Error, Request, Response, Result};
use memconsumer_router::Router;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Prefix all memory routes are mounted under
    pub base_path: String,
    /// Identity reported in log lines, captured once at startup
    pub hostname: String,
    /// Share of the memory limit the threshold route consumes, in (0, 1]
    pub consume_ratio: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_path: "/hello".to_string(),
            hostname: "unknown".to_string(),
            consume_ratio: 0.8,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.base_path.starts_with('/') {
            return Err(Error::Config(format!(
                "base path must start with '/': {:?}",
                self.base_path
            )));
        }
        if !(self.consume_ratio > 0.0 && self.consume_ratio <= 1.0) {
            return Err(Error::Config(format!(
                "consume ratio must be in (0, 1]: {}",
                self.consume_ratio
            )));
        }
        Ok(())
    }

    /// Join `suffix` onto the base path
    pub fn route_path(&self, suffix: &str) -> String {
        let path = format!("{}{}", self.base_path.trim_end_matches('/'), suffix);
        if path.is_empty() {
            "/".to_string()
        } else {
            path
        }
    }
}

/// State shared by all requests
pub struct AppState {
    hostname: String,
    consume_ratio: f64,
    probe: Arc<dyn MemoryProbe>,
    ballast: Ballast,
    ready: AtomicBool,
}

impl AppState {
    pub fn new(config: &AppConfig, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            hostname: config.hostname.clone(),
            consume_ratio: config.consume_ratio,
            probe,
            ballast: Ballast::new(),
            ready: AtomicBool::new(true),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn consume_ratio(&self) -> f64 {
        self.consume_ratio
    }

    pub fn probe(&self) -> &Arc<dyn MemoryProbe> {
        &self.probe
    }

    pub fn ballast(&self) -> &Ballast {
        &self.ballast
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

/// Routed endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Hello,
    SystemResources,
    ConsumeBytes,
    ConsumeToThreshold,
    Liveness,
    Readiness,
}

/// Request-handling component
pub struct App {
    state: Arc<AppState>,
    router: Router<Route>,
    middleware: MiddlewareChain,
}

impl App {
    pub fn new(config: AppConfig, probe: Arc<dyn MemoryProbe>) -> Result<Self> {
        config.validate()?;

        let mut router = Router::new();
        router.insert("GET", &config.route_path(""), Route::Hello)?;
        router.insert("GET", &config.route_path("/sysresources"), Route::SystemResources)?;
        router.insert("GET", &config.route_path("/consume/{bytes}"), Route::ConsumeBytes)?;
        router.insert("GET", &config.route_path("/consume"), Route::ConsumeToThreshold)?;
        router.insert("GET", "/health/live", Route::Liveness)?;
        router.insert("GET", "/health/ready", Route::Readiness)?;

        let mut middleware = MiddlewareChain::new();
        middleware.add(RequestLog::new());

        Ok(Self {
            state: Arc::new(AppState::new(&config, probe)),
            router,
            middleware,
        })
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Route, run middleware and handle one request
    pub async fn handle(&self, mut req: Request) -> Response {
        if let Some(res) = self.middleware.run_before(&mut req) {
            return res;
        }

        let mut res = match self.router.find(req.method.as_str(), &req.path) {
            Some(matched) => {
                let route = *matched.value;
                req.params = matched.params_map();
                self.dispatch(route, &req).await.unwrap_or_else(|e| {
                    tracing::debug!(path = %req.path, error = %e, "handler error");
                    e.into_response()
                })
            }
            None => {
                let allowed = self.router.allowed_methods(&req.path);
                if allowed.is_empty() {
                    Response::not_found()
                } else {
                    Response::method_not_allowed(&allowed)
                }
            }
        };

        self.middleware.run_after(&req, &mut res);
        res
    }

    async fn dispatch(&self, route: Route, req: &Request) -> Result<Response> {
        match route {
            Route::Hello => Ok(Response::text(handlers::hello())),
            Route::SystemResources => Ok(Response::text(handlers::system_resources(&self.state))),
            Route::ConsumeBytes => {
                let bytes: u64 = req.param_as("bytes")?;
                let state = Arc::clone(&self.state);
                run_blocking(move || handlers::consume_bytes(&state, bytes))
                    .await
                    .map(Response::text)
            }
            Route::ConsumeToThreshold => {
                let state = Arc::clone(&self.state);
                run_blocking(move || handlers::consume_to_threshold(&state))
                    .await
                    .map(Response::text)
            }
            Route::Liveness => Ok(handlers::liveness()),
            Route::Readiness => Ok(handlers::readiness(&self.state)),
        }
    }
}

/// Run a handler on the blocking pool. The task is detached from the
/// request: dropping the future does not stop it.
async fn run_blocking<F>(f: F) -> Result<String>
where
    F: FnOnce() -> Result<String> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("handler task failed: {}", e)))?
}
