//! Request ID and access logging middleware

use super::Middleware;
use crate::{Request, Response};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default header carrying the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tags every request with an ID and logs one line per response
///
/// An ID supplied by the client is kept; otherwise a counter-based one is
/// generated. The ID is echoed back on the response.
pub struct RequestLog {
    next_id: AtomicU64,
}

impl Default for RequestLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLog {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    fn generate_id(&self) -> String {
        format!("{:016x}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Middleware for RequestLog {
    fn before(&self, req: &mut Request) -> Option<Response> {
        if req.header(REQUEST_ID_HEADER).is_none() {
            let id = self.generate_id();
            req.headers.push((REQUEST_ID_HEADER.to_string(), id));
        }
        None
    }

    fn after(&self, req: &Request, res: &mut Response) {
        let id = req.header(REQUEST_ID_HEADER).unwrap_or("-").to_string();
        let elapsed_ms = req.received_at.elapsed().as_secs_f64() * 1000.0;
        let status = res.status.as_u16();

        if status >= 500 {
            tracing::warn!(request_id = %id, method = %req.method, path = %req.path, status, elapsed_ms, "request failed");
        } else {
            tracing::info!(request_id = %id, method = %req.method, path = %req.path, status, elapsed_ms, "request");
        }

        res.headers.push((REQUEST_ID_HEADER.to_string(), id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    #[test]
    fn test_generates_sequential_ids() {
        let log = RequestLog::new();
        let mut first = Request::new(Method::Get, "/hello");
        let mut second = Request::new(Method::Get, "/hello");

        assert!(log.before(&mut first).is_none());
        log.before(&mut second);

        assert_eq!(first.header("x-request-id"), Some("0000000000000001"));
        assert_eq!(second.header("x-request-id"), Some("0000000000000002"));
    }

    #[test]
    fn test_keeps_client_id_and_echoes_it() {
        let log = RequestLog::new();
        let mut req = Request::new(Method::Get, "/hello");
        req.headers.push(("X-Request-ID".to_string(), "from-client".to_string()));
        let mut res = Response::text("Hello World");

        log.before(&mut req);
        log.after(&req, &mut res);

        assert_eq!(req.headers.len(), 1);
        assert_eq!(res.header("x-request-id"), Some("from-client"));
    }
}
