//! HTTP Request types

use crate::{Error, Result};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Instant;

/// HTTP Methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Connect,
    Trace,
}

impl Method {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "CONNECT" => Ok(Method::Connect),
            "TRACE" => Ok(Method::Trace),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP Request
///
/// Bodies are never read; every route is a bodyless `GET`.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Request headers (stack-allocated for small header counts)
    pub headers: SmallVec<[(String, String); 16]>,
    /// Route parameters (populated by router)
    pub params: HashMap<String, String>,
    /// When the request was received
    pub received_at: Instant,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: SmallVec::new(),
            params: HashMap::new(),
            received_at: Instant::now(),
        }
    }

    /// Convert a hyper request head into our Request type
    pub fn from_hyper<B>(req: &hyper::Request<B>) -> Result<Self> {
        let method = req.method().as_str().parse()?;
        let mut request = Request::new(method, req.uri().path());

        for (name, value) in req.headers() {
            if let Ok(v) = value.to_str() {
                request.headers.push((name.to_string(), v.to_string()));
            }
        }

        Ok(request)
    }

    /// Get a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a route parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    /// Parse a route parameter
    ///
    /// A missing or unparseable parameter is a client error.
    pub fn param_as<T>(&self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.param(name).ok_or_else(|| Error::InvalidParam {
            name: name.to_string(),
            reason: "missing".to_string(),
        })?;

        raw.parse::<T>().map_err(|e| Error::InvalidParam {
            name: name.to_string(),
            reason: format!("{:?} {}", raw, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("head".parse::<Method>().unwrap(), Method::Head);
        assert!("BREW".parse::<Method>().is_err());
    }

    #[test]
    fn test_request_header() {
        let mut req = Request::new(Method::Get, "/");
        req.headers.push(("X-Request-ID".to_string(), "abc".to_string()));

        assert_eq!(req.header("x-request-id"), Some("abc"));
        assert_eq!(req.header("X-REQUEST-ID"), Some("abc"));
        assert_eq!(req.header("content-type"), None);
    }

    #[test]
    fn test_param_as() {
        let mut req = Request::new(Method::Get, "/hello/consume/2048");
        req.params.insert("bytes".to_string(), "2048".to_string());

        assert_eq!(req.param_as::<u64>("bytes").unwrap(), 2048);
        assert!(matches!(
            req.param_as::<u64>("missing"),
            Err(Error::InvalidParam { .. })
        ));
    }

    #[test]
    fn test_param_as_rejects_negative() {
        let mut req = Request::new(Method::Get, "/hello/consume/-1");
        req.params.insert("bytes".to_string(), "-1".to_string());

        let err = req.param_as::<u64>("bytes").unwrap_err();
        assert!(err.to_string().starts_with("Invalid path parameter `bytes`: \"-1\""));
    }

    #[test]
    fn test_from_hyper() {
        let hyper_req = hyper::Request::builder()
            .method("GET")
            .uri("/hello/sysresources?verbose=1")
            .header("x-request-id", "r-1")
            .body(())
            .unwrap();

        let req = Request::from_hyper(&hyper_req).unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "/hello/sysresources");
        assert_eq!(req.header("X-Request-Id"), Some("r-1"));
    }
}
