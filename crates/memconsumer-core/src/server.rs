//! HTTP server
//!
//! hyper HTTP/1.1 on a multi-threaded tokio runtime with:
//! - SO_REUSEADDR / SO_REUSEPORT listener
//! - TCP_NODELAY for low latency
//! - One task per connection, counted for graceful shutdown

use crate::{App, Error, Request, Result};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub workers: usize,
    /// How long to wait for open connections on shutdown
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            workers: num_cpus::get(),
            shutdown_timeout: Duration::from_millis(5000),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address {:?}: {}", self.bind, e)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Create a TCP socket with optimizations
pub fn create_optimized_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;
    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;

    Ok(socket)
}

/// Bind a tokio listener. Must be called from within a runtime.
pub fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let socket = create_optimized_socket(&addr)?;
    socket.set_nonblocking(true)?;
    Ok(TcpListener::from_std(socket.into())?)
}

/// Tracks open connections for graceful shutdown
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: AtomicU64,
    shutting_down: AtomicBool,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn decrement(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn start_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    fn guard(self: &Arc<Self>) -> ConnectionGuard {
        self.increment();
        ConnectionGuard(Arc::clone(self))
    }
}

/// Decrements the count when the connection task ends, panics included
struct ConnectionGuard(Arc<ConnectionTracker>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Accept connections until `shutdown` resolves
///
/// On shutdown the listener is dropped, readiness flips to not-ready and
/// open connections are asked to close after their in-flight request.
/// Use [`drain`] afterwards to wait for them.
pub async fn serve<F>(
    listener: TcpListener,
    app: Arc<App>,
    tracker: Arc<ConnectionTracker>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let (closing_tx, closing_rx) = watch::channel(false);
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            },
            _ = &mut shutdown => break,
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "set_nodelay failed");
        }

        let guard = tracker.guard();
        tokio::spawn(serve_connection(stream, peer, Arc::clone(&app), closing_rx.clone(), guard));
    }

    tracker.start_shutdown();
    app.state().set_ready(false);
    let _ = closing_tx.send(true);
    tracing::info!(active = tracker.count(), "stopped accepting connections");

    Ok(())
}

/// Serve one HTTP/1.1 connection until the peer closes it or `closing` turns
/// true, in which case the in-flight request finishes first
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Arc<App>,
    mut closing: watch::Receiver<bool>,
    _guard: ConnectionGuard,
) {
    let service = service_fn(move |req: hyper::Request<Incoming>| {
        let app = Arc::clone(&app);
        async move {
            let res = match Request::from_hyper(&req) {
                Ok(request) => app.handle(request).await,
                Err(e) => e.into_response(),
            };
            Ok::<_, Infallible>(res.into_hyper())
        }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    // The watch guard must not live across the await below.
    let closed = async {
        let _ = closing.wait_for(|closing| *closing).await;
    };

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = closed => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = result {
        if !e.is_incomplete_message() {
            tracing::debug!(%peer, error = %e, "connection error");
        }
    }
}

/// Wait for open connections to close
///
/// Returns `true` if all connections drained before `timeout`.
pub async fn drain(tracker: &ConnectionTracker, timeout: Duration) -> bool {
    let start = Instant::now();
    loop {
        if tracker.count() == 0 {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            bind: "127.0.0.1".to_string(),
            port: 9000,
            ..ServerConfig::default()
        };
        assert_eq!(config.socket_addr().unwrap(), "127.0.0.1:9000".parse().unwrap());

        let v6 = ServerConfig {
            bind: "::1".to_string(),
            port: 9000,
            ..ServerConfig::default()
        };
        assert_eq!(v6.socket_addr().unwrap(), "[::1]:9000".parse().unwrap());

        let bad = ServerConfig {
            bind: "localhost:80".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(bad.socket_addr(), Err(Error::Config(_))));
    }

    #[test]
    fn test_connection_tracker() {
        let tracker = Arc::new(ConnectionTracker::new());
        assert_eq!(tracker.count(), 0);

        let a = tracker.guard();
        let b = tracker.guard();
        assert_eq!(tracker.count(), 2);
        drop(a);
        assert_eq!(tracker.count(), 1);
        drop(b);
        assert_eq!(tracker.count(), 0);

        assert!(!tracker.is_shutting_down());
        tracker.start_shutdown();
        assert!(tracker.is_shutting_down());
    }

    #[tokio::test]
    async fn test_drain() {
        let tracker = Arc::new(ConnectionTracker::new());
        assert!(drain(&tracker, Duration::from_millis(10)).await);

        let guard = tracker.guard();
        assert!(!drain(&tracker, Duration::from_millis(30)).await);

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(guard);
        });
        assert!(drain(&tracker, Duration::from_secs(5)).await);
        release.await.unwrap();
    }

    async fn read_until(client: &mut TcpStream, needle: &str) -> String {
        use tokio::io::AsyncReadExt;

        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        while !String::from_utf8_lossy(&raw).contains(needle) {
            let n = client.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed early");
            raw.extend_from_slice(&buf[..n]);
        }
        String::from_utf8(raw).unwrap()
    }

    #[tokio::test]
    async fn test_keep_alive_connection_closes_when_signalled() {
        use crate::memory::testing::ScriptedProbe;
        use crate::AppConfig;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();

        let probe = Arc::new(ScriptedProbe::fixed(1 << 30, 0));
        let app = Arc::new(App::new(AppConfig::default(), probe).unwrap());
        let tracker = Arc::new(ConnectionTracker::new());
        let (closing_tx, closing_rx) = watch::channel(false);

        // Spawning requires the connection future to be Send.
        let task = tokio::spawn(serve_connection(stream, peer, app, closing_rx, tracker.guard()));

        client
            .write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let reply = read_until(&mut client, "Hello World").await;
        assert!(reply.starts_with("HTTP/1.1 200"));
        assert_eq!(tracker.count(), 1);

        closing_tx.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(tracker.count(), 0);

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = bind("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
