use clap::{Parser, ValueEnum};
use memconsumer_core::units::parse_bytes;
use memconsumer_core::{AppConfig, ServerConfig};
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// One JSON object per line
    Json,
}

/// HTTP service that consumes memory on demand
///
/// Every option can also be set through the environment variable shown.
#[derive(Debug, Parser)]
#[command(name = "memconsumer", version, long_about = None)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "MEMCONSUMER_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Runtime worker threads (default: logical cores)
    #[arg(long, env = "MEMCONSUMER_WORKERS", value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Prefix for the memory routes
    #[arg(long, env = "MEMCONSUMER_BASE_PATH", default_value = "/hello")]
    pub base_path: String,

    /// Host identity included in log lines
    #[arg(long, env = "HOSTNAME", default_value = "unknown")]
    pub hostname: String,

    /// Memory limit, e.g. 512Mi or 2G (default: detected from cgroup or host)
    #[arg(long, env = "MEMCONSUMER_MAX_MEMORY", value_parser = parse_max_memory)]
    pub max_memory: Option<u64>,

    /// Share of the memory limit the threshold route consumes, in (0, 1]
    #[arg(long, env = "MEMCONSUMER_CONSUME_RATIO", default_value_t = 0.8, value_parser = parse_ratio)]
    pub consume_ratio: f64,

    /// How long to wait for open connections on shutdown, in milliseconds
    #[arg(long, env = "MEMCONSUMER_SHUTDOWN_TIMEOUT_MS", default_value_t = 5000)]
    pub shutdown_timeout_ms: u64,

    /// Log output format
    #[arg(long, env = "MEMCONSUMER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            base_path: self.base_path.clone(),
            hostname: self.hostname.clone(),
            consume_ratio: self.consume_ratio,
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.bind.clone(),
            port: self.port,
            workers: self.workers.unwrap_or_else(num_cpus::get),
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
        }
    }
}

fn parse_max_memory(s: &str) -> Result<u64, String> {
    match parse_bytes(s) {
        Some(0) => Err("must be greater than zero".to_string()),
        Some(bytes) => Ok(bytes),
        None => Err(format!("{:?} is not a byte quantity (e.g. 536870912, 512Mi, 2G)", s)),
    }
}

fn parse_ratio(s: &str) -> Result<f64, String> {
    let ratio: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if ratio > 0.0 && ratio <= 1.0 {
        Ok(ratio)
    } else {
        Err(format!("{} is not in (0, 1]", ratio))
    }
}

fn parse_workers(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
