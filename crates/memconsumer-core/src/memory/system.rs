//! Platform memory probe
//!
//! The limit comes from, in order: explicit configuration, the cgroup v2
//! `memory.max`, the cgroup v1 `memory.limit_in_bytes`, and finally host
//! physical memory. A cgroup limit above host memory means "unlimited" and
//! falls through to the host figure. Used memory is the process resident set
//! size.

use super::MemoryProbe;
use crate::{Error, Result};
use std::fmt;

const CGROUP_V2_MAX: &str = "/sys/fs/cgroup/memory.max";
const CGROUP_V1_LIMIT: &str = "/sys/fs/cgroup/memory/memory.limit_in_bytes";
const PROC_MEMINFO: &str = "/proc/meminfo";

/// Where the memory limit was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSource {
    Configured,
    CgroupV2,
    CgroupV1,
    Host,
}

impl LimitSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitSource::Configured => "configured",
            LimitSource::CgroupV2 => "cgroup-v2",
            LimitSource::CgroupV1 => "cgroup-v1",
            LimitSource::Host => "host",
        }
    }
}

impl fmt::Display for LimitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory probe backed by cgroup files, `/proc/meminfo` and `memory-stats`
#[derive(Debug, Clone)]
pub struct SystemProbe {
    limit: u64,
    source: LimitSource,
}

impl SystemProbe {
    /// Detect the memory limit, preferring `configured` when given
    pub fn detect(configured: Option<u64>) -> Result<Self> {
        if let Some(limit) = configured {
            return Self::with_limit(limit);
        }

        let host = read(PROC_MEMINFO).and_then(|s| parse_meminfo_total(&s));
        let cgroup = read(CGROUP_V2_MAX)
            .and_then(|s| parse_cgroup_v2(&s))
            .map(|limit| (limit, LimitSource::CgroupV2))
            .or_else(|| {
                read(CGROUP_V1_LIMIT)
                    .and_then(|s| parse_cgroup_v1(&s))
                    .map(|limit| (limit, LimitSource::CgroupV1))
            });

        let (limit, source) = resolve_limit(cgroup, host)?;
        Ok(Self { limit, source })
    }

    /// Use a fixed limit
    pub fn with_limit(limit: u64) -> Result<Self> {
        if limit == 0 {
            return Err(Error::Config("max memory must be greater than zero".to_string()));
        }
        Ok(Self {
            limit,
            source: LimitSource::Configured,
        })
    }

    pub fn source(&self) -> LimitSource {
        self.source
    }
}

impl MemoryProbe for SystemProbe {
    fn max_memory(&self) -> u64 {
        self.limit
    }

    fn used_memory(&self) -> Result<u64> {
        memory_stats::memory_stats()
            .map(|stats| stats.physical_mem as u64)
            .ok_or_else(|| {
                Error::MemoryUnavailable("process memory statistics unavailable".to_string())
            })
    }

    fn available_cores(&self) -> usize {
        num_cpus::get()
    }
}

fn read(path: &str) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Some(contents),
        Err(e) => {
            tracing::trace!(path, error = %e, "memory source not readable");
            None
        }
    }
}

fn resolve_limit(
    cgroup: Option<(u64, LimitSource)>,
    host: Option<u64>,
) -> Result<(u64, LimitSource)> {
    match (cgroup, host) {
        (Some((limit, source)), Some(host)) if limit < host => Ok((limit, source)),
        (Some(found), None) => Ok(found),
        (_, Some(host)) => Ok((host, LimitSource::Host)),
        (None, None) => Err(Error::MemoryUnavailable(
            "no memory limit detected; configure one explicitly".to_string(),
        )),
    }
}

/// cgroup v2 `memory.max`: a byte count, or `max` for unlimited
fn parse_cgroup_v2(contents: &str) -> Option<u64> {
    match contents.trim() {
        "max" => None,
        value => value.parse().ok(),
    }
}

/// cgroup v1 `memory.limit_in_bytes`: always a byte count, huge when unlimited
fn parse_cgroup_v1(contents: &str) -> Option<u64> {
    contents.trim().parse().ok()
}

/// `MemTotal:` line of `/proc/meminfo`, reported in kB
fn parse_meminfo_total(contents: &str) -> Option<u64> {
    contents.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        if parts.next()? != "MemTotal:" {
            return None;
        }
        let kb: u64 = parts.next()?.parse().ok()?;
        kb.checked_mul(1024)
    })
}
