//! Host usage collection from procfs
//!
//! Reads:
//! - /proc/stat for aggregate CPU time (usage is the delta between reads)
//! - /proc/meminfo for total and available memory
//! - statvfs on the monitored mount for disk usage

use super::HostCollector;
use crate::models::Sample;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

/// Aggregate CPU jiffies from the first line of /proc/stat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    /// idle + iowait
    pub idle: u64,
    /// user through steal; guest time is already included in user
    pub total: u64,
}

impl CpuTimes {
    /// Busy percentage between `prev` and `self`
    ///
    /// Returns 0.0 when no time elapsed or the counters went backwards.
    pub fn usage_since(&self, prev: &CpuTimes) -> f64 {
        let total = self.total.saturating_sub(prev.total);
        let idle = self.idle.saturating_sub(prev.idle);
        if total == 0 {
            return 0.0;
        }
        (total.saturating_sub(idle)) as f64 / total as f64 * 100.0
    }
}

/// Collector for the local host
pub struct ProcfsCollector {
    proc_path: PathBuf,
    disk_mount: PathBuf,
    prev_cpu: Mutex<Option<CpuTimes>>,
}

impl ProcfsCollector {
    /// Create a collector reading from `proc_path`
    pub fn with_proc_path(proc_path: impl Into<PathBuf>, disk_mount: impl Into<PathBuf>) -> Self {
        Self {
            proc_path: proc_path.into(),
            disk_mount: disk_mount.into(),
            prev_cpu: Mutex::new(None),
        }
    }

    /// Check if the procfs files this collector reads are present
    pub async fn is_available(&self) -> bool {
        fs::metadata(self.proc_path.join("stat")).await.is_ok()
            && fs::metadata(self.proc_path.join("meminfo")).await.is_ok()
    }

    /// Parse the aggregate `cpu` line of /proc/stat
    pub fn parse_cpu_stat(content: &str) -> Result<CpuTimes> {
        let line = content
            .lines()
            .find(|line| line.starts_with("cpu "))
            .context("No aggregate cpu line in /proc/stat")?;

        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .take(8)
            .map(|v| v.parse::<u64>())
            .collect::<std::result::Result<_, _>>()
            .context("Malformed cpu line in /proc/stat")?;

        if fields.len() < 4 {
            anyhow::bail!("cpu line in /proc/stat has {} fields, need 4", fields.len());
        }

        // user nice system idle iowait irq softirq steal
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        let total = fields.iter().sum();

        Ok(CpuTimes { idle, total })
    }

    /// Parse /proc/meminfo into a used-memory percentage
    ///
    /// Falls back to MemFree + Buffers + Cached on kernels without
    /// MemAvailable.
    pub fn parse_meminfo(content: &str) -> Result<f64> {
        let mut total = None;
        let mut available = None;
        let mut free_estimate = 0u64;

        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                continue;
            }
            let value: u64 = match parts[1].parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            match parts[0] {
                "MemTotal:" => total = Some(value),
                "MemAvailable:" => available = Some(value),
                "MemFree:" | "Buffers:" | "Cached:" => free_estimate += value,
                _ => {}
            }
        }

        let total = total.context("MemTotal missing from /proc/meminfo")?;
        if total == 0 {
            anyhow::bail!("MemTotal is zero");
        }
        let available = available.unwrap_or(free_estimate).min(total);

        Ok((total - available) as f64 / total as f64 * 100.0)
    }

    async fn read_cpu_percent(&self) -> Result<f64> {
        let stat_path = self.proc_path.join("stat");
        let content = fs::read_to_string(&stat_path)
            .await
            .with_context(|| format!("Failed to read {}", stat_path.display()))?;
        let current = Self::parse_cpu_stat(&content)?;

        let mut prev = self
            .prev_cpu
            .lock()
            .map_err(|_| anyhow::anyhow!("CPU state lock poisoned"))?;
        let percent = prev.map(|p| current.usage_since(&p)).unwrap_or(0.0);
        *prev = Some(current);

        Ok(percent)
    }

    async fn read_memory_percent(&self) -> Result<f64> {
        let meminfo_path = self.proc_path.join("meminfo");
        let content = fs::read_to_string(&meminfo_path)
            .await
            .with_context(|| format!("Failed to read {}", meminfo_path.display()))?;
        Self::parse_meminfo(&content)
    }

    async fn read_disk_percent(&self) -> Result<f64> {
        let mount = self.disk_mount.clone();
        tokio::task::spawn_blocking(move || disk_usage_percent(&mount))
            .await
            .context("Disk usage task failed")?
    }
}

#[async_trait]
impl HostCollector for ProcfsCollector {
    async fn collect(&self) -> Result<Sample> {
        let cpu = self.read_cpu_percent().await?;
        let memory = self.read_memory_percent().await?;
        let disk = self.read_disk_percent().await?;

        Ok(Sample::new(cpu, memory, disk))
    }

    fn name(&self) -> &'static str {
        "procfs"
    }
}

/// Used share of the filesystem holding `mount`, excluding reserved blocks
#[cfg(unix)]
pub fn disk_usage_percent(mount: &Path) -> Result<f64> {
    use nix::sys::statvfs::statvfs;

    let stat = statvfs(mount).with_context(|| format!("statvfs failed for {}", mount.display()))?;
    let fragment = stat.fragment_size() as u64;
    let used = (stat.blocks() as u64).saturating_sub(stat.blocks_free() as u64) * fragment;
    let available = stat.blocks_available() as u64 * fragment;

    if used + available == 0 {
        anyhow::bail!("Filesystem at {} reports no capacity", mount.display());
    }

    Ok(used as f64 / (used + available) as f64 * 100.0)
}

#[cfg(not(unix))]
pub fn disk_usage_percent(mount: &Path) -> Result<f64> {
    anyhow::bail!("Disk usage is not supported on this platform ({})", mount.display())
}
