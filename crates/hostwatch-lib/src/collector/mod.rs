//! Host usage collection
//!
//! This module provides the collector that samples CPU, memory and disk
//! usage of the local host and the loop that drives it at a fixed cadence.

mod r#loop;
mod procfs;

#[cfg(test)]
mod tests;

pub use procfs::{disk_usage_percent, CpuTimes, ProcfsCollector};
pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder};

use crate::models::Sample;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

pub use async_trait::async_trait;

/// Trait for host usage collection implementations
#[async_trait]
pub trait HostCollector: Send + Sync {
    /// Take one joint usage sample
    async fn collect(&self) -> Result<Sample>;

    /// Short identifier for logs
    fn name(&self) -> &'static str;
}

/// Create the procfs collector after checking the files it reads exist
pub async fn create_collector(
    proc_path: &Path,
    disk_mount: &Path,
) -> Result<Arc<dyn HostCollector>> {
    let collector = ProcfsCollector::with_proc_path(proc_path, disk_mount);

    if !collector.is_available().await {
        anyhow::bail!(
            "procfs not available at {}, cannot sample host usage",
            proc_path.display()
        );
    }

    tracing::info!(
        proc_path = %proc_path.display(),
        disk_mount = %disk_mount.display(),
        "Using procfs host collector"
    );
    Ok(Arc::new(collector))
}
