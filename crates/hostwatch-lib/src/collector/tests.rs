//! Integration tests for host collection
//!
//! These tests use a mock procfs tree so collection runs without
//! depending on the machine the tests execute on.

#[cfg(test)]
mod mock_procfs_tests {
    use crate::collector::{create_collector, HostCollector, ProcfsCollector};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use tokio::fs;

    const MEMINFO: &str = "MemTotal:        8000000 kB
MemFree:         1000000 kB
MemAvailable:    2000000 kB
Buffers:          200000 kB
Cached:           800000 kB
";

    async fn write_stat(proc_root: &Path, busy: u64, idle: u64) {
        let stat = format!(
            "cpu  {} 0 0 {} 0 0 0 0 0 0\ncpu0 {} 0 0 {} 0 0 0 0 0 0\n",
            busy, idle, busy, idle
        );
        fs::write(proc_root.join("stat"), stat).await.unwrap();
    }

    /// Helper to create a mock procfs tree
    async fn create_mock_procfs(temp_dir: &TempDir) -> PathBuf {
        let proc_root = temp_dir.path().join("proc");
        fs::create_dir_all(&proc_root).await.unwrap();

        write_stat(&proc_root, 1000, 3000).await;
        fs::write(proc_root.join("meminfo"), MEMINFO).await.unwrap();

        proc_root
    }

    #[tokio::test]
    async fn test_first_read_reports_zero_cpu() {
        let temp_dir = TempDir::new().unwrap();
        let proc_root = create_mock_procfs(&temp_dir).await;
        let collector = ProcfsCollector::with_proc_path(&proc_root, temp_dir.path());

        let sample = collector.collect().await.unwrap();

        assert_eq!(sample.cpu_percent, 0.0);
        assert!((sample.memory_percent - 75.0).abs() < 1e-9);
        assert!(sample.is_valid());
    }

    #[tokio::test]
    async fn test_cpu_delta_between_reads() {
        let temp_dir = TempDir::new().unwrap();
        let proc_root = create_mock_procfs(&temp_dir).await;
        let collector = ProcfsCollector::with_proc_path(&proc_root, temp_dir.path());

        collector.collect().await.unwrap();

        // 100 busy and 300 idle jiffies since the first read
        write_stat(&proc_root, 1100, 3300).await;
        let sample = collector.collect().await.unwrap();

        assert!((sample.cpu_percent - 25.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_procfs_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let collector =
            ProcfsCollector::with_proc_path(temp_dir.path().join("missing"), temp_dir.path());

        assert!(!collector.is_available().await);
        assert!(collector.collect().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_disk_mount_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let proc_root = create_mock_procfs(&temp_dir).await;
        let collector =
            ProcfsCollector::with_proc_path(&proc_root, temp_dir.path().join("no-such-mount"));

        assert!(collector.collect().await.is_err());
    }

    #[tokio::test]
    async fn test_create_collector() {
        let temp_dir = TempDir::new().unwrap();
        let proc_root = create_mock_procfs(&temp_dir).await;

        let collector = create_collector(&proc_root, temp_dir.path()).await.unwrap();
        assert_eq!(collector.name(), "procfs");

        let missing = create_collector(&temp_dir.path().join("missing"), temp_dir.path()).await;
        assert!(missing.is_err());
    }
}
