//! Host metric sampling: CPU, memory and disk via `sysinfo`, GPU via an
//! optional `nvidia-smi` probe.

use std::path::Path;

use serde::Serialize;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct HostSample {
    pub cpu_percent: f64,
    pub cpu_count: usize,
    pub ram_total: u64,
    pub ram_used: u64,
    pub ram_percent: f64,
    pub storage_total: u64,
    pub storage_used: u64,
    pub storage_percent: f64,
}

/// Owns a persistent `sysinfo::System` so CPU usage deltas are meaningful
/// across calls.
pub struct SystemMetricsCollector {
    sys: Mutex<System>,
}

impl Default for SystemMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMetricsCollector {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }

    pub async fn sample(&self) -> HostSample {
        let mut sys = self.sys.lock().await;
        sys.refresh_cpu_all();
        // Two refreshes separated by the minimum interval, otherwise the
        // usage delta is empty.
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let cpu_percent = sys.global_cpu_usage() as f64;
        let cpu_count = sys.cpus().len();
        let ram_total = sys.total_memory();
        let ram_used = sys.used_memory();
        let ram_percent = if ram_total > 0 {
            (ram_used as f64 / ram_total as f64) * 100.0
        } else {
            0.0
        };

        let (storage_used, storage_total) = disk_usage_for_path("/").unwrap_or((0, 0));
        let storage_percent = if storage_total > 0 {
            (storage_used as f64 / storage_total as f64) * 100.0
        } else {
            0.0
        };

        HostSample {
            cpu_percent,
            cpu_count,
            ram_total,
            ram_used,
            ram_percent,
            storage_total,
            storage_used,
            storage_percent,
        }
    }
}

/// Live used/total bytes for the disk backing `path`, chosen as the mounted
/// filesystem with the longest mount-point prefix of the (canonicalized)
/// path. `None` when the path cannot be resolved to any mounted disk.
pub fn disk_usage_for_path(path: &str) -> Option<(u64, u64)> {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| Path::new(path).to_path_buf());
    let disks = Disks::new_with_refreshed_list();

    let mut best: Option<(usize, u64, u64)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if resolved.starts_with(mount) {
            let depth = mount.components().count();
            let total = disk.total_space();
            let used = total.saturating_sub(disk.available_space());
            if best.map(|(d, _, _)| depth > d).unwrap_or(true) {
                best = Some((depth, used, total));
            }
        }
    }
    best.map(|(_, used, total)| (used, total))
}

/// GPU inventory via `nvidia-smi`. Hosts without the binary (or without a
/// GPU) report `installed: false` instead of an error.
pub async fn gpu_info() -> serde_json::Value {
    let output = Command::new("nvidia-smi")
        .args([
            "--query-gpu=name,memory.total,memory.used,utilization.gpu",
            "--format=csv,noheader,nounits",
        ])
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            parse_nvidia_smi_csv(&String::from_utf8_lossy(&out.stdout))
        }
        Ok(out) => {
            debug!(status = ?out.status, "nvidia-smi exited with an error.");
            serde_json::json!({ "installed": false, "message": "No GPU detected" })
        }
        Err(e) => {
            debug!(error = %e, "nvidia-smi not available.");
            serde_json::json!({ "installed": false, "message": "No GPU detected" })
        }
    }
}

fn parse_nvidia_smi_csv(stdout: &str) -> serde_json::Value {
    let mut gpus = Vec::new();
    for line in stdout.lines() {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 4 {
            continue;
        }
        let memory_total_mib: u64 = fields[1].parse().unwrap_or(0);
        let memory_used_mib: u64 = fields[2].parse().unwrap_or(0);
        let utilization: u64 = fields[3].parse().unwrap_or(0);
        gpus.push(serde_json::json!({
            "name": fields[0],
            "memory_total": memory_total_mib * 1024 * 1024,
            "memory_used": memory_used_mib * 1024 * 1024,
            "utilization": utilization,
        }));
    }

    if gpus.is_empty() {
        serde_json::json!({ "installed": false, "message": "No GPU detected" })
    } else {
        serde_json::json!({ "installed": true, "gpus": gpus })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_gpu_line() {
        let parsed = parse_nvidia_smi_csv("NVIDIA GeForce RTX 3060, 12288, 1024, 17\n");
        assert_eq!(parsed["installed"], true);
        let gpus = parsed["gpus"].as_array().expect("gpus array");
        assert_eq!(gpus.len(), 1);
        assert_eq!(gpus[0]["name"], "NVIDIA GeForce RTX 3060");
        assert_eq!(gpus[0]["memory_total"], 12288u64 * 1024 * 1024);
        assert_eq!(gpus[0]["utilization"], 17);
    }

    #[test]
    fn empty_output_means_no_gpu() {
        let parsed = parse_nvidia_smi_csv("");
        assert_eq!(parsed["installed"], false);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let parsed = parse_nvidia_smi_csv("garbage\nGPU0, 8192, 512, 3\n");
        let gpus = parsed["gpus"].as_array().expect("gpus array");
        assert_eq!(gpus.len(), 1);
    }

    #[test]
    fn root_disk_usage_is_statable() {
        // "/" is always mounted on the platforms we run on.
        let (used, total) = disk_usage_for_path("/").expect("root disk");
        assert!(total > 0);
        assert!(used <= total);
    }

    #[tokio::test]
    async fn host_sample_reports_sane_ranges() {
        let collector = SystemMetricsCollector::new();
        let sample = collector.sample().await;
        assert!(sample.cpu_count > 0);
        assert!(sample.ram_total > 0);
        assert!((0.0..=100.0).contains(&sample.ram_percent));
    }
}
