//! CPU/memory extraction from a raw engine stats sample.

use bollard::models::ContainerStatsResponse;

/// Standard delta formula: (cpu_delta / system_delta) * online_cpus * 100.
pub(crate) fn cpu_percent(sample: &ContainerStatsResponse) -> f64 {
    let cpu = match &sample.cpu_stats {
        Some(c) => c,
        None => return 0.0,
    };
    let precpu = match &sample.precpu_stats {
        Some(c) => c,
        None => return 0.0,
    };

    let total = cpu
        .cpu_usage
        .as_ref()
        .and_then(|u| u.total_usage)
        .unwrap_or(0);
    let pre_total = precpu
        .cpu_usage
        .as_ref()
        .and_then(|u| u.total_usage)
        .unwrap_or(0);
    let system = cpu.system_cpu_usage.unwrap_or(0);
    let pre_system = precpu.system_cpu_usage.unwrap_or(0);
    let online_cpus = cpu.online_cpus.unwrap_or(1).max(1) as f64;

    let cpu_delta = total.saturating_sub(pre_total) as f64;
    let system_delta = system.saturating_sub(pre_system) as f64;
    if system_delta > 0.0 {
        (cpu_delta / system_delta) * online_cpus * 100.0
    } else {
        0.0
    }
}

pub(crate) fn memory_usage(sample: &ContainerStatsResponse) -> (u64, u64) {
    let memory = match &sample.memory_stats {
        Some(m) => m,
        None => return (0, 0),
    };
    (memory.usage.unwrap_or(0), memory.limit.unwrap_or(0))
}
