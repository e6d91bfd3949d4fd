//! Hardware probing for the edge node.
//!
//! CPU load and available memory come from `sysinfo`. GPU utilization is
//! read from `nvidia-smi` rather than linking NVML, which keeps the crate
//! free of GPU libraries at compile time.

use std::path::Path;
use std::process::Command;

use parking_lot::Mutex;
use sysinfo::System;

use crate::error::ProbeError;
use crate::types::{DeviceType, HardwareSample};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of hardware readings.
///
/// Implementations may block (process spawns, `/proc` reads); the
/// [`StateAggregator`](crate::state::StateAggregator) calls them on the
/// blocking pool under a timeout.
pub trait HardwareProbe: Send + Sync {
    fn sample(&self) -> Result<HardwareSample, ProbeError>;
}

impl DeviceType {
    /// Detect whether the node should run in GPU mode.
    ///
    /// Checks the `/dev/nvidia0` device node first, then asks `nvidia-smi`
    /// to list devices.
    pub fn detect() -> Self {
        if Path::new("/dev/nvidia0").exists() || nvidia_gpu_listed() {
            DeviceType::Gpu
        } else {
            DeviceType::Cpu
        }
    }
}

fn nvidia_gpu_listed() -> bool {
    Command::new("nvidia-smi")
        .args(["--query-gpu=name", "--format=csv,noheader"])
        .output()
        .map(|output| output.status.success() && !output.stdout.is_empty())
        .unwrap_or(false)
}

/// Probe backed by `sysinfo` (and `nvidia-smi` in GPU mode).
///
/// Keeps one `System` across calls: CPU usage is computed from the delta
/// between two refreshes, so the first sample after construction may read
/// low.
pub struct SysinfoHardwareProbe {
    device_type: DeviceType,
    system: Mutex<System>,
}

impl SysinfoHardwareProbe {
    pub fn new(device_type: DeviceType) -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();

        tracing::info!(device_type = %device_type, "hardware probe initialized");
        Self {
            device_type,
            system: Mutex::new(system),
        }
    }

    /// Probe for the auto-detected device type.
    pub fn detect() -> Self {
        Self::new(DeviceType::detect())
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }
}

impl HardwareProbe for SysinfoHardwareProbe {
    fn sample(&self) -> Result<HardwareSample, ProbeError> {
        let (cpu_percent, available_bytes) = {
            let mut system = self.system.lock();
            system.refresh_cpu_usage();
            system.refresh_memory();

            // sysinfo reports 0 available memory where it cannot determine it
            let available = match system.available_memory() {
                0 => system.total_memory().saturating_sub(system.used_memory()),
                bytes => bytes,
            };
            (f64::from(system.global_cpu_usage()), available)
        };

        if !cpu_percent.is_finite() {
            return Err(ProbeError::Parse(format!("cpu usage {cpu_percent}")));
        }

        let gpu_percent = match self.device_type {
            DeviceType::Gpu => Some(query_gpu_utilization()?),
            DeviceType::Cpu => None,
        };

        Ok(HardwareSample {
            cpu_percent,
            mem_available_mb: available_bytes as f64 / BYTES_PER_MB,
            gpu_percent,
            device_type: self.device_type,
        })
    }
}

fn query_gpu_utilization() -> Result<f64, ProbeError> {
    let output = Command::new("nvidia-smi")
        .args(["--query-gpu=utilization.gpu", "--format=csv,noheader,nounits"])
        .output()
        .map_err(|e| ProbeError::Command {
            command: "nvidia-smi",
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ProbeError::Command {
            command: "nvidia-smi",
            reason: format!("exited with {}", output.status),
        });
    }

    parse_gpu_utilization(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `nvidia-smi` CSV output. Uses the first device.
pub(crate) fn parse_gpu_utilization(stdout: &str) -> Result<f64, ProbeError> {
    let first = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| ProbeError::Parse("nvidia-smi returned no devices".into()))?;

    let value: f64 = first
        .parse()
        .map_err(|_| ProbeError::Parse(format!("unexpected utilization '{first}'")))?;

    if !(0.0..=100.0).contains(&value) {
        return Err(ProbeError::Parse(format!("utilization {value} out of range")));
    }
    Ok(value)
}
