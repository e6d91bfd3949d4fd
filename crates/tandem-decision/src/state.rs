//! Per-decision snapshot of node state.
//!
//! The aggregator fronts both probes with small caches so that decision
//! throughput does not translate into probe throughput:
//!
//! - hardware readings are reused for `hardware_ttl_ms` (default 100 ms),
//!   and at most one blocking hardware probe runs at a time, even after
//!   an earlier one has timed out
//! - the network is probed at most once per `network_interval_ms`
//!   (default 5 s); concurrent decisions never wait on an in-flight probe
//!
//! A probe that fails or exceeds `probe_timeout_ms` never fails the
//! decision. Hardware falls back to the last good reading or to safe
//! defaults; the network falls back to the last good sample while it is
//! younger than `network_stale_after_ms`, otherwise the network state is
//! reported as unknown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::probe::{HardwareProbe, NetworkProbe};
use crate::types::{
    DecisionContext, DeviceType, HardwareSample, NetworkSample, SystemSnapshot, TaskRequirements,
};

/// CPU load assumed when nothing better is known
pub const DEFAULT_CPU_PERCENT: f64 = 50.0;
/// Available memory assumed when nothing better is known
pub const DEFAULT_MEM_AVAILABLE_MB: f64 = 2000.0;

#[derive(Debug, Default)]
struct HardwareCache {
    last_good: Option<HardwareSample>,
    checked_at: Option<Instant>,
    in_flight: bool,
}

/// Clears `in_flight` when the blocking probe finishes or is dropped unrun.
struct InFlightGuard(Arc<Mutex<HardwareCache>>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.lock().in_flight = false;
    }
}

#[derive(Debug, Default)]
struct NetworkCache {
    last_good: Option<(NetworkSample, Instant)>,
    last_attempt: Option<Instant>,
}

/// Builds [`DecisionContext`]s from cached probe readings.
pub struct StateAggregator {
    hardware: Arc<dyn HardwareProbe>,
    network: Option<Arc<dyn NetworkProbe>>,
    settings: ProbeConfig,
    device_type: DeviceType,
    hardware_cache: Arc<Mutex<HardwareCache>>,
    network_cache: Mutex<NetworkCache>,
}

impl StateAggregator {
    /// `network` is ignored when `settings.network_enabled` is false.
    pub fn new(
        hardware: Arc<dyn HardwareProbe>,
        network: Option<Arc<dyn NetworkProbe>>,
        settings: ProbeConfig,
        device_type: DeviceType,
    ) -> Self {
        let network = network.filter(|_| settings.network_enabled);
        Self {
            hardware,
            network,
            settings,
            device_type,
            hardware_cache: Arc::new(Mutex::new(HardwareCache::default())),
            network_cache: Mutex::new(NetworkCache::default()),
        }
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn network_enabled(&self) -> bool {
        self.network.is_some()
    }

    /// Build the context for one decision.
    pub async fn snapshot(
        &self,
        requirements: TaskRequirements,
        confidence_threshold: f64,
    ) -> DecisionContext {
        DecisionContext {
            requirements,
            system: self.capture().await,
            confidence_threshold,
        }
    }

    /// Capture the current system state.
    pub async fn capture(&self) -> SystemSnapshot {
        let (hardware, network) = tokio::join!(self.hardware_sample(), self.network_sample());
        SystemSnapshot::new(hardware, network)
    }

    /// Safe defaults for when no hardware reading has ever succeeded.
    pub fn default_hardware(&self) -> HardwareSample {
        HardwareSample {
            cpu_percent: DEFAULT_CPU_PERCENT,
            mem_available_mb: DEFAULT_MEM_AVAILABLE_MB,
            gpu_percent: None,
            device_type: self.device_type,
        }
    }

    /// Latest hardware reading, probing only when the cache has expired
    /// and no earlier probe is still running.
    pub async fn hardware_sample(&self) -> HardwareSample {
        let now = Instant::now();
        {
            let mut cache = self.hardware_cache.lock();
            let fresh = cache
                .checked_at
                .is_some_and(|at| now.duration_since(at) < self.settings.hardware_ttl());
            if fresh || cache.in_flight {
                return cache.last_good.unwrap_or_else(|| self.default_hardware());
            }
            cache.checked_at = Some(now);
            cache.in_flight = true;
        }

        match self.probe_hardware().await {
            Ok(sample) => sample,
            Err(e) => {
                let last_good = self.hardware_cache.lock().last_good;
                tracing::warn!(
                    error = %e.into_decision_error("hardware"),
                    using_last_good = last_good.is_some(),
                    "hardware probe degraded"
                );
                last_good.unwrap_or_else(|| self.default_hardware())
            }
        }
    }

    /// Runs the blocking probe. A result that arrives after the timeout
    /// still refreshes `last_good`.
    async fn probe_hardware(&self) -> Result<HardwareSample, ProbeError> {
        let probe = Arc::clone(&self.hardware);
        let guard = InFlightGuard(Arc::clone(&self.hardware_cache));
        let timeout = self.settings.probe_timeout();

        let task = tokio::task::spawn_blocking(move || {
            let result = probe.sample();
            if let Ok(sample) = &result {
                guard.0.lock().last_good = Some(*sample);
            }
            drop(guard);
            result
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(ProbeError::Unavailable(join.to_string())),
            Err(_) => Err(ProbeError::Timeout(timeout)),
        }
    }

    /// Latest usable network reading, or `None` when the state is unknown.
    pub async fn network_sample(&self) -> Option<NetworkSample> {
        let probe = self.network.as_ref()?;
        let now = Instant::now();

        let due = {
            let mut cache = self.network_cache.lock();
            let due = cache
                .last_attempt
                .is_none_or(|at| now.duration_since(at) >= self.settings.network_interval());
            if due {
                cache.last_attempt = Some(now);
            }
            due
        };

        if due {
            let timeout = self.settings.probe_timeout();
            let result =
                match tokio::time::timeout(timeout, probe.sample(&self.settings.cloud_endpoint))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProbeError::Timeout(timeout)),
                };

            match result {
                Ok(sample) => {
                    self.network_cache.lock().last_good = Some((sample, Instant::now()));
                    return Some(sample);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e.into_decision_error("network"),
                        endpoint = %self.settings.cloud_endpoint,
                        "network probe degraded"
                    );
                }
            }
        }

        self.last_good_network()
    }

    fn last_good_network(&self) -> Option<NetworkSample> {
        let stale_after: Duration = self.settings.network_stale_after();
        self.network_cache
            .lock()
            .last_good
            .filter(|(_, at)| at.elapsed() <= stale_after)
            .map(|(sample, _)| sample)
    }
}
