//! Scripted probe implementations.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tandem_decision::{HardwareProbe, HardwareSample, NetworkProbe, NetworkSample, ProbeError};

/// Hardware probe returning whatever sample was last set.
#[derive(Debug)]
pub struct MockHardwareProbe {
    sample: Mutex<HardwareSample>,
    calls: AtomicUsize,
}

impl MockHardwareProbe {
    pub fn new(sample: HardwareSample) -> Arc<Self> {
        Arc::new(Self {
            sample: Mutex::new(sample),
            calls: AtomicUsize::new(0),
        })
    }

    /// CPU node at the given load with plenty of memory.
    pub fn cpu(cpu_percent: f64) -> Arc<Self> {
        Self::new(HardwareSample::cpu(cpu_percent, 4000.0))
    }

    pub fn set(&self, sample: HardwareSample) {
        *self.sample.lock() = sample;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HardwareProbe for MockHardwareProbe {
    fn sample(&self) -> Result<HardwareSample, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.sample.lock())
    }
}

/// Hardware probe that always fails.
#[derive(Debug, Default)]
pub struct FailingHardwareProbe;

impl HardwareProbe for FailingHardwareProbe {
    fn sample(&self) -> Result<HardwareSample, ProbeError> {
        Err(ProbeError::Unavailable("scripted hardware failure".to_string()))
    }
}

/// Network probe returning a settable sample, or failing when unset.
#[derive(Debug)]
pub struct MockNetworkProbe {
    sample: Mutex<Option<NetworkSample>>,
    calls: AtomicUsize,
}

impl MockNetworkProbe {
    pub fn new(rtt_ms: f64, packet_loss_ratio: f64) -> Arc<Self> {
        Arc::new(Self {
            sample: Mutex::new(Some(NetworkSample {
                rtt_ms,
                packet_loss_ratio,
            })),
            calls: AtomicUsize::new(0),
        })
    }

    /// Probe whose every call fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sample: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, sample: Option<NetworkSample>) {
        *self.sample.lock() = sample;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkProbe for MockNetworkProbe {
    async fn sample(&self, endpoint: &str) -> Result<NetworkSample, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let sample = *self.sample.lock();
        sample.ok_or_else(|| ProbeError::Unavailable(format!("{endpoint} unreachable")))
    }
}
