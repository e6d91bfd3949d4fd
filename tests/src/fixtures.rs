//! Facade and outcome fixtures.

use std::sync::{Arc, Once};

use tandem_decision::{
    DecisionConfig, DecisionFacade, DeviceType, ExecutionOutcome, HardwareProbe, NetworkProbe,
    Strategy,
};

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// CPU-mode facade over the given probes.
pub fn facade_with(
    config: DecisionConfig,
    hardware: Arc<dyn HardwareProbe>,
    network: Option<Arc<dyn NetworkProbe>>,
) -> anyhow::Result<DecisionFacade> {
    init_tracing();
    let mut builder = DecisionFacade::builder(config)
        .hardware_probe(hardware)
        .device_type(DeviceType::Cpu);
    if let Some(network) = network {
        builder = builder.network_probe(network);
    }
    Ok(builder.build()?)
}

/// A run of identical outcomes.
#[derive(Debug, Clone)]
pub struct OutcomeBatch {
    pub strategy: Strategy,
    pub acceptance_rate: f64,
    pub latency_ms: f64,
    pub success: bool,
    pub count: usize,
}

impl OutcomeBatch {
    /// `count` successful speculative outcomes at `acceptance_rate`.
    pub fn speculative(acceptance_rate: f64, count: usize) -> Self {
        Self {
            strategy: Strategy::SpeculativeStandard,
            acceptance_rate,
            latency_ms: 90.0,
            success: true,
            count,
        }
    }

    pub fn of(strategy: Strategy, acceptance_rate: f64, latency_ms: f64, count: usize) -> Self {
        Self {
            strategy,
            acceptance_rate,
            latency_ms,
            success: true,
            count,
        }
    }

    pub fn outcomes(&self) -> impl Iterator<Item = ExecutionOutcome> + '_ {
        (0..self.count).map(|i| {
            ExecutionOutcome::new(self.strategy, self.acceptance_rate, self.latency_ms, self.success)
                .with_split_latency(self.latency_ms * 0.4, self.latency_ms * 0.6)
                .with_confidence(self.acceptance_rate)
                .with_tokens(32 + i as u32)
        })
    }

    pub fn record_into(&self, facade: &DecisionFacade) {
        for outcome in self.outcomes() {
            facade.record_outcome(outcome);
        }
    }
}
