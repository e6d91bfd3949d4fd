//! Decision facade.
//!
//! The only entry point a serving process needs:
//!
//! ```text
//! decide(requirements)
//!   -> StateAggregator::snapshot
//!   -> HardConstraintGate::check ── fired ──> plan (Forced)
//!   -> MultiObjectiveScorer::score
//!   -> ExecutionPlanBuilder::build            plan (Scored)
//!
//! record_outcome(outcome)
//!   -> HistoryLedger::record
//!   -> AdaptiveTuner::maybe_update
//! ```
//!
//! The ledger and the threshold are the only shared mutable state. Both
//! sit behind one narrow mutex that is held for an append, a threshold
//! update, or while copying the per-strategy statistics a decision scores
//! against. It is never held across probing or scoring.
//!
//! `decide` never fails: any internal error degrades to an edge-only
//! fallback plan.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::DecisionConfig;
use crate::error::{DecisionError, DecisionResult};
use crate::gate::HardConstraintGate;
use crate::ledger::{HistoryLedger, LedgerSummary};
use crate::planner::ExecutionPlanBuilder;
use crate::probe::{HardwareProbe, HttpNetworkProbe, NetworkProbe, SysinfoHardwareProbe};
use crate::scorer::{MultiObjectiveScorer, StatsView};
use crate::state::StateAggregator;
use crate::tuner::{AdaptiveTuner, ThresholdState};
use crate::types::{
    DecisionContext, DeviceType, ExecutionOutcome, ExecutionPlan, PlanSource, SystemSnapshot,
    TaskRequirements,
};

/// Score reported on plans forced by a hard constraint.
pub const FORCED_SCORE: f64 = 1.0;

struct SharedState {
    ledger: HistoryLedger,
    threshold: ThresholdState,
}

#[derive(Debug, Default)]
struct DecisionCounters {
    scored: AtomicU64,
    forced: AtomicU64,
    fallback: AtomicU64,
}

impl DecisionCounters {
    fn snapshot(&self) -> DecisionCounts {
        DecisionCounts {
            scored: self.scored.load(Ordering::Relaxed),
            forced: self.forced.load(Ordering::Relaxed),
            fallback: self.fallback.load(Ordering::Relaxed),
        }
    }
}

/// Decisions made so far, by how the strategy was chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCounts {
    pub scored: u64,
    pub forced: u64,
    pub fallback: u64,
}

impl DecisionCounts {
    pub fn total(&self) -> u64 {
        self.scored + self.forced + self.fallback
    }
}

/// Read-only aggregate returned by [`DecisionFacade::statistics_summary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub history: LedgerSummary,
    pub decisions: DecisionCounts,
    pub confidence_threshold: f64,
    pub threshold_updates: u64,
}

/// Live parameters returned by [`DecisionFacade::current_config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub config: DecisionConfig,
    pub device_type: DeviceType,
    pub network_enabled: bool,
    /// Tuned threshold, as opposed to `config.adaptive.initial_threshold`
    pub confidence_threshold: f64,
    pub outcomes_recorded: u64,
    pub threshold_updates: u64,
}

/// Builder for [`DecisionFacade`].
pub struct DecisionFacadeBuilder {
    config: DecisionConfig,
    hardware: Option<Arc<dyn HardwareProbe>>,
    network: Option<Arc<dyn NetworkProbe>>,
    device_type: Option<DeviceType>,
}

impl DecisionFacadeBuilder {
    /// Use a custom hardware probe instead of `sysinfo`.
    pub fn hardware_probe(mut self, probe: Arc<dyn HardwareProbe>) -> Self {
        self.hardware = Some(probe);
        self
    }

    /// Probe the edge-to-cloud link. Without one the network state is
    /// always unknown.
    pub fn network_probe(mut self, probe: Arc<dyn NetworkProbe>) -> Self {
        self.network = Some(probe);
        self
    }

    /// Override the device type from configuration and detection.
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = Some(device_type);
        self
    }

    /// Validate the configuration and assemble the facade.
    pub fn build(self) -> DecisionResult<DecisionFacade> {
        self.config.validate()?;

        let device_type = self
            .device_type
            .or(self.config.probes.device_type)
            .unwrap_or_else(DeviceType::detect);
        let hardware = self
            .hardware
            .unwrap_or_else(|| Arc::new(SysinfoHardwareProbe::new(device_type)));

        let aggregator = StateAggregator::new(
            hardware,
            self.network,
            self.config.probes.clone(),
            device_type,
        );
        let tuner = AdaptiveTuner::new(self.config.adaptive.clone(), self.config.history.min_samples);
        let shared = SharedState {
            ledger: HistoryLedger::from_config(&self.config.history),
            threshold: tuner.initial_state(),
        };

        tracing::info!(
            device_type = %device_type,
            network_enabled = aggregator.network_enabled(),
            confidence_threshold = shared.threshold.confidence_threshold,
            window_size = self.config.history.window_size,
            "decision facade initialized"
        );

        Ok(DecisionFacade {
            aggregator,
            gate: HardConstraintGate::new(self.config.hard_constraints.clone()),
            scorer: MultiObjectiveScorer::from_config(&self.config),
            planner: ExecutionPlanBuilder::new(&self.config),
            tuner,
            shared: Mutex::new(shared),
            counters: DecisionCounters::default(),
            config: self.config,
        })
    }
}

/// Routes requests to an execution strategy and learns from outcomes.
pub struct DecisionFacade {
    config: DecisionConfig,
    aggregator: StateAggregator,
    gate: HardConstraintGate,
    scorer: MultiObjectiveScorer,
    tuner: AdaptiveTuner,
    planner: ExecutionPlanBuilder,
    shared: Mutex<SharedState>,
    counters: DecisionCounters,
}

impl DecisionFacade {
    pub fn builder(config: DecisionConfig) -> DecisionFacadeBuilder {
        DecisionFacadeBuilder {
            config,
            hardware: None,
            network: None,
            device_type: None,
        }
    }

    /// Facade wired to `sysinfo` and an HTTP probe of
    /// `probes.cloud_endpoint`.
    pub fn with_system_probes(config: DecisionConfig) -> DecisionResult<Self> {
        let mut builder = Self::builder(config);
        if builder.config.probes.network_enabled {
            let probe = HttpNetworkProbe::new(builder.config.probes.probe_timeout())
                .map_err(|e| e.into_decision_error("network"))?;
            builder = builder.network_probe(Arc::new(probe));
        }
        builder.build()
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.shared.lock().threshold.confidence_threshold
    }

    /// Choose a strategy and its parameters for one request.
    pub async fn decide(&self, requirements: TaskRequirements) -> ExecutionPlan {
        let system = self.aggregator.capture().await;
        self.decide_with_snapshot(requirements, system)
    }

    /// Like [`decide`](Self::decide), against a caller-supplied snapshot.
    pub fn decide_with_snapshot(
        &self,
        requirements: TaskRequirements,
        system: SystemSnapshot,
    ) -> ExecutionPlan {
        let (confidence_threshold, stats) = {
            let shared = self.shared.lock();
            (
                shared.threshold.confidence_threshold,
                StatsView::from_ledger(&shared.ledger, self.config.history.min_samples),
            )
        };

        let ctx = DecisionContext {
            requirements,
            system,
            confidence_threshold,
        };
        tracing::debug!(
            max_latency_ms = ctx.requirements.max_latency_ms,
            min_quality = ctx.requirements.min_quality_score,
            priority = ctx.requirements.priority,
            privacy_level = ctx.requirements.privacy_level,
            cpu_percent = ctx.system.cpu_percent,
            gpu_percent = ?ctx.system.gpu_percent,
            mem_available_mb = ctx.system.mem_available_mb,
            network_rtt_ms = ?ctx.system.network_rtt_ms,
            confidence_threshold,
            "deciding"
        );

        match self.plan(&ctx, &stats) {
            Ok(plan) => plan,
            Err(e) => {
                self.counters.fallback.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "decision failed, using fallback plan");
                self.planner
                    .fallback(confidence_threshold, format!("fallback: {e}"))
            }
        }
    }

    fn plan(&self, ctx: &DecisionContext, stats: &StatsView) -> DecisionResult<ExecutionPlan> {
        if let Some(forced) = self.gate.check(ctx) {
            self.counters.forced.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                strategy = %forced.strategy,
                rule = %forced.rule,
                reason = %forced.reason,
                "decision forced by hard constraint"
            );
            return Ok(self.planner.build(
                forced.strategy,
                ctx,
                FORCED_SCORE,
                forced.reason,
                PlanSource::Forced { rule: forced.rule },
            ));
        }

        let ranking = self.scorer.score(ctx, stats)?;
        let best = ranking
            .first()
            .copied()
            .ok_or_else(|| DecisionError::ScoringFailed("empty ranking".to_string()))?;

        tracing::debug!(
            ranking = ?ranking
                .iter()
                .map(|s| (s.strategy.as_str(), s.total_score))
                .collect::<Vec<_>>(),
            "strategies scored"
        );

        self.counters.scored.fetch_add(1, Ordering::Relaxed);
        let reason = format!(
            "highest weighted score {:.3} (latency {:.2}, cost {:.2}, quality {:.2})",
            best.total_score, best.subscores.latency, best.subscores.cost, best.subscores.quality
        );
        Ok(self.planner.build(
            best.strategy,
            ctx,
            best.total_score,
            reason,
            PlanSource::Scored,
        ))
    }

    /// Feed back the result of executing a plan.
    pub fn record_outcome(&self, outcome: ExecutionOutcome) {
        let update = {
            let mut guard = self.shared.lock();
            let shared = &mut *guard;
            shared.ledger.record(outcome);
            self.tuner.maybe_update(&shared.ledger, &mut shared.threshold)
        };

        if let Some(update) = update {
            tracing::info!(
                previous = update.previous,
                current = update.current,
                acceptance_rate = update.acceptance_rate,
                "confidence threshold updated"
            );
        }
    }

    pub fn statistics_summary(&self) -> StatisticsSummary {
        let shared = self.shared.lock();
        StatisticsSummary {
            history: shared.ledger.summary(),
            decisions: self.counters.snapshot(),
            confidence_threshold: shared.threshold.confidence_threshold,
            threshold_updates: shared.threshold.updates_applied,
        }
    }

    pub fn current_config(&self) -> EffectiveConfig {
        let (confidence_threshold, outcomes_recorded, threshold_updates) = {
            let shared = self.shared.lock();
            (
                shared.threshold.confidence_threshold,
                shared.ledger.total_recorded(),
                shared.threshold.updates_applied,
            )
        };

        EffectiveConfig {
            config: self.config.clone(),
            device_type: self.aggregator.device_type(),
            network_enabled: self.aggregator.network_enabled(),
            confidence_threshold,
            outcomes_recorded,
            threshold_updates,
        }
    }
}
