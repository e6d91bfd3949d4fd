//! Turns a chosen strategy into concrete runtime parameters.
//!
//! Planning is a pure function of the strategy, the decision context and
//! configuration. It starts from the device tier's base parameters, then:
//!
//! - narrows the draft length for strict SLOs (proportional to
//!   `slo / strict_slo_cutoff_ms`, floored at a third of the tier default)
//! - extends the timeout by `timeout_extension` when the active compute
//!   unit is above the tier's load threshold
//! - derives the confidence threshold from the tuned one

use crate::config::{DecisionConfig, HardwareTiers, TierConfig};
use crate::types::{DecisionContext, DeviceType, ExecutionPlan, PlanSource, Strategy};

/// Minimum threshold for standard speculation on demanding tasks.
const DEMANDING_SPECULATIVE_THRESHOLD: f64 = 0.85;
/// Per-request adjustments to the adaptive-confidence threshold.
const ADAPTIVE_DEMANDING_RAISE: f64 = 0.10;
const ADAPTIVE_LENIENT_QUALITY: f64 = 0.7;
const ADAPTIVE_LENIENT_DROP: f64 = 0.10;
const ADAPTIVE_URGENT_PRIORITY: u8 = 3;
const ADAPTIVE_URGENT_DROP: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct ExecutionPlanBuilder {
    tiers: HardwareTiers,
    high_quality_cutoff: f64,
    threshold_min: f64,
    threshold_max: f64,
}

impl ExecutionPlanBuilder {
    pub fn new(config: &DecisionConfig) -> Self {
        Self {
            tiers: config.hardware_tiers.clone(),
            high_quality_cutoff: config.quality.high_quality_cutoff,
            threshold_min: config.adaptive.threshold_min,
            threshold_max: config.adaptive.threshold_max,
        }
    }

    /// Build the plan for `strategy` under `ctx`.
    pub fn build(
        &self,
        strategy: Strategy,
        ctx: &DecisionContext,
        score: f64,
        reason: impl Into<String>,
        source: PlanSource,
    ) -> ExecutionPlan {
        let tier = self.tiers.tier(ctx.system.device_type);

        let (draft_max_tokens, max_tokens) = match strategy {
            Strategy::EdgeOnly => (tier.edge_only_max_tokens, tier.edge_only_max_tokens),
            Strategy::CloudDirect => (0, tier.cloud_max_tokens),
            Strategy::SpeculativeStandard | Strategy::AdaptiveConfidence => (
                self.draft_tokens(tier, ctx.requirements.max_latency_ms),
                tier.edge_only_max_tokens,
            ),
        };

        let timeout_ms = if ctx.system.active_load_percent() > tier.load_threshold {
            extend(tier.verify_timeout_ms, self.tiers.timeout_extension)
        } else {
            tier.verify_timeout_ms
        };

        ExecutionPlan {
            strategy,
            confidence_threshold: self.threshold_for(strategy, ctx),
            draft_max_tokens,
            max_tokens,
            timeout_ms,
            score,
            reason: reason.into(),
            source,
        }
    }

    /// Plan used when deciding failed: edge-only with CPU-tier parameters.
    pub fn fallback(&self, confidence_threshold: f64, reason: impl Into<String>) -> ExecutionPlan {
        let tier = self.tiers.tier(DeviceType::Cpu);
        ExecutionPlan {
            strategy: Strategy::EdgeOnly,
            confidence_threshold: confidence_threshold.clamp(self.threshold_min, self.threshold_max),
            draft_max_tokens: tier.edge_only_max_tokens,
            max_tokens: tier.edge_only_max_tokens,
            timeout_ms: tier.verify_timeout_ms,
            score: 0.0,
            reason: reason.into(),
            source: PlanSource::Fallback,
        }
    }

    fn draft_tokens(&self, tier: &TierConfig, slo_ms: u64) -> u32 {
        let base = tier.collaborative_draft_tokens;
        let cutoff = self.tiers.strict_slo_cutoff_ms;
        if slo_ms >= cutoff {
            return base;
        }
        let floor = (base / 3).max(1);
        let scaled = (f64::from(base) * slo_ms as f64 / cutoff as f64).round() as u32;
        scaled.max(floor)
    }

    fn threshold_for(&self, strategy: Strategy, ctx: &DecisionContext) -> f64 {
        let tuned = ctx.confidence_threshold;
        let req = &ctx.requirements;
        let demanding = req.min_quality_score > self.high_quality_cutoff;

        let threshold = match strategy {
            Strategy::SpeculativeStandard if demanding => tuned.max(DEMANDING_SPECULATIVE_THRESHOLD),
            Strategy::AdaptiveConfidence => {
                let mut t = tuned;
                if demanding {
                    t += ADAPTIVE_DEMANDING_RAISE;
                } else if req.min_quality_score < ADAPTIVE_LENIENT_QUALITY {
                    t -= ADAPTIVE_LENIENT_DROP;
                }
                if req.priority >= ADAPTIVE_URGENT_PRIORITY {
                    t -= ADAPTIVE_URGENT_DROP;
                }
                t
            }
            _ => tuned,
        };
        threshold.clamp(self.threshold_min, self.threshold_max)
    }
}

fn extend(timeout_ms: u64, factor: f64) -> u64 {
    (timeout_ms as f64 * factor).round() as u64
}
