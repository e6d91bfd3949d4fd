//! Hard-constraint gate.
//!
//! Rules are evaluated in a fixed order and the first one that fires wins.
//! A fired rule is a total override: scoring is skipped for that decision.
//!
//! | # | Rule               | Condition                                              | Forces        |
//! |---|--------------------|--------------------------------------------------------|---------------|
//! | 1 | resource overload  | GPU: gpu > gpu_overload; CPU: cpu > cpu_overload or mem < mem_critical | `CloudDirect` |
//! | 2 | ultra-low latency  | max_latency_ms < ultra_low_latency_ms                   | `EdgeOnly`    |
//! | 3 | privacy            | privacy_level >= 2                                     | `EdgeOnly`    |
//! | 4 | weak network       | rtt > weak_network_rtt_ms or loss > packet_loss_threshold | `EdgeOnly` |
//! | 5 | urgent, low quality| priority >= urgent_priority and quality < ceiling      | `EdgeOnly`    |
//!
//! An unknown network state (no usable sample) never fires rule 4.

use serde::{Deserialize, Serialize};

use crate::config::HardConstraintsConfig;
use crate::types::{ConstraintRule, DecisionContext, DeviceType, Strategy, TaskRequirements};

/// Privacy level at which data must not leave the device.
const PRIVATE_LEVEL: u8 = 2;

/// A strategy imposed by a hard constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcedDecision {
    pub strategy: Strategy,
    pub rule: ConstraintRule,
    pub reason: String,
}

impl ForcedDecision {
    fn new(strategy: Strategy, rule: ConstraintRule, reason: String) -> Self {
        Self {
            strategy,
            rule,
            reason,
        }
    }
}

/// Evaluates the ordered hard-constraint rules.
#[derive(Debug, Clone)]
pub struct HardConstraintGate {
    config: HardConstraintsConfig,
}

impl HardConstraintGate {
    pub fn new(config: HardConstraintsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HardConstraintsConfig {
        &self.config
    }

    /// Return the forced strategy of the first rule that fires, if any.
    pub fn check(&self, ctx: &DecisionContext) -> Option<ForcedDecision> {
        let req = &ctx.requirements;
        self.resource_overload(ctx)
            .or_else(|| self.ultra_low_latency(req))
            .or_else(|| self.privacy(req))
            .or_else(|| self.weak_network(ctx))
            .or_else(|| self.urgent_low_quality(req))
    }

    fn resource_overload(&self, ctx: &DecisionContext) -> Option<ForcedDecision> {
        let sys = &ctx.system;
        let c = &self.config;

        let reason = match sys.device_type {
            DeviceType::Gpu => sys
                .gpu_percent
                .filter(|gpu| *gpu > c.gpu_overload)
                .map(|gpu| format!("resource overload: gpu {gpu:.1}% > {:.1}%", c.gpu_overload)),
            DeviceType::Cpu if sys.cpu_percent > c.cpu_overload => Some(format!(
                "resource overload: cpu {:.1}% > {:.1}%",
                sys.cpu_percent, c.cpu_overload
            )),
            DeviceType::Cpu if sys.mem_available_mb < c.mem_critical_mb => Some(format!(
                "resource overload: available memory {:.0} MB < {:.0} MB",
                sys.mem_available_mb, c.mem_critical_mb
            )),
            DeviceType::Cpu => None,
        }?;

        Some(ForcedDecision::new(
            Strategy::CloudDirect,
            ConstraintRule::ResourceOverload,
            reason,
        ))
    }

    fn ultra_low_latency(&self, req: &TaskRequirements) -> Option<ForcedDecision> {
        (req.max_latency_ms < self.config.ultra_low_latency_ms).then(|| {
            ForcedDecision::new(
                Strategy::EdgeOnly,
                ConstraintRule::UltraLowLatency,
                format!(
                    "ultra-low latency SLO: {} ms < {} ms",
                    req.max_latency_ms, self.config.ultra_low_latency_ms
                ),
            )
        })
    }

    fn privacy(&self, req: &TaskRequirements) -> Option<ForcedDecision> {
        (req.privacy_level >= PRIVATE_LEVEL).then(|| {
            ForcedDecision::new(
                Strategy::EdgeOnly,
                ConstraintRule::PrivacySensitive,
                format!(
                    "privacy level {} keeps data on device",
                    req.privacy_level
                ),
            )
        })
    }

    fn weak_network(&self, ctx: &DecisionContext) -> Option<ForcedDecision> {
        let sys = &ctx.system;
        let c = &self.config;

        let reason = if let Some(rtt) = sys.network_rtt_ms.filter(|rtt| *rtt > c.weak_network_rtt_ms)
        {
            format!("weak network: rtt {rtt:.0} ms > {:.0} ms", c.weak_network_rtt_ms)
        } else if let Some(loss) = sys
            .packet_loss_ratio
            .filter(|loss| *loss > c.packet_loss_threshold)
        {
            format!(
                "weak network: packet loss {loss:.2} > {:.2}",
                c.packet_loss_threshold
            )
        } else {
            return None;
        };

        Some(ForcedDecision::new(
            Strategy::EdgeOnly,
            ConstraintRule::WeakNetwork,
            reason,
        ))
    }

    fn urgent_low_quality(&self, req: &TaskRequirements) -> Option<ForcedDecision> {
        let c = &self.config;
        (req.priority >= c.urgent_priority && req.min_quality_score < c.urgent_quality_ceiling)
            .then(|| {
                ForcedDecision::new(
                    Strategy::EdgeOnly,
                    ConstraintRule::UrgentLowQuality,
                    format!(
                        "urgent task (priority {}) accepts quality {:.2} < {:.2}",
                        req.priority, req.min_quality_score, c.urgent_quality_ceiling
                    ),
                )
            })
    }
}
