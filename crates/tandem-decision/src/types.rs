//! Shared types for the decision core.
//!
//! These define the contract between the serving caller and the
//! [`DecisionFacade`](crate::facade::DecisionFacade): what a request asks
//! for, what the node looks like right now, which strategy was chosen and
//! with which parameters, and what actually happened afterwards.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution strategy for a single inference request.
///
/// The declaration order is the deterministic tie-break order used by the
/// scorer: `EdgeOnly < CloudDirect < SpeculativeStandard < AdaptiveConfidence`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Small model on the edge node answers alone.
    EdgeOnly,
    /// Request is forwarded to the cloud model unchanged.
    CloudDirect,
    /// Edge drafts, cloud verifies every draft with a fixed threshold.
    SpeculativeStandard,
    /// Edge drafts, cloud verifies only drafts below a per-request threshold.
    AdaptiveConfidence,
}

impl Strategy {
    /// Every strategy, in tie-break order.
    pub const ALL: [Strategy; 4] = [
        Strategy::EdgeOnly,
        Strategy::CloudDirect,
        Strategy::SpeculativeStandard,
        Strategy::AdaptiveConfidence,
    ];

    /// Whether the strategy runs an edge draft that the cloud verifies.
    pub fn is_collaborative(self) -> bool {
        matches!(
            self,
            Strategy::SpeculativeStandard | Strategy::AdaptiveConfidence
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::EdgeOnly => "edge_only",
            Strategy::CloudDirect => "cloud_direct",
            Strategy::SpeculativeStandard => "speculative_standard",
            Strategy::AdaptiveConfidence => "adaptive_confidence",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute class of the edge node. Selects overload rules and plan tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    #[default]
    Cpu,
    Gpu,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Cpu => write!(f, "cpu"),
            DeviceType::Gpu => write!(f, "gpu"),
        }
    }
}

/// Per-request service requirements, supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskRequirements {
    /// End-to-end latency SLO in milliseconds
    pub max_latency_ms: u64,
    /// Minimum acceptable quality score (0.0-1.0)
    pub min_quality_score: f64,
    /// Urgency, 0 (background) to 3 (urgent)
    pub priority: u8,
    /// Data sensitivity, 0 (public) to 2 (must stay on device)
    pub privacy_level: u8,
}

impl Default for TaskRequirements {
    fn default() -> Self {
        Self {
            max_latency_ms: 1000,
            min_quality_score: 0.8,
            priority: 1,
            privacy_level: 0,
        }
    }
}

impl TaskRequirements {
    pub const MAX_PRIORITY: u8 = 3;
    pub const MAX_PRIVACY_LEVEL: u8 = 2;

    /// Create requirements with the given SLO and default quality/priority.
    pub fn new(max_latency_ms: u64) -> Self {
        Self {
            max_latency_ms,
            ..Default::default()
        }
    }

    pub fn with_min_quality(mut self, score: f64) -> Self {
        self.min_quality_score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Set the priority, saturating at [`Self::MAX_PRIORITY`].
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(Self::MAX_PRIORITY);
        self
    }

    /// Set the privacy level, saturating at [`Self::MAX_PRIVACY_LEVEL`].
    pub fn with_privacy_level(mut self, level: u8) -> Self {
        self.privacy_level = level.min(Self::MAX_PRIVACY_LEVEL);
        self
    }
}

/// One reading from a [`HardwareProbe`](crate::probe::HardwareProbe).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HardwareSample {
    pub cpu_percent: f64,
    pub mem_available_mb: f64,
    /// GPU utilization, only reported in GPU mode
    pub gpu_percent: Option<f64>,
    pub device_type: DeviceType,
}

impl HardwareSample {
    pub fn cpu(cpu_percent: f64, mem_available_mb: f64) -> Self {
        Self {
            cpu_percent,
            mem_available_mb,
            gpu_percent: None,
            device_type: DeviceType::Cpu,
        }
    }

    pub fn gpu(gpu_percent: f64, cpu_percent: f64, mem_available_mb: f64) -> Self {
        Self {
            cpu_percent,
            mem_available_mb,
            gpu_percent: Some(gpu_percent),
            device_type: DeviceType::Gpu,
        }
    }
}

/// One reading from a [`NetworkProbe`](crate::probe::NetworkProbe).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkSample {
    pub rtt_ms: f64,
    pub packet_loss_ratio: f64,
}

/// Node state captured for a single decision. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub cpu_percent: f64,
    pub mem_available_mb: f64,
    pub gpu_percent: Option<f64>,
    pub device_type: DeviceType,
    /// `None` when the network state is unknown
    pub network_rtt_ms: Option<f64>,
    pub packet_loss_ratio: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl SystemSnapshot {
    pub fn new(hardware: HardwareSample, network: Option<NetworkSample>) -> Self {
        Self {
            cpu_percent: hardware.cpu_percent,
            mem_available_mb: hardware.mem_available_mb,
            gpu_percent: hardware.gpu_percent,
            device_type: hardware.device_type,
            network_rtt_ms: network.map(|n| n.rtt_ms),
            packet_loss_ratio: network.map(|n| n.packet_loss_ratio),
            captured_at: Utc::now(),
        }
    }

    /// Utilization of the compute unit that matters for this device type.
    pub fn active_load_percent(&self) -> f64 {
        match self.device_type {
            DeviceType::Gpu => self.gpu_percent.unwrap_or(0.0),
            DeviceType::Cpu => self.cpu_percent,
        }
    }
}

/// Everything downstream components may read while deciding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub requirements: TaskRequirements,
    pub system: SystemSnapshot,
    /// Confidence threshold as of the start of this decision
    pub confidence_threshold: f64,
}

/// Hard-constraint rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintRule {
    ResourceOverload,
    UltraLowLatency,
    PrivacySensitive,
    WeakNetwork,
    UrgentLowQuality,
}

impl fmt::Display for ConstraintRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConstraintRule::ResourceOverload => "resource_overload",
            ConstraintRule::UltraLowLatency => "ultra_low_latency",
            ConstraintRule::PrivacySensitive => "privacy_sensitive",
            ConstraintRule::WeakNetwork => "weak_network",
            ConstraintRule::UrgentLowQuality => "urgent_low_quality",
        };
        f.write_str(s)
    }
}

/// Per-objective components of a strategy score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub latency: f64,
    pub cost: f64,
    pub quality: f64,
    /// Expected end-to-end latency the latency score was derived from
    pub expected_latency_ms: f64,
}

/// A strategy with its weighted score for one decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredStrategy {
    pub strategy: Strategy,
    pub total_score: f64,
    pub subscores: SubScores,
}

/// How a plan's strategy was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanSource {
    /// Highest weighted score
    Scored,
    /// A hard constraint overrode scoring
    Forced { rule: ConstraintRule },
    /// Something failed internally; conservative defaults
    Fallback,
}

/// Concrete runtime parameters for executing one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub strategy: Strategy,
    /// Minimum draft confidence accepted without cloud correction
    pub confidence_threshold: f64,
    /// Tokens the edge model drafts per round (0 when the edge does not draft)
    pub draft_max_tokens: u32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub score: f64,
    pub reason: String,
    pub source: PlanSource,
}

impl ExecutionPlan {
    pub fn is_forced(&self) -> bool {
        matches!(self.source, PlanSource::Forced { .. })
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, PlanSource::Fallback)
    }
}

/// Observed result of executing a plan, reported by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub strategy: Strategy,
    /// Fraction of drafted tokens the cloud accepted (0.0-1.0)
    pub acceptance_rate: f64,
    pub latency_ms: f64,
    pub edge_latency_ms: f64,
    pub cloud_latency_ms: f64,
    pub confidence_score: f64,
    pub success: bool,
    pub tokens_generated: u32,
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionOutcome {
    pub fn new(strategy: Strategy, acceptance_rate: f64, latency_ms: f64, success: bool) -> Self {
        Self {
            strategy,
            acceptance_rate,
            latency_ms,
            edge_latency_ms: 0.0,
            cloud_latency_ms: 0.0,
            confidence_score: 0.0,
            success,
            tokens_generated: 0,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_split_latency(mut self, edge_ms: f64, cloud_ms: f64) -> Self {
        self.edge_latency_ms = edge_ms;
        self.cloud_latency_ms = cloud_ms;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence_score = confidence;
        self
    }

    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens_generated = tokens;
        self
    }
}
