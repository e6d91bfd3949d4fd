//! Decision core configuration.
//!
//! [`DecisionConfig`] is the single, typed source of every tunable the
//! decision core reads. It is validated once, before the first decision:
//! out-of-range weights or thresholds are rejected instead of silently
//! producing nonsensical scores.
//!
//! Configuration can be built in code (every section implements `Default`)
//! or loaded from YAML, TOML or JSON with environment variable substitution:
//!
//! ```rust,ignore
//! use tandem_decision::DecisionConfig;
//!
//! let config = DecisionConfig::from_file("tandem.yaml")?;
//! let config = DecisionConfig::from_file_with_env("tandem.toml", "TANDEM")?;
//! ```

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use config::{Config as Cfg, Environment, File, FileFormat};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DecisionError, DecisionResult};
use crate::types::{DeviceType, Strategy};

/// Thresholds for the hard-constraint gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardConstraintsConfig {
    /// CPU utilization (%) above which a CPU node is overloaded
    pub cpu_overload: f64,
    /// GPU utilization (%) above which a GPU node is overloaded
    pub gpu_overload: f64,
    /// Available memory (MB) below which a CPU node is overloaded
    pub mem_critical_mb: f64,
    /// SLOs strictly below this cannot afford a cloud round trip
    pub ultra_low_latency_ms: u64,
    pub weak_network_rtt_ms: f64,
    pub packet_loss_threshold: f64,
    /// Priority at which the urgent-task rule starts to apply
    pub urgent_priority: u8,
    /// Urgent tasks below this quality requirement stay on the edge
    pub urgent_quality_ceiling: f64,
}

impl Default for HardConstraintsConfig {
    fn default() -> Self {
        Self {
            cpu_overload: 95.0,
            gpu_overload: 85.0,
            mem_critical_mb: 500.0,
            ultra_low_latency_ms: 50,
            weak_network_rtt_ms: 200.0,
            packet_loss_threshold: 0.1,
            urgent_priority: 3,
            urgent_quality_ceiling: 0.7,
        }
    }
}

/// Objective weights. They need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub latency: f64,
    pub cost: f64,
    pub quality: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            latency: 0.4,
            cost: 0.3,
            quality: 0.3,
        }
    }
}

/// Static latency estimates used until a strategy has enough history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyEstimates {
    pub edge_only_ms: f64,
    pub cloud_direct_ms: f64,
    pub speculative_ms: f64,
    /// Adaptive-confidence estimate as a fraction of the speculative one
    pub adaptive_factor: f64,
}

impl Default for LatencyEstimates {
    fn default() -> Self {
        Self {
            edge_only_ms: 30.0,
            cloud_direct_ms: 200.0,
            speculative_ms: 80.0,
            adaptive_factor: 0.9,
        }
    }
}

impl LatencyEstimates {
    /// Static estimate for `strategy`, excluding network round trips.
    pub fn estimate(&self, strategy: Strategy) -> f64 {
        match strategy {
            Strategy::EdgeOnly => self.edge_only_ms,
            Strategy::CloudDirect => self.cloud_direct_ms,
            Strategy::SpeculativeStandard => self.speculative_ms,
            Strategy::AdaptiveConfidence => self.speculative_ms * self.adaptive_factor,
        }
    }
}

/// Shape of the quality objective and per-task score adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Acceptance factor is `acceptance_floor + acceptance_weight * acceptance`
    pub acceptance_floor: f64,
    pub acceptance_weight: f64,
    /// Tasks asking for more quality than this favour cloud-verified paths
    pub high_quality_cutoff: f64,
    pub high_quality_bonus: f64,
    /// Tasks at or above this priority get a latency bonus
    pub priority_latency_cutoff: u8,
    pub priority_latency_bonus: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            acceptance_floor: 0.8,
            acceptance_weight: 0.2,
            high_quality_cutoff: 0.9,
            high_quality_bonus: 0.1,
            priority_latency_cutoff: 2,
            priority_latency_bonus: 0.1,
        }
    }
}

/// History window sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Ring buffer capacity
    pub window_size: usize,
    /// Samples a strategy needs before its history is trusted
    pub min_samples: usize,
    /// Most recent outcomes per strategy that statistics are computed over
    pub recent_samples: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            min_samples: 5,
            recent_samples: 20,
        }
    }
}

/// Confidence-threshold controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub enabled: bool,
    pub initial_threshold: f64,
    /// Acceptance band in which the threshold is left alone
    pub target_min: f64,
    pub target_max: f64,
    pub step_size: f64,
    /// Acceptance distance that produces one full `step_size`
    pub deadband_width: f64,
    /// EMA smoothing factor
    pub alpha: f64,
    pub threshold_min: f64,
    pub threshold_max: f64,
    /// Outcomes between controller updates
    pub update_interval: u64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_threshold: 0.80,
            target_min: 0.75,
            target_max: 0.85,
            step_size: 0.05,
            deadband_width: 0.10,
            alpha: 0.1,
            threshold_min: 0.50,
            threshold_max: 0.95,
            update_interval: 10,
        }
    }
}

/// Base plan parameters for one device tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    pub edge_only_max_tokens: u32,
    pub collaborative_draft_tokens: u32,
    pub cloud_max_tokens: u32,
    pub verify_timeout_ms: u64,
    /// Utilization (%) above which plan timeouts are extended
    pub load_threshold: f64,
}

impl TierConfig {
    pub fn gpu_default() -> Self {
        Self {
            edge_only_max_tokens: 256,
            collaborative_draft_tokens: 96,
            cloud_max_tokens: 128,
            verify_timeout_ms: 5000,
            load_threshold: 70.0,
        }
    }

    pub fn cpu_default() -> Self {
        Self {
            edge_only_max_tokens: 128,
            collaborative_draft_tokens: 48,
            cloud_max_tokens: 128,
            verify_timeout_ms: 5000,
            load_threshold: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareTiers {
    pub gpu_mode: TierConfig,
    pub cpu_mode: TierConfig,
    /// SLOs below this shrink the draft length proportionally
    pub strict_slo_cutoff_ms: u64,
    /// Timeout multiplier applied under high load
    pub timeout_extension: f64,
}

impl Default for HardwareTiers {
    fn default() -> Self {
        Self {
            gpu_mode: TierConfig::gpu_default(),
            cpu_mode: TierConfig::cpu_default(),
            strict_slo_cutoff_ms: 1000,
            timeout_extension: 1.2,
        }
    }
}

impl HardwareTiers {
    pub fn tier(&self, device: DeviceType) -> &TierConfig {
        match device {
            DeviceType::Gpu => &self.gpu_mode,
            DeviceType::Cpu => &self.cpu_mode,
        }
    }
}

/// Probe cadence and targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Force the device type instead of detecting it
    pub device_type: Option<DeviceType>,
    pub hardware_ttl_ms: u64,
    pub network_enabled: bool,
    pub network_interval_ms: u64,
    /// Last-good network samples older than this are treated as unknown
    pub network_stale_after_ms: u64,
    /// Upper bound on a single probe call
    pub probe_timeout_ms: u64,
    pub cloud_endpoint: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            device_type: None,
            hardware_ttl_ms: 100,
            network_enabled: true,
            network_interval_ms: 5000,
            network_stale_after_ms: 30_000,
            probe_timeout_ms: 250,
            cloud_endpoint: "http://localhost:8081".to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn hardware_ttl(&self) -> Duration {
        Duration::from_millis(self.hardware_ttl_ms)
    }

    pub fn network_interval(&self) -> Duration {
        Duration::from_millis(self.network_interval_ms)
    }

    pub fn network_stale_after(&self) -> Duration {
        Duration::from_millis(self.network_stale_after_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Complete configuration for a decision instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub hard_constraints: HardConstraintsConfig,
    pub scoring_weights: ScoringWeights,
    pub latency_estimates: LatencyEstimates,
    pub quality: QualityConfig,
    pub history: HistoryConfig,
    pub adaptive: AdaptiveConfig,
    pub hardware_tiers: HardwareTiers,
    pub probes: ProbeConfig,
}

impl DecisionConfig {
    /// Load, substitute environment variables, and validate.
    pub fn from_file(path: impl AsRef<Path>) -> DecisionResult<Self> {
        let path = path.as_ref();
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path).map_err(ConfigError::from)?;
        Self::from_str(&content, format)
    }

    /// Parse from a string in an explicit format, then validate.
    pub fn from_str(content: &str, format: FileFormat) -> DecisionResult<Self> {
        let substituted = substitute_env_vars(content);
        let config: Self = Cfg::builder()
            .add_source(File::from_str(&substituted, format))
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file with `PREFIX_SECTION__FIELD` environment overrides.
    pub fn from_file_with_env(path: impl AsRef<Path>, env_prefix: &str) -> DecisionResult<Self> {
        let path = path.as_ref();
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path).map_err(ConfigError::from)?;
        let substituted = substitute_env_vars(&content);

        let config: Self = Cfg::builder()
            .add_source(File::from_str(&substituted, format))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would produce meaningless decisions.
    pub fn validate(&self) -> DecisionResult<()> {
        let hc = &self.hard_constraints;
        check_percent("hard_constraints.cpu_overload", hc.cpu_overload)?;
        check_percent("hard_constraints.gpu_overload", hc.gpu_overload)?;
        check_non_negative("hard_constraints.mem_critical_mb", hc.mem_critical_mb)?;
        check_non_negative("hard_constraints.weak_network_rtt_ms", hc.weak_network_rtt_ms)?;
        check_unit("hard_constraints.packet_loss_threshold", hc.packet_loss_threshold)?;
        check_unit("hard_constraints.urgent_quality_ceiling", hc.urgent_quality_ceiling)?;

        let w = &self.scoring_weights;
        check_non_negative("scoring_weights.latency", w.latency)?;
        check_non_negative("scoring_weights.cost", w.cost)?;
        check_non_negative("scoring_weights.quality", w.quality)?;
        if w.latency + w.cost + w.quality <= 0.0 {
            return Err(DecisionError::invalid(
                "scoring_weights",
                "at least one weight must be positive",
            ));
        }

        let le = &self.latency_estimates;
        check_positive("latency_estimates.edge_only_ms", le.edge_only_ms)?;
        check_positive("latency_estimates.cloud_direct_ms", le.cloud_direct_ms)?;
        check_positive("latency_estimates.speculative_ms", le.speculative_ms)?;
        check_positive("latency_estimates.adaptive_factor", le.adaptive_factor)?;

        let q = &self.quality;
        check_unit("quality.acceptance_floor", q.acceptance_floor)?;
        check_unit("quality.acceptance_weight", q.acceptance_weight)?;
        check_unit("quality.high_quality_cutoff", q.high_quality_cutoff)?;
        check_unit("quality.high_quality_bonus", q.high_quality_bonus)?;
        check_non_negative("quality.priority_latency_bonus", q.priority_latency_bonus)?;

        let h = &self.history;
        if h.window_size == 0 {
            return Err(DecisionError::invalid("history.window_size", "must be > 0"));
        }
        if h.min_samples == 0 {
            return Err(DecisionError::invalid("history.min_samples", "must be > 0"));
        }
        if h.recent_samples < h.min_samples {
            return Err(DecisionError::invalid(
                "history.recent_samples",
                format!("must be >= min_samples ({})", h.min_samples),
            ));
        }

        self.validate_adaptive()?;

        let t = &self.hardware_tiers;
        for (field, tier) in [
            ("hardware_tiers.gpu_mode", &t.gpu_mode),
            ("hardware_tiers.cpu_mode", &t.cpu_mode),
        ] {
            if tier.edge_only_max_tokens == 0
                || tier.collaborative_draft_tokens == 0
                || tier.cloud_max_tokens == 0
            {
                return Err(DecisionError::invalid(field, "token limits must be > 0"));
            }
            if tier.verify_timeout_ms == 0 {
                return Err(DecisionError::invalid(field, "verify_timeout_ms must be > 0"));
            }
            check_percent(field, tier.load_threshold)?;
        }
        if t.strict_slo_cutoff_ms == 0 {
            return Err(DecisionError::invalid(
                "hardware_tiers.strict_slo_cutoff_ms",
                "must be > 0",
            ));
        }
        if !t.timeout_extension.is_finite() || t.timeout_extension < 1.0 {
            return Err(DecisionError::invalid(
                "hardware_tiers.timeout_extension",
                format!("must be >= 1.0, got {}", t.timeout_extension),
            ));
        }

        if self.probes.probe_timeout_ms == 0 {
            return Err(DecisionError::invalid("probes.probe_timeout_ms", "must be > 0"));
        }
        Ok(())
    }

    fn validate_adaptive(&self) -> DecisionResult<()> {
        let a = &self.adaptive;
        check_unit("adaptive.threshold_min", a.threshold_min)?;
        check_unit("adaptive.threshold_max", a.threshold_max)?;
        if a.threshold_min > a.threshold_max {
            return Err(DecisionError::invalid(
                "adaptive.threshold_min",
                format!(
                    "{} exceeds threshold_max {}",
                    a.threshold_min, a.threshold_max
                ),
            ));
        }
        if !(a.threshold_min..=a.threshold_max).contains(&a.initial_threshold) {
            return Err(DecisionError::invalid(
                "adaptive.initial_threshold",
                format!(
                    "{} outside [{}, {}]",
                    a.initial_threshold, a.threshold_min, a.threshold_max
                ),
            ));
        }
        check_unit("adaptive.target_min", a.target_min)?;
        check_unit("adaptive.target_max", a.target_max)?;
        if a.target_min > a.target_max {
            return Err(DecisionError::invalid(
                "adaptive.target_min",
                format!("{} exceeds target_max {}", a.target_min, a.target_max),
            ));
        }
        check_non_negative("adaptive.step_size", a.step_size)?;
        check_positive("adaptive.deadband_width", a.deadband_width)?;
        if !a.alpha.is_finite() || a.alpha <= 0.0 || a.alpha > 1.0 {
            return Err(DecisionError::invalid(
                "adaptive.alpha",
                format!("must be in (0, 1], got {}", a.alpha),
            ));
        }
        if a.update_interval == 0 {
            return Err(DecisionError::invalid("adaptive.update_interval", "must be > 0"));
        }
        Ok(())
    }
}

fn check_non_negative(field: &'static str, value: f64) -> DecisionResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DecisionError::invalid(
            field,
            format!("must be a finite non-negative number, got {value}"),
        ));
    }
    Ok(())
}

fn check_positive(field: &'static str, value: f64) -> DecisionResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(DecisionError::invalid(
            field,
            format!("must be a finite positive number, got {value}"),
        ));
    }
    Ok(())
}

fn check_unit(field: &'static str, value: f64) -> DecisionResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(DecisionError::invalid(
            field,
            format!("must be within [0, 1], got {value}"),
        ));
    }
    Ok(())
}

fn check_percent(field: &'static str, value: f64) -> DecisionResult<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(DecisionError::invalid(
            field,
            format!("must be within [0, 100], got {value}"),
        ));
    }
    Ok(())
}

/// Detect configuration format from the file extension.
pub fn detect_format(path: &Path) -> Result<FileFormat, ConfigError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)\b")
        .expect("env var pattern is valid")
});

/// Replace `${VAR}` and `$VAR` with environment values. Unset variables
/// are left as written.
pub fn substitute_env_vars(content: &str) -> String {
    ENV_VAR
        .replace_all(content, |caps: &regex::Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
