//! Bounded history of execution outcomes.
//!
//! The ledger is a fixed-capacity ring buffer: appends are O(1) and the
//! oldest outcome is evicted once the window is full. Per-strategy
//! statistics only look at the most recent `recent_samples` outcomes of
//! that strategy, and are withheld below `min_samples` so callers fall back
//! to static estimates.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::HistoryConfig;
use crate::error::{DecisionError, DecisionResult};
use crate::types::{ExecutionOutcome, Strategy};

/// Aggregate view of one strategy's recent outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub mean_acceptance: f64,
    pub mean_latency_ms: f64,
    pub success_rate: f64,
    pub sample_count: usize,
}

/// Spread of reported draft confidence across the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

/// Read-only summary of the whole window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    /// Outcomes ever recorded, including evicted ones
    pub total_recorded: u64,
    pub window_len: usize,
    pub capacity: usize,
    pub success_rate: f64,
    pub mean_latency_ms: f64,
    pub strategy_distribution: BTreeMap<Strategy, usize>,
    pub per_strategy: BTreeMap<Strategy, StrategyStats>,
    pub confidence: Option<ConfidenceDistribution>,
    pub recent_collaborative_acceptance: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct HistoryLedger {
    capacity: usize,
    recent_samples: usize,
    outcomes: VecDeque<ExecutionOutcome>,
    total_recorded: u64,
}

impl HistoryLedger {
    /// `capacity` and `recent_samples` are raised to at least 1.
    pub fn new(capacity: usize, recent_samples: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            recent_samples: recent_samples.max(1),
            outcomes: VecDeque::with_capacity(capacity),
            total_recorded: 0,
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.window_size, config.recent_samples)
    }

    /// Append an outcome, evicting the oldest when full.
    pub fn record(&mut self, outcome: ExecutionOutcome) {
        if let Err(e) = self.check_integrity() {
            tracing::warn!(error = %e, "resetting history window");
            self.outcomes.clear();
        }

        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(outcome);
        self.total_recorded += 1;
    }

    fn check_integrity(&self) -> DecisionResult<()> {
        if self.outcomes.len() > self.capacity {
            return Err(DecisionError::HistoryCorruption(format!(
                "{} outcomes in a window of {}",
                self.outcomes.len(),
                self.capacity
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    pub fn clear(&mut self) {
        self.outcomes.clear();
    }

    /// Outcomes from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &ExecutionOutcome> {
        self.outcomes.iter()
    }

    /// Most recent outcomes matching `filter`, newest first.
    fn recent<'a>(
        &'a self,
        filter: impl Fn(&ExecutionOutcome) -> bool + 'a,
    ) -> impl Iterator<Item = &'a ExecutionOutcome> + 'a {
        self.outcomes
            .iter()
            .rev()
            .filter(move |o| filter(*o))
            .take(self.recent_samples)
    }

    /// Statistics over the recent outcomes of `strategy`, or `None` when
    /// fewer than `min_samples` are available.
    pub fn stats_for(&self, strategy: Strategy, min_samples: usize) -> Option<StrategyStats> {
        let recent: Vec<&ExecutionOutcome> = self.recent(|o| o.strategy == strategy).collect();
        if recent.is_empty() || recent.len() < min_samples {
            return None;
        }

        let n = recent.len() as f64;
        let acceptance: f64 = recent.iter().map(|o| o.acceptance_rate).sum();
        let latency: f64 = recent.iter().map(|o| o.latency_ms).sum();
        let successes = recent.iter().filter(|o| o.success).count();

        Some(StrategyStats {
            mean_acceptance: acceptance / n,
            mean_latency_ms: latency / n,
            success_rate: successes as f64 / n,
            sample_count: recent.len(),
        })
    }

    /// Mean acceptance over recent collaborative outcomes, or `None` when
    /// fewer than `min_samples` are available.
    pub fn recent_collaborative_acceptance(&self, min_samples: usize) -> Option<f64> {
        let rates: Vec<f64> = self
            .recent(|o| o.strategy.is_collaborative())
            .map(|o| o.acceptance_rate)
            .collect();
        if rates.is_empty() || rates.len() < min_samples {
            return None;
        }
        Some(rates.iter().sum::<f64>() / rates.len() as f64)
    }

    pub fn summary(&self) -> LedgerSummary {
        let n = self.outcomes.len();

        let mut strategy_distribution = BTreeMap::new();
        for outcome in &self.outcomes {
            *strategy_distribution.entry(outcome.strategy).or_insert(0) += 1;
        }

        let per_strategy = strategy_distribution
            .keys()
            .filter_map(|s| self.stats_for(*s, 1).map(|stats| (*s, stats)))
            .collect();

        let (success_rate, mean_latency_ms) = if n == 0 {
            (0.0, 0.0)
        } else {
            let successes = self.outcomes.iter().filter(|o| o.success).count();
            let latency: f64 = self.outcomes.iter().map(|o| o.latency_ms).sum();
            (successes as f64 / n as f64, latency / n as f64)
        };

        LedgerSummary {
            total_recorded: self.total_recorded,
            window_len: n,
            capacity: self.capacity,
            success_rate,
            mean_latency_ms,
            strategy_distribution,
            per_strategy,
            confidence: self.confidence_distribution(),
            recent_collaborative_acceptance: self.recent_collaborative_acceptance(1),
        }
    }

    fn confidence_distribution(&self) -> Option<ConfidenceDistribution> {
        if self.outcomes.is_empty() {
            return None;
        }

        let n = self.outcomes.len() as f64;
        let scores = || self.outcomes.iter().map(|o| o.confidence_score);
        let mean = scores().sum::<f64>() / n;
        let variance = scores().map(|c| (c - mean).powi(2)).sum::<f64>() / n;

        Some(ConfidenceDistribution {
            mean,
            min: scores().fold(f64::INFINITY, f64::min),
            max: scores().fold(f64::NEG_INFINITY, f64::max),
            std_dev: variance.sqrt(),
        })
    }
}
