//! Multi-objective strategy scoring.
//!
//! Every strategy gets three sub-scores in `[0, 1]`:
//!
//! - **latency**: `clamp(1 - expected / slo, 0, 1)`, where `expected` is the
//!   strategy's recent mean latency once it has enough history, else the
//!   configured static estimate, plus the network round trips the strategy
//!   pays (2x RTT for `CloudDirect`, 1x for the collaborative strategies)
//! - **cost**: a fixed ordinal, `EdgeOnly` cheapest and `CloudDirect` most
//!   expensive
//! - **quality**: a per-strategy base quality scaled by the historical
//!   success rate and, for collaborative strategies, by
//!   `acceptance_floor + acceptance_weight * acceptance`
//!
//! The total is the weighted sum of the three. Scores are comparative, not
//! calibrated. The ranking is sorted by total, highest first, with exact
//! ties broken by [`Strategy`] declaration order.

use std::collections::BTreeMap;

use crate::config::{DecisionConfig, LatencyEstimates, QualityConfig, ScoringWeights};
use crate::error::{DecisionError, DecisionResult};
use crate::ledger::{HistoryLedger, StrategyStats};
use crate::types::{DecisionContext, ScoredStrategy, Strategy, SubScores};

/// Per-strategy history copied out of the ledger for one decision.
///
/// Scoring runs against this copy so the ledger lock is not held while
/// ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsView {
    per_strategy: BTreeMap<Strategy, StrategyStats>,
}

impl StatsView {
    /// Strategies with fewer than `min_samples` recent outcomes are left out.
    pub fn from_ledger(ledger: &HistoryLedger, min_samples: usize) -> Self {
        let per_strategy = Strategy::ALL
            .iter()
            .filter_map(|s| ledger.stats_for(*s, min_samples).map(|stats| (*s, stats)))
            .collect();
        Self { per_strategy }
    }

    pub fn get(&self, strategy: Strategy) -> Option<&StrategyStats> {
        self.per_strategy.get(&strategy)
    }

    pub fn insert(&mut self, strategy: Strategy, stats: StrategyStats) {
        self.per_strategy.insert(strategy, stats);
    }

    pub fn is_empty(&self) -> bool {
        self.per_strategy.is_empty()
    }
}

fn cost_score(strategy: Strategy) -> f64 {
    match strategy {
        Strategy::EdgeOnly => 1.0,
        Strategy::AdaptiveConfidence => 0.7,
        Strategy::SpeculativeStandard => 0.6,
        Strategy::CloudDirect => 0.0,
    }
}

fn base_quality(strategy: Strategy) -> f64 {
    match strategy {
        Strategy::EdgeOnly => 0.7,
        Strategy::CloudDirect => 1.0,
        Strategy::SpeculativeStandard => 0.95,
        Strategy::AdaptiveConfidence => 0.92,
    }
}

/// Network round trips the strategy pays per request.
fn round_trips(strategy: Strategy) -> f64 {
    match strategy {
        Strategy::EdgeOnly => 0.0,
        Strategy::CloudDirect => 2.0,
        Strategy::SpeculativeStandard | Strategy::AdaptiveConfidence => 1.0,
    }
}

#[derive(Debug, Clone)]
pub struct MultiObjectiveScorer {
    weights: ScoringWeights,
    estimates: LatencyEstimates,
    quality: QualityConfig,
}

impl MultiObjectiveScorer {
    pub fn new(weights: ScoringWeights, estimates: LatencyEstimates, quality: QualityConfig) -> Self {
        Self {
            weights,
            estimates,
            quality,
        }
    }

    pub fn from_config(config: &DecisionConfig) -> Self {
        Self::new(
            config.scoring_weights,
            config.latency_estimates.clone(),
            config.quality.clone(),
        )
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    /// Rank every strategy for `ctx`, best first.
    ///
    /// Strategies whose total is not finite are dropped; if none is left
    /// the call fails with [`DecisionError::ScoringFailed`].
    pub fn score(
        &self,
        ctx: &DecisionContext,
        stats: &StatsView,
    ) -> DecisionResult<Vec<ScoredStrategy>> {
        let mut ranking: Vec<ScoredStrategy> = Strategy::ALL
            .iter()
            .map(|s| self.score_strategy(*s, ctx, stats))
            .filter(|scored| {
                let finite = scored.total_score.is_finite();
                if !finite {
                    tracing::warn!(strategy = %scored.strategy, "dropping non-finite score");
                }
                finite
            })
            .collect();

        if ranking.is_empty() {
            return Err(DecisionError::ScoringFailed(
                "no strategy produced a finite score".to_string(),
            ));
        }

        ranking.sort_by(|a, b| {
            b.total_score
                .total_cmp(&a.total_score)
                .then(a.strategy.cmp(&b.strategy))
        });
        Ok(ranking)
    }

    /// Score a single strategy.
    pub fn score_strategy(
        &self,
        strategy: Strategy,
        ctx: &DecisionContext,
        stats: &StatsView,
    ) -> ScoredStrategy {
        let history = stats.get(strategy);
        let req = &ctx.requirements;

        let base_latency = history
            .map(|h| h.mean_latency_ms)
            .unwrap_or_else(|| self.estimates.estimate(strategy));
        let expected_latency_ms = match ctx.system.network_rtt_ms {
            Some(rtt) if strategy != Strategy::EdgeOnly => {
                base_latency + round_trips(strategy) * rtt
            }
            _ => base_latency,
        };

        let latency = if req.max_latency_ms == 0 {
            0.0
        } else {
            (1.0 - expected_latency_ms / req.max_latency_ms as f64).clamp(0.0, 1.0)
        };

        let cost = cost_score(strategy);
        let quality = self.quality_score(strategy, req.min_quality_score, history);

        let w = &self.weights;
        let mut total_score = w.latency * latency + w.cost * cost + w.quality * quality;
        if req.priority >= self.quality.priority_latency_cutoff {
            total_score += self.quality.priority_latency_bonus * latency;
        }

        ScoredStrategy {
            strategy,
            total_score,
            subscores: SubScores {
                latency,
                cost,
                quality,
                expected_latency_ms,
            },
        }
    }

    fn quality_score(
        &self,
        strategy: Strategy,
        min_quality: f64,
        history: Option<&StrategyStats>,
    ) -> f64 {
        let q = &self.quality;
        let mut quality = base_quality(strategy);

        if let Some(h) = history {
            quality *= h.success_rate;
            if strategy.is_collaborative() {
                quality *= q.acceptance_floor + q.acceptance_weight * h.mean_acceptance;
            }
        }

        let favours_verification = matches!(
            strategy,
            Strategy::CloudDirect | Strategy::SpeculativeStandard
        );
        if min_quality > q.high_quality_cutoff && favours_verification {
            quality = (quality + q.high_quality_bonus).min(1.0);
        }
        quality
    }
}
