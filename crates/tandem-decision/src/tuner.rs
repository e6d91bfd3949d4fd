//! Confidence-threshold controller.
//!
//! A discrete proportional controller with a deadband and EMA smoothing.
//! With `r` the recent collaborative acceptance rate:
//!
//! ```text
//! r > target_max:  step = -step_size * (r - target_max) / deadband_width
//! r < target_min:  step = +step_size * (target_min - r) / deadband_width
//! otherwise:       step = 0
//!
//! next = current * (1 - alpha) + (current + step) * alpha
//! ```
//!
//! `next` is clamped to `[threshold_min, threshold_max]`. The controller
//! only runs once every `update_interval` recorded outcomes.

use serde::{Deserialize, Serialize};

use crate::config::AdaptiveConfig;
use crate::ledger::HistoryLedger;

/// Live tuning state. Owned by one facade and only written by the tuner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdState {
    pub confidence_threshold: f64,
    /// Outcomes recorded since the controller last ran
    pub updates_since_apply: u64,
    /// Times the controller moved the threshold
    pub updates_applied: u64,
}

impl ThresholdState {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
            updates_since_apply: 0,
            updates_applied: 0,
        }
    }
}

/// One applied threshold change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdUpdate {
    pub previous: f64,
    pub current: f64,
    pub acceptance_rate: f64,
    pub step: f64,
}

#[derive(Debug, Clone)]
pub struct AdaptiveTuner {
    config: AdaptiveConfig,
    min_samples: usize,
}

impl AdaptiveTuner {
    /// `min_samples` is the collaborative history required before tuning.
    pub fn new(config: AdaptiveConfig, min_samples: usize) -> Self {
        Self {
            config,
            min_samples,
        }
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    pub fn initial_state(&self) -> ThresholdState {
        ThresholdState::new(self.clamp(self.config.initial_threshold))
    }

    fn clamp(&self, threshold: f64) -> f64 {
        threshold.clamp(self.config.threshold_min, self.config.threshold_max)
    }

    /// Raw controller step for an acceptance rate.
    pub fn step(&self, acceptance_rate: f64) -> f64 {
        let c = &self.config;
        if acceptance_rate > c.target_max {
            -c.step_size * (acceptance_rate - c.target_max) / c.deadband_width
        } else if acceptance_rate < c.target_min {
            c.step_size * (c.target_min - acceptance_rate) / c.deadband_width
        } else {
            0.0
        }
    }

    /// Smoothed and clamped threshold after one controller step.
    pub fn next_threshold(&self, current: f64, acceptance_rate: f64) -> f64 {
        let alpha = self.config.alpha;
        let target = current + self.step(acceptance_rate);
        self.clamp(current * (1.0 - alpha) + target * alpha)
    }

    /// Count one recorded outcome and run the controller when the
    /// interval is reached.
    ///
    /// Returns the applied change, or `None` when the controller did not
    /// run, lacked collaborative history, or left the threshold alone.
    pub fn maybe_update(
        &self,
        ledger: &HistoryLedger,
        state: &mut ThresholdState,
    ) -> Option<ThresholdUpdate> {
        if !self.config.enabled {
            return None;
        }

        state.updates_since_apply += 1;
        if state.updates_since_apply < self.config.update_interval {
            return None;
        }
        state.updates_since_apply = 0;

        let Some(acceptance_rate) = ledger.recent_collaborative_acceptance(self.min_samples)
        else {
            tracing::debug!(
                min_samples = self.min_samples,
                "not enough collaborative history to tune threshold"
            );
            return None;
        };

        let step = self.step(acceptance_rate);
        if step == 0.0 {
            tracing::debug!(acceptance_rate, "acceptance within target band");
            return None;
        }

        let previous = state.confidence_threshold;
        let current = self.next_threshold(previous, acceptance_rate);
        state.confidence_threshold = current;
        state.updates_applied += 1;

        Some(ThresholdUpdate {
            previous,
            current,
            acceptance_rate,
            step,
        })
    }
}
