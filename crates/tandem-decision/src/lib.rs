//! # tandem-decision
//!
//! Request-routing decision core for split edge/cloud inference.
//!
//! For every inbound request the core picks one of four execution
//! strategies, trading latency, cost and quality against live hardware,
//! network and task constraints:
//!
//! | Strategy              | Who generates                               |
//! |-----------------------|---------------------------------------------|
//! | `EdgeOnly`            | small edge model alone                      |
//! | `CloudDirect`         | cloud model alone                           |
//! | `SpeculativeStandard` | edge drafts, cloud verifies every draft      |
//! | `AdaptiveConfidence`  | edge drafts, cloud verifies low-confidence drafts |
//!
//! Observed outcomes are fed back through
//! [`DecisionFacade::record_outcome`]; an adaptive controller retunes the
//! draft confidence threshold from them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tandem_decision::{DecisionConfig, DecisionFacade, ExecutionOutcome, TaskRequirements};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tandem_decision::DecisionError> {
//!     let facade = DecisionFacade::with_system_probes(DecisionConfig::default())?;
//!
//!     let plan = facade.decide(TaskRequirements::new(800).with_priority(2)).await;
//!     println!("{} ({})", plan.strategy, plan.reason);
//!
//!     facade.record_outcome(ExecutionOutcome::new(plan.strategy, 0.82, 140.0, true));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod facade;
pub mod gate;
pub mod ledger;
pub mod planner;
pub mod probe;
pub mod scorer;
pub mod state;
pub mod tuner;
pub mod types;

pub use config::DecisionConfig;
pub use error::{ConfigError, DecisionError, DecisionResult, ProbeError};
pub use facade::{
    DecisionCounts, DecisionFacade, DecisionFacadeBuilder, EffectiveConfig, StatisticsSummary,
};
pub use gate::{ForcedDecision, HardConstraintGate};
pub use ledger::{HistoryLedger, LedgerSummary, StrategyStats};
pub use planner::ExecutionPlanBuilder;
pub use probe::{HardwareProbe, HttpNetworkProbe, NetworkProbe, SysinfoHardwareProbe};
pub use scorer::{MultiObjectiveScorer, StatsView};
pub use state::StateAggregator;
pub use tuner::{AdaptiveTuner, ThresholdState, ThresholdUpdate};
pub use types::{
    ConstraintRule, DecisionContext, DeviceType, ExecutionOutcome, ExecutionPlan, HardwareSample,
    NetworkSample, PlanSource, ScoredStrategy, Strategy, SubScores, SystemSnapshot,
    TaskRequirements,
};
