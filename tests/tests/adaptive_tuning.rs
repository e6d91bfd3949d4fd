use tandem_decision::{
    DecisionConfig, ExecutionOutcome, HistoryLedger, Strategy, TaskRequirements,
};
use tandem_testing::{MockHardwareProbe, OutcomeBatch, facade_with};

const EPS: f64 = 1e-9;

#[tokio::test]
async fn test_high_acceptance_lowers_threshold_once() -> anyhow::Result<()> {
    let facade = facade_with(DecisionConfig::default(), MockHardwareProbe::cpu(40.0), None)?;
    assert_eq!(facade.confidence_threshold(), 0.80);

    OutcomeBatch::speculative(0.95, 9).record_into(&facade);
    assert_eq!(facade.confidence_threshold(), 0.80);

    OutcomeBatch::speculative(0.95, 1).record_into(&facade);
    let threshold = facade.confidence_threshold();
    assert!(threshold < 0.80);
    assert!((threshold - 0.795).abs() < EPS, "threshold {threshold}");
    assert_eq!(facade.current_config().threshold_updates, 1);
    Ok(())
}

#[tokio::test]
async fn test_low_acceptance_raises_threshold() -> anyhow::Result<()> {
    let facade = facade_with(DecisionConfig::default(), MockHardwareProbe::cpu(40.0), None)?;
    OutcomeBatch::speculative(0.60, 10).record_into(&facade);

    let threshold = facade.confidence_threshold();
    assert!(threshold > 0.80);
    assert!((threshold - 0.8075).abs() < EPS, "threshold {threshold}");
    Ok(())
}

#[tokio::test]
async fn test_in_band_acceptance_holds_threshold() -> anyhow::Result<()> {
    let facade = facade_with(DecisionConfig::default(), MockHardwareProbe::cpu(40.0), None)?;
    OutcomeBatch::speculative(0.80, 30).record_into(&facade);
    assert_eq!(facade.confidence_threshold(), 0.80);
    assert_eq!(facade.current_config().threshold_updates, 0);
    Ok(())
}

#[tokio::test]
async fn test_tuner_fires_on_interval_multiples_only() -> anyhow::Result<()> {
    let facade = facade_with(DecisionConfig::default(), MockHardwareProbe::cpu(40.0), None)?;

    let mut previous = facade.confidence_threshold();
    for n in 1..=40u64 {
        facade.record_outcome(ExecutionOutcome::new(
            Strategy::AdaptiveConfidence,
            0.99,
            70.0,
            true,
        ));
        let current = facade.confidence_threshold();
        if n % 10 == 0 {
            assert!(current < previous, "update expected at outcome {n}");
        } else {
            assert_eq!(current, previous, "no update expected at outcome {n}");
        }
        previous = current;
    }
    assert_eq!(facade.current_config().threshold_updates, 4);
    Ok(())
}

#[tokio::test]
async fn test_edge_only_history_does_not_tune() -> anyhow::Result<()> {
    let facade = facade_with(DecisionConfig::default(), MockHardwareProbe::cpu(40.0), None)?;
    OutcomeBatch::of(Strategy::EdgeOnly, 0.0, 25.0, 50).record_into(&facade);
    OutcomeBatch::of(Strategy::CloudDirect, 1.0, 210.0, 50).record_into(&facade);
    assert_eq!(facade.confidence_threshold(), 0.80);
    Ok(())
}

#[tokio::test]
async fn test_threshold_stays_in_bounds() -> anyhow::Result<()> {
    let mut config = DecisionConfig::default();
    config.adaptive.alpha = 1.0;
    config.adaptive.step_size = 0.4;
    config.adaptive.update_interval = 1;
    config.history.min_samples = 1;
    config.history.recent_samples = 1;
    let facade = facade_with(config, MockHardwareProbe::cpu(40.0), None)?;

    // Deterministic pseudo-random acceptance sequence
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    for _ in 0..500 {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        let acceptance = (seed % 1001) as f64 / 1000.0;
        facade.record_outcome(ExecutionOutcome::new(
            Strategy::SpeculativeStandard,
            acceptance,
            80.0,
            true,
        ));
        let threshold = facade.confidence_threshold();
        assert!((0.50..=0.95).contains(&threshold), "threshold {threshold}");
    }

    OutcomeBatch::speculative(1.0, 50).record_into(&facade);
    assert_eq!(facade.confidence_threshold(), 0.50);
    OutcomeBatch::speculative(0.0, 50).record_into(&facade);
    assert_eq!(facade.confidence_threshold(), 0.95);
    Ok(())
}

#[tokio::test]
async fn test_plans_carry_tuned_threshold() -> anyhow::Result<()> {
    let facade = facade_with(DecisionConfig::default(), MockHardwareProbe::cpu(40.0), None)?;
    OutcomeBatch::speculative(0.95, 10).record_into(&facade);

    let tuned = facade.confidence_threshold();
    let plan = facade.decide(TaskRequirements::new(30)).await;
    assert_eq!(plan.confidence_threshold, tuned);
    assert_eq!(facade.current_config().confidence_threshold, tuned);
    Ok(())
}

#[test]
fn test_ledger_never_exceeds_capacity() {
    let mut ledger = HistoryLedger::new(100, 20);
    for i in 0..=100 {
        ledger.record(ExecutionOutcome::new(
            Strategy::EdgeOnly,
            0.0,
            i as f64,
            true,
        ));
        assert!(ledger.len() <= ledger.capacity());
    }
    assert_eq!(ledger.len(), 100);
    // Outcome 0 was evicted first
    assert_eq!(ledger.iter().next().map(|o| o.latency_ms), Some(1.0));
    assert_eq!(ledger.iter().last().map(|o| o.latency_ms), Some(100.0));
}

#[tokio::test]
async fn test_statistics_summary_reflects_activity() -> anyhow::Result<()> {
    let mut config = DecisionConfig::default();
    config.history.window_size = 20;
    let facade = facade_with(config, MockHardwareProbe::cpu(40.0), None)?;

    facade.decide(TaskRequirements::new(30)).await;
    facade.decide(TaskRequirements::new(2000)).await;
    OutcomeBatch::speculative(0.9, 15).record_into(&facade);
    OutcomeBatch::of(Strategy::EdgeOnly, 0.0, 25.0, 10).record_into(&facade);

    let summary = facade.statistics_summary();
    assert_eq!(summary.decisions.forced, 1);
    assert_eq!(summary.decisions.scored, 1);
    assert_eq!(summary.decisions.total(), 2);
    assert_eq!(summary.history.total_recorded, 25);
    assert_eq!(summary.history.window_len, 20);
    assert_eq!(summary.history.strategy_distribution[&Strategy::EdgeOnly], 10);
    assert_eq!(
        summary.history.strategy_distribution[&Strategy::SpeculativeStandard],
        10
    );
    assert!(summary.history.confidence.is_some());

    let json = serde_json::to_value(&summary)?;
    assert!(json["history"]["strategy_distribution"]["edge_only"].is_number());

    let effective = facade.current_config();
    assert_eq!(effective.outcomes_recorded, 25);
    assert_eq!(effective.config.history.window_size, 20);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_decisions_and_outcomes() -> anyhow::Result<()> {
    let facade = std::sync::Arc::new(facade_with(
        DecisionConfig::default(),
        MockHardwareProbe::cpu(40.0),
        None,
    )?);

    let mut handles = Vec::new();
    for worker in 0..8u32 {
        let facade = facade.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..50u32 {
                let slo = 100 + u64::from((worker * 50 + i) % 1900);
                let plan = facade.decide(TaskRequirements::new(slo)).await;
                let acceptance = if worker % 2 == 0 { 0.95 } else { 0.55 };
                facade.record_outcome(
                    ExecutionOutcome::new(plan.strategy, acceptance, 90.0, true)
                        .with_confidence(plan.confidence_threshold),
                );
                let threshold = facade.confidence_threshold();
                assert!((0.50..=0.95).contains(&threshold));
            }
        }));
    }
    for handle in handles {
        handle.await?;
    }

    let summary = facade.statistics_summary();
    assert_eq!(summary.history.total_recorded, 400);
    assert_eq!(summary.history.window_len, 100);
    assert_eq!(summary.decisions.total(), 400);
    Ok(())
}
