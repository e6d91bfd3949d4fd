use std::sync::Arc;

use tandem_decision::{
    ConstraintRule, DecisionConfig, DecisionContext, HardwareProbe, HardwareSample,
    MultiObjectiveScorer, NetworkProbe, NetworkSample, PlanSource, StatsView, Strategy,
    SystemSnapshot, TaskRequirements,
    config::ScoringWeights,
};
use tandem_testing::{FailingHardwareProbe, MockHardwareProbe, MockNetworkProbe, facade_with};

fn weight_sets() -> Vec<ScoringWeights> {
    vec![
        ScoringWeights::default(),
        ScoringWeights {
            latency: 1.0,
            cost: 0.0,
            quality: 0.0,
        },
        ScoringWeights {
            latency: 0.0,
            cost: 1.0,
            quality: 0.0,
        },
        ScoringWeights {
            latency: 0.0,
            cost: 0.0,
            quality: 5.0,
        },
    ]
}

fn config_with(weights: ScoringWeights) -> DecisionConfig {
    let mut config = DecisionConfig::default();
    config.scoring_weights = weights;
    config
}

#[tokio::test]
async fn test_cpu_overload_forces_cloud_for_any_weights() -> anyhow::Result<()> {
    for weights in weight_sets() {
        for hw in [HardwareSample::cpu(98.0, 4000.0), HardwareSample::cpu(30.0, 200.0)] {
            let facade = facade_with(config_with(weights), MockHardwareProbe::new(hw), None)?;
            for slo in [10, 200, 5000] {
                let plan = facade.decide(TaskRequirements::new(slo).with_privacy_level(2)).await;
                assert_eq!(plan.strategy, Strategy::CloudDirect, "weights {weights:?}, slo {slo}");
                assert!(plan.is_forced());
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_gpu_overload_forces_cloud() -> anyhow::Result<()> {
    let facade = facade_with(DecisionConfig::default(), MockHardwareProbe::cpu(10.0), None)?;
    let system = SystemSnapshot::new(HardwareSample::gpu(92.0, 10.0, 8000.0), None);
    let plan = facade.decide_with_snapshot(TaskRequirements::new(500), system);
    assert_eq!(plan.strategy, Strategy::CloudDirect);
    assert_eq!(
        plan.source,
        PlanSource::Forced {
            rule: ConstraintRule::ResourceOverload
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_ultra_low_latency_forces_edge() -> anyhow::Result<()> {
    for weights in weight_sets() {
        let facade = facade_with(config_with(weights), MockHardwareProbe::cpu(40.0), None)?;
        for slo in [0, 1, 25, 49] {
            for quality in [0.2, 0.8, 0.99] {
                let req = TaskRequirements::new(slo).with_min_quality(quality);
                let plan = facade.decide(req).await;
                assert_eq!(plan.strategy, Strategy::EdgeOnly, "slo {slo}");
                assert_eq!(
                    plan.source,
                    PlanSource::Forced {
                        rule: ConstraintRule::UltraLowLatency
                    }
                );
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_privacy_forces_edge_when_no_higher_rule_fires() -> anyhow::Result<()> {
    let facade = facade_with(DecisionConfig::default(), MockHardwareProbe::cpu(40.0), None)?;
    for slo in [50, 300, 10_000] {
        for quality in [0.5, 0.99] {
            let req = TaskRequirements::new(slo)
                .with_min_quality(quality)
                .with_privacy_level(2);
            let plan = facade.decide(req).await;
            assert_eq!(plan.strategy, Strategy::EdgeOnly);
            assert_eq!(
                plan.source,
                PlanSource::Forced {
                    rule: ConstraintRule::PrivacySensitive
                }
            );
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_decide_is_idempotent_without_outcomes() -> anyhow::Result<()> {
    let mut config = DecisionConfig::default();
    config.probes.hardware_ttl_ms = 60_000;
    config.probes.network_interval_ms = 60_000;

    let network = MockNetworkProbe::new(25.0, 0.0);
    let facade = facade_with(
        config,
        MockHardwareProbe::cpu(40.0),
        Some(network as Arc<dyn NetworkProbe>),
    )?;

    for req in [
        TaskRequirements::new(2000).with_min_quality(0.95),
        TaskRequirements::new(400).with_priority(2),
        TaskRequirements::new(150).with_min_quality(0.6),
    ] {
        let first = facade.decide(req).await;
        let second = facade.decide(req).await;
        assert_eq!(first, second);

        let system = SystemSnapshot::new(HardwareSample::cpu(55.0, 3000.0), None);
        let a = facade.decide_with_snapshot(req, system.clone());
        let b = facade.decide_with_snapshot(req, system);
        assert_eq!(a, b);
    }
    Ok(())
}

#[tokio::test]
async fn test_scenario_overload_cites_overload() -> anyhow::Result<()> {
    let facade = facade_with(
        DecisionConfig::default(),
        MockHardwareProbe::new(HardwareSample::cpu(98.0, 4000.0)),
        None,
    )?;
    let req = TaskRequirements::new(200)
        .with_min_quality(0.8)
        .with_priority(1);
    let plan = facade.decide(req).await;
    assert_eq!(plan.strategy, Strategy::CloudDirect);
    assert!(plan.reason.contains("overload"), "reason: {}", plan.reason);
    Ok(())
}

#[tokio::test]
async fn test_scenario_ultra_low_latency_cites_latency() -> anyhow::Result<()> {
    let facade = facade_with(
        DecisionConfig::default(),
        MockHardwareProbe::new(HardwareSample::cpu(40.0, 4000.0)),
        None,
    )?;
    let plan = facade.decide(TaskRequirements::new(30)).await;
    assert_eq!(plan.strategy, Strategy::EdgeOnly);
    assert!(plan.reason.contains("ultra-low latency"), "reason: {}", plan.reason);
    Ok(())
}

#[tokio::test]
async fn test_scenario_unconstrained_picks_highest_score() -> anyhow::Result<()> {
    let config = DecisionConfig::default();
    let facade = facade_with(config.clone(), MockHardwareProbe::cpu(40.0), None)?;

    let req = TaskRequirements::new(2000).with_min_quality(0.95);
    let system = SystemSnapshot::new(HardwareSample::cpu(40.0, 4000.0), None);
    let plan = facade.decide_with_snapshot(req, system.clone());

    let ctx = DecisionContext {
        requirements: req,
        system,
        confidence_threshold: facade.confidence_threshold(),
    };
    let ranking = MultiObjectiveScorer::from_config(&config).score(&ctx, &StatsView::default())?;
    let best = ranking[0];

    assert_eq!(plan.source, PlanSource::Scored);
    assert_eq!(plan.strategy, best.strategy);
    assert_eq!(plan.score, best.total_score);
    assert!(
        ranking[1..]
            .iter()
            .all(|r| r.total_score < best.total_score
                || (r.total_score == best.total_score && r.strategy > best.strategy))
    );
    Ok(())
}

#[tokio::test]
async fn test_failing_hardware_probe_still_plans() -> anyhow::Result<()> {
    let facade = facade_with(
        DecisionConfig::default(),
        Arc::new(FailingHardwareProbe) as Arc<dyn HardwareProbe>,
        Some(MockNetworkProbe::failing() as Arc<dyn NetworkProbe>),
    )?;
    let plan = facade.decide(TaskRequirements::new(800)).await;
    assert_eq!(plan.source, PlanSource::Scored);
    assert!(plan.timeout_ms > 0);
    Ok(())
}

#[tokio::test]
async fn test_weak_network_forces_edge() -> anyhow::Result<()> {
    let network = MockNetworkProbe::new(350.0, 0.0);
    let facade = facade_with(
        DecisionConfig::default(),
        MockHardwareProbe::cpu(40.0),
        Some(network.clone() as Arc<dyn NetworkProbe>),
    )?;
    let plan = facade.decide(TaskRequirements::new(2000)).await;
    assert_eq!(plan.strategy, Strategy::EdgeOnly);
    assert_eq!(
        plan.source,
        PlanSource::Forced {
            rule: ConstraintRule::WeakNetwork
        }
    );
    assert_eq!(network.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_unknown_network_neither_forces_nor_penalizes() -> anyhow::Result<()> {
    let failing = facade_with(
        DecisionConfig::default(),
        MockHardwareProbe::cpu(40.0),
        Some(MockNetworkProbe::failing() as Arc<dyn NetworkProbe>),
    )?;
    let disabled = facade_with(DecisionConfig::default(), MockHardwareProbe::cpu(40.0), None)?;

    let req = TaskRequirements::new(1000).with_priority(2);
    let a = failing.decide(req).await;
    let b = disabled.decide(req).await;
    assert_eq!(a.source, PlanSource::Scored);
    assert_eq!(a.strategy, b.strategy);
    assert_eq!(a.score, b.score);
    Ok(())
}

#[test]
fn test_rtt_lowers_cloud_scores() {
    let config = DecisionConfig::default();
    let scorer = MultiObjectiveScorer::from_config(&config);
    let req = TaskRequirements::new(1000);
    let ctx = |rtt: Option<f64>| DecisionContext {
        requirements: req,
        system: SystemSnapshot::new(
            HardwareSample::cpu(40.0, 4000.0),
            rtt.map(|rtt_ms| NetworkSample {
                rtt_ms,
                packet_loss_ratio: 0.0,
            }),
        ),
        confidence_threshold: 0.8,
    };

    let view = StatsView::default();
    let near = scorer.score_strategy(Strategy::CloudDirect, &ctx(Some(10.0)), &view);
    let far = scorer.score_strategy(Strategy::CloudDirect, &ctx(Some(150.0)), &view);
    assert!(far.total_score < near.total_score);

    let edge_near = scorer.score_strategy(Strategy::EdgeOnly, &ctx(Some(10.0)), &view);
    let edge_far = scorer.score_strategy(Strategy::EdgeOnly, &ctx(Some(150.0)), &view);
    assert_eq!(edge_near.total_score, edge_far.total_score);
}

#[tokio::test]
async fn test_hardware_changes_visible_after_ttl() -> anyhow::Result<()> {
    let mut config = DecisionConfig::default();
    config.probes.hardware_ttl_ms = 10;
    let hardware = MockHardwareProbe::cpu(40.0);
    let facade = facade_with(config, hardware.clone(), None)?;

    let req = TaskRequirements::new(500);
    assert!(!facade.decide(req).await.is_forced());

    hardware.set(HardwareSample::cpu(99.0, 4000.0));
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    let plan = facade.decide(req).await;
    assert_eq!(plan.strategy, Strategy::CloudDirect);
    assert!(hardware.calls() >= 2);
    Ok(())
}
