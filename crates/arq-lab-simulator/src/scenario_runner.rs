use crate::engine::ProtocolEngine;
use crate::error::EngineError;
use crate::trace::SimulationReport;
use anyhow::{Context, anyhow};
use arq_lab_abstract::{ProtocolEvent, RunConfig, TestAction, TestAssertion, TestScenario};
use std::fs;
use std::path::Path;
use tracing::info;

/// Simulated-time budget when a scenario sets no `max_duration`.
pub const DEFAULT_MAX_DURATION_MS: u64 = 600_000;

pub fn load_scenario(path: impl AsRef<Path>) -> anyhow::Result<TestScenario> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    parse_scenario(&content)
}

pub fn parse_scenario(content: &str) -> anyhow::Result<TestScenario> {
    toml::from_str(content).context("Failed to parse scenario")
}

pub fn run_scenario(scenario_path: impl AsRef<Path>) -> anyhow::Result<SimulationReport> {
    let scenario = load_scenario(scenario_path)?;
    run(&scenario, ProtocolEngine::new())
}

/// Runs `scenario` on `engine` and checks every assertion against the outcome.
pub fn run(scenario: &TestScenario, mut engine: ProtocolEngine) -> anyhow::Result<SimulationReport> {
    info!("Running Scenario: {}", scenario.name);
    info!("Description: {}", scenario.description);

    let mut config = RunConfig::default();
    scenario.config.apply_to(&mut config);

    for action in &scenario.actions {
        match action {
            TestAction::DropFrame { payload } => engine.add_drop_frame_once(payload.clone()),
            TestAction::DropAck { payload } => engine.add_drop_ack_once(payload.clone()),
        }
    }

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| {
            if let TestAssertion::MaxDuration { ms } = a {
                Some(*ms)
            } else {
                None
            }
        })
        .unwrap_or(DEFAULT_MAX_DURATION_MS);

    engine
        .start(config)
        .context("Scenario configuration rejected")?;

    engine
        .run_until_complete(max_duration)
        .map_err(|e| match e {
            EngineError::TimeLimitExceeded(ms) => anyhow!("Test timed out after {} ms", ms),
            other => other.into(),
        })?;

    let report = engine.export_report();
    let summary = report
        .summary
        .as_ref()
        .ok_or_else(|| anyhow!("Run stopped before every frame was acknowledged"))?;
    let stats = &summary.stats;

    for assertion in &scenario.assertions {
        match assertion {
            TestAssertion::AllDelivered => {
                if stats.successful_deliveries != summary.frame_count {
                    return Err(anyhow!(
                        "Assertion Failed: {} of {} frames delivered",
                        stats.successful_deliveries,
                        summary.frame_count
                    ));
                }
            }
            TestAssertion::SuccessfulDeliveries { count } => {
                if stats.successful_deliveries != *count {
                    return Err(anyhow!(
                        "Assertion Failed: {} successful deliveries, expected {}",
                        stats.successful_deliveries,
                        count
                    ));
                }
            }
            TestAssertion::TransmissionCount { min, max } => {
                check_range("transmissions", stats.total_transmissions, *min, *max)?;
            }
            TestAssertion::RetransmissionCount { min, max } => {
                check_range("retransmissions", stats.retransmissions, *min, *max)?;
            }
            TestAssertion::EventCount { event, min, max } => {
                let seen = report.count(event) as u32;
                check_range(event, seen, *min, *max)?;
            }
            TestAssertion::AckRejected { reason } => {
                let found = report.events.iter().any(|e| {
                    matches!(&e.event, ProtocolEvent::AckRejected { reason: r, .. } if r == reason)
                });
                if !found {
                    return Err(anyhow!(
                        "Assertion Failed: no ACK was rejected as {}",
                        reason
                    ));
                }
            }
            TestAssertion::MaxDuration { .. } => {} // Already checked
        }
    }

    info!("Test Scenario Passed!");
    Ok(report)
}

fn check_range(what: &str, value: u32, min: u32, max: Option<u32>) -> anyhow::Result<()> {
    if value < min {
        return Err(anyhow!(
            "Assertion Failed: {} {}, expected min {}",
            value,
            what,
            min
        ));
    }
    if let Some(max) = max
        && value > max
    {
        return Err(anyhow!(
            "Assertion Failed: {} {}, expected max {}",
            value,
            what,
            max
        ));
    }
    Ok(())
}
