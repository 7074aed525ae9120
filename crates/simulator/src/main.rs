use anyhow::Context;

use ballast_common::config::AppConfig;
use ballast_sim::{Scenario, Simulation};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ballast_sim=info,ballast_engine=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::from_env()?;
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.sim_scenario_path.clone());

    tracing::info!(path = %path, engine = %config.engine_address, "Loading scenario");

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read scenario {path}"))?;
    let scenario: Scenario =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse scenario {path}"))?;

    let report = Simulation::new(&scenario, &config)?.run(&scenario.steps)?;

    tracing::info!(
        scenario = %report.scenario,
        steps = report.steps.len(),
        failed = report.failed_steps(),
        solvent = ?report.solvent,
        "Scenario finished"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
