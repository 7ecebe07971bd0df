//! Life Planner CLI
//!
//! Command-line interface for running scenario projections

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use life_planner::templates::DEFAULT_CONFIG_ROOT;
use life_planner::{ScenarioProjection, ScenarioRunner, ScenarioSummary};

#[derive(Parser)]
#[command(name = "life-planner")]
#[command(about = "Template-driven multi-year financial projections")]
#[command(version)]
struct Cli {
    /// Directory holding templates/, tax_systems/ and scenarios/
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_ROOT)]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project one scenario year by year
    Run {
        /// Scenario id, e.g. uk_to_seattle or examples/uk_home_purchase
        scenario: String,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run every scenario and print one summary line each
    Analyze,

    /// Resolve and validate a scenario without projecting it
    Validate {
        scenario: String,
    },
}

/// JSON document written by `run --json`
#[derive(Serialize)]
struct RunReport<'a> {
    generated_at: DateTime<Utc>,
    scenario_id: &'a str,
    summary: ScenarioSummary,
    projection: &'a ScenarioProjection,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let runner = ScenarioRunner::from_config_root(&cli.config_root);

    match cli.command {
        Commands::Run { scenario, json } => {
            let projection = runner
                .run(&scenario)
                .with_context(|| format!("failed to project scenario '{scenario}'"))?;
            if json {
                let report = RunReport {
                    generated_at: Utc::now(),
                    scenario_id: &scenario,
                    summary: projection.summary(),
                    projection: &projection,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_projection(&projection);
            }
        }
        Commands::Analyze => {
            let outcomes = runner
                .run_all()
                .with_context(|| format!("failed to list scenarios under {}", cli.config_root.display()))?;
            println!("{:<40} {:>6} {:>16} {:>14} {:>14} {:>10}",
                "Scenario", "Years", "Final NW", "Total Tax", "Avg Savings", "Growth %");
            println!("{}", "-".repeat(105));
            let mut failures = 0;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(projection) => {
                        let s = projection.summary();
                        println!("{:<40} {:>6} {:>16.0} {:>14.0} {:>14.0} {:>10.1}",
                            outcome.scenario_id, s.years, s.final_net_worth, s.total_tax,
                            s.average_annual_savings, s.net_worth_growth_rate);
                    }
                    Err(err) => {
                        failures += 1;
                        println!("{:<40} ERROR: {err}", outcome.scenario_id);
                    }
                }
            }
            println!("\n{} scenarios, {} failed", outcomes.len(), failures);
        }
        Commands::Validate { scenario } => {
            let config = runner
                .resolve(&scenario)
                .with_context(|| format!("scenario '{scenario}' is invalid"))?;
            println!("Scenario '{}' is valid", config.name());
            for phase in &config.phases {
                println!("  {:<20} plan-years {:>2}-{:<2} {} ({})",
                    phase.name, phase.start_plan_year, phase.end_plan_year,
                    phase.location_market, phase.jurisdiction());
            }
        }
    }
    Ok(())
}

fn print_projection(projection: &ScenarioProjection) {
    println!("Scenario: {}", projection.scenario_name);
    println!("{:>4} {:>5} {:>4} {:>4} {:>4} {:>12} {:>10} {:>12} {:>12} {:>14} {:>14}",
        "PY", "Year", "Age", "Jur", "Ccy", "Income", "Tax", "Expenses", "Savings", "Liquid", "Net Worth");
    println!("{}", "-".repeat(110));

    for p in &projection.data_points {
        println!("{:>4} {:>5} {:>4} {:>4} {:>4} {:>12.0} {:>10.0} {:>12.0} {:>12.0} {:>14.0} {:>14.0}",
            p.plan_year, p.year, p.age, p.jurisdiction.to_string(), p.currency.to_string(),
            p.income.total, p.tax.total, p.expenses.total, p.annual_savings(),
            p.net_worth.liquid_assets, p.net_worth.total);
    }

    let summary = projection.summary();
    println!("\nSummary ({}):", projection.base_currency);
    println!("  Years: {}", summary.years);
    println!("  Final Net Worth: {:.2}", summary.final_net_worth);
    println!("  Final Liquid Assets: {:.2}", summary.final_liquid_assets);
    println!("  Total Tax: {:.2}", summary.total_tax);
    println!("  Average Annual Savings: {:.2}", summary.average_annual_savings);
    println!("  Net Worth Growth: {:.1}%", summary.net_worth_growth_rate);
}
