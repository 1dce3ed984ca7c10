use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use tripflow_rs::flow::{InMemoryCheckpointStore, InterruptPayload, Resume, RunStatus};
use tripflow_rs::trip::{build_planner, server, AppConfig, TripState, TripUpdate};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port to listen on (overrides configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Plan a trip in the terminal, answering each approval prompt
    Plan {
        /// Trip request in plain language
        #[arg(short, long)]
        input: String,

        /// Approve every checkpoint without prompting
        #[arg(long)]
        auto: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;

    let store = Arc::new(InMemoryCheckpointStore::new());

    match args.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let planner = Arc::new(build_planner(&config, store)?);
            server::serve(&config, planner)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        Commands::Plan { input, auto } => {
            let planner = build_planner(&config, store)?;
            let mut report = planner.create_run(TripUpdate::from_input(input)).await?;
            println!("Run: {}", report.run_id);

            let mut stdin = BufReader::new(tokio::io::stdin()).lines();
            while report.status == RunStatus::AwaitingApproval {
                let Some(payload) = report.interrupt.as_ref() else {
                    break;
                };
                print_interrupt(payload)?;

                let resume = if auto {
                    println!("> auto-approved");
                    Resume::approve()
                } else {
                    println!("Approve with 'y' (or Enter), or paste a JSON override:");
                    let line = stdin.next_line().await?.unwrap_or_default();
                    parse_answer(&line)
                };
                report = planner.resume_run(&report.run_id, resume).await?;
            }

            match report.status {
                RunStatus::Complete => print_summary(&report.state),
                status => {
                    anyhow::bail!(
                        "run ended with status {}: {}",
                        status,
                        report.error.unwrap_or_default()
                    )
                }
            }
        }
    }

    Ok(())
}

/// Empty input or y/yes approves; valid JSON is passed through as an override
fn parse_answer(line: &str) -> Resume {
    let line = line.trim();
    if line.is_empty() || line.eq_ignore_ascii_case("y") || line.eq_ignore_ascii_case("yes") {
        return Resume::approve();
    }
    match serde_json::from_str::<Value>(line) {
        Ok(value) => Resume::new(value),
        Err(_) => Resume::new(Value::String(line.to_string())),
    }
}

fn print_interrupt(payload: &InterruptPayload) -> anyhow::Result<()> {
    println!();
    println!("== {} ==", payload.message);
    println!("{}", serde_json::to_string_pretty(&payload.data)?);
    Ok(())
}

fn print_summary(state: &TripState) {
    println!();
    println!("== Trip plan ==");
    if let Some(budget) = &state.approved_budget {
        println!(
            "Budget ({}): transport {}, stay {}, food {}, activities {}, buffer {}",
            budget.currency,
            budget.transport,
            budget.stay,
            budget.food,
            budget.activities,
            budget.buffer
        );
    }
    for day in &state.day_by_day_itinerary {
        println!("Day {}{}", day.day, day.date.as_deref().map(|d| format!(" ({})", d)).unwrap_or_default());
        for item in &day.items {
            println!("  {} {}", item.time.as_deref().unwrap_or("--:--"), item.title);
        }
    }
    println!("Bookings:");
    for option in &state.booking_options {
        let price = option
            .price
            .map(|p| format!("{} {}", p, option.currency))
            .unwrap_or_else(|| "n/a".to_string());
        println!("  [{}] {} - {}", option.kind, option.label, price);
    }
    if let Some(error) = &state.error_message {
        println!("Note: {}", error);
    }
}
