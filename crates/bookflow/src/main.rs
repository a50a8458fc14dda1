use anyhow::Context;
use bookflow::app::{build_engine, serve_until};
use bookflow_core::config::BookflowConfig;
use bookflow_core::{RunId, RunType};
use bookflow_scheduler::RunStatus;
use bookflow_sink::{BookSink, SqliteSink};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

/// Fetch books from OpenLibrary and append them to a local `books` table.
#[derive(Parser, Debug)]
#[command(name = "bookflow")]
#[command(version)]
struct Cli {
    /// Path to bookflow.toml (default: ~/.bookflow/bookflow.toml)
    #[arg(short, long, env = "BOOKFLOW_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trigger one run now, with the configured retry policy.
    Run {
        /// Override the number of books requested.
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Run on the configured schedule until Ctrl-C.
    Serve,
    /// Create the destination table if it does not exist.
    InitDb,
    /// Show recent runs and their task attempts.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print the most recently loaded books as JSON.
    Books {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookflow=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = BookflowConfig::load(cli.config.as_deref()).context("loading config")?;

    match cli.command {
        Command::Run { limit } => {
            if let Some(limit) = limit {
                anyhow::ensure!(limit > 0, "--limit must be a positive integer");
                config.source.limit = limit;
            }
            let engine = build_engine(&config)?;
            let run = engine.trigger(RunType::Manual, Utc::now()).await?;
            println!("{}  {}", run.run_id, run.status);
            if run.status != RunStatus::Success {
                anyhow::bail!(
                    "run {} failed: {}",
                    run.run_id,
                    run.error.unwrap_or_default()
                );
            }
        }
        Command::Serve => {
            let engine = build_engine(&config)?;
            serve_until(engine, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("cannot listen for Ctrl-C: {e}");
                    std::future::pending::<()>().await;
                }
                info!("interrupt received");
            })
            .await?;
        }
        Command::InitDb => {
            let sink = SqliteSink::new(&config.database);
            sink.ensure_schema()?;
            println!("books table ready at {}", sink.path());
        }
        Command::History { limit } => {
            let engine = build_engine(&config)?;
            let history = engine.history();
            for run in history.list_runs(engine.dag_id(), limit)? {
                println!(
                    "{}  {:<7}  started {}  finished {}",
                    run.run_id,
                    run.status,
                    run.started_at,
                    run.finished_at.as_deref().unwrap_or("-")
                );
                if let Some(err) = &run.error {
                    println!("    error: {err}");
                }
                let run_id = RunId::from(run.run_id.as_str());
                for ti in history.task_instances(engine.dag_id(), &run_id)? {
                    println!(
                        "    {:<18} try {}  {}{}",
                        ti.task_id,
                        ti.try_number,
                        ti.state,
                        ti.error_code
                            .map(|c| format!("  [{c}]"))
                            .unwrap_or_default()
                    );
                }
            }
        }
        Command::Books { limit } => {
            let sink = SqliteSink::new(&config.database);
            let rows = sink.list_rows(limit)?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }

    Ok(())
}
