use anyhow::Context;
use clap::Parser;
use dataflow_accumulators::app::{handle_fatal_error, initialize_app, AppConfig};
use dataflow_accumulators::cli::{Cli, Commands, LineStatsPlan};
use dataflow_accumulators::{JobConfig, KindRegistry, LocalJobExecutor};
use std::path::Path;
use tracing::{debug, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    if let Err(e) = run(cli).await {
        handle_fatal_error(e, verbose);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run {
            input,
            tasks,
            config,
            fail_first_attempt,
            pretty,
        } => {
            let app = AppConfig::new(cli.verbose).with_job_config(config);
            let mut job = initialize_app(&app).await?;
            if let Some(tasks) = tasks {
                job.parallelism = tasks;
            }
            run_line_stats(&input, job, fail_first_attempt, pretty).await
        }
        Commands::Kinds => {
            for kind in KindRegistry::with_builtins().kinds() {
                println!("{kind}");
            }
            Ok(())
        }
    }
}

async fn run_line_stats(
    input: &Path,
    job: JobConfig,
    fail_first_attempt: Vec<u32>,
    pretty: bool,
) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read input file {}", input.display()))?;

    let plan = LineStatsPlan::new(&text, job.parallelism)
        .with_failing_first_attempts(fail_first_attempt);
    debug!("Loaded {} lines from {}", plan.line_count(), input.display());

    let executor = LocalJobExecutor::new(job, KindRegistry::with_builtins())?;
    let outcome = executor
        .execute(move |task_id| Box::new(plan.task(task_id)))
        .await?;

    let result = outcome.accumulator_results()?;
    info!("{} finalized with {} accumulators", result.job_id(), result.len());

    let json = if pretty {
        serde_json::to_string_pretty(&result.to_json())?
    } else {
        serde_json::to_string(&result.to_json())?
    };
    println!("{json}");
    Ok(())
}
