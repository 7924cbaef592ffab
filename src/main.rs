use clap::Parser;
use log::{error, info};
use rowflow::config::MigrationConfig;
use rowflow::query::QueryBuilder;
use rowflow::runner;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(
    name = "rowflow",
    version,
    about = "Declarative batched table-to-table data migration for PostgreSQL"
)]
struct Args {
    /// Path to the migration configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match MigrationConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested, stopping before the next batch");
            signal_cancel.cancel();
        }
    });

    let builder = QueryBuilder::default();
    let outcomes = runner::run_jobs(&config.jobs, &builder, &cancel).await;

    let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
    info!(
        "{} job(s) succeeded, {} failed",
        outcomes.len() - failed,
        failed
    );

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
