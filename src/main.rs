use anyhow::Context;
use clap::Parser;

use claims_metrics::catalog::CATALOG;
use claims_metrics::cli::{self, QueryArgs};
use claims_metrics::{MetricService, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    match args.cmd {
        cli::Command::Serve(cmd) => server::run(cmd).await.context("serve failed"),
        cli::Command::Query(cmd) => tokio::task::spawn_blocking(move || run_query(cmd))
            .await?
            .context("query failed"),
        cli::Command::Metrics => {
            println!("{}", serde_json::to_string_pretty(CATALOG)?);
            Ok(())
        }
    }
}

fn run_query(cmd: QueryArgs) -> anyhow::Result<()> {
    let svc = MetricService::open(&cmd.db.to_config())
        .with_context(|| format!("open database {}", cmd.db.database))?;
    let inputs: Vec<&str> = cmd.inputs.iter().map(String::as_str).collect();
    let result = svc.run(&cmd.metric, &inputs)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
