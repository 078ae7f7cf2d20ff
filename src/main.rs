mod config;
mod error;
mod fees;
mod policy;
mod relay;
mod run;
mod select;
mod store;
mod submit;
mod types;
mod windows;

use clap::Parser;
use eyre::Result;
use std::path::PathBuf;

use config::FlushConfig;
use relay::RelayClient;
use run::RunOutcome;

#[derive(Parser, Debug)]
#[command(
    name = "opqueue",
    version,
    about = "Drains a queue of signed ERC-4337 user operations into relay batches"
)]
struct Args {
    /// Relay (bundler) JSON-RPC endpoint.
    #[arg(long, env = "OPQUEUE_RELAY_URL")]
    relay_url: String,

    /// EntryPoint contract address the batch is submitted under.
    #[arg(long, env = "OPQUEUE_ENTRYPOINT")]
    entrypoint: String,

    /// Queue store path (JSON array of pending operations).
    #[arg(long, default_value = "state/queue.json")]
    queue_file: PathBuf,

    /// Rate-window ledger path. Defaults to the queue file with a
    /// .windows.json suffix.
    #[arg(long)]
    window_file: Option<PathBuf>,

    /// Optional policy artifact JSON (blocked targets, gas and fee ceilings).
    #[arg(long, env = "OPQUEUE_POLICY")]
    policy: Option<PathBuf>,

    /// Max operations admitted per target within one rate window.
    #[arg(long, default_value_t = 20)]
    max_per_target: u64,

    /// Rate-window length in seconds.
    #[arg(long, default_value_t = 60)]
    window_seconds: u64,

    /// Don't submit anything; only report what would be sent.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        // Logs go to stderr so stdout stays free for script-friendly output.
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let cfg = FlushConfig::from_cli(
        args.relay_url,
        args.entrypoint,
        args.queue_file,
        args.window_file,
        args.policy,
        args.max_per_target,
        args.window_seconds,
        args.dry_run,
    )?;

    tracing::info!(
        relay = %cfg.relay_url,
        entrypoint = ?cfg.entrypoint,
        queue = %cfg.queue_file.display(),
        windows = %cfg.window_file.display(),
        max_per_target = cfg.max_per_target,
        window_secs = cfg.window_secs,
        dry_run = cfg.dry_run,
        "starting flush"
    );

    let relay = RelayClient::new(cfg.relay_url.clone());
    let report = run::run(&cfg, &relay).await?;

    match report.outcome {
        RunOutcome::Sent { receipt, attempts } => tracing::info!(
            receipt = %receipt,
            attempts,
            sent = report.sent,
            retained = report.retained,
            dropped = report.dropped,
            "flush complete"
        ),
        RunOutcome::DryRun { would_send } => tracing::info!(
            would_send,
            retained = report.retained,
            dropped = report.dropped,
            "dry run complete"
        ),
        RunOutcome::Noop => tracing::info!(
            retained = report.retained,
            dropped = report.dropped,
            "nothing to submit"
        ),
    }

    Ok(())
}
