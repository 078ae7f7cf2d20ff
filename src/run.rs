use eyre::Result;

use crate::{
    config::FlushConfig,
    error::FlushError,
    fees::{self, FeeEstimate},
    relay::Relay,
    select,
    store,
    submit::{self, SubmitOutcome},
    types::UserOperation,
    windows::{now_unix, WindowLedger},
};

/// What a single flush pass did. `main` turns this into the final log line
/// and the process exit code.
#[derive(Debug)]
pub enum RunOutcome {
    /// Nothing was submitted: the queue was empty or every entry was
    /// retained or dropped.
    Noop,
    /// Dry-run: what a real run would have submitted.
    DryRun { would_send: usize },
    /// The relay accepted a batch.
    Sent { receipt: String, attempts: u32 },
}

#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub sent: usize,
    pub retained: usize,
    pub dropped: usize,
}

/// One flush pass: load the queue, partition it, backfill fees, submit the
/// batch, persist the retained set and the window ledger.
///
/// Persistence discipline: nothing is written until the batch is accepted
/// (or until a drop-only pass needs its removals recorded). A run that fails
/// in estimation or exhausts its retries leaves the queue store exactly as
/// it found it.
pub async fn run<R: Relay>(cfg: &FlushConfig, relay: &R) -> Result<RunReport> {
    let queue = store::load(&cfg.queue_file)?;
    if queue.is_empty() {
        tracing::info!(queue = %cfg.queue_file.display(), "queue is empty; nothing to do");
        return Ok(RunReport {
            outcome: RunOutcome::Noop,
            sent: 0,
            retained: 0,
            dropped: 0,
        });
    }

    let mut ledger = WindowLedger::load(&cfg.window_file)?;
    let now = now_unix();

    let queued = queue.len();
    let selection = select::select(
        queue,
        &cfg.policy,
        &ledger,
        cfg.max_per_target,
        cfg.window_secs,
        now,
    );
    tracing::info!(
        queued,
        admitted = selection.to_send.len(),
        retained = selection.retained.len(),
        dropped = selection.dropped,
        "queue partitioned"
    );

    if selection.to_send.is_empty() {
        // Dropped entries are removed for good even when no batch goes out;
        // a pass that dropped nothing leaves the store byte-identical.
        if selection.dropped > 0 && !cfg.dry_run {
            store::save(&cfg.queue_file, &selection.retained)?;
        }
        return Ok(RunReport {
            outcome: RunOutcome::Noop,
            sent: 0,
            retained: selection.retained.len(),
            dropped: selection.dropped,
        });
    }

    let mut ops: Vec<UserOperation> = selection.to_send.iter().map(|e| e.op.clone()).collect();

    if fees::any_needs_backfill(&ops) {
        let base = relay
            .gas_price()
            .await
            .map_err(|e| FlushError::Estimation(format!("{e:#}")))?;
        let estimate = FeeEstimate::from_base_fee(base);
        let touched = fees::backfill(&mut ops, estimate);
        tracing::info!(
            base_fee = %base,
            max_fee = %estimate.max_fee_per_gas,
            priority_fee = %estimate.max_priority_fee_per_gas,
            ops = touched,
            "backfilled unset fees"
        );
    }

    if cfg.dry_run {
        tracing::info!(
            would_send = ops.len(),
            "dry run; skipping submission and persistence"
        );
        return Ok(RunReport {
            outcome: RunOutcome::DryRun {
                would_send: ops.len(),
            },
            sent: 0,
            retained: selection.retained.len(),
            dropped: selection.dropped,
        });
    }

    match submit::submit_with_retries(relay, &ops, cfg.entrypoint).await {
        SubmitOutcome::Sent { receipt, attempts } => {
            store::save(&cfg.queue_file, &selection.retained)?;
            for entry in &selection.to_send {
                ledger.record_sent(&entry.target, 1, now, cfg.window_secs);
            }
            ledger.prune_elapsed(now, cfg.window_secs);
            ledger.save(&cfg.window_file)?;

            Ok(RunReport {
                outcome: RunOutcome::Sent { receipt, attempts },
                sent: selection.to_send.len(),
                retained: selection.retained.len(),
                dropped: selection.dropped,
            })
        }
        SubmitOutcome::Exhausted {
            attempts,
            last_error,
        } => Err(FlushError::RetriesExhausted {
            attempts,
            last_error,
        }
        .into()),
    }
}
