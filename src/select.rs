use ethers::types::Address;
use std::collections::BTreeMap;

use crate::{policy::Policy, types::QueueEntry, windows::WindowLedger};

/// One run's partition of the queue. Every input entry lands in exactly one
/// bucket.
#[derive(Debug, Default)]
pub struct Selection {
    /// Admitted entries in queue order; these form the batch.
    pub to_send: Vec<QueueEntry>,
    /// Rate-limited or blocked-target entries in queue order; kept for a
    /// later run, never validated this run.
    pub retained: Vec<QueueEntry>,
    /// Entries dropped for policy violations. Terminal; the reasons were
    /// logged as each one dropped.
    pub dropped: usize,
}

#[derive(Clone, Copy)]
enum Verdict {
    Send,
    Retain,
    Drop,
}

/// Partitions the queue for submission.
///
/// Entries are grouped per target address. Each target gets
/// `cap - sent_in_window` admission slots this run; the first that many
/// entries of the group (queue order) are candidates and the rest are
/// retained as rate-limited. Candidacy is positional: a candidate that drops
/// does not free its slot for a retained entry. Blocked targets retain their
/// whole group, since a block can be lifted later. Candidates that fail
/// policy validation are dropped for good.
pub fn select(
    entries: Vec<QueueEntry>,
    policy: &Policy,
    ledger: &WindowLedger,
    cap: u64,
    window_secs: u64,
    now: u64,
) -> Selection {
    let mut verdicts = vec![Verdict::Retain; entries.len()];

    let mut groups: BTreeMap<Address, Vec<usize>> = BTreeMap::new();
    for (idx, entry) in entries.iter().enumerate() {
        groups.entry(entry.target).or_default().push(idx);
    }

    for (target, indices) in &groups {
        if policy.is_blocked(target) {
            tracing::info!(
                target_addr = ?target,
                entries = indices.len(),
                "target is blocked; retaining its entries"
            );
            continue;
        }

        let already = ledger.sent_in_window(target, now, window_secs);
        let allowed = cap.saturating_sub(already);
        if (indices.len() as u64) > allowed {
            tracing::info!(
                target_addr = ?target,
                entries = indices.len(),
                allowed,
                already_sent = already,
                "rate window limits admissions for target"
            );
        }

        for (pos, &idx) in indices.iter().enumerate() {
            if (pos as u64) >= allowed {
                // Already initialized to Retain.
                continue;
            }
            let entry = &entries[idx];
            let reasons = policy.validate(&entry.op);
            if reasons.is_empty() {
                verdicts[idx] = Verdict::Send;
            } else {
                tracing::warn!(
                    session = %entry.session_id,
                    target_addr = ?target,
                    reasons = ?reasons,
                    "dropping operation rejected by policy"
                );
                verdicts[idx] = Verdict::Drop;
            }
        }
    }

    let mut selection = Selection::default();
    for (entry, verdict) in entries.into_iter().zip(verdicts) {
        match verdict {
            Verdict::Send => selection.to_send.push(entry),
            Verdict::Retain => selection.retained.push(entry),
            Verdict::Drop => selection.dropped += 1,
        }
    }
    selection
}
