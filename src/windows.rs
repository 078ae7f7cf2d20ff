use ethers::types::Address;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Counter for one target inside the current rate window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowEntry {
    pub sent: u64,
    pub window_start: u64,
}

/// Durable per-target rate-window ledger.
///
/// Persisted next to the queue store so the per-target admission cap holds
/// across process restarts, not just within one run. Keys are canonical
/// lowercase `0x…` target addresses, which also makes target comparison
/// case-insensitive at the store level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowLedger {
    #[serde(default)]
    pub targets: BTreeMap<String, WindowEntry>,
}

impl WindowLedger {
    /// Loads the ledger, treating an absent file as a fresh one. Unlike the
    /// queue store there is nothing to salvage here, but a parse failure is
    /// still surfaced rather than silently resetting every window.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .map_err(|e| eyre!("failed to read window ledger {}: {e}", path.display()))?;
        serde_json::from_str(&raw)
            .map_err(|e| eyre!("failed to parse window ledger {}: {e}", path.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                eyre!("failed to create ledger directory {}: {e}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| eyre!("failed to serialize window ledger: {e}"))?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .map_err(|e| eyre!("failed to write temp ledger file {}: {e}", tmp_path.display()))?;

        if let Err(err) = fs::rename(&tmp_path, path) {
            if cfg!(windows) {
                let _ = fs::remove_file(path);
                fs::rename(&tmp_path, path)
                    .map_err(|e| eyre!("failed to replace ledger file {}: {e}", path.display()))?;
            } else {
                return Err(eyre!(
                    "failed to replace ledger file {}: {err}",
                    path.display()
                ));
            }
        }
        Ok(())
    }

    pub fn key(target: &Address) -> String {
        format!("{target:#x}")
    }

    /// How many operations were already sent to `target` in the window that
    /// contains `now`. An elapsed window counts as zero.
    pub fn sent_in_window(&self, target: &Address, now: u64, window_secs: u64) -> u64 {
        match self.targets.get(&Self::key(target)) {
            Some(w) if now.saturating_sub(w.window_start) < window_secs => w.sent,
            _ => 0,
        }
    }

    /// Records `count` sends to `target`. Starts a fresh window at `now` when
    /// the previous one has elapsed, otherwise accumulates into it.
    pub fn record_sent(&mut self, target: &Address, count: u64, now: u64, window_secs: u64) {
        let entry = self
            .targets
            .entry(Self::key(target))
            .or_insert(WindowEntry {
                sent: 0,
                window_start: now,
            });
        if now.saturating_sub(entry.window_start) >= window_secs {
            entry.sent = 0;
            entry.window_start = now;
        }
        entry.sent = entry.sent.saturating_add(count);
    }

    /// Drops counters whose window has elapsed. Keeps the persisted file from
    /// growing with every target ever seen.
    pub fn prune_elapsed(&mut self, now: u64, window_secs: u64) {
        self.targets
            .retain(|_, w| now.saturating_sub(w.window_start) < window_secs);
    }
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}
