use ethers::types::Address;
use eyre::{eyre, Result};
use std::{path::PathBuf, str::FromStr};

use crate::policy::Policy;

#[derive(Debug, Clone)]
pub struct FlushConfig {
    pub relay_url: String,
    pub entrypoint: Address,

    pub queue_file: PathBuf,
    pub window_file: PathBuf,

    pub policy: Policy,

    /// Max operations admitted per target inside one rate window.
    pub max_per_target: u64,
    /// Rate-window length in seconds.
    pub window_secs: u64,

    pub dry_run: bool,
}

impl FlushConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn from_cli(
        relay_url: String,
        entrypoint: String,
        queue_file: PathBuf,
        window_file: Option<PathBuf>,
        policy_file: Option<PathBuf>,
        max_per_target: u64,
        window_seconds: u64,
        dry_run: bool,
    ) -> Result<Self> {
        let entrypoint = Address::from_str(&entrypoint)
            .map_err(|e| eyre!("invalid entrypoint address '{entrypoint}': {e}"))?;

        if max_per_target == 0 {
            return Err(eyre!("max per target must be > 0"));
        }

        if window_seconds == 0 {
            tracing::warn!("window length of 0 s would make every window stale; clamping to 1 s");
        }

        if relay_url.contains("alchemy.com/v2/") || relay_url.contains("infura.io/v3/") {
            tracing::warn!("relay URL looks like it may contain an API key; consider using OPQUEUE_RELAY_URL env instead of committing it.");
        }

        let policy = match policy_file {
            Some(path) => Policy::load(&path)?,
            None => Policy::default(),
        };

        // Ledger defaults to a sidecar of the queue: queue.json -> queue.windows.json.
        let window_file =
            window_file.unwrap_or_else(|| queue_file.with_extension("windows.json"));

        Ok(Self {
            relay_url,
            entrypoint,
            queue_file,
            window_file,
            policy,
            max_per_target,
            window_secs: window_seconds.max(1),
            dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRYPOINT: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";

    fn build(
        window_file: Option<PathBuf>,
        max_per_target: u64,
        window_seconds: u64,
    ) -> Result<FlushConfig> {
        FlushConfig::from_cli(
            "http://localhost:4337".to_string(),
            ENTRYPOINT.to_string(),
            PathBuf::from("state/queue.json"),
            window_file,
            None,
            max_per_target,
            window_seconds,
            false,
        )
    }

    #[test]
    fn assembles_with_defaults() {
        let cfg = build(None, 20, 60).unwrap();
        assert_eq!(cfg.max_per_target, 20);
        assert_eq!(cfg.window_secs, 60);
        assert!(!cfg.dry_run);
        assert!(cfg.policy.blocked_targets.is_empty());
    }

    #[test]
    fn window_file_defaults_to_queue_sidecar() {
        let cfg = build(None, 20, 60).unwrap();
        assert_eq!(cfg.window_file, PathBuf::from("state/queue.windows.json"));

        let explicit = build(Some(PathBuf::from("/tmp/w.json")), 20, 60).unwrap();
        assert_eq!(explicit.window_file, PathBuf::from("/tmp/w.json"));
    }

    #[test]
    fn zero_admission_cap_is_rejected() {
        assert!(build(None, 0, 60).is_err());
    }

    #[test]
    fn zero_window_is_clamped_to_one_second() {
        let cfg = build(None, 20, 0).unwrap();
        assert_eq!(cfg.window_secs, 1);
    }

    #[test]
    fn invalid_entrypoint_is_rejected() {
        let err = FlushConfig::from_cli(
            "http://localhost:4337".to_string(),
            "not-an-address".to_string(),
            PathBuf::from("queue.json"),
            None,
            None,
            20,
            60,
            false,
        );
        assert!(err.is_err());
    }
}
