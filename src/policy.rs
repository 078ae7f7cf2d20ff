use ethers::types::{Address, U256};
use eyre::{eyre, Result};
use serde::Deserialize;
use std::{collections::BTreeSet, fs, path::Path};

use crate::types::UserOperation;

const DEFAULT_MAX_CALL_GAS: u64 = 5_000_000;
const DEFAULT_MAX_FEE_GWEI: u64 = 1_000;
const DEFAULT_MAX_PRIORITY_FEE_GWEI: u64 = 100;

const WEI_PER_GWEI: u64 = 1_000_000_000;

/// On-disk policy artifact (JSON, camelCase). Fee ceilings are written in
/// gwei for the operator's sake and converted to wei on load.
///
/// We intentionally keep this loose: extra fields are ignored, missing fields
/// take the defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyArtifact {
    #[serde(default)]
    pub blocked_targets: Vec<Address>,
    #[serde(default)]
    pub max_call_gas: Option<u64>,
    #[serde(default)]
    pub max_fee_gwei: Option<u64>,
    #[serde(default)]
    pub max_priority_fee_gwei: Option<u64>,
}

/// Admission policy, immutable for the duration of a run.
///
/// Ceilings are wei-denominated `U256`, so every check is an integer
/// comparison against the operation's parsed quantities. Address parsing
/// already canonicalizes case, so the blocked set compares case-insensitively.
#[derive(Debug, Clone)]
pub struct Policy {
    pub blocked_targets: BTreeSet<Address>,
    pub max_call_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            blocked_targets: BTreeSet::new(),
            max_call_gas: U256::from(DEFAULT_MAX_CALL_GAS),
            max_fee_per_gas: gwei_to_wei(DEFAULT_MAX_FEE_GWEI),
            max_priority_fee_per_gas: gwei_to_wei(DEFAULT_MAX_PRIORITY_FEE_GWEI),
        }
    }
}

impl Policy {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| eyre!("failed to read policy artifact {}: {e}", path.display()))?;
        let art: PolicyArtifact = serde_json::from_str(&raw)
            .map_err(|e| eyre!("failed to parse policy artifact {}: {e}", path.display()))?;
        Ok(Self::from_artifact(art))
    }

    pub fn from_artifact(art: PolicyArtifact) -> Self {
        let defaults = Self::default();
        Self {
            blocked_targets: art.blocked_targets.into_iter().collect(),
            max_call_gas: art
                .max_call_gas
                .map(U256::from)
                .unwrap_or(defaults.max_call_gas),
            max_fee_per_gas: art
                .max_fee_gwei
                .map(gwei_to_wei)
                .unwrap_or(defaults.max_fee_per_gas),
            max_priority_fee_per_gas: art
                .max_priority_fee_gwei
                .map(gwei_to_wei)
                .unwrap_or(defaults.max_priority_fee_per_gas),
        }
    }

    pub fn is_blocked(&self, target: &Address) -> bool {
        self.blocked_targets.contains(target)
    }

    /// Checks one operation against the policy and returns every violation
    /// found, not just the first. An empty vector means admitted.
    ///
    /// Blocked-target and rate-limit handling are the selector's business;
    /// a violation here is terminal for the entry.
    pub fn validate(&self, op: &UserOperation) -> Vec<String> {
        let mut reasons = Vec::new();

        if op.call_gas_limit > self.max_call_gas {
            reasons.push(format!(
                "callGasLimit {} exceeds maximum {}",
                op.call_gas_limit, self.max_call_gas
            ));
        }
        if op.max_fee_per_gas > self.max_fee_per_gas {
            reasons.push(format!(
                "maxFeePerGas {} exceeds maximum {} wei",
                op.max_fee_per_gas, self.max_fee_per_gas
            ));
        }
        if op.max_priority_fee_per_gas > self.max_priority_fee_per_gas {
            reasons.push(format!(
                "maxPriorityFeePerGas {} exceeds maximum {} wei",
                op.max_priority_fee_per_gas, self.max_priority_fee_per_gas
            ));
        }
        if !op.init_code.is_empty() && op.signature.is_empty() {
            reasons.push("initCode present with empty signature (unsigned deployment)".to_string());
        }

        reasons
    }
}

fn gwei_to_wei(gwei: u64) -> U256 {
    U256::from(gwei) * U256::from(WEI_PER_GWEI)
}
