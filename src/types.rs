use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// ERC-4337 UserOperation (EntryPoint v0.6 layout).
///
/// Note: EntryPoint v0.7 uses a *different* packed struct layout.
///
/// Serialized with camelCase field names and 0x-prefixed hex quantities, which
/// is both the bundler wire format and the on-disk queue format. Numeric
/// fields deserialize into `U256`, so every comparison downstream is on
/// integers rather than on hex strings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

impl UserOperation {
    /// True when at least one of the two fee fields is unset (zero) and the
    /// fee estimator needs to fill it in before submission.
    pub fn needs_fee_backfill(&self) -> bool {
        self.max_fee_per_gas.is_zero() || self.max_priority_fee_per_gas.is_zero()
    }
}

/// One pending, already-signed operation in the queue store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub op: UserOperation,

    /// Destination contract the operation is aimed at. Grouping and the
    /// per-target rate window key off this address.
    pub target: Address,

    /// Free-form session label for diagnostics. May repeat across entries;
    /// entries are identified by their queue position, not by this.
    pub session_id: String,

    /// Unix seconds at enqueue time.
    #[serde(default)]
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "op": {
                "sender": "0x1111111111111111111111111111111111111111",
                "nonce": "0x5",
                "initCode": "0x",
                "callData": "0xb61d27f6",
                "callGasLimit": "0x249f0",
                "verificationGasLimit": "0x186a0",
                "preVerificationGas": "0xafc8",
                "maxFeePerGas": "0x10",
                "maxPriorityFeePerGas": "0x9",
                "paymasterAndData": "0x",
                "signature": "0xdeadbeef"
            },
            "target": "0x2222222222222222222222222222222222222222",
            "sessionId": "sess-1",
            "createdAt": 1700000000
        }"#
    }

    #[test]
    fn queue_entry_round_trips_camel_case_quantities() {
        let entry: QueueEntry = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(entry.op.nonce, U256::from(5));
        assert_eq!(entry.op.max_fee_per_gas, U256::from(16));
        assert_eq!(entry.op.max_priority_fee_per_gas, U256::from(9));
        assert!(entry.op.init_code.is_empty());
        assert_eq!(entry.session_id, "sess-1");
        assert_eq!(entry.created_at, 1_700_000_000);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["op"]["maxFeePerGas"], "0x10");
        assert_eq!(json["op"]["initCode"], "0x");
        assert_eq!(json["sessionId"], "sess-1");
        // Hex length says nothing about magnitude: 0x10 (16) > 0x9 (9) even
        // though "0x10" < "0x9" as strings.
        assert!(entry.op.max_fee_per_gas > entry.op.max_priority_fee_per_gas);
    }

    #[test]
    fn created_at_defaults_to_zero_when_absent() {
        let raw = r#"{
            "op": {
                "sender": "0x1111111111111111111111111111111111111111",
                "nonce": "0x0",
                "initCode": "0x",
                "callData": "0x",
                "callGasLimit": "0x0",
                "verificationGasLimit": "0x0",
                "preVerificationGas": "0x0",
                "maxFeePerGas": "0x0",
                "maxPriorityFeePerGas": "0x0",
                "paymasterAndData": "0x",
                "signature": "0x"
            },
            "target": "0x2222222222222222222222222222222222222222",
            "sessionId": "s"
        }"#;
        let entry: QueueEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.created_at, 0);
        assert!(entry.op.needs_fee_backfill());
    }

    #[test]
    fn needs_fee_backfill_checks_each_field() {
        let mut entry: QueueEntry = serde_json::from_str(sample_json()).unwrap();
        assert!(!entry.op.needs_fee_backfill());
        entry.op.max_priority_fee_per_gas = U256::zero();
        assert!(entry.op.needs_fee_backfill());
    }
}
