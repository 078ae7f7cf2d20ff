use ethers::types::U256;

use crate::types::UserOperation;

/// Fee parameters derived from the relay's current base fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

impl FeeEstimate {
    /// `maxFeePerGas = 2 * base`, `maxPriorityFeePerGas = base / 10`
    /// (integer division, so a base below 10 wei yields a zero tip).
    pub fn from_base_fee(base: U256) -> Self {
        Self {
            max_fee_per_gas: base * U256::from(2u64),
            max_priority_fee_per_gas: base / U256::from(10u64),
        }
    }
}

/// True when any admitted operation still has a zero fee field, i.e. the run
/// must query the relay for a base fee before submitting.
pub fn any_needs_backfill(ops: &[UserOperation]) -> bool {
    ops.iter().any(UserOperation::needs_fee_backfill)
}

/// Fills zero fee fields from the estimate. The two fields are treated
/// independently and a non-zero value is never overwritten. Returns how many
/// operations were touched.
pub fn backfill(ops: &mut [UserOperation], estimate: FeeEstimate) -> usize {
    let mut touched = 0;
    for op in ops.iter_mut() {
        let mut changed = false;
        if op.max_fee_per_gas.is_zero() {
            op.max_fee_per_gas = estimate.max_fee_per_gas;
            changed = true;
        }
        if op.max_priority_fee_per_gas.is_zero() {
            op.max_priority_fee_per_gas = estimate.max_priority_fee_per_gas;
            changed = true;
        }
        if changed {
            touched += 1;
        }
    }
    touched
}
