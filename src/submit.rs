use ethers::types::Address;
use std::time::Duration;

use crate::relay::Relay;
use crate::types::UserOperation;

pub const MAX_ATTEMPTS: u32 = 5;
const BACKOFF_CAP_SECS: u64 = 60;

/// Terminal outcome of the submission pipeline. Exhaustion is a normal value
/// here; the caller decides that it is fatal for the run.
#[derive(Debug)]
pub enum SubmitOutcome {
    Sent { receipt: String, attempts: u32 },
    Exhausted { attempts: u32, last_error: String },
}

/// Delay after failed attempt `attempt` (1-based): `2^attempt` seconds,
/// hard-capped at 60. The five attempts are therefore separated by
/// 2, 4, 8 and 16 seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.min(63);
    Duration::from_secs((1u64 << exp).min(BACKOFF_CAP_SECS))
}

/// Sends the batch, retrying on any relay error with capped exponential
/// backoff. Individual failures are logged and retried; only full exhaustion
/// surfaces to the caller. The run makes no other progress while a backoff
/// sleep is pending.
pub async fn submit_with_retries<R: Relay + ?Sized>(
    relay: &R,
    ops: &[UserOperation],
    entrypoint: Address,
) -> SubmitOutcome {
    let mut last_error = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        match relay.send_bundle(ops, entrypoint).await {
            Ok(receipt) => {
                if attempt > 1 {
                    tracing::info!(attempt, "bundle accepted after retry");
                }
                return SubmitOutcome::Sent { receipt, attempts: attempt };
            }
            Err(err) => {
                last_error = format!("{err:#}");
                if attempt == MAX_ATTEMPTS {
                    break;
                }
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = MAX_ATTEMPTS,
                    sleep_s = delay.as_secs(),
                    error = %err,
                    "bundle submission failed; backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    SubmitOutcome::Exhausted {
        attempts: MAX_ATTEMPTS,
        last_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ethers::types::U256;
    use eyre::{eyre, Result};
    use std::sync::Mutex;

    /// Fails the first `fail_first` send attempts, then succeeds.
    struct FlakyRelay {
        fail_first: u32,
        calls: Mutex<u32>,
    }

    impl FlakyRelay {
        fn new(fail_first: u32) -> Self {
            Self {
                fail_first,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Relay for FlakyRelay {
        async fn gas_price(&self) -> Result<U256> {
            Ok(U256::from(100u64))
        }

        async fn send_bundle(&self, _ops: &[UserOperation], _entrypoint: Address) -> Result<String> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls <= self.fail_first {
                Err(eyre!("relay unavailable"))
            } else {
                Ok("0xreceipt".to_string())
            }
        }
    }

    #[test]
    fn backoff_doubles_then_caps_at_sixty_seconds() {
        assert_eq!(backoff_delay(1).as_secs(), 2);
        assert_eq!(backoff_delay(2).as_secs(), 4);
        assert_eq!(backoff_delay(3).as_secs(), 8);
        assert_eq!(backoff_delay(4).as_secs(), 16);
        assert_eq!(backoff_delay(5).as_secs(), 32);
        assert_eq!(backoff_delay(6).as_secs(), 60);
        assert_eq!(backoff_delay(40).as_secs(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success_sleeps_nothing() {
        let relay = FlakyRelay::new(0);
        let start = tokio::time::Instant::now();
        let outcome = submit_with_retries(&relay, &[], Address::zero()).await;
        match outcome {
            SubmitOutcome::Sent { attempts, receipt } => {
                assert_eq!(attempts, 1);
                assert_eq!(receipt, "0xreceipt");
            }
            other => panic!("expected Sent, got {other:?}"),
        }
        assert_eq!(start.elapsed().as_secs(), 0);
        assert_eq!(relay.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_on_the_fifth_attempt_after_backing_off() {
        let relay = FlakyRelay::new(4);
        let start = tokio::time::Instant::now();
        let outcome = submit_with_retries(&relay, &[], Address::zero()).await;
        match outcome {
            SubmitOutcome::Sent { attempts, .. } => assert_eq!(attempts, 5),
            other => panic!("expected Sent, got {other:?}"),
        }
        // 2 + 4 + 8 + 16 seconds of virtual backoff.
        assert_eq!(start.elapsed().as_secs(), 30);
        assert_eq!(relay.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_five_failures() {
        let relay = FlakyRelay::new(u32::MAX);
        let outcome = submit_with_retries(&relay, &[], Address::zero()).await;
        match outcome {
            SubmitOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 5);
                assert!(last_error.contains("relay unavailable"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(relay.calls(), 5);
    }
}
