use thiserror::Error;

/// Fatal outcomes of a flush run. Everything else is either retried inside
/// the submission loop or logged and absorbed (per-entry policy drops).
#[derive(Error, Debug)]
pub enum FlushError {
    /// The relay fee-price query failed or returned a non-numeric result.
    /// There is no safe default fee, so the run stops before any submission.
    #[error("fee estimation failed: {0}")]
    Estimation(String),

    /// Every submission attempt failed. The queue store was left untouched,
    /// so the next run retries the same batch.
    #[error("bundle submission failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}
