//! Fatal error kinds surfaced to the caller.
//!
//! Everything else in this tool is recoverable per-line or per-entry; these
//! three abort the whole run and must reach the user as-is, without a partial
//! launcher set being written.

// -- std imports
use std::process::ExitStatus;

// -- crate imports
use thiserror::Error;

/// Run-aborting failures of the synchronization pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The VM the entries should be retrieved from is not running.
    #[error("launcher entries can only be retrieved from a running VM, and '{0}' is not running")]
    VmNotRunning(String),

    /// The untrusted source produced more lines than the configured cap.
    ///
    /// The cap is the only defense against an adversarial VM streaming
    /// unbounded output, so exceeding it unwinds the entire run.
    #[error("line count limit exceeded while reading launcher entries")]
    LimitExceeded,

    /// The in-VM entry listing service exited with a nonzero status.
    #[error("launcher entry service failed ({0})")]
    ServiceFailed(ExitStatus),
}
