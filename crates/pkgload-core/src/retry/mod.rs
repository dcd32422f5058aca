//! Per-resource retry: constant-delay policy and a cancellable async retry loop.
//!
//! Every non-aborted failure is retried until the attempt budget is spent;
//! cancellation ends the loop immediately and is reported separately from
//! failure so callers can leave their bookkeeping untouched.

mod policy;
mod run;

pub use policy::{RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryOutcome};
