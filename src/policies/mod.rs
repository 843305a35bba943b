//! Restart and backoff policies applied by the supervisor loop.

mod backoff;
mod restart;

pub use backoff::BackoffPolicy;
pub use restart::RestartPolicy;
