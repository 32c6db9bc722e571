use thiserror::Error;

use crate::state::StateError;

/// Fatal, run-level failures.
///
/// Per-instrument problems (price fetch exhausted, delivery rejected) are
/// reported inside the per-instrument `CycleOutcome` and never surface
/// here; a `CycleError` means the run as a whole cannot vouch for its
/// state and the process should exit non-zero.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("alert state persist failed: {0}")]
    StatePersist(#[source] StateError),
}
