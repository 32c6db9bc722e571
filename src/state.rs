use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Which side of the threshold last triggered a notification for an
/// instrument in the current trading session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    None,
    Up,
    Down,
}

/// In-memory alert state for one run: instrument symbol -> last-triggered
/// direction. Owned exclusively by the orchestrator while a run is active.
pub type AlertState = HashMap<String, Direction>;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("cannot write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sole reader/writer of the on-disk alert state.
///
/// Loading is deliberately infallible: a missing, unreadable or corrupt
/// file degrades to "no prior state" with a warning, because losing dedup
/// for one run is preferable to never alerting again. Saving is strict;
/// if the state cannot be persisted the whole run must fail.
pub struct AlertStateStore {
    path: PathBuf,
}

impl AlertStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> AlertState {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no state file; starting empty");
            return AlertState::new();
        }

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file unreadable; treating as empty");
                return AlertState::new();
            }
        };

        match serde_json::from_str::<AlertState>(&raw) {
            Ok(state) => {
                debug!(path = %self.path.display(), entries = state.len(), "alert state loaded");
                state
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file corrupt; treating as empty");
                AlertState::new()
            }
        }
    }

    pub fn save(&self, state: &AlertState) -> Result<(), StateError> {
        let raw = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, raw).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), entries = state.len(), "alert state saved");
        Ok(())
    }
}
