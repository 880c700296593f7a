//! Persisted record of the active provider.
//!
//! Written as pretty JSON to `data_source_info.json` under the data root on
//! every switch, so other processes (and the next run) can tell which
//! provider's directory holds the current analysis.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LoaderError;
use crate::provider::ProviderKind;

const MIXING_WARNING: &str = "Do not mix imagery from different sources";

/// Which provider is active and where its images live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderState {
    pub active_source: ProviderKind,
    pub source_name: String,
    pub last_updated: DateTime<Utc>,
    pub data_directory: PathBuf,
    pub warning: String,
}

impl ProviderState {
    pub fn new(kind: ProviderKind, data_directory: PathBuf) -> Self {
        Self {
            active_source: kind,
            source_name: kind.label().to_string(),
            last_updated: Utc::now(),
            data_directory,
            warning: MIXING_WARNING.to_string(),
        }
    }

    /// Writes the state to `path`, replacing any previous state.
    pub fn save(&self, path: &Path) -> Result<(), LoaderError> {
        let write_err = |source| LoaderError::StateWrite {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| LoaderError::StateParse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(write_err)?;
        debug!(path = %path.display(), source = %self.active_source, "Saved provider state");
        Ok(())
    }

    /// Reads a saved state; `None` when no state has been written yet.
    pub fn load(path: &Path) -> Result<Option<Self>, LoaderError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|source| LoaderError::StateRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| LoaderError::StateParse {
                path: path.to_path_buf(),
                source,
            })
    }
}
