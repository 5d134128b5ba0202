// LogTrail - app/checkpoint_store.rs
//
// Persistence of file checkpoints between runs, so a later invocation
// resumes each file where the previous one stopped.
//
// - Saved atomically (write temp, rename) so a crash during save never
//   corrupts the previous good store.
// - A missing store is a normal first run and yields no checkpoints.
// - A store written by a different schema version is discarded with a
//   warning; the files are simply read from the start again.

use crate::core::model::FileCheckpoint;
use crate::util::error::CheckpointError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bump whenever `StoreData` changes incompatibly.
pub const STORE_VERSION: u32 = 1;

/// On-disk shape of the checkpoint store.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreData {
    pub version: u32,
    #[serde(default)]
    pub checkpoints: Vec<FileCheckpoint>,
}

/// Save `checkpoints` to `path` atomically, creating parent directories.
pub fn save(checkpoints: &[FileCheckpoint], path: &Path) -> Result<(), CheckpointError> {
    let io_err = |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let data = StoreData {
        version: STORE_VERSION,
        checkpoints: checkpoints.to_vec(),
    };
    let json = serde_json::to_string_pretty(&data).map_err(|e| CheckpointError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json.as_bytes()).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        io_err(e)
    })?;

    tracing::debug!(path = %path.display(), files = checkpoints.len(), "Checkpoints saved");
    Ok(())
}

/// Load checkpoints from `path`.
///
/// A missing file or a version mismatch yields an empty list. Unreadable
/// or malformed content is an error so the caller can decide whether to
/// start over.
pub fn load(path: &Path) -> Result<Vec<FileCheckpoint>, CheckpointError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No checkpoint store yet");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(CheckpointError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let data: StoreData = serde_json::from_str(&content).map_err(|e| CheckpointError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    if data.version != STORE_VERSION {
        tracing::warn!(
            found = data.version,
            expected = STORE_VERSION,
            "Checkpoint store version mismatch; starting fresh"
        );
        return Ok(Vec::new());
    }

    tracing::info!(path = %path.display(), files = data.checkpoints.len(), "Checkpoints loaded");
    Ok(data.checkpoints)
}
