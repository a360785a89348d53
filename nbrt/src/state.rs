//! Persistence of the managed template between runs.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::FileError;
use crate::reconciler::ManagedTemplate;

/// Default state file, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = "nbrt.state.json";

/// Loads the state file. A missing file means nothing is managed yet.
pub async fn load(path: &Path) -> Result<ManagedTemplate, FileError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No state file, starting absent");
            return Ok(ManagedTemplate::default());
        }
        Err(source) => {
            return Err(FileError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&text).map_err(|source| FileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes the state file through a temporary file and a rename.
pub async fn save(path: &Path, managed: &ManagedTemplate) -> Result<(), FileError> {
    let json = serde_json::to_string_pretty(managed).map_err(FileError::Encode)?;
    let tmp = temp_path(path);
    let write_err = |source| FileError::Write {
        path: path.to_path_buf(),
        source,
    };

    tokio::fs::write(&tmp, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
    debug!(path = %path.display(), phase = %managed.phase, "State saved");
    Ok(())
}
