//! config::discover
//!
//! Upward directory search for a manifest file, starting at the current
//! directory and stopping at (and including) the user's home directory.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Manifest file names searched for, in precedence order, at each directory.
pub const MANIFEST_FILE_NAMES: &[&str] = &[".gz-git.yaml", ".gz-git.yml"];

/// Errors from manifest discovery.
#[derive(Debug, Error)]
pub enum DiscoverError {
    /// No manifest file was found between `start` and the search boundary.
    #[error("no manifest found searching upward from '{0}'")]
    NotFound(PathBuf),

    /// The starting directory could not be read (e.g. does not exist).
    #[error("cannot start discovery at '{path}': {source}")]
    InvalidStart {
        /// The directory discovery was asked to start from.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Search upward from `start` toward the filesystem root, returning the
/// first matching manifest path. The search stops after checking the user's
/// home directory (if `start` is inside it) or the filesystem root,
/// whichever comes first — it never searches above `$HOME`.
pub fn discover_manifest(start: &Path) -> Result<PathBuf, DiscoverError> {
    let start = std::fs::canonicalize(start).map_err(|e| DiscoverError::InvalidStart {
        path: start.to_path_buf(),
        source: e,
    })?;

    let home = dirs::home_dir();
    let mut current: Option<&Path> = Some(start.as_path());

    while let Some(dir) = current {
        for name in MANIFEST_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        if let Some(home) = &home {
            if dir == home.as_path() {
                break;
            }
        }

        current = dir.parent();
    }

    Err(DiscoverError::NotFound(start))
}
