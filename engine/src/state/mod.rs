//! Persisted engine state
//!
//! Two small JSON files in the data directory:
//! - `last_retrieved_time.json`: the cursor, i.e. the newest record the engine
//!   has finished with.
//! - `last_seen_record.json`: the most recently fetched record, kept for crash
//!   visibility only.
//!
//! Both are replaced atomically (write to a temp file, fsync, rename) so a
//! crash leaves either the old or the new content, never a torn file.

pub mod cursor;
pub mod last_seen;

pub use cursor::{Cursor, StartMode};
pub use last_seen::LastSeenFile;

use sdk::errors::EngineError;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Replace `path` with `contents` durably.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), EngineError> {
    let tmp_path = path.with_extension("json.tmp");

    {
        let mut tmp = File::create(&tmp_path).map_err(|e| {
            EngineError::State(format!("Failed to create {}: {}", tmp_path.display(), e))
        })?;
        tmp.write_all(contents).map_err(|e| {
            EngineError::State(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        tmp.sync_all().map_err(|e| {
            EngineError::State(format!("Failed to sync {}: {}", tmp_path.display(), e))
        })?;
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        EngineError::State(format!("Failed to replace {}: {}", path.display(), e))
    })?;

    // Make the rename itself durable
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}
