//! File-backed store repository
//!
//! Owns every path the catalog touches. The current state is one JSON file;
//! each save first writes a full snapshot to `versions/`, then rewrites the
//! current file. Imported payloads are archived verbatim under `imports/`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::template::{Store, now};

/// Current-state file name inside the data directory
pub const DATA_FILE: &str = "prompts.json";
/// Snapshot directory name inside the data directory
pub const VERSIONS_DIR: &str = "versions";
/// Import archive directory name inside the data directory
pub const IMPORTS_DIR: &str = "imports";

const SNAPSHOT_PREFIX: &str = "prompts-";
const SNAPSHOT_SUFFIX: &str = ".json";

/// A snapshot file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// File name, e.g. `prompts-20240501-123000.json`
    pub name: String,
    /// Full path
    pub path: PathBuf,
}

/// Persistence for one catalog
#[derive(Debug, Clone)]
pub struct StoreRepository {
    data_path: PathBuf,
    versions_dir: PathBuf,
    imports_dir: PathBuf,
    /// Keep at most this many snapshots after each save; `None` keeps all.
    /// Pruning failures are logged, not returned.
    snapshot_retention: Option<usize>,
}

impl StoreRepository {
    /// Repository rooted at `data_dir` using the standard layout
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self::with_paths(
            data_dir.join(DATA_FILE),
            data_dir.join(VERSIONS_DIR),
            data_dir.join(IMPORTS_DIR),
        )
    }

    /// Repository with explicit locations for each file set
    pub fn with_paths(data_path: impl Into<PathBuf>, versions_dir: impl Into<PathBuf>, imports_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            versions_dir: versions_dir.into(),
            imports_dir: imports_dir.into(),
            snapshot_retention: None,
        }
    }

    /// Prune snapshots down to `keep` after every save
    pub fn with_snapshot_retention(mut self, keep: Option<usize>) -> Self {
        self.snapshot_retention = keep;
        self
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn versions_dir(&self) -> &Path {
        &self.versions_dir
    }

    pub fn imports_dir(&self) -> &Path {
        &self.imports_dir
    }

    fn ensure_dirs(&self) -> Result<()> {
        let parent = self
            .data_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        for dir in [parent, self.versions_dir.as_path(), self.imports_dir.as_path()] {
            fs::create_dir_all(dir).map_err(|e| StoreError::storage(dir, e))?;
        }
        Ok(())
    }

    /// Load the current store, or a fresh empty one if nothing was saved yet
    pub fn load(&self) -> Result<Store> {
        self.ensure_dirs()?;
        if !self.data_path.exists() {
            debug!(path = %self.data_path.display(), "No store file, starting empty");
            return Ok(Store::new());
        }
        read_store(&self.data_path)
    }

    /// Snapshot `store`, then stamp `meta.updated_at` and overwrite the current file
    ///
    /// If the second write fails the snapshot stays behind as the recovery
    /// point; nothing is rolled back.
    pub fn save(&self, store: &mut Store) -> Result<PathBuf> {
        self.ensure_dirs()?;

        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let snapshot_path = self
            .versions_dir
            .join(format!("{}{}{}", SNAPSHOT_PREFIX, stamp, SNAPSHOT_SUFFIX));
        write_store(&snapshot_path, store)?;

        store.meta.updated_at = now();
        write_store(&self.data_path, store)?;

        info!(
            templates = store.templates.len(),
            snapshot = %snapshot_path.display(),
            "Saved store"
        );

        // Retention is housekeeping; the store is already written
        if let Some(keep) = self.snapshot_retention
            && let Err(e) = self.prune_snapshots(keep)
        {
            warn!(error = %e, "Failed to prune snapshots after save");
        }
        Ok(snapshot_path)
    }

    /// Archive an imported payload verbatim as `import-<epoch>.<ext>`
    pub fn record_import(&self, payload: &[u8], extension: &str) -> Result<PathBuf> {
        self.ensure_dirs()?;
        let ext = match extension.trim_start_matches('.') {
            "" => "dat",
            ext => ext,
        };
        let path = self
            .imports_dir
            .join(format!("import-{}.{}", Utc::now().timestamp(), ext));
        fs::write(&path, payload).map_err(|e| StoreError::storage(&path, e))?;
        debug!(path = %path.display(), bytes = payload.len(), "Archived import payload");
        Ok(path)
    }

    /// All snapshots, oldest first
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>> {
        self.ensure_dirs()?;
        let entries = fs::read_dir(&self.versions_dir).map_err(|e| StoreError::storage(&self.versions_dir, e))?;

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::storage(&self.versions_dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && name.starts_with(SNAPSHOT_PREFIX)
                && name.ends_with(SNAPSHOT_SUFFIX)
            {
                snapshots.push(SnapshotInfo {
                    name: name.to_string(),
                    path,
                });
            }
        }

        // Timestamp format sorts lexically in time order
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(snapshots)
    }

    /// Read one snapshot by file name
    pub fn load_snapshot(&self, name: &str) -> Result<Store> {
        let snapshot = self
            .list_snapshots()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| StoreError::NotFound { id: name.to_string() })?;
        read_store(&snapshot.path)
    }

    /// Delete the oldest snapshots so at most `keep` remain
    ///
    /// The newest snapshot is never removed, so `keep` is at least 1.
    pub fn prune_snapshots(&self, keep: usize) -> Result<usize> {
        let keep = keep.max(1);
        let snapshots = self.list_snapshots()?;
        let excess = snapshots.len().saturating_sub(keep);
        for snapshot in &snapshots[..excess] {
            fs::remove_file(&snapshot.path).map_err(|e| StoreError::storage(&snapshot.path, e))?;
            debug!(snapshot = %snapshot.name, "Pruned snapshot");
        }
        if excess > 0 {
            info!(removed = excess, kept = keep, "Pruned snapshots");
        }
        Ok(excess)
    }
}

fn read_store(path: &Path) -> Result<Store> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::storage(path, e))?;
    let store: Store = serde_json::from_str(&content).inspect_err(|e| {
        warn!(path = %path.display(), error = %e, "Store file is not valid");
    })?;
    debug!(path = %path.display(), templates = store.templates.len(), "Loaded store");
    Ok(store)
}

fn write_store(path: &Path, store: &Store) -> Result<()> {
    let content = serde_json::to_string_pretty(store)?;
    fs::write(path, content).map_err(|e| StoreError::storage(path, e))
}
