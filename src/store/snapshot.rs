//! File-backed project.
//!
//! A project snapshot is a JSON document holding a project's assets and time
//! series. It is loaded into [`MemoryStore`]s, mutated by a run, and written
//! back atomically (temp file + rename). The destination is held under an
//! exclusive lock on `<path>.lock` so two runs cannot interleave on it. The
//! lock file is never removed: a run waiting on the old inode must keep
//! excluding any run that opens the path later.

use super::MemoryStore;
use crate::error::{ReplicationError, Result};
use crate::model::{Asset, Replicable, TimeSeries};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

/// On-disk form of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub project: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub time_series: Vec<TimeSeries>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Reject a snapshot where two records of one kind share an id. Loading
    /// it would keep only one of them and the next save would drop the other.
    pub fn check_ids(&self, path: &Path) -> Result<()> {
        unique_ids(&self.time_series, "time series", path)?;
        unique_ids(&self.assets, "asset", path)
    }

    /// Write to `path` through a temp file in the same directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, self)?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| ReplicationError::Io(e.error))?;
        Ok(())
    }
}

/// A project loaded from a snapshot file.
pub struct SnapshotProject {
    path: PathBuf,
    pub time_series: MemoryStore<TimeSeries>,
    pub assets: MemoryStore<Asset>,
    // Held for the lifetime of the project; released on drop.
    lock: Option<File>,
}

impl SnapshotProject {
    /// Load a project for reading.
    pub fn open(path: &Path) -> Result<Self> {
        let snapshot = Snapshot::load(path)?;
        Self::from_snapshot(path, snapshot, None)
    }

    /// Load a project for writing. Fails with [`ReplicationError::Locked`]
    /// if another run holds it.
    pub fn open_locked(path: &Path) -> Result<Self> {
        let lock_path = lock_path(path);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        if lock.try_lock_exclusive().is_err() {
            return Err(ReplicationError::Locked(path.to_path_buf()));
        }

        let snapshot = Snapshot::load(path)?;
        Self::from_snapshot(path, snapshot, Some(lock))
    }

    fn from_snapshot(path: &Path, snapshot: Snapshot, lock: Option<File>) -> Result<Self> {
        snapshot.check_ids(path)?;
        let time_series =
            MemoryStore::with_records(snapshot.project.clone(), snapshot.time_series, |ts, id| {
                ts.id = Some(id)
            });
        let assets = MemoryStore::with_records(snapshot.project, snapshot.assets, |asset, id| {
            asset.id = Some(id)
        });

        Ok(Self {
            path: path.to_path_buf(),
            time_series,
            assets,
            lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn project(&self) -> &str {
        use crate::store::RecordSource;
        RecordSource::<TimeSeries>::project(&self.time_series)
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            project: self.project().to_string(),
            assets: self.assets.records(),
            time_series: self.time_series.records(),
        }
    }

    /// Write the current state back to the file it was loaded from.
    pub fn save(&self) -> Result<()> {
        self.to_snapshot().save(&self.path)
    }
}

impl Drop for SnapshotProject {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            let _ = FileExt::unlock(&lock);
        }
    }
}

fn unique_ids<R: Replicable>(records: &[R], kind: &'static str, path: &Path) -> Result<()> {
    let mut seen = HashSet::new();
    for id in records.iter().filter_map(Replicable::id) {
        if !seen.insert(id) {
            return Err(ReplicationError::DuplicateId {
                path: path.to_path_buf(),
                kind,
                id,
            });
        }
    }
    Ok(())
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}
