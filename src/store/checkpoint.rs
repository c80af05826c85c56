//! Completion checkpoint: the persisted set of finished cells.
//!
//! Epistemic foundation:
//! - K_i: A key present in the checkpoint means the cell was filled and
//!   both files were committed together
//! - B_i: The file may not exist → empty checkpoint
//! - I^B: Crash between content-write and checkpoint-write → reconcile
//!   drops entries whose cells are still empty so they are re-queued
//!
//! On disk this is a JSON object mapping `"{row}-{col}"` to `true`,
//! written atomically with sorted keys so an unchanged checkpoint
//! serializes byte-identically.

use crate::models::{CellKey, GlossfillError, Result};
use crate::store::{write_atomic, Table};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persisted set of completed cell keys.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
    done: HashSet<CellKey>,
}

impl Checkpoint {
    /// Load the checkpoint, defaulting to empty when the file is absent.
    ///
    /// A checkpoint that fails to parse is moved aside (so the evidence
    /// survives) and treated as empty; the worst outcome is re-requesting
    /// cells, never corrupting them.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                path: path.to_path_buf(),
                done: HashSet::new(),
            });
        }

        let content = fs::read_to_string(path)
            .map_err(|e| GlossfillError::io(format!("reading checkpoint {}", path.display()), e))?;

        let done = match serde_json::from_str::<BTreeMap<String, bool>>(&content) {
            Ok(map) => {
                let mut done = HashSet::with_capacity(map.len());
                for (key, flag) in map {
                    if !flag {
                        continue;
                    }
                    match key.parse::<CellKey>() {
                        Ok(cell) => {
                            done.insert(cell);
                        }
                        Err(_) => warn!(key = %key, "Skipping malformed checkpoint key"),
                    }
                }
                done
            }
            Err(e) => {
                let backup = backup_path(path);
                warn!(
                    error = %e,
                    backup = %backup.display(),
                    "Corrupted checkpoint file, moving aside and starting fresh"
                );
                fs::rename(path, &backup).map_err(|e| {
                    GlossfillError::io("backing up corrupted checkpoint".to_string(), e)
                })?;
                HashSet::new()
            }
        };

        debug!(entries = done.len(), "Loaded checkpoint");
        Ok(Self {
            path: path.to_path_buf(),
            done,
        })
    }

    /// Whether `key` is already marked complete.
    pub fn contains(&self, key: CellKey) -> bool {
        self.done.contains(&key)
    }

    /// Mark `key` complete in memory. Durable only after [`Self::save`].
    pub fn mark_done(&mut self, key: CellKey) {
        self.done.insert(key);
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Save the checkpoint via an atomic replace.
    pub fn save(&self) -> Result<()> {
        let map: BTreeMap<String, bool> =
            self.done.iter().map(|key| (key.to_string(), true)).collect();
        let json = serde_json::to_string_pretty(&map)
            .map_err(|e| GlossfillError::Internal(format!("serializing checkpoint: {e}")))?;

        write_atomic(&self.path, json.as_bytes())
    }

    /// Drop entries whose table cell is empty or out of bounds, so those
    /// cells are re-discovered and re-requested.
    ///
    /// This is the recovery rule for a crash that landed between the
    /// checkpoint write and the table write: the entry claims completion
    /// but the content is gone. Returns the number of entries dropped.
    pub fn reconcile(&mut self, table: &Table) -> usize {
        let before = self.done.len();
        self.done
            .retain(|key| table.get(*key).is_some_and(|v| !v.trim().is_empty()));
        before - self.done.len()
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(format!(".corrupted.{}", chrono::Utc::now().timestamp()));
    PathBuf::from(os)
}
