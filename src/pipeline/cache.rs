//! Persistent sentence → explanation cache backed by one JSON file.
//!
//! The file is a single JSON object mapping the exact sentence text to its
//! [`SentenceExplanation`]. It is human-readable and grows forever: entries
//! are added, never updated or removed.
//!
//! ## Consistency model
//!
//! * Every [`ExplanationCache::lookup`] and [`ExplanationCache::store`]
//!   re-reads the whole file, so a second process (or a hand edit) is seen
//!   on the next call.
//! * Every `store` rewrites the whole file via a temporary sibling and a
//!   rename. Readers see either the old or the new file, never a partial one,
//!   so lookups take no lock.
//! * The read-modify-write cycle of `store` runs under an async mutex.
//!   Concurrent stores through one `ExplanationCache` never lose entries.
//!   Separate processes writing the same file can still lose entries
//!   (last writer wins).
//!
//! ## Failure model
//!
//! A missing file is an empty cache. An unparseable file is also treated as
//! empty (logged at `warn`) and copied to `<file>.corrupt` before the next
//! store replaces it. A single entry that no longer matches the schema, or
//! fails validation, is a miss and is overwritten by the next store for that
//! sentence.

use crate::model::SentenceExplanation;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

type Entries = BTreeMap<String, Value>;

/// Result of reading the backing file.
enum Loaded {
    Missing,
    Corrupt,
    Entries(Entries),
}

/// The explanation cache. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct ExplanationCache {
    path: PathBuf,
    write_lock: Mutex<()>,
}

/// Parse and validate one stored value.
fn decode(value: &Value) -> Result<SentenceExplanation, String> {
    let explanation =
        serde_json::from_value::<SentenceExplanation>(value.clone()).map_err(|e| e.to_string())?;
    explanation.validate()?;
    Ok(explanation)
}

impl ExplanationCache {
    /// Open (lazily) the cache at `path`. Nothing is read or created yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the explanation stored for exactly `sentence`.
    pub async fn lookup(&self, sentence: &str) -> Option<SentenceExplanation> {
        let Loaded::Entries(entries) = self.load().await else {
            return None;
        };
        let value = entries.get(sentence)?;
        match decode(value) {
            Ok(explanation) => Some(explanation),
            Err(e) => {
                warn!(
                    "Ignoring cache entry for {:?} in {}: {}",
                    sentence,
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    /// Persist `explanation` under `sentence`.
    ///
    /// A usable entry for the same sentence is kept: entries are never
    /// updated. An entry that [`lookup`](Self::lookup) would reject is
    /// replaced, otherwise the sentence would be asked again on every run.
    pub async fn store(&self, sentence: &str, explanation: &SentenceExplanation) -> io::Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries = match self.load().await {
            Loaded::Entries(entries) => entries,
            Loaded::Missing => Entries::new(),
            Loaded::Corrupt => {
                let backup = self.corrupt_backup_path();
                warn!(
                    "Preserving unreadable cache {} as {}",
                    self.path.display(),
                    backup.display()
                );
                tokio::fs::copy(&self.path, &backup).await?;
                Entries::new()
            }
        };

        if let Some(existing) = entries.get(sentence) {
            match decode(existing) {
                Ok(_) => {
                    debug!("Cache already holds {:?}; keeping existing entry", sentence);
                    return Ok(());
                }
                Err(e) => warn!(
                    "Replacing unusable cache entry for {:?} in {}: {}",
                    sentence,
                    self.path.display(),
                    e
                ),
            }
        }

        let value = serde_json::to_value(explanation).map_err(io::Error::other)?;
        entries.insert(sentence.to_string(), value);
        self.write_atomic(&entries).await?;
        debug!(
            "Stored explanation for {:?} ({} entries in {})",
            sentence,
            entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Number of entries currently in the file (0 if missing or unreadable).
    pub async fn len(&self) -> usize {
        match self.load().await {
            Loaded::Entries(entries) => entries.len(),
            _ => 0,
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn load(&self) -> Loaded {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Loaded::Missing,
            Err(e) => {
                warn!("Cannot read cache {}: {}; treating as empty", self.path.display(), e);
                return Loaded::Corrupt;
            }
        };
        if raw.trim().is_empty() {
            return Loaded::Entries(Entries::new());
        }
        match serde_json::from_str::<Entries>(&raw) {
            Ok(entries) => Loaded::Entries(entries),
            Err(e) => {
                warn!(
                    "Cache {} is not a JSON object ({}); treating as empty",
                    self.path.display(),
                    e
                );
                Loaded::Corrupt
            }
        }
    }

    async fn write_atomic(&self, entries: &Entries) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(entries).map_err(io::Error::other)?;
        let tmp = self.sibling_path("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }

    fn corrupt_backup_path(&self) -> PathBuf {
        self.sibling_path("corrupt")
    }

    fn sibling_path(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }
}
