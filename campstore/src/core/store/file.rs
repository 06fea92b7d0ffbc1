//! JSON-file persistence
//!
//! Layout inside the data directory, for a collection named `applicants`:
//!
//! - `applicants.json`: pretty-printed array of records in insertion order
//! - `applicants.seq`: identifier high-water mark
//!
//! Both files are replaced atomically: the new content is written to a
//! temporary sibling, flushed to disk, then renamed over the old file.
//! The counter file is written first, so after a crash it is never behind
//! the records file.

use super::{Backend, BackendError, Loaded};
use crate::core::record::{Record, is_valid_collection_name};
use chrono::Utc;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Stores one collection as a JSON document on the local filesystem
pub struct JsonFileBackend {
    dir: PathBuf,
    name: String,
    tmp_counter: AtomicU64,
}

impl JsonFileBackend {
    /// Use `dir` for collection `name`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>, name: &str) -> Result<Self, BackendError> {
        if !is_valid_collection_name(name) {
            return Err(BackendError::InvalidName(name.to_string()));
        }

        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        Ok(JsonFileBackend {
            dir,
            name: name.to_string(),
            tmp_counter: AtomicU64::new(0),
        })
    }

    pub fn records_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.name))
    }

    pub fn seq_path(&self) -> PathBuf {
        self.dir.join(format!("{}.seq", self.name))
    }

    fn read_seq(&self) -> Result<Option<u64>, BackendError> {
        let path = self.seq_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match text.trim().parse() {
            Ok(seq) => Ok(Some(seq)),
            Err(_) => {
                // Recomputed from the records on open
                tracing::warn!(path = %path.display(), "Ignoring unreadable id counter");
                Ok(None)
            }
        }
    }

    fn read_records(&self) -> Result<(Vec<Record>, Option<String>), BackendError> {
        let path = self.records_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok((Vec::new(), None)),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok((Vec::new(), None));
        }

        match serde_json::from_slice(&bytes) {
            Ok(records) => Ok((records, None)),
            Err(err) => {
                let quarantine = self.dir.join(format!(
                    "{}.json.corrupt-{}",
                    self.name,
                    Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
                ));
                fs::rename(&path, &quarantine)?;
                Ok((
                    Vec::new(),
                    Some(format!("{err}; moved to {}", quarantine.display())),
                ))
            }
        }
    }

    /// Remove temporary files left behind by an interrupted commit
    fn remove_stray_temp_files(&self) -> Result<(), BackendError> {
        let prefixes = [format!("{}.json.", self.name), format!("{}.seq.", self.name)];
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.ends_with(".tmp") && prefixes.iter().any(|p| file_name.starts_with(p)) {
                tracing::info!(path = %entry.path().display(), "Removing interrupted write");
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BackendError::InvalidName(path.display().to_string()))?;
        let tmp_path = path.with_file_name(format!(
            "{file_name}.{}-{}.tmp",
            std::process::id(),
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));

        let written = (|| {
            let mut file = File::create(&tmp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp_path, path)
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        // The rename is done: from here on the new content is what `load` sees
        self.sync_dir().map_err(BackendError::Unsynced)
    }

    #[cfg(unix)]
    fn sync_dir(&self) -> io::Result<()> {
        File::open(&self.dir)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) -> io::Result<()> {
        Ok(())
    }
}

impl Backend for JsonFileBackend {
    fn load(&self) -> Result<Loaded, BackendError> {
        self.remove_stray_temp_files()?;
        let next_seq = self.read_seq()?;
        let (records, discarded) = self.read_records()?;
        Ok(Loaded {
            records,
            next_seq,
            discarded,
        })
    }

    fn commit(&self, records: &[Record], next_seq: u64) -> Result<(), BackendError> {
        let json = serde_json::to_vec_pretty(records)?;
        match self.write_atomic(&self.seq_path(), next_seq.to_string().as_bytes()) {
            Ok(()) => {}
            // A counter ahead of the records only skips ids
            Err(BackendError::Unsynced(e)) => {
                tracing::warn!(path = %self.seq_path().display(), error = %e, "Id counter not flushed");
            }
            Err(e) => return Err(e),
        }
        self.write_atomic(&self.records_path(), &json)
    }

    fn describe(&self) -> String {
        self.records_path().display().to_string()
    }
}
