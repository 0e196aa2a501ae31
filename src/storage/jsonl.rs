// src/storage/jsonl.rs

//! Append-only JSONL sink with key-based deduplication.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::WriteMode;
use crate::storage::DedupKey;

/// One JSONL file holding records of type `T`.
pub struct JsonlSink<T> {
    path: PathBuf,
    file: File,
    keys: HashSet<String>,
    written: usize,
    _record: PhantomData<fn(T)>,
}

impl<T> JsonlSink<T>
where
    T: Serialize + DeserializeOwned + DedupKey,
{
    /// Open the sink at `path`.
    ///
    /// In [`WriteMode::Accumulate`] the keys of existing lines are loaded and
    /// new records are appended after them; [`WriteMode::Fresh`] truncates.
    pub async fn open(path: impl Into<PathBuf>, mode: WriteMode) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::sink_write(&path, e))?;
        }

        let (keys, needs_newline) = match mode {
            WriteMode::Fresh => (HashSet::new(), false),
            WriteMode::Accumulate => Self::load_keys(&path).await?,
        };

        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            WriteMode::Fresh => options.write(true).truncate(true),
            WriteMode::Accumulate => options.append(true),
        };
        let mut file = options
            .open(&path)
            .await
            .map_err(|e| AppError::sink_write(&path, e))?;

        if needs_newline {
            log::warn!("{} ends with a partial line; terminating it", path.display());
            file.write_all(b"\n")
                .await
                .map_err(|e| AppError::sink_write(&path, e))?;
            file.flush()
                .await
                .map_err(|e| AppError::sink_write(&path, e))?;
        }

        log::debug!(
            "Opened {} ({:?}, {} existing keys)",
            path.display(),
            mode,
            keys.len()
        );

        Ok(Self {
            path,
            file,
            keys,
            written: 0,
            _record: PhantomData,
        })
    }

    /// Keys of every parseable line, and whether the file lacks a final newline.
    async fn load_keys(path: &Path) -> Result<(HashSet<String>, bool)> {
        let content = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok((HashSet::new(), false));
            }
            Err(e) => return Err(AppError::sink_write(path, e)),
        };

        let needs_newline = content.last().is_some_and(|b| *b != b'\n');
        let mut keys = HashSet::new();
        for (number, line) in content.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<T>(line) {
                Ok(record) => {
                    keys.insert(record.dedup_key());
                }
                Err(e) => log::warn!(
                    "Ignoring unreadable line {} of {}: {}",
                    number + 1,
                    path.display(),
                    e
                ),
            }
        }

        Ok((keys, needs_newline))
    }

    /// Append `record` unless its key was already written.
    ///
    /// Returns `false` for a duplicate. The line is written with a single
    /// `write_all` and flushed before returning.
    pub async fn append(&mut self, record: &T) -> Result<bool> {
        let key = record.dedup_key();
        if self.keys.contains(&key) {
            return Ok(false);
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .await
            .map_err(|e| AppError::sink_write(&self.path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| AppError::sink_write(&self.path, e))?;

        self.keys.insert(key);
        self.written += 1;
        Ok(true)
    }

    /// Whether a record with `key` is already in the sink.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Distinct keys known to the sink, including lines from earlier runs.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Lines appended by this handle.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
