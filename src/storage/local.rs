// src/storage/local.rs

//! Local filesystem storage.
//!
//! Owns the output directory: opens the record sinks and keeps the stats of
//! the latest run next to them.

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{CourseRecord, OutputConfig, ProfessorRecord, RunStats, WriteMode};
use crate::storage::JsonlSink;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    professors_file: String,
    courses_file: String,
    stats_file: String,
    mode: WriteMode,
}

impl LocalStorage {
    /// Create a new LocalStorage with the default file names under `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::from_config(&OutputConfig {
            dir: root_dir.into(),
            ..OutputConfig::default()
        })
    }

    pub fn from_config(output: &OutputConfig) -> Self {
        Self {
            root_dir: output.dir.clone(),
            professors_file: output.professors_file.clone(),
            courses_file: output.courses_file.clone(),
            stats_file: output.stats_file.clone(),
            mode: output.mode,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    pub fn professors_path(&self) -> PathBuf {
        self.path(&self.professors_file)
    }

    pub fn courses_path(&self) -> PathBuf {
        self.path(&self.courses_file)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.path(&self.stats_file)
    }

    pub async fn open_professors(&self) -> Result<JsonlSink<ProfessorRecord>> {
        JsonlSink::open(self.professors_path(), self.mode).await
    }

    pub async fn open_courses(&self) -> Result<JsonlSink<CourseRecord>> {
        JsonlSink::open(self.courses_path(), self.mode).await
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn save_stats(&self, stats: &RunStats) -> Result<()> {
        self.write_json(&self.stats_file, stats).await
    }

    pub async fn load_stats(&self) -> Result<Option<RunStats>> {
        self.read_json(&self.stats_file).await
    }

    /// Non-empty lines in a sink file; zero when it does not exist.
    pub async fn count_lines(&self, key: &str) -> Result<usize> {
        Ok(self
            .read_bytes(key)
            .await?
            .map(|bytes| {
                bytes
                    .split(|b| *b == b'\n')
                    .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
                    .count()
            })
            .unwrap_or(0))
    }

    pub async fn professor_count(&self) -> Result<usize> {
        self.count_lines(&self.professors_file).await
    }

    pub async fn course_count(&self) -> Result<usize> {
        self.count_lines(&self.courses_file).await
    }
}
