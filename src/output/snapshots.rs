// src/output/snapshots.rs
//! Verbatim copies of every fetched page.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Writes page bodies to `raw/page_{YYYYmmdd_HHMMSS}_{NNNN}.json`.
#[derive(Debug, Clone)]
pub struct RawSnapshots {
    dir: PathBuf,
}

/// File name for page `index` of a run fetched at `at`.
pub fn snapshot_name(at: DateTime<Utc>, index: u32) -> String {
    format!("page_{}_{:04}.json", at.format("%Y%m%d_%H%M%S"), index)
}

impl RawSnapshots {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stores `body` unchanged and synced; returns the file name used.
    ///
    /// Never overwrites: if the name is taken (a re-run within the same
    /// second) a numeric suffix is added.
    pub fn write(&self, index: u32, body: &str, at: DateTime<Utc>) -> Result<String, AppError> {
        fs::create_dir_all(&self.dir)?;
        let base = snapshot_name(at, index);
        let mut name = base.clone();
        let mut attempt = 1u32;
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.dir.join(&name))
            {
                Ok(mut file) => {
                    file.write_all(body.as_bytes())?;
                    file.sync_all()?;
                    log::debug!("Raw page -> {}", self.dir.join(&name).display());
                    return Ok(name);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    name = format!("{}_{}.json", base.trim_end_matches(".json"), attempt);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
