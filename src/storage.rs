//! Clip store
//!
//! A single directory is the whole persistence layer: there is no manifest and
//! no in-memory index, so every listing is a fresh O(n) directory scan. Clips
//! are named `video-<unix seconds>.<ext>`, which lets a listing recover their
//! age from the name alone.

use crate::errors::DiaryError;
use crate::types::VideoRecord;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

const NAME_PREFIX: &str = "video-";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Directory-backed store of recorded clips
#[derive(Debug, Clone)]
pub struct VideoStore {
    root: PathBuf,
    extension: String,
}

impl VideoStore {
    /// Create a store rooted at `root`; the directory is created lazily
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            extension: "mp4".to_string(),
        }
    }

    /// Use a different extension for newly saved clips
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store directory if it does not exist yet
    pub fn ensure_store_exists(&self) {
        if self.root.is_dir() {
            return;
        }
        if let Err(e) = fs::create_dir_all(&self.root) {
            log::warn!("Failed to create video store {:?}: {}", self.root, e);
        }
    }

    /// Copy `source` into the store, named after the current time
    ///
    /// Failures are logged and reported as `None`.
    pub fn save(&self, source: &Path) -> Option<PathBuf> {
        match self.try_save(source) {
            Ok(path) => {
                log::info!("Saved video at {:?}", path);
                Some(path)
            }
            Err(e) => {
                log::error!("Save error for {:?}: {}", source, e);
                None
            }
        }
    }

    pub fn try_save(&self, source: &Path) -> Result<PathBuf, DiaryError> {
        self.save_at(source, Utc::now())
    }

    /// Copy `source` into the store, named after `when`
    ///
    /// An existing clip with the same name is never overwritten.
    pub fn save_at(&self, source: &Path, when: DateTime<Utc>) -> Result<PathBuf, DiaryError> {
        self.ensure_store_exists();

        let copy_error = |e: io::Error| {
            DiaryError::IoError(format!("Failed to copy {:?} into store: {}", source, e))
        };
        let mut input = File::open(source).map_err(copy_error)?;

        let destination = self.root.join(clip_file_name(when, &self.extension));
        let mut output = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&destination)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => {
                    DiaryError::IoError(format!("{:?} already exists", destination))
                }
                _ => copy_error(e),
            })?;

        if let Err(e) = io::copy(&mut input, &mut output).and_then(|_| output.sync_all()) {
            drop(output);
            if let Err(cleanup) = fs::remove_file(&destination) {
                log::warn!("Failed to remove partial clip {:?}: {}", destination, cleanup);
            }
            return Err(copy_error(e));
        }

        Ok(destination)
    }

    /// All stored entries, newest first
    ///
    /// Returns an empty list when the directory is missing or unreadable.
    pub fn list(&self) -> Vec<PathBuf> {
        self.ensure_store_exists();

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to read video store {:?}: {}", self.root, e);
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();

        paths.sort_by(|a, b| newest_first(a, b));
        paths
    }

    /// Listing with creation time and size, same order as [`VideoStore::list`]
    pub fn records(&self) -> Vec<VideoRecord> {
        self.list().into_iter().map(record_for).collect()
    }

    /// Remove one clip; failures are logged
    pub fn delete(&self, path: &Path) {
        if let Err(e) = self.try_delete(path) {
            log::warn!("Delete error for {:?}: {}", path, e);
        }
    }

    pub fn try_delete(&self, path: &Path) -> Result<(), DiaryError> {
        fs::remove_file(path)
            .map_err(|e| DiaryError::IoError(format!("Failed to delete {:?}: {}", path, e)))
    }

    /// Sum of all listed clip sizes; unreadable sizes count as zero
    pub fn used_bytes(&self) -> u64 {
        self.list()
            .iter()
            .map(|path| fs::metadata(path).map(|m| m.len()).unwrap_or(0))
            .sum()
    }

    /// Storage used, as base-2 megabytes with two decimals ("2.00 MB")
    pub fn used_space(&self) -> String {
        format_megabytes(self.used_bytes())
    }
}

/// Format a byte count as "<n>.<nn> MB" using 1 MB = 1024 * 1024 bytes
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}

/// File name for a clip created at `when`
pub fn clip_file_name(when: DateTime<Utc>, extension: &str) -> String {
    let seconds = when.timestamp_micros() as f64 / 1_000_000.0;
    format!("{}{:.6}.{}", NAME_PREFIX, seconds, extension)
}

/// Seconds since the epoch embedded in a clip name, if any
///
/// Accepts both `video-<secs>.<ext>` and a bare `<secs>.<ext>`.
pub fn embedded_timestamp(path: &Path) -> Option<f64> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.strip_prefix(NAME_PREFIX).unwrap_or(stem);
    let seconds = digits.parse::<f64>().ok()?;
    seconds.is_finite().then_some(seconds)
}

fn newest_first(a: &Path, b: &Path) -> Ordering {
    match (embedded_timestamp(a), embedded_timestamp(b)) {
        (Some(ta), Some(tb)) => tb
            .partial_cmp(&ta)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.file_name().cmp(&a.file_name())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.file_name().cmp(&a.file_name()),
    }
}

fn record_for(path: PathBuf) -> VideoRecord {
    let metadata = fs::metadata(&path).ok();
    let created = metadata
        .as_ref()
        .and_then(|m| m.created().or_else(|_| m.modified()).ok())
        .map(DateTime::<Utc>::from);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    VideoRecord {
        name,
        created,
        size_bytes: metadata.map(|m| m.len()).unwrap_or(0),
        path,
    }
}
