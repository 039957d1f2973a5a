use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::types::StatisticsDocument;
use crate::error::StatsError;

/// Owner of the on-disk `stats.json` statistics document
#[derive(Debug, Clone)]
pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `<data-local>/opencode/stats.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|d| d.join("opencode").join("stats.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document exactly as stored, without any date handling
    pub fn try_load(&self) -> Result<StatisticsDocument, StatsError> {
        read_json(&self.path)
    }

    /// Load the document, falling back to a fresh one on any failure.
    ///
    /// The daily window is rolled if its date is not today's.
    pub fn load(&self, now: &DateTime<Local>) -> StatisticsDocument {
        match self.try_load() {
            Ok(mut doc) => {
                if doc.roll_daily(now) {
                    tracing::info!(date = %doc.daily.date, "Daily statistics reset for a new day");
                }
                doc
            }
            Err(e) if e.is_missing() => {
                tracing::info!(path = %self.path.display(), "No statistics file yet, starting fresh");
                StatisticsDocument::new(now)
            }
            Err(e) => {
                tracing::warn!("Error loading stats file, creating new one: {}", e);
                StatisticsDocument::new(now)
            }
        }
    }

    /// Persist the full document, replacing the previous version atomically
    pub fn save(&self, doc: &StatisticsDocument) -> Result<(), StatsError> {
        write_json_atomic(&self.path, doc)
    }

    /// Load the document for a new session: the session window is reset,
    /// daily and total carry over. The result is persisted right away.
    pub fn start_session(&self, now: &DateTime<Local>) -> StatisticsDocument {
        let mut doc = self.load(now);
        doc.reset_session(now);
        if let Err(e) = self.save(&doc) {
            tracing::error!("Error saving stats: {}", e);
        }
        doc
    }
}

/// Read and parse a JSON file into `T`
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StatsError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StatsError::Missing {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(StatsError::io(path, e)),
    };

    serde_json::from_str(&content).map_err(|source| StatsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `value` as pretty JSON through a temp file and a rename, so an
/// interrupted write leaves the previous version in place.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StatsError> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| StatsError::io(parent, e))?;
        }
    }

    let temp_path = path.with_extension("json.tmp");
    // Leftover from an earlier crashed write
    let _ = fs::remove_file(&temp_path);

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|e| StatsError::io(&temp_path, e))?;
    file.write_all(json.as_bytes())
        .map_err(|e| StatsError::io(&temp_path, e))?;
    file.sync_all().map_err(|e| StatsError::io(&temp_path, e))?;

    fs::rename(&temp_path, path).map_err(|e| StatsError::io(path, e))?;
    Ok(())
}
