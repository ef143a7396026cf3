//! One JSON file per recording under a single directory.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::models::{Recording, RecordingId, RecordingSummary, RecordingType};

const EXTENSION: &str = "json";

/// Recording metadata read from a file without its action bodies.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordingHeader {
    platform: String,
    #[serde(default)]
    recording_type: RecordingType,
    #[serde(default)]
    start_url: String,
    created_at: DateTime<Utc>,
    total_actions: usize,
}

#[derive(Debug, Clone)]
pub struct RecordingStore {
    dir: PathBuf,
}

impl RecordingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `recording` to a new file and return its id.
    ///
    /// Names are `{platform}_actions_{YYYYmmdd_HHMMSS}` (or `_manual_` for manual
    /// recordings); `_2`, `_3`, ... is appended when the name is taken. Existing
    /// files are never overwritten.
    pub fn save(&self, recording: &Recording) -> EngineResult<RecordingId> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            EngineError::StoreWriteFailure(format!(
                "Failed to create {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let body = serde_json::to_string_pretty(recording)
            .map_err(|e| EngineError::StoreWriteFailure(e.to_string()))?;
        let base = base_name(recording);

        let mut attempt = 1u32;
        loop {
            let stem = if attempt == 1 {
                base.clone()
            } else {
                format!("{}_{}", base, attempt)
            };
            let path = self.path_for(&stem);

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    attempt += 1;
                    continue;
                }
                Err(e) => {
                    return Err(EngineError::StoreWriteFailure(format!(
                        "Failed to create {}: {}",
                        path.display(),
                        e
                    )))
                }
            };

            file.write_all(body.as_bytes()).map_err(|e| {
                EngineError::StoreWriteFailure(format!("Failed to write {}: {}", path.display(), e))
            })?;

            tracing::info!(
                "Saved recording {} ({} actions) to {}",
                stem,
                recording.total_actions(),
                path.display()
            );
            return Ok(RecordingId::new(stem));
        }
    }

    /// Recordings whose `platform` field matches (case-insensitively), newest first.
    /// Files that cannot be read or parsed are skipped.
    pub fn list(&self, platform: &str) -> EngineResult<Vec<RecordingSummary>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(EngineError::StoreReadFailure(format!(
                    "Failed to read {}: {}",
                    self.dir.display(),
                    e
                )))
            }
        };

        let mut summaries = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let header = match read_header(&path) {
                Ok(header) => header,
                Err(e) => {
                    tracing::warn!("Skipping unreadable recording {}: {}", path.display(), e);
                    continue;
                }
            };

            if !header.platform.eq_ignore_ascii_case(platform) {
                continue;
            }

            summaries.push(RecordingSummary {
                id: RecordingId::new(stem),
                platform: header.platform,
                recording_type: header.recording_type,
                start_url: header.start_url,
                created_at: header.created_at,
                total_actions: header.total_actions,
            });
        }

        summaries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_str().cmp(a.id.as_str()))
        });
        Ok(summaries)
    }

    pub fn load(&self, id: &RecordingId) -> EngineResult<Recording> {
        let path = self.existing_path(id)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            EngineError::StoreReadFailure(format!("Failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            EngineError::StoreReadFailure(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Human-readable summary of a stored recording.
    pub fn preview(&self, id: &RecordingId) -> EngineResult<String> {
        Ok(self.load(id)?.preview(id))
    }

    fn path_for(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", stem, EXTENSION))
    }

    fn existing_path(&self, id: &RecordingId) -> EngineResult<PathBuf> {
        let stem = id.as_str();
        if stem.trim().is_empty()
            || stem.contains('/')
            || stem.contains('\\')
            || stem.contains("..")
            || stem.contains('\0')
        {
            return Err(EngineError::NotFound(stem.to_string()));
        }

        let path = self.path_for(stem);
        if !path.is_file() {
            return Err(EngineError::NotFound(stem.to_string()));
        }
        Ok(path)
    }
}

fn read_header(path: &Path) -> anyhow::Result<RecordingHeader> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn base_name(recording: &Recording) -> String {
    let platform: String = recording
        .platform()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let kind = match recording.recording_type() {
        RecordingType::Automatic => "actions",
        RecordingType::Manual => "manual",
    };
    format!(
        "{}_{}_{}",
        platform,
        kind,
        recording.created_at().format("%Y%m%d_%H%M%S")
    )
}
