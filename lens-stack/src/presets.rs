//! Named position presets per stage axis.
//!
//! The alignment calibration is persisted as two labelled presets on each of
//! the x, y and z axes. [`FilePresetStore`] keeps one JSON file per axis in a
//! preset directory; without a directory it refuses writes.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::json_file;
use crate::motion::StageAxis;

/// Error from a preset store
#[derive(Error, Debug)]
pub enum PresetError {
    /// No location has been configured to save presets to
    #[error("no preset location configured")]
    Unconfigured,

    /// IO error during save/load
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single preset write: axis, label and value
pub type PresetWrite<'a> = (StageAxis, &'a str, f64);

/// Storage for labelled axis positions.
pub trait PresetStore {
    /// Add or replace several presets at once.
    ///
    /// Either every entry is stored or, on error, none of them is.
    fn add_entries(&mut self, entries: &[PresetWrite<'_>]) -> Result<(), PresetError>;

    /// Add or replace the preset `label` on `axis`
    fn add_entry(&mut self, axis: StageAxis, label: &str, value: f64) -> Result<(), PresetError> {
        self.add_entries(&[(axis, label, value)])
    }

    /// Read a preset, `Ok(None)` if it does not exist
    fn get_entry(&self, axis: StageAxis, label: &str) -> Result<Option<f64>, PresetError>;
}

/// A stored preset value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetEntry {
    pub value: f64,
    /// When the preset was written (RFC 3339)
    #[serde(default)]
    pub timestamp: Option<String>,
}

type AxisPresets = BTreeMap<String, PresetEntry>;

/// Preset store backed by one JSON file per axis.
#[derive(Debug, Clone, Default)]
pub struct FilePresetStore {
    root_path: Option<PathBuf>,
}

impl FilePresetStore {
    /// Store presets under `root_path`
    pub fn with_path(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: Some(root_path.into()),
        }
    }

    /// Store with no location; every write fails with `Unconfigured`
    pub fn unconfigured() -> Self {
        Self { root_path: None }
    }

    /// Preset directory, if configured
    pub fn root_path(&self) -> Option<&Path> {
        self.root_path.as_deref()
    }

    fn axis_path(&self, axis: StageAxis) -> Option<PathBuf> {
        self.root_path
            .as_ref()
            .map(|root| root.join(format!("{axis}.json")))
    }

    fn read_axis(path: &Path) -> Result<AxisPresets, PresetError> {
        if !path.exists() {
            return Ok(AxisPresets::new());
        }
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl PresetStore for FilePresetStore {
    fn add_entries(&mut self, entries: &[PresetWrite<'_>]) -> Result<(), PresetError> {
        let root = self.root_path.as_ref().ok_or(PresetError::Unconfigured)?;
        std::fs::create_dir_all(root)?;

        let timestamp = chrono::Utc::now().to_rfc3339();
        let mut updated: BTreeMap<StageAxis, AxisPresets> = BTreeMap::new();
        for &(axis, label, value) in entries {
            let presets = match updated.entry(axis) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => e.insert(Self::read_axis(&root.join(format!("{axis}.json")))?),
            };
            presets.insert(
                label.to_string(),
                PresetEntry {
                    value,
                    timestamp: Some(timestamp.clone()),
                },
            );
        }

        // Every axis file is staged before any of them is replaced
        let mut staged = Vec::with_capacity(updated.len());
        for (axis, presets) in &updated {
            let path = root.join(format!("{axis}.json"));
            match json_file::write_temp(&path, presets) {
                Ok(temp) => staged.push((temp, path)),
                Err(e) => {
                    for (temp, _) in &staged {
                        let _ = std::fs::remove_file(temp);
                    }
                    return Err(e.into());
                }
            }
        }

        for (temp, path) in staged {
            std::fs::rename(&temp, &path)?;
            debug!("Saved presets to {}", path.display());
        }
        Ok(())
    }

    fn get_entry(&self, axis: StageAxis, label: &str) -> Result<Option<f64>, PresetError> {
        let Some(path) = self.axis_path(axis) else {
            return Ok(None);
        };
        Ok(Self::read_axis(&path)?.get(label).map(|entry| entry.value))
    }
}

/// In-memory preset store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPresetStore {
    entries: BTreeMap<(StageAxis, String), f64>,
}

impl MemoryPresetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored presets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PresetStore for MemoryPresetStore {
    fn add_entries(&mut self, entries: &[PresetWrite<'_>]) -> Result<(), PresetError> {
        for &(axis, label, value) in entries {
            self.entries.insert((axis, label.to_string()), value);
        }
        Ok(())
    }

    fn get_entry(&self, axis: StageAxis, label: &str) -> Result<Option<f64>, PresetError> {
        Ok(self.entries.get(&(axis, label.to_string())).copied())
    }
}
