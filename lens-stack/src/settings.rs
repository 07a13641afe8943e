//! Settings storage for the lens stack.
//!
//! All settings live under ~/.xfls_config/ by default:
//! - `settings.json`: optical and geometric configuration of the stack
//! - `lenses.json`: the lens set currently installed (see [`LensConfigFile`])
//! - `presets/`: per-axis position presets, including the alignment points

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use lens_math::LensSet;
use serde::{Deserialize, Serialize};

use crate::json_file;
use crate::lens_config::LensConfigFile;
use crate::presets::FilePresetStore;
use crate::transform::{BeamSizeTolerance, LensStackConfig, ZDirection};

/// Persistent lens stack settings.
///
/// The lens set itself is kept in its own file so it can be backed up
/// independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    /// Photon energy in keV
    pub energy_kev: f64,
    /// Lens-to-sample distance at stage z = 0, meters
    pub z_offset_m: f64,
    pub z_direction: ZDirection,
    /// Unfocused FWHM beam size, meters
    pub unfocused_fwhm_m: f64,
    /// Stage z units per meter
    pub z_units_per_meter: f64,
    pub material: String,
    pub density: Option<f64>,
    pub tolerance: BeamSizeTolerance,
    /// Interlock settle time in milliseconds
    pub settle_time_ms: u64,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            energy_kev: 9.5,
            z_offset_m: 4.0,
            z_direction: ZDirection::Positive,
            unfocused_fwhm_m: 500e-6,
            z_units_per_meter: 1000.0,
            material: "Be".to_string(),
            density: None,
            tolerance: BeamSizeTolerance::default(),
            settle_time_ms: 10,
        }
    }
}

impl StackSettings {
    /// Lens stack configuration for a given lens set
    pub fn to_config(&self, lens_set: LensSet) -> LensStackConfig {
        LensStackConfig {
            lens_set,
            energy_kev: self.energy_kev,
            z_offset_m: self.z_offset_m,
            z_direction: self.z_direction,
            unfocused_fwhm_m: self.unfocused_fwhm_m,
            z_units_per_meter: self.z_units_per_meter,
            material: self.material.clone(),
            density: self.density,
        }
    }
}

/// Settings storage manager.
#[derive(Debug, Clone)]
pub struct SettingsStorage {
    /// Root directory for all settings (e.g., ~/.xfls_config)
    root_path: PathBuf,
}

impl SettingsStorage {
    /// Storage at the default path (~/.xfls_config)
    pub fn new() -> std::io::Result<Self> {
        let home = std::env::var("HOME")
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
        Ok(Self {
            root_path: PathBuf::from(home).join(".xfls_config"),
        })
    }

    pub fn with_path(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn settings_path(&self) -> PathBuf {
        self.root_path.join("settings.json")
    }

    /// Load settings.
    ///
    /// Returns None if no settings file exists.
    /// Returns Some(Err) if the file exists but cannot be loaded.
    pub fn get_settings(&self) -> Option<Result<StackSettings, std::io::Error>> {
        let path = self.settings_path();
        if !path.exists() {
            return None;
        }
        Some(read_json(&path))
    }

    /// Load settings, falling back to defaults if none are stored.
    pub fn settings_or_default(&self) -> std::io::Result<StackSettings> {
        self.get_settings().unwrap_or_else(|| Ok(StackSettings::default()))
    }

    /// Save settings, returning the path written.
    pub fn save_settings(&self, settings: &StackSettings) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.root_path)?;
        let path = self.settings_path();
        json_file::write_atomic(&path, settings)?;
        Ok(path)
    }

    /// Installed lens set file
    pub fn lens_file(&self) -> LensConfigFile {
        LensConfigFile::new(self.root_path.join("lenses.json"))
    }

    pub fn preset_dir(&self) -> PathBuf {
        self.root_path.join("presets")
    }

    /// Preset store in the preset directory
    pub fn preset_store(&self) -> FilePresetStore {
        FilePresetStore::with_path(self.preset_dir())
    }
}

impl Default for SettingsStorage {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::with_path(PathBuf::from(".xfls_config")))
    }
}

fn read_json(path: &Path) -> std::io::Result<StackSettings> {
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
