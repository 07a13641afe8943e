//! Lens set definition file.
//!
//! The lens set currently loaded in the stack is kept as a JSON list of
//! `{count, radius}` elements. Every save first copies the previous file to
//! a dated backup next to it (`lenses.json.2024-03-01`, then
//! `lenses.json.2024-03-01-1`, ...), so earlier configurations are never
//! overwritten.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use lens_math::LensSet;
use tracing::info;

use crate::error::LensStackResult;
use crate::json_file;

/// Lens set file with dated backups.
#[derive(Debug, Clone)]
pub struct LensConfigFile {
    path: PathBuf,
}

impl LensConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the lens set from disk.
    pub fn load(&self) -> LensStackResult<LensSet> {
        let reader = BufReader::new(File::open(&self.path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write a lens set, backing up the previous file first.
    ///
    /// Returns the backup path, or `None` if there was no previous file.
    pub fn save(&self, lens_set: &LensSet) -> LensStackResult<Option<PathBuf>> {
        let backup = if self.path.exists() {
            let backup = self.backup_path(Local::now().date_naive());
            std::fs::copy(&self.path, &backup)?;
            info!("Backed up lens file to {}", backup.display());
            Some(backup)
        } else {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            None
        };

        json_file::write_atomic(&self.path, lens_set)?;
        info!(
            "Saved {} lenses to {}",
            lens_set.lens_count(),
            self.path.display()
        );
        Ok(backup)
    }

    /// First unused backup path for `date`.
    pub fn backup_path(&self, date: NaiveDate) -> PathBuf {
        let stamp = date.format("%Y-%m-%d").to_string();
        let base = append_suffix(&self.path, &stamp);
        if !base.exists() {
            return base;
        }
        (1..)
            .map(|n| append_suffix(&self.path, &format!("{stamp}-{n}")))
            .find(|candidate| !candidate.exists())
            .unwrap_or(base)
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
