//! Beam-axis calibration line
//!
//! Two stage positions recorded at either end of the z travel, with the beam
//! centred on the lenses, define the beam axis in stage coordinates. Any z
//! along the axis then has a unique x and y:
//! ```text
//! t = (z - z1) / (z2 - z1)
//! x = x1 + t (x2 - x1)
//! y = y1 + t (y2 - y1)
//! ```
//!
//! The line is shared between the alignment procedure (single writer) and
//! the coordinate transform (readers) through a [`CalibrationHandle`]. Each
//! publish replaces the whole line and bumps the version number.

use std::sync::{Arc, RwLock};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LensStackError, LensStackResult};
use crate::motion::{RealPosition, StageAxis};
use crate::presets::{PresetError, PresetStore, PresetWrite};

/// Preset label of the point recorded at the low z limit
pub const ALIGN_POSITION_ONE: &str = "align_position_one";

/// Preset label of the point recorded at the high z limit
pub const ALIGN_POSITION_TWO: &str = "align_position_two";

/// Two-point line of the beam axis in stage coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationLine {
    /// First point (x, y, z)
    p1: [f64; 3],
    /// Second point (x, y, z)
    p2: [f64; 3],
    /// Calibration timestamp (ISO 8601)
    #[serde(default)]
    timestamp: Option<String>,
}

impl CalibrationLine {
    /// Create a line through two stage positions.
    ///
    /// # Errors
    /// `DegenerateCalibration` if both points have the same z.
    pub fn new(p1: RealPosition, p2: RealPosition) -> LensStackResult<Self> {
        if p1.z == p2.z || !(p2.z - p1.z).is_finite() {
            return Err(LensStackError::DegenerateCalibration { z: p1.z });
        }
        Ok(Self {
            p1: [p1.x, p1.y, p1.z],
            p2: [p2.x, p2.y, p2.z],
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        })
    }

    pub fn point_one(&self) -> RealPosition {
        RealPosition::new(self.p1[0], self.p1[1], self.p1[2])
    }

    pub fn point_two(&self) -> RealPosition {
        RealPosition::new(self.p2[0], self.p2[1], self.p2[2])
    }

    /// When the line was measured, if known
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    /// Stage position on the beam axis at `z`.
    pub fn position_at(&self, z: f64) -> RealPosition {
        let p1 = Vector3::from(self.p1);
        let p2 = Vector3::from(self.p2);
        let t = (z - p1.z) / (p2.z - p1.z);
        let p = p1 + (p2 - p1) * t;
        RealPosition::new(p.x, p.y, z)
    }

    /// Write both points to the preset store under the alignment labels.
    ///
    /// All six presets are written as one batch, so a failed save never
    /// leaves a mix of old and new points behind.
    pub fn save_to_presets(&self, store: &mut dyn PresetStore) -> Result<(), PresetError> {
        let entries: Vec<PresetWrite<'_>> = StageAxis::ALL
            .into_iter()
            .flat_map(|axis| {
                let index = axis as usize;
                [
                    (axis, ALIGN_POSITION_ONE, self.p1[index]),
                    (axis, ALIGN_POSITION_TWO, self.p2[index]),
                ]
            })
            .collect();
        store.add_entries(&entries)
    }

    /// Read a line back from the preset store.
    ///
    /// Returns `Ok(None)` if any of the six presets is missing.
    pub fn load_from_presets(store: &dyn PresetStore) -> LensStackResult<Option<Self>> {
        let mut p1 = [0.0; 3];
        let mut p2 = [0.0; 3];
        for axis in StageAxis::ALL {
            let index = axis as usize;
            let one = store.get_entry(axis, ALIGN_POSITION_ONE).map_err(preset_read_error)?;
            let two = store.get_entry(axis, ALIGN_POSITION_TWO).map_err(preset_read_error)?;
            match (one, two) {
                (Some(one), Some(two)) => {
                    p1[index] = one;
                    p2[index] = two;
                }
                _ => return Ok(None),
            }
        }

        let mut line = Self::new(
            RealPosition::new(p1[0], p1[1], p1[2]),
            RealPosition::new(p2[0], p2[1], p2[2]),
        )?;
        line.timestamp = None;
        Ok(Some(line))
    }
}

fn preset_read_error(err: PresetError) -> LensStackError {
    match err {
        PresetError::Io(e) => LensStackError::Io(e),
        PresetError::Json(e) => LensStackError::Json(e),
        PresetError::Unconfigured => LensStackError::CalibrationMissing,
    }
}

/// A published calibration line with its version number
#[derive(Debug, Clone)]
pub struct VersionedCalibration {
    /// Incremented on every publish, starting at 1
    pub version: u64,
    pub line: Arc<CalibrationLine>,
}

#[derive(Debug, Default)]
struct CalibrationSlot {
    version: u64,
    current: Option<VersionedCalibration>,
}

/// Shared, versioned calibration line.
///
/// Cloning the handle shares the same slot. Readers take a snapshot of the
/// current line; [`CalibrationHandle::publish`] replaces it atomically.
#[derive(Debug, Clone, Default)]
pub struct CalibrationHandle {
    slot: Arc<RwLock<CalibrationSlot>>,
}

impl CalibrationHandle {
    /// Handle with no calibration
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle initialised from the alignment presets, empty if they are missing.
    pub fn load_from_presets(store: &dyn PresetStore) -> LensStackResult<Self> {
        let handle = Self::new();
        match CalibrationLine::load_from_presets(store)? {
            Some(line) => {
                let version = handle.publish(line);
                info!("Loaded alignment calibration from presets (version {version})");
            }
            None => info!("No alignment presets found, lens stack needs align()"),
        }
        Ok(handle)
    }

    /// Replace the calibration line, returning the new version number.
    pub fn publish(&self, line: CalibrationLine) -> u64 {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        slot.version += 1;
        let version = slot.version;
        slot.current = Some(VersionedCalibration {
            version,
            line: Arc::new(line),
        });
        version
    }

    /// Current calibration, if any.
    pub fn snapshot(&self) -> Option<VersionedCalibration> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.current.clone()
    }

    /// Current calibration or `CalibrationMissing`.
    pub fn require(&self) -> LensStackResult<VersionedCalibration> {
        self.snapshot().ok_or(LensStackError::CalibrationMissing)
    }

    /// Version of the current calibration, 0 if none was ever published
    pub fn version(&self) -> u64 {
        self.snapshot().map_or(0, |c| c.version)
    }
}
