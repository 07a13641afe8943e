//! Error types for lens stack control.

use lens_math::OpticsError;
use thiserror::Error;

use crate::calibration::CalibrationLine;
use crate::motion::StageAxis;
use crate::presets::PresetError;

/// Error raised by lens stack operations
#[derive(Error, Debug)]
pub enum LensStackError {
    /// Optics model rejected the configuration or the requested size
    #[error("optics error: {0}")]
    Optics(#[from] OpticsError),

    /// No two-point alignment has been established
    #[error("no alignment calibration: run align() and save the alignment presets")]
    CalibrationMissing,

    /// Both calibration points share the same z
    #[error("degenerate calibration line: both points at z={z}")]
    DegenerateCalibration { z: f64 },

    /// Calibration was measured but could not be persisted
    #[error("calibration measured but not saved: {reason}")]
    PresetStoreUnavailable {
        /// The measured calibration, so the caller can persist it elsewhere
        line: Box<CalibrationLine>,
        /// Why the preset store rejected the write
        #[source]
        reason: PresetError,
    },

    /// Protective attenuator is absent or did not insert
    #[error("safety interlock failed: beam stop attenuator is not inserted")]
    InterlockFailed,

    /// Operator quit the jog step of the alignment procedure
    #[error("alignment cancelled by operator")]
    AlignmentCancelled,

    /// Computed target lies outside an axis' travel limits
    #[error("{axis} target {target:.4} outside travel limits ({low:.4}, {high:.4})")]
    OutOfRange {
        axis: StageAxis,
        target: f64,
        low: f64,
        high: f64,
    },

    /// Motor or device communication failure
    #[error("motion error: {0}")]
    Motion(String),

    /// Lens cartridge reported a state that is not known
    #[error("unknown lens cartridge state: {0}")]
    UnknownState(String),

    /// IO error reading or writing configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for lens stack operations
pub type LensStackResult<T> = Result<T, LensStackError>;
