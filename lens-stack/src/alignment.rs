//! Two-point alignment of the lens stack to the beam.
//!
//! The procedure:
//! 1. Move z to its low travel limit
//! 2. Operator jogs x and y until the beam passes through the lenses
//! 3. Record (x, y, z) as point one
//! 4. Move z to its high travel limit and repeat the jog
//! 5. Record point two, save both points to the preset store
//!
//! The resulting [`CalibrationLine`] is published to the shared
//! [`CalibrationHandle`] only once it has been saved.

use tracing::{info, warn};

use crate::calibration::{CalibrationHandle, CalibrationLine, VersionedCalibration};
use crate::error::{LensStackError, LensStackResult};
use crate::motion::{Motor, RealPosition, Stage, StageAxis};
use crate::presets::PresetStore;

/// How the operator ended a jog session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogOutcome {
    /// Operator accepted the current position
    Accepted,
    /// Operator quit; the procedure must stop
    Cancelled,
}

/// Source of operator jog input (keyboard, GUI, script).
///
/// `jog` blocks until the operator accepts the position or cancels.
pub trait OperatorInput {
    fn jog(&mut self, x: &mut dyn Motor, y: &mut dyn Motor) -> Result<JogOutcome, String>;
}

/// Run a jog session on the x and y motors of a stage.
pub fn jog_stage<M: Motor>(
    stage: &mut Stage<M>,
    operator: &mut dyn OperatorInput,
) -> LensStackResult<JogOutcome> {
    let Stage { x, y, .. } = stage;
    operator.jog(x, y).map_err(LensStackError::Motion)
}

/// Two-point alignment procedure.
pub struct AlignmentCalibrator<'a> {
    presets: &'a mut dyn PresetStore,
    calibration: &'a CalibrationHandle,
}

impl<'a> AlignmentCalibrator<'a> {
    pub fn new(presets: &'a mut dyn PresetStore, calibration: &'a CalibrationHandle) -> Self {
        Self {
            presets,
            calibration,
        }
    }

    /// Measure, save and publish a new calibration line.
    ///
    /// # Errors
    /// - `AlignmentCancelled` if the operator quits either jog
    /// - `PresetStoreUnavailable` if the points were measured but could not
    ///   be saved; the error carries the measured line
    pub fn align<M: Motor>(
        &mut self,
        stage: &mut Stage<M>,
        operator: &mut dyn OperatorInput,
    ) -> LensStackResult<VersionedCalibration> {
        let line = Self::measure(stage, operator)?;

        if let Err(reason) = line.save_to_presets(&mut *self.presets) {
            warn!("Alignment measured but presets could not be saved: {reason}");
            return Err(LensStackError::PresetStoreUnavailable {
                line: Box::new(line),
                reason,
            });
        }

        let version = self.calibration.publish(line);
        info!("Alignment calibration saved (version {version})");
        self.calibration.require()
    }

    /// Collect both calibration points without saving them.
    pub fn measure<M: Motor>(
        stage: &mut Stage<M>,
        operator: &mut dyn OperatorInput,
    ) -> LensStackResult<CalibrationLine> {
        let (low, high) = stage.z.limits();
        let p1 = Self::measure_point(stage, operator, low)?;
        info!("Alignment point one: ({:.4}, {:.4}, {:.4})", p1.x, p1.y, p1.z);
        let p2 = Self::measure_point(stage, operator, high)?;
        info!("Alignment point two: ({:.4}, {:.4}, {:.4})", p2.x, p2.y, p2.z);
        CalibrationLine::new(p1, p2)
    }

    fn measure_point<M: Motor>(
        stage: &mut Stage<M>,
        operator: &mut dyn OperatorInput,
        z: f64,
    ) -> LensStackResult<RealPosition> {
        info!("Moving z to {z:.4} for alignment");
        stage.move_axis(StageAxis::Z, z)?;

        match jog_stage(stage, operator)? {
            JogOutcome::Accepted => stage.position(),
            JogOutcome::Cancelled => {
                info!("Alignment cancelled by operator");
                Err(LensStackError::AlignmentCancelled)
            }
        }
    }
}
