//! Lens stack controller.
//!
//! Ties the stage motors, the coordinate transform, the safety interlock and
//! the preset store together. Every pseudo-axis move goes through
//! [`LensStack::move_to`]:
//! 1. Insert the beam stop filter; abort with no motion if it fails
//! 2. Read back the stage and solve the real target
//! 3. Check the target against every axis' travel limits
//! 4. Move x, y, then z

use tracing::{info, warn};

use crate::alignment::{jog_stage, AlignmentCalibrator, JogOutcome, OperatorInput};
use crate::calibration::{CalibrationHandle, VersionedCalibration};
use crate::error::{LensStackError, LensStackResult};
use crate::interlock::SafetyInterlock;
use crate::motion::{Motor, RealPosition, Stage, StageAxis};
use crate::presets::PresetStore;
use crate::transform::{BeamSizeTolerance, CoordinateTransform, LensStackConfig, PseudoPosition};

/// Motorized lens stack driven in beam-size and calibrated-z coordinates.
pub struct LensStack<M: Motor> {
    stage: Stage<M>,
    transform: CoordinateTransform,
    interlock: SafetyInterlock,
    presets: Box<dyn PresetStore + Send>,
}

impl<M: Motor> LensStack<M> {
    /// Create a controller, loading the alignment calibration from `presets`.
    pub fn new(
        stage: Stage<M>,
        config: LensStackConfig,
        interlock: SafetyInterlock,
        presets: Box<dyn PresetStore + Send>,
    ) -> LensStackResult<Self> {
        let calibration = CalibrationHandle::load_from_presets(&*presets)?;
        Ok(Self {
            stage,
            transform: CoordinateTransform::new(config, calibration),
            interlock,
            presets,
        })
    }

    pub fn with_tolerance(mut self, tolerance: BeamSizeTolerance) -> Self {
        self.transform = self.transform.with_tolerance(tolerance);
        self
    }

    /// Current stage readback
    pub fn real_position(&mut self) -> LensStackResult<RealPosition> {
        self.stage.position()
    }

    /// Current position in pseudo coordinates
    pub fn position(&mut self) -> LensStackResult<PseudoPosition> {
        let real = self.stage.position()?;
        self.transform.inverse(&real)
    }

    /// Move to a pseudo position behind the safety interlock.
    ///
    /// # Errors
    /// - `InterlockFailed` if the beam stop filter is not in; nothing moves
    /// - `CalibrationMissing`, `Optics` or `OutOfRange` if no valid target
    ///   exists; nothing moves
    /// - `Motion` if an axis fails mid-move
    pub fn move_to(&mut self, target: PseudoPosition) -> LensStackResult<RealPosition> {
        if !self.interlock.make_safe() {
            warn!("Lens move to {target:?} blocked by safety interlock");
            return Err(LensStackError::InterlockFailed);
        }

        let current = self.stage.position()?;
        let real = self
            .transform
            .forward(&target, &current, self.stage.z.limits())?;
        self.stage.check_limits(&real)?;

        for axis in StageAxis::ALL {
            self.stage.move_axis(axis, real.axis(axis))?;
        }
        info!(
            "Lens stack moved to ({:.4}, {:.4}, {:.4}) for beam size {:.3e} m",
            real.x, real.y, real.z, target.beam_size
        );
        Ok(real)
    }

    /// Set the FWHM beam size at the sample, in meters.
    pub fn move_beam_size(&mut self, beam_size: f64) -> LensStackResult<RealPosition> {
        let current = self.position()?;
        self.move_to(PseudoPosition::new(current.calib_z, beam_size))
    }

    /// Move z along the calibrated beam axis, keeping x and y on the beam.
    pub fn move_calib_z(&mut self, z: f64) -> LensStackResult<RealPosition> {
        let current = self.position()?;
        self.move_to(PseudoPosition::new(z, current.beam_size))
    }

    /// Let the operator jog x and y outside of the alignment procedure.
    pub fn tweak(&mut self, operator: &mut dyn OperatorInput) -> LensStackResult<JogOutcome> {
        let outcome = jog_stage(&mut self.stage, operator)?;
        info!("Tweak finished: {outcome:?}");
        Ok(outcome)
    }

    /// Run the two-point alignment, then optionally move to `calib_z`.
    pub fn align(
        &mut self,
        operator: &mut dyn OperatorInput,
        calib_z: Option<f64>,
    ) -> LensStackResult<VersionedCalibration> {
        let calibration = AlignmentCalibrator::new(&mut *self.presets, self.transform.calibration())
            .align(&mut self.stage, operator)?;
        if let Some(z) = calib_z {
            self.move_calib_z(z)?;
        }
        Ok(calibration)
    }

    pub fn config(&self) -> &LensStackConfig {
        self.transform.config()
    }

    /// Reconfigure lenses, energy or geometry; no motion is issued.
    pub fn set_config(&mut self, config: LensStackConfig) {
        info!(
            "Lens stack reconfigured: {} lenses at {} keV",
            config.lens_set.lens_count(),
            config.energy_kev
        );
        self.transform.set_config(config);
    }

    pub fn calibration(&self) -> &CalibrationHandle {
        self.transform.calibration()
    }

    pub fn stage(&self) -> &Stage<M> {
        &self.stage
    }

    pub fn interlock(&self) -> &SafetyInterlock {
        &self.interlock
    }

    pub fn presets(&self) -> &dyn PresetStore {
        &*self.presets
    }
}
