//! Pseudo-axis transform between the stage and the focused beam.
//!
//! The lens stack is driven through two logical axes:
//! - `calib_z`: the stage z position, with x and y following the calibrated beam axis
//! - `beam_size`: the FWHM beam size at the sample, set by the lens-to-sample distance
//!
//! Stage z maps to the lens-to-sample distance `d` (meters) as
//! ```text
//! z = (d - z_offset) · z_direction · z_units_per_meter
//! d = z / z_units_per_meter · z_direction + z_offset
//! ```

use lens_math::{size_at_distance, BeamParameters, LensSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calibration::CalibrationHandle;
use crate::error::{LensStackError, LensStackResult};
use crate::motion::RealPosition;

/// Sign of stage z relative to the lens-to-sample distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZDirection {
    /// Stage z increases with distance
    Positive,
    /// Stage z decreases with distance
    Negative,
}

impl ZDirection {
    /// Signed unit multiplier, ±1
    pub fn sign(&self) -> f64 {
        match self {
            ZDirection::Positive => 1.0,
            ZDirection::Negative => -1.0,
        }
    }
}

/// Lens stack optical and geometric configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensStackConfig {
    /// Lenses currently in the beam
    pub lens_set: LensSet,
    /// Photon energy in keV
    pub energy_kev: f64,
    /// Lens-to-sample distance at stage z = 0, meters
    pub z_offset_m: f64,
    pub z_direction: ZDirection,
    /// Unfocused FWHM beam size at the lens entrance, meters
    pub unfocused_fwhm_m: f64,
    /// Stage z units per meter (1000 for a stage in mm)
    pub z_units_per_meter: f64,
    /// Lens material symbol
    pub material: String,
    /// Material density override in g/cm³
    #[serde(default)]
    pub density: Option<f64>,
}

impl LensStackConfig {
    /// Beryllium lens stack on a mm stage
    pub fn new(lens_set: LensSet, energy_kev: f64, z_offset_m: f64, z_direction: ZDirection) -> Self {
        Self {
            lens_set,
            energy_kev,
            z_offset_m,
            z_direction,
            unfocused_fwhm_m: 500e-6,
            z_units_per_meter: 1000.0,
            material: "Be".to_string(),
            density: None,
        }
    }

    /// Stage z for a lens-to-sample distance in meters
    pub fn distance_to_z(&self, distance_m: f64) -> f64 {
        (distance_m - self.z_offset_m) * self.z_direction.sign() * self.z_units_per_meter
    }

    /// Lens-to-sample distance in meters for a stage z
    pub fn z_to_distance(&self, z: f64) -> f64 {
        z / self.z_units_per_meter * self.z_direction.sign() + self.z_offset_m
    }

    /// Gaussian beam parameters of the current configuration
    pub fn beam_parameters(&self) -> LensStackResult<BeamParameters> {
        Ok(BeamParameters::compute(
            self.energy_kev,
            &self.lens_set,
            &self.material,
            self.density,
            self.unfocused_fwhm_m,
        )?)
    }
}

/// Tolerance for deciding whether a requested beam size differs from the readback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamSizeTolerance {
    /// Relative tolerance
    pub relative: f64,
    /// Absolute tolerance in meters
    pub absolute: f64,
}

impl Default for BeamSizeTolerance {
    fn default() -> Self {
        Self {
            relative: 1e-6,
            absolute: 1e-12,
        }
    }
}

impl BeamSizeTolerance {
    /// `|a - b| <= absolute + relative · |b|`
    pub fn is_close(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.absolute + self.relative * b.abs()
    }
}

/// Logical lens stack position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PseudoPosition {
    /// Stage z along the calibrated beam axis
    pub calib_z: f64,
    /// FWHM beam size at the sample, meters
    pub beam_size: f64,
}

impl PseudoPosition {
    pub fn new(calib_z: f64, beam_size: f64) -> Self {
        Self { calib_z, beam_size }
    }
}

/// Bidirectional mapping between stage and pseudo coordinates.
#[derive(Debug, Clone)]
pub struct CoordinateTransform {
    config: LensStackConfig,
    calibration: CalibrationHandle,
    tolerance: BeamSizeTolerance,
}

impl CoordinateTransform {
    pub fn new(config: LensStackConfig, calibration: CalibrationHandle) -> Self {
        Self {
            config,
            calibration,
            tolerance: BeamSizeTolerance::default(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: BeamSizeTolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn config(&self) -> &LensStackConfig {
        &self.config
    }

    /// Replace the lens stack configuration
    pub fn set_config(&mut self, config: LensStackConfig) {
        self.config = config;
    }

    pub fn calibration(&self) -> &CalibrationHandle {
        &self.calibration
    }

    pub fn tolerance(&self) -> BeamSizeTolerance {
        self.tolerance
    }

    /// Pseudo position for a stage position.
    pub fn inverse(&self, real: &RealPosition) -> LensStackResult<PseudoPosition> {
        let distance = self.config.z_to_distance(real.z);
        let beam_size = size_at_distance(
            self.config.energy_kev,
            &self.config.lens_set,
            distance,
            &self.config.material,
            self.config.density,
            self.config.unfocused_fwhm_m,
        )?;
        Ok(PseudoPosition::new(real.z, beam_size))
    }

    /// Stage position for a pseudo target.
    ///
    /// If the target beam size differs from the size at `current`, z is
    /// solved from the beam size and `target.calib_z` is ignored; otherwise
    /// `target.calib_z` is used as z. x and y always follow the calibration
    /// line. `z_limits` steers the choice between the two focus-symmetric
    /// solutions for z.
    pub fn forward(
        &self,
        target: &PseudoPosition,
        current: &RealPosition,
        z_limits: (f64, f64),
    ) -> LensStackResult<RealPosition> {
        let calibration = self.calibration.require()?;
        let current_size = self.inverse(current)?.beam_size;

        let z = if self.tolerance.is_close(target.beam_size, current_size) {
            target.calib_z
        } else {
            let (near, far) = self
                .config
                .beam_parameters()?
                .distances_for_fwhm(target.beam_size)?;
            let candidates = (self.config.distance_to_z(near), self.config.distance_to_z(far));
            let z = select_z(candidates, current.z, z_limits);
            debug!(
                beam_size = target.beam_size,
                near_z = candidates.0,
                far_z = candidates.1,
                selected_z = z,
                "Solved z for beam size"
            );
            z
        };

        Ok(calibration.line.position_at(z))
    }
}

/// Pick one of two candidate z positions.
///
/// Candidates inside `limits` win over those outside; among equals the one
/// nearest `current_z` wins; an exact tie goes to the first candidate.
fn select_z(candidates: (f64, f64), current_z: f64, limits: (f64, f64)) -> f64 {
    let (low, high) = limits;
    let reachable = |z: f64| (low..=high).contains(&z);
    let (a, b) = candidates;
    match (reachable(a), reachable(b)) {
        (true, false) => a,
        (false, true) => b,
        _ => {
            if (b - current_z).abs() < (a - current_z).abs() {
                b
            } else {
                a
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationLine;
    use approx::assert_relative_eq;
    use lens_math::{LensElement, OpticsError};

    const LIMITS: (f64, f64) = (-100.0, 100.0);

    fn config() -> LensStackConfig {
        let lenses = LensSet::new(vec![LensElement::new(10, Some(100e-6)).unwrap()]).unwrap();
        LensStackConfig::new(lenses, 9.5, 1.0, ZDirection::Positive)
    }

    fn calibrated(config: LensStackConfig) -> CoordinateTransform {
        let handle = CalibrationHandle::new();
        handle.publish(
            CalibrationLine::new(
                RealPosition::new(0.0, 0.0, 0.0),
                RealPosition::new(10.0, 20.0, 100.0),
            )
            .unwrap(),
        );
        CoordinateTransform::new(config, handle)
    }

    #[test]
    fn test_z_distance_conversion() {
        let mut c = config();
        c.z_offset_m = 0.5;
        c.z_direction = ZDirection::Negative;
        assert_relative_eq!(c.distance_to_z(0.45), 50.0, epsilon = 1e-9);
        assert_relative_eq!(c.z_to_distance(50.0), 0.45, epsilon = 1e-12);
    }

    #[test]
    fn test_calib_z_branch_interpolates() {
        let t = calibrated(config());
        let current = RealPosition::new(0.0, 0.0, 10.0);
        let size = t.inverse(&current).unwrap().beam_size;

        let real = t
            .forward(&PseudoPosition::new(50.0, size), &current, LIMITS)
            .unwrap();
        assert_relative_eq!(real.x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(real.y, 10.0, epsilon = 1e-12);
        assert_relative_eq!(real.z, 50.0, epsilon = 1e-12);
    }

    #[test]
    fn test_beam_size_branch_roundtrip() {
        let t = calibrated(config());
        let current = RealPosition::new(0.0, 0.0, -20.0);
        let beam = t.config().beam_parameters().unwrap();

        let target = PseudoPosition::new(0.0, 3.0 * beam.waist_fwhm());
        let real = t.forward(&target, &current, LIMITS).unwrap();
        let readback = t.inverse(&real).unwrap();

        assert_relative_eq!(readback.beam_size, target.beam_size, max_relative = 1e-6);
        assert_relative_eq!(readback.calib_z, real.z);
        // x and y follow the calibration line
        assert_relative_eq!(real.x, real.z / 10.0, epsilon = 1e-9);
        assert_relative_eq!(real.y, real.z / 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_beam_size_branch_ignores_calib_z() {
        let t = calibrated(config());
        let current = RealPosition::new(0.0, 0.0, 0.0);
        let beam = t.config().beam_parameters().unwrap();

        let a = t
            .forward(&PseudoPosition::new(-80.0, 2.0 * beam.waist_fwhm()), &current, LIMITS)
            .unwrap();
        let b = t
            .forward(&PseudoPosition::new(80.0, 2.0 * beam.waist_fwhm()), &current, LIMITS)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_root_nearest_current_z() {
        let mut c = config();
        // put the focus at stage z = 0
        let f = c.beam_parameters().unwrap().focal_length;
        c.z_offset_m = f;
        let t = calibrated(c);
        let beam = t.config().beam_parameters().unwrap();
        let target = PseudoPosition::new(0.0, 4.0 * beam.waist_fwhm());

        let above = t
            .forward(&target, &RealPosition::new(0.0, 0.0, 30.0), LIMITS)
            .unwrap();
        let below = t
            .forward(&target, &RealPosition::new(0.0, 0.0, -30.0), LIMITS)
            .unwrap();
        assert!(above.z > 0.0);
        assert!(below.z < 0.0);
        assert_relative_eq!(above.z, -below.z, max_relative = 1e-6);
    }

    #[test]
    fn test_select_z_prefers_reachable_root() {
        // nearest is out of range, so the reachable one wins
        assert_eq!(select_z((-150.0, 50.0), -120.0, LIMITS), 50.0);
        assert_eq!(select_z((-50.0, 150.0), 140.0, LIMITS), -50.0);
        // both reachable: nearest
        assert_eq!(select_z((-50.0, 50.0), 40.0, LIMITS), 50.0);
        // exact tie: first
        assert_eq!(select_z((-50.0, 50.0), 0.0, LIMITS), -50.0);
        // neither reachable: nearest, left for the limit check to reject
        assert_eq!(select_z((-150.0, 150.0), 120.0, LIMITS), 150.0);
    }

    #[test]
    fn test_calibration_missing() {
        let t = CoordinateTransform::new(config(), CalibrationHandle::new());
        let result = t.forward(
            &PseudoPosition::new(10.0, 1e-3),
            &RealPosition::new(0.0, 0.0, 0.0),
            LIMITS,
        );
        assert!(matches!(result, Err(LensStackError::CalibrationMissing)));
    }

    #[test]
    fn test_forward_reads_latest_calibration() {
        let t = calibrated(config());
        let current = RealPosition::new(0.0, 0.0, 0.0);
        let size = t.inverse(&current).unwrap().beam_size;
        let target = PseudoPosition::new(50.0, size);

        assert_relative_eq!(t.forward(&target, &current, LIMITS).unwrap().x, 5.0);

        t.calibration().publish(
            CalibrationLine::new(
                RealPosition::new(2.0, 2.0, 0.0),
                RealPosition::new(2.0, 2.0, 100.0),
            )
            .unwrap(),
        );
        assert_relative_eq!(t.forward(&target, &current, LIMITS).unwrap().x, 2.0);
    }

    #[test]
    fn test_unreachable_size_aborts() {
        let t = calibrated(config());
        let beam = t.config().beam_parameters().unwrap();
        let result = t.forward(
            &PseudoPosition::new(0.0, beam.waist_fwhm() / 2.0),
            &RealPosition::new(0.0, 0.0, 0.0),
            LIMITS,
        );
        assert!(matches!(
            result,
            Err(LensStackError::Optics(OpticsError::BeamSizeUnreachable { .. }))
        ));
    }

    #[test]
    fn test_tolerance() {
        let tol = BeamSizeTolerance::default();
        assert!(tol.is_close(10e-6, 10e-6 * (1.0 + 1e-7)));
        assert!(!tol.is_close(10e-6, 10.1e-6));
    }
}
