//! Gaussian beam propagation through a focusing lens set.
//!
//! The unfocused beam at the lens entrance is characterised by its FWHM.
//! Sizes are converted to the 1/e² half-width `w` with `w = FWHM · 2/2.35`
//! and the focused beam follows the usual Gaussian optics:
//! ```text
//! w0   = λ F / (π w_unfocused)          focused waist
//! z_R  = π w0² / λ                      Rayleigh range
//! w(d) = w0 sqrt(1 + ((d - F) / z_R)²)  size at distance d from the lens
//! ```

use std::f64::consts::PI;

use tracing::debug;

use crate::error::{require_positive, OpticsError, OpticsResult};
use crate::focal::{focal_length, LensSet};
use crate::material::wavelength_m;

/// Conversion factor from FWHM to the 1/e² half-width
pub const FWHM_TO_WAIST: f64 = 2.0 / 2.35;

/// Conversion factor from the 1/e² half-width to FWHM
pub const WAIST_TO_FWHM: f64 = 2.35 / 2.0;

/// Derived Gaussian beam parameters for one lens configuration.
///
/// Always recomputed from energy, lens set and unfocused size; never stored
/// alongside them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamParameters {
    /// Wavelength in meters
    pub wavelength: f64,
    /// Focal length of the lens set in meters
    pub focal_length: f64,
    /// Focused 1/e² waist half-width in meters
    pub waist: f64,
    /// Rayleigh range in meters
    pub rayleigh_range: f64,
    /// Unfocused 1/e² half-width at the lens in meters
    pub unfocused_waist: f64,
}

impl BeamParameters {
    /// Compute the beam parameters for a lens set at an energy.
    pub fn compute(
        energy_kev: f64,
        lens_set: &LensSet,
        material: &str,
        density: Option<f64>,
        unfocused_fwhm: f64,
    ) -> OpticsResult<Self> {
        require_positive("energy", energy_kev)?;
        require_positive("unfocused FWHM", unfocused_fwhm)?;

        let focal_length = focal_length(energy_kev, lens_set, material, density)?;
        let wavelength = wavelength_m(energy_kev);
        let unfocused_waist = unfocused_fwhm * FWHM_TO_WAIST;
        // divergence of the focused beam is w_unfocused / f
        let waist = wavelength / PI * focal_length / unfocused_waist;
        let rayleigh_range = PI * waist * waist / wavelength;

        Ok(Self {
            wavelength,
            focal_length,
            waist,
            rayleigh_range,
            unfocused_waist,
        })
    }

    /// Smallest reachable FWHM size, at the focus
    pub fn waist_fwhm(&self) -> f64 {
        self.waist * WAIST_TO_FWHM
    }

    /// 1/e² half-width at a distance from the lens
    pub fn waist_at(&self, distance: f64) -> f64 {
        let z = (distance - self.focal_length) / self.rayleigh_range;
        self.waist * (1.0 + z * z).sqrt()
    }

    /// FWHM size at a distance from the lens
    pub fn fwhm_at(&self, distance: f64) -> f64 {
        self.waist_at(distance) * WAIST_TO_FWHM
    }

    /// Distances `(before, after)` the focus at which the beam has the target FWHM.
    ///
    /// # Errors
    /// `BeamSizeUnreachable` if the target is smaller than the focused waist.
    pub fn distances_for_fwhm(&self, target_fwhm: f64) -> OpticsResult<(f64, f64)> {
        require_positive("target FWHM", target_fwhm)?;
        let waist_fwhm = self.waist_fwhm();
        if target_fwhm < waist_fwhm {
            return Err(OpticsError::BeamSizeUnreachable {
                target_fwhm,
                waist_fwhm,
            });
        }

        let ratio = target_fwhm * FWHM_TO_WAIST / self.waist;
        // rounding can put a target equal to the waist just below it
        let offset = self.rayleigh_range * (ratio * ratio - 1.0).max(0.0).sqrt();
        Ok((self.focal_length - offset, self.focal_length + offset))
    }

    fn log_summary(&self, distance: f64, size: f64) {
        debug!(
            unfocused_fwhm = self.unfocused_waist * WAIST_TO_FWHM,
            waist = self.waist,
            waist_fwhm = self.waist_fwhm(),
            rayleigh_range = self.rayleigh_range,
            focal_length = self.focal_length,
            distance,
            size,
            size_fwhm = size * WAIST_TO_FWHM,
            "beam propagation"
        );
    }
}

/// Focused FWHM beam size at a distance (meters) from the lens set.
pub fn size_at_distance(
    energy_kev: f64,
    lens_set: &LensSet,
    distance: f64,
    material: &str,
    density: Option<f64>,
    unfocused_fwhm: f64,
) -> OpticsResult<f64> {
    if !distance.is_finite() {
        return Err(OpticsError::InvalidParameter {
            name: "distance",
            value: distance,
        });
    }
    let beam = BeamParameters::compute(energy_kev, lens_set, material, density, unfocused_fwhm)?;
    let size = beam.waist_at(distance);
    beam.log_summary(distance, size);
    Ok(size * WAIST_TO_FWHM)
}

/// The two distances `(F - Δ, F + Δ)` from the lens at which the beam has the target FWHM.
///
/// # Errors
/// `BeamSizeUnreachable` if the target is smaller than the focused waist.
pub fn distance_for_size(
    target_fwhm: f64,
    energy_kev: f64,
    lens_set: &LensSet,
    material: &str,
    density: Option<f64>,
    unfocused_fwhm: f64,
) -> OpticsResult<(f64, f64)> {
    let beam = BeamParameters::compute(energy_kev, lens_set, material, density, unfocused_fwhm)?;
    beam.distances_for_fwhm(target_fwhm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focal::LensElement;
    use approx::assert_relative_eq;

    const ENERGY: f64 = 9.5;
    const UNFOCUSED: f64 = 500e-6;

    fn lenses() -> LensSet {
        LensSet::new(vec![
            LensElement::new(3, Some(50e-6)).unwrap(),
            LensElement::new(2, Some(200e-6)).unwrap(),
            LensElement::new(1, None).unwrap(),
        ])
        .unwrap()
    }

    fn params() -> BeamParameters {
        BeamParameters::compute(ENERGY, &lenses(), "Be", None, UNFOCUSED).unwrap()
    }

    #[test]
    fn test_parameters_are_consistent() {
        let p = params();
        assert_relative_eq!(p.wavelength, 12.398 / ENERGY * 1e-10, max_relative = 1e-12);
        assert_relative_eq!(
            p.waist,
            p.wavelength * p.focal_length / (PI * UNFOCUSED * FWHM_TO_WAIST),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            p.rayleigh_range,
            PI * p.waist * p.waist / p.wavelength,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_minimum_size_at_focus() {
        let p = params();
        let at_focus =
            size_at_distance(ENERGY, &lenses(), p.focal_length, "Be", None, UNFOCUSED).unwrap();
        assert_relative_eq!(at_focus, p.waist_fwhm(), max_relative = 1e-12);
    }

    #[test]
    fn test_size_increases_away_from_focus() {
        let p = params();
        let f = p.focal_length;
        let step = p.rayleigh_range / 4.0;

        let mut previous = p.fwhm_at(f);
        for i in 1..40 {
            let after = p.fwhm_at(f + step * i as f64);
            let before = p.fwhm_at(f - step * i as f64);
            assert!(after > previous, "not increasing after focus at step {i}");
            assert_relative_eq!(after, before, max_relative = 1e-9);
            previous = after;
        }
    }

    #[test]
    fn test_distance_roundtrip() {
        let p = params();
        for d in [
            p.focal_length * 0.5,
            p.focal_length - 3.0 * p.rayleigh_range,
            p.focal_length + 0.1 * p.rayleigh_range,
            p.focal_length * 1.7,
        ] {
            let size = size_at_distance(ENERGY, &lenses(), d, "Be", None, UNFOCUSED).unwrap();
            let (near, far) =
                distance_for_size(size, ENERGY, &lenses(), "Be", None, UNFOCUSED).unwrap();
            assert!(near <= far);
            let recovered = if (near - d).abs() < (far - d).abs() {
                near
            } else {
                far
            };
            assert_relative_eq!(recovered, d, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_roots_are_symmetric_about_focus() {
        let p = params();
        let (near, far) = p.distances_for_fwhm(10.0 * p.waist_fwhm()).unwrap();
        assert_relative_eq!(
            (near + far) / 2.0,
            p.focal_length,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_waist_size_gives_focal_distance() {
        let p = params();
        let (near, far) = p.distances_for_fwhm(p.waist_fwhm()).unwrap();
        assert_relative_eq!(near, p.focal_length, max_relative = 1e-9);
        assert_relative_eq!(far, p.focal_length, max_relative = 1e-9);
    }

    #[test]
    fn test_size_below_waist_is_unreachable() {
        let p = params();
        let result = distance_for_size(
            p.waist_fwhm() * 0.5,
            ENERGY,
            &lenses(),
            "Be",
            None,
            UNFOCUSED,
        );
        assert!(matches!(
            result,
            Err(OpticsError::BeamSizeUnreachable { .. })
        ));
    }

    #[test]
    fn test_unfocused_size_at_lens() {
        // Far from a long Rayleigh range the beam at the lens is close to its entrance size
        let p = params();
        assert_relative_eq!(p.fwhm_at(0.0), UNFOCUSED, max_relative = 1e-3);
    }

    #[test]
    fn test_flat_lens_set_propagates_error() {
        let flat = LensSet::new(vec![LensElement::new(2, None).unwrap()]).unwrap();
        assert_eq!(
            size_at_distance(ENERGY, &flat, 1.0, "Be", None, UNFOCUSED),
            Err(OpticsError::NoFocusingPower)
        );
        assert_eq!(
            distance_for_size(1e-6, ENERGY, &flat, "Be", None, UNFOCUSED),
            Err(OpticsError::NoFocusingPower)
        );
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            BeamParameters::compute(ENERGY, &lenses(), "Be", None, 0.0),
            Err(OpticsError::InvalidParameter { .. })
        ));
        assert!(matches!(
            size_at_distance(ENERGY, &lenses(), f64::NAN, "Be", None, UNFOCUSED),
            Err(OpticsError::InvalidParameter { .. })
        ));
    }
}
