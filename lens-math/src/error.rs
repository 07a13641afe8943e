//! Error types for optics computations.

use thiserror::Error;

/// Error raised by the lens optics model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpticsError {
    /// No element of the lens set has a radius, so the set does not focus
    #[error("lens set has no focusing power")]
    NoFocusingPower,

    /// Requested beam size is smaller than the focused waist
    #[error("beam size {target_fwhm:.3e} m is below the focused waist {waist_fwhm:.3e} m")]
    BeamSizeUnreachable {
        /// Requested FWHM size in meters
        target_fwhm: f64,
        /// Smallest reachable FWHM size in meters
        waist_fwhm: f64,
    },

    /// Material is not present in the scattering-factor table
    #[error("unknown lens material: {0}")]
    UnknownMaterial(String),

    /// Photon energy outside the tabulated range of the material
    #[error("energy {energy_kev} keV is outside the tabulated range ({min_kev}, {max_kev}) keV for {material}")]
    EnergyOutOfRange {
        material: String,
        energy_kev: f64,
        min_kev: f64,
        max_kev: f64,
    },

    /// A physical parameter was zero, negative or not finite
    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Result type for optics computations
pub type OpticsResult<T> = Result<T, OpticsError>;

/// Reject values that are not strictly positive and finite.
pub(crate) fn require_positive(name: &'static str, value: f64) -> OpticsResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(OpticsError::InvalidParameter { name, value })
    }
}
