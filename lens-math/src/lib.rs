//! lens-math - Optics for compound refractive X-ray lens stacks
//!
//! This crate provides the physics used to drive a motorized stack of
//! beryllium compound refractive lenses (CRLs):
//!
//! - **Material** - tabulated atomic scattering factors and the complex
//!   refractive index of lens materials
//! - **Focal** - focal length of a lens set at a given photon energy
//! - **Beam** - Gaussian beam propagation: focused size at a distance and the
//!   distances at which a target size is reached
//!
//! All lengths are in meters and photon energies in keV.
//!
//! # Example
//!
//! ```
//! use lens_math::{focal_length, LensElement, LensSet};
//!
//! let lenses = LensSet::new(vec![LensElement::new(10, Some(50e-6)).unwrap()]).unwrap();
//! let f = focal_length(9.5, &lenses, "Be", None).unwrap();
//! assert!(f > 0.0 && f.is_finite());
//! ```

pub mod beam;
pub mod error;
pub mod focal;
pub mod material;

pub use beam::{
    distance_for_size, size_at_distance, BeamParameters, FWHM_TO_WAIST, WAIST_TO_FWHM,
};
pub use error::{OpticsError, OpticsResult};
pub use focal::{focal_length, single_lens_focal_length, LensElement, LensSet, STANDARD_LENS_RADII};
pub use material::{delta, refractive_index, wavelength_m, Material, HC_KEV_ANGSTROM};
