//! Focal length of compound refractive lens sets.
//!
//! A single parabolic refractive lens with apex radius `R` has focal length
//! `f = R / (2δ)`. A stack of `N` identical lenses acts as one lens with
//! `f / N`, and stacks of different radii add their inverse focal lengths.

use serde::{Deserialize, Serialize};

use crate::error::{require_positive, OpticsError, OpticsResult};
use crate::material;

/// Apex radii (meters) of the standard Be lens catalogue.
pub const STANDARD_LENS_RADII: [f64; 7] = [
    50e-6, 100e-6, 200e-6, 300e-6, 500e-6, 1000e-6, 1500e-6,
];

/// A group of identical lenses in a stack.
///
/// A missing radius marks a flat (empty) slot that contributes no focusing power.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LensElement {
    /// Number of lenses in the group
    pub count: u32,
    /// Apex radius in meters, `None` for a flat slot
    pub radius: Option<f64>,
}

impl LensElement {
    /// Create a lens group, rejecting a zero count or non-positive radius.
    pub fn new(count: u32, radius: Option<f64>) -> OpticsResult<Self> {
        if count == 0 {
            return Err(OpticsError::InvalidParameter {
                name: "lens count",
                value: 0.0,
            });
        }
        if let Some(r) = radius {
            require_positive("lens radius", r)?;
        }
        Ok(Self { count, radius })
    }

    /// Inverse focal length contributed by this group, 1/m.
    fn focusing_power(&self, delta: f64) -> f64 {
        match self.radius {
            Some(r) => self.count as f64 / single_lens_focal_length_for_delta(r, delta),
            None => 0.0,
        }
    }
}

/// Ordered set of lens groups making up a stack.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<LensElement>", into = "Vec<LensElement>")]
pub struct LensSet {
    elements: Vec<LensElement>,
}

impl LensSet {
    /// Build a lens set, validating every element.
    pub fn new(elements: Vec<LensElement>) -> OpticsResult<Self> {
        for element in &elements {
            LensElement::new(element.count, element.radius)?;
        }
        Ok(Self { elements })
    }

    /// Lens groups in stack order
    pub fn elements(&self) -> &[LensElement] {
        &self.elements
    }

    /// Total number of physical lenses, flat slots included
    pub fn lens_count(&self) -> u32 {
        self.elements.iter().map(|e| e.count).sum()
    }

    /// True when no element has a radius
    pub fn is_flat(&self) -> bool {
        self.elements.iter().all(|e| e.radius.is_none())
    }
}

impl TryFrom<Vec<LensElement>> for LensSet {
    type Error = OpticsError;

    fn try_from(elements: Vec<LensElement>) -> Result<Self, Self::Error> {
        Self::new(elements)
    }
}

impl From<LensSet> for Vec<LensElement> {
    fn from(set: LensSet) -> Self {
        set.elements
    }
}

fn single_lens_focal_length_for_delta(radius: f64, delta: f64) -> f64 {
    (radius / 2.0) / delta
}

/// Focal length in meters of a single lens of the given apex radius.
pub fn single_lens_focal_length(
    energy_kev: f64,
    radius: f64,
    material: &str,
    density: Option<f64>,
) -> OpticsResult<f64> {
    require_positive("lens radius", radius)?;
    let delta = material::delta(material, energy_kev, density)?;
    Ok(single_lens_focal_length_for_delta(radius, delta))
}

/// Focal length in meters of a lens set at a photon energy.
///
/// # Errors
/// `NoFocusingPower` if no element has a radius.
pub fn focal_length(
    energy_kev: f64,
    lens_set: &LensSet,
    material: &str,
    density: Option<f64>,
) -> OpticsResult<f64> {
    if lens_set.is_flat() {
        return Err(OpticsError::NoFocusingPower);
    }

    let delta = material::delta(material, energy_kev, density)?;
    let inverse: f64 = lens_set
        .elements()
        .iter()
        .map(|e| e.focusing_power(delta))
        .sum();

    if inverse <= 0.0 || !inverse.is_finite() {
        return Err(OpticsError::NoFocusingPower);
    }
    Ok(1.0 / inverse)
}
