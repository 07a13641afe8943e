//! Lens materials and their X-ray refractive index.
//!
//! The refractive index of a material for hard X-rays is slightly below one:
//! ```text
//! n = 1 - δ - iβ
//! δ = r_e λ² n_a f1 / (2π)
//! β = r_e λ² n_a f2 / (2π)
//! ```
//! where `r_e` is the classical electron radius, `λ` the wavelength, `n_a` the
//! atomic number density and `f1`, `f2` the real and imaginary atomic
//! scattering factors. The factors are tabulated per material between 1 and
//! 50 keV and interpolated (linear for f1, log-log for f2).

use num_complex::Complex64;
use std::f64::consts::PI;

use crate::error::{require_positive, OpticsError, OpticsResult};

/// Photon energy-wavelength product in keV·Å
pub const HC_KEV_ANGSTROM: f64 = 12.398;

/// Classical electron radius in meters
pub const CLASSICAL_ELECTRON_RADIUS_M: f64 = 2.817_940_326_2e-15;

/// Avogadro constant in 1/mol
pub const AVOGADRO: f64 = 6.022_140_76e23;

const TABLE_ENERGIES_KEV: [f64; 15] = [
    1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 12.0, 15.0, 20.0, 25.0, 30.0, 40.0, 50.0,
];

/// Photon wavelength in meters for an energy in keV.
pub fn wavelength_m(energy_kev: f64) -> f64 {
    HC_KEV_ANGSTROM / energy_kev * 1e-10
}

/// A lens material with its tabulated atomic scattering factors.
#[derive(Debug)]
pub struct Material {
    /// Chemical symbol used for lookup (e.g. "Be")
    pub symbol: &'static str,
    /// Human readable name
    pub name: &'static str,
    /// Molar mass in g/mol
    pub molar_mass: f64,
    /// Nominal density in g/cm³
    pub density: f64,
    energies_kev: &'static [f64],
    f1: &'static [f64],
    f2: &'static [f64],
}

// f1 and f2 from the Henke atomic scattering factor tables (CXRO), sampled at TABLE_ENERGIES_KEV
static MATERIALS: [Material; 2] = [
    Material {
        symbol: "Be",
        name: "Beryllium",
        molar_mass: 9.012_183,
        density: 1.848,
        energies_kev: &TABLE_ENERGIES_KEV,
        f1: &[
            4.045, 4.015, 4.008, 4.005, 4.003, 4.002, 4.001, 4.000, 4.000, 3.999, 3.999, 3.999,
            3.999, 3.999, 3.999,
        ],
        f2: &[
            6.4e-2, 1.6e-2, 7.1e-3, 4.0e-3, 2.56e-3, 1.78e-3, 1.0e-3, 6.4e-4, 4.4e-4, 2.8e-4,
            1.6e-4, 1.0e-4, 7.1e-5, 4.0e-5, 2.56e-5,
        ],
    },
    Material {
        symbol: "C",
        name: "Diamond",
        molar_mass: 12.011,
        density: 3.51,
        energies_kev: &TABLE_ENERGIES_KEV,
        f1: &[
            6.100, 6.030, 6.015, 6.010, 6.006, 6.004, 6.002, 6.001, 6.000, 6.000, 5.999, 5.999,
            5.999, 5.999, 5.999,
        ],
        f2: &[
            5.9e-1, 1.5e-1, 6.6e-2, 3.7e-2, 2.4e-2, 1.65e-2, 9.3e-3, 6.0e-3, 4.1e-3, 2.6e-3,
            1.5e-3, 9.5e-4, 6.6e-4, 3.7e-4, 2.4e-4,
        ],
    },
];

impl Material {
    /// Look up a material by chemical symbol (case-sensitive, e.g. "Be").
    pub fn lookup(symbol: &str) -> OpticsResult<&'static Material> {
        MATERIALS
            .iter()
            .find(|m| m.symbol == symbol)
            .ok_or_else(|| OpticsError::UnknownMaterial(symbol.to_string()))
    }

    /// All materials with tabulated scattering factors.
    pub fn all() -> &'static [Material] {
        &MATERIALS
    }

    /// Tabulated energy range `(min, max)` in keV
    pub fn energy_range(&self) -> (f64, f64) {
        (
            self.energies_kev[0],
            self.energies_kev[self.energies_kev.len() - 1],
        )
    }

    /// Interpolated atomic scattering factors `(f1, f2)` at an energy.
    pub fn scattering_factors(&self, energy_kev: f64) -> OpticsResult<(f64, f64)> {
        require_positive("energy", energy_kev)?;
        let (min_kev, max_kev) = self.energy_range();
        if energy_kev < min_kev || energy_kev > max_kev {
            return Err(OpticsError::EnergyOutOfRange {
                material: self.symbol.to_string(),
                energy_kev,
                min_kev,
                max_kev,
            });
        }

        // Index of the upper bracketing grid point, clamped so i-1 is valid
        let upper = self
            .energies_kev
            .partition_point(|&e| e < energy_kev)
            .clamp(1, self.energies_kev.len() - 1);
        let lower = upper - 1;

        let (e0, e1) = (self.energies_kev[lower], self.energies_kev[upper]);
        let t = (energy_kev - e0) / (e1 - e0);
        let f1 = self.f1[lower] + (self.f1[upper] - self.f1[lower]) * t;

        let log_t = (energy_kev.ln() - e0.ln()) / (e1.ln() - e0.ln());
        let log_f2 = self.f2[lower].ln() + (self.f2[upper].ln() - self.f2[lower].ln()) * log_t;

        Ok((f1, log_f2.exp()))
    }

    /// Complex refractive index `1 - δ - iβ` at an energy.
    ///
    /// `density` overrides the nominal density (g/cm³) when given.
    pub fn refractive_index(&self, energy_kev: f64, density: Option<f64>) -> OpticsResult<Complex64> {
        let density = match density {
            Some(d) => require_positive("density", d)?,
            None => self.density,
        };
        let (f1, f2) = self.scattering_factors(energy_kev)?;

        // atoms per m³ from g/cm³
        let number_density = density * 1e6 * AVOGADRO / self.molar_mass;
        let lambda = wavelength_m(energy_kev);
        let scale = CLASSICAL_ELECTRON_RADIUS_M * lambda * lambda * number_density / (2.0 * PI);

        Ok(Complex64::new(1.0 - scale * f1, -scale * f2))
    }
}

/// Complex refractive index of a named material.
pub fn refractive_index(
    material: &str,
    energy_kev: f64,
    density: Option<f64>,
) -> OpticsResult<Complex64> {
    Material::lookup(material)?.refractive_index(energy_kev, density)
}

/// Index of refraction deviation δ = 1 - Re(n).
pub fn delta(material: &str, energy_kev: f64, density: Option<f64>) -> OpticsResult<f64> {
    let n = refractive_index(material, energy_kev, density)?;
    Ok(1.0 - n.re)
}
