//! XFLS lens cartridge positioner.
//!
//! The XFLS holds three lens stacks on a single in/out mechanism. Exactly one
//! of `LENS1`, `LENS2`, `LENS3` or `OUT` is selected at a time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LensStackError, LensStackResult};

/// Transmission of a single lens stack in the beam
pub const LENS_TRANSMISSION: f64 = 0.8;

/// Device that moves between named states.
pub trait StatePositioner {
    /// Current state name
    fn state(&mut self) -> Result<String, String>;

    /// Move to a named state and wait for completion
    fn set_state(&mut self, state: &str) -> Result<(), String>;
}

/// Cartridge position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum XflsState {
    Lens1,
    Lens2,
    Lens3,
    Out,
}

impl XflsState {
    pub const ALL: [XflsState; 4] = [
        XflsState::Lens1,
        XflsState::Lens2,
        XflsState::Lens3,
        XflsState::Out,
    ];

    /// State name as reported by the device
    pub fn as_str(&self) -> &'static str {
        match self {
            XflsState::Lens1 => "LENS1",
            XflsState::Lens2 => "LENS2",
            XflsState::Lens3 => "LENS3",
            XflsState::Out => "OUT",
        }
    }

    /// Whether a lens stack is in the beam
    pub fn is_inserted(&self) -> bool {
        !matches!(self, XflsState::Out)
    }

    /// Beam transmission in this state
    pub fn transmission(&self) -> f64 {
        if self.is_inserted() {
            LENS_TRANSMISSION
        } else {
            1.0
        }
    }
}

impl fmt::Display for XflsState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for XflsState {
    type Err = LensStackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LensStackError::UnknownState(s.to_string()))
    }
}

/// XFLS cartridge on top of a named-state positioner.
pub struct Xfls<P: StatePositioner> {
    positioner: P,
}

impl<P: StatePositioner> Xfls<P> {
    pub fn new(positioner: P) -> Self {
        Self { positioner }
    }

    /// Current cartridge state
    pub fn state(&mut self) -> LensStackResult<XflsState> {
        self.positioner
            .state()
            .map_err(LensStackError::Motion)?
            .parse()
    }

    /// Move a lens stack into the beam.
    pub fn insert(&mut self, lens: XflsState) -> LensStackResult<()> {
        if !lens.is_inserted() {
            return Err(LensStackError::UnknownState(format!(
                "{lens} is not a lens position"
            )));
        }
        self.move_to(lens)
    }

    /// Take all lenses out of the beam.
    pub fn remove(&mut self) -> LensStackResult<()> {
        self.move_to(XflsState::Out)
    }

    /// Transmission in the current state
    pub fn transmission(&mut self) -> LensStackResult<f64> {
        Ok(self.state()?.transmission())
    }

    fn move_to(&mut self, state: XflsState) -> LensStackResult<()> {
        self.positioner
            .set_state(state.as_str())
            .map_err(|e| LensStackError::Motion(format!("XFLS move to {state} failed: {e}")))?;
        info!("XFLS moved to {state}");
        Ok(())
    }
}
