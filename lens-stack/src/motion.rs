//! Motion controller abstraction for the three lens stack axes.
//!
//! Real hardware (EPICS motor records, stepper controllers, ...) implements
//! [`Motor`]; the transport is not part of this crate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LensStackError, LensStackResult};

/// One of the three physical stage axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageAxis {
    X,
    Y,
    Z,
}

impl StageAxis {
    /// All axes in x, y, z order
    pub const ALL: [StageAxis; 3] = [StageAxis::X, StageAxis::Y, StageAxis::Z];

    /// Lowercase axis name
    pub fn as_str(&self) -> &'static str {
        match self {
            StageAxis::X => "x",
            StageAxis::Y => "y",
            StageAxis::Z => "z",
        }
    }
}

impl fmt::Display for StageAxis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single positioning axis.
///
/// Positions and limits are in the motor's own engineering units.
pub trait Motor {
    /// Current readback position
    fn position(&mut self) -> Result<f64, String>;

    /// Move to an absolute position and wait for completion
    fn move_to(&mut self, value: f64) -> Result<(), String>;

    /// Travel limits `(low, high)`
    fn limits(&self) -> (f64, f64);
}

impl<M: Motor + ?Sized> Motor for Box<M> {
    fn position(&mut self) -> Result<f64, String> {
        (**self).position()
    }

    fn move_to(&mut self, value: f64) -> Result<(), String> {
        (**self).move_to(value)
    }

    fn limits(&self) -> (f64, f64) {
        (**self).limits()
    }
}

/// Physical stage position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RealPosition {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Coordinate along one axis
    pub fn axis(&self, axis: StageAxis) -> f64 {
        match axis {
            StageAxis::X => self.x,
            StageAxis::Y => self.y,
            StageAxis::Z => self.z,
        }
    }
}

/// The x, y and z motors of a lens stack.
pub struct Stage<M: Motor> {
    pub x: M,
    pub y: M,
    pub z: M,
}

impl<M: Motor> Stage<M> {
    pub fn new(x: M, y: M, z: M) -> Self {
        Self { x, y, z }
    }

    /// Motor for an axis
    pub fn motor(&self, axis: StageAxis) -> &M {
        match axis {
            StageAxis::X => &self.x,
            StageAxis::Y => &self.y,
            StageAxis::Z => &self.z,
        }
    }

    /// Mutable motor for an axis
    pub fn motor_mut(&mut self, axis: StageAxis) -> &mut M {
        match axis {
            StageAxis::X => &mut self.x,
            StageAxis::Y => &mut self.y,
            StageAxis::Z => &mut self.z,
        }
    }

    /// Read back all three axes
    pub fn position(&mut self) -> LensStackResult<RealPosition> {
        Ok(RealPosition {
            x: self.x.position().map_err(LensStackError::Motion)?,
            y: self.y.position().map_err(LensStackError::Motion)?,
            z: self.z.position().map_err(LensStackError::Motion)?,
        })
    }

    /// Verify a target lies within every axis' travel limits.
    pub fn check_limits(&self, target: &RealPosition) -> LensStackResult<()> {
        for axis in StageAxis::ALL {
            let (low, high) = self.motor(axis).limits();
            let value = target.axis(axis);
            if !(low..=high).contains(&value) {
                return Err(LensStackError::OutOfRange {
                    axis,
                    target: value,
                    low,
                    high,
                });
            }
        }
        Ok(())
    }

    /// Move one axis, mapping device errors.
    pub fn move_axis(&mut self, axis: StageAxis, value: f64) -> LensStackResult<()> {
        self.motor_mut(axis)
            .move_to(value)
            .map_err(|e| LensStackError::Motion(format!("{axis} move to {value} failed: {e}")))
    }
}
