//! lens-stack - Control of a motorized X-ray CRL lens stack
//!
//! A stack of compound refractive lenses sits on a three-axis (x, y, z) stage.
//! This crate drives it through two logical axes, the beam size at the
//! sample and z along the calibrated beam axis:
//!
//! - **Transform** - stage position <-> (calib_z, beam_size) using the optics in `lens_math`
//! - **Calibration** - two-point beam-axis line, shared and versioned
//! - **Alignment** - operator-driven procedure that measures the line
//! - **Interlock** - beam stop filter inserted before every move
//! - **Stack** - the controller tying these to the stage motors
//! - **Xfls** - three-position lens cartridge
//! - **Settings** / **Lens config** / **Presets** - persistence under `~/.xfls_config`
//! - **Sim** - simulated motors, attenuator, cartridge and operator
//!
//! Hardware access is behind the [`Motor`], [`Attenuator`],
//! [`StatePositioner`] and [`OperatorInput`] traits.

pub mod alignment;
pub mod calibration;
pub mod error;
pub mod interlock;
mod json_file;
pub mod lens_config;
pub mod motion;
pub mod presets;
pub mod settings;
pub mod sim;
pub mod stack;
pub mod transform;
pub mod xfls;

pub use alignment::{AlignmentCalibrator, JogOutcome, OperatorInput};
pub use calibration::{CalibrationHandle, CalibrationLine, VersionedCalibration};
pub use error::{LensStackError, LensStackResult};
pub use interlock::{Attenuator, SafetyInterlock};
pub use lens_config::LensConfigFile;
pub use motion::{Motor, RealPosition, Stage, StageAxis};
pub use presets::{FilePresetStore, MemoryPresetStore, PresetError, PresetStore, PresetWrite};
pub use settings::{SettingsStorage, StackSettings};
pub use stack::LensStack;
pub use transform::{
    BeamSizeTolerance, CoordinateTransform, LensStackConfig, PseudoPosition, ZDirection,
};
pub use xfls::{StatePositioner, Xfls, XflsState};
