//! End-to-end tests of the lens stack against simulated devices.

use std::time::Duration;

use approx::assert_relative_eq;
use lens_math::{LensElement, LensSet};
use lens_stack::sim::{sim_stage, JogStep, ScriptedOperator, SimAttenuator, SimMotor};
use lens_stack::{
    CalibrationLine, FilePresetStore, LensStack, LensStackConfig, LensStackError,
    MemoryPresetStore, PresetStore, PseudoPosition, RealPosition, SafetyInterlock,
    SettingsStorage, StackSettings, StageAxis, ZDirection,
};

fn lenses() -> LensSet {
    LensSet::new(vec![
        LensElement::new(8, Some(50e-6)).unwrap(),
        LensElement::new(2, Some(200e-6)).unwrap(),
    ])
    .unwrap()
}

/// Focus placed at stage z = 20 mm
fn config() -> LensStackConfig {
    let mut config = LensStackConfig::new(lenses(), 10.0, 0.0, ZDirection::Positive);
    let f = config.beam_parameters().unwrap().focal_length;
    config.z_offset_m = f - 0.020;
    config
}

fn interlock() -> SafetyInterlock {
    SafetyInterlock::new(Box::new(SimAttenuator::new(&[20e-6, 320e-6, 1280e-6])))
        .with_settle_time(Duration::ZERO)
}

fn midpoint_presets() -> MemoryPresetStore {
    let mut presets = MemoryPresetStore::new();
    CalibrationLine::new(
        RealPosition::new(0.0, 0.0, 0.0),
        RealPosition::new(10.0, 20.0, 100.0),
    )
    .unwrap()
    .save_to_presets(&mut presets)
    .unwrap();
    presets
}

fn total_moves(stack: &LensStack<SimMotor>) -> usize {
    let stage = stack.stage();
    stage.x.move_count() + stage.y.move_count() + stage.z.move_count()
}

#[test]
fn test_calib_z_midpoint_of_line() {
    let mut stack =
        LensStack::new(sim_stage(), config(), interlock(), Box::new(midpoint_presets())).unwrap();

    let real = stack.move_calib_z(50.0).unwrap();
    assert_relative_eq!(real.x, 5.0, epsilon = 1e-12);
    assert_relative_eq!(real.y, 10.0, epsilon = 1e-12);
    assert_relative_eq!(real.z, 50.0, epsilon = 1e-12);
}

#[test]
fn test_forward_inverse_consistency() {
    let mut stack =
        LensStack::new(sim_stage(), config(), interlock(), Box::new(midpoint_presets())).unwrap();
    let waist = stack.config().beam_parameters().unwrap().waist_fwhm();

    for factor in [1.5, 3.0, 10.0, 40.0] {
        let target = factor * waist;
        let real = stack.move_beam_size(target).unwrap();
        let pseudo = stack.position().unwrap();
        assert_relative_eq!(pseudo.beam_size, target, max_relative = 1e-6);
        assert_relative_eq!(pseudo.calib_z, real.z);
        assert_relative_eq!(real.x, real.z / 10.0, epsilon = 1e-9);
        assert_relative_eq!(real.y, real.z / 5.0, epsilon = 1e-9);
    }
}

#[test]
fn test_unchanged_beam_size_moves_along_line() {
    let mut stack =
        LensStack::new(sim_stage(), config(), interlock(), Box::new(midpoint_presets())).unwrap();
    let current = stack.position().unwrap();

    let real = stack
        .move_to(PseudoPosition::new(30.0, current.beam_size))
        .unwrap();
    assert_relative_eq!(real.z, 30.0);
    assert_relative_eq!(real.x, 3.0, epsilon = 1e-12);
}

#[test]
fn test_interlock_blocks_every_move() {
    let attenuator = SimAttenuator::new(&[20e-6, 320e-6]).with_fault("attenuator offline");
    let interlock = SafetyInterlock::new(Box::new(attenuator)).with_settle_time(Duration::ZERO);
    let mut stack =
        LensStack::new(sim_stage(), config(), interlock, Box::new(midpoint_presets())).unwrap();

    assert!(matches!(
        stack.move_calib_z(10.0),
        Err(LensStackError::InterlockFailed)
    ));
    assert!(matches!(
        stack.move_beam_size(50e-6),
        Err(LensStackError::InterlockFailed)
    ));
    assert_eq!(total_moves(&stack), 0);
}

#[test]
fn test_unreachable_size_moves_nothing() {
    let mut stack =
        LensStack::new(sim_stage(), config(), interlock(), Box::new(midpoint_presets())).unwrap();
    let waist = stack.config().beam_parameters().unwrap().waist_fwhm();

    assert!(matches!(
        stack.move_beam_size(0.5 * waist),
        Err(LensStackError::Optics(_))
    ));
    assert_eq!(total_moves(&stack), 0);
}

#[test]
fn test_alignment_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SettingsStorage::with_path(dir.path().to_path_buf());
    let settings = StackSettings::default();

    let mut stack = LensStack::new(
        sim_stage(),
        settings.to_config(lenses()),
        interlock(),
        Box::new(storage.preset_store()),
    )
    .unwrap();
    assert_eq!(stack.calibration().version(), 0);

    let mut operator = ScriptedOperator::new(vec![
        JogStep::MoveTo { x: -2.0, y: 1.0 },
        JogStep::MoveTo { x: 2.0, y: 3.0 },
    ]);
    let calibration = stack.align(&mut operator, Some(50.0)).unwrap();
    assert_eq!(calibration.version, 1);

    let real = stack.real_position().unwrap();
    assert_relative_eq!(real.x, 1.0, epsilon = 1e-12);
    assert_relative_eq!(real.y, 2.5, epsilon = 1e-12);

    // a new controller picks up the saved alignment
    let reloaded = LensStack::new(
        sim_stage(),
        settings.to_config(lenses()),
        interlock(),
        Box::new(FilePresetStore::with_path(storage.preset_dir())),
    )
    .unwrap();
    let line = reloaded.calibration().require().unwrap().line;
    assert_eq!(line.point_one(), RealPosition::new(-2.0, 1.0, -100.0));
    assert_eq!(line.point_two(), RealPosition::new(2.0, 3.0, 100.0));
}

#[test]
fn test_alignment_without_store_returns_line() {
    let mut stack = LensStack::new(
        sim_stage(),
        config(),
        interlock(),
        Box::new(FilePresetStore::unconfigured()),
    )
    .unwrap();
    let mut operator = ScriptedOperator::new(vec![
        JogStep::MoveTo { x: 1.0, y: 1.0 },
        JogStep::MoveTo { x: 1.0, y: 1.0 },
    ]);

    match stack.align(&mut operator, None) {
        Err(LensStackError::PresetStoreUnavailable { line, .. }) => {
            assert_eq!(line.point_two(), RealPosition::new(1.0, 1.0, 100.0));
        }
        other => panic!("expected PresetStoreUnavailable, got {other:?}"),
    }
    assert_eq!(stack.calibration().version(), 0);
    assert_eq!(
        stack
            .presets()
            .get_entry(StageAxis::Z, "align_position_one")
            .unwrap(),
        None
    );
}
