//! CLI tool for the CRL lens stack.
//!
//! Subcommands:
//! - `focal`: Focal length and focused waist of the installed lens set
//! - `size`: Beam size at a lens-to-sample distance
//! - `distance`: Lens-to-sample distances giving a beam size
//! - `radii`: Standard lens radii
//! - `lens show` / `lens set`: Inspect or replace the installed lens set
//! - `sim-align`: Align and move a simulated lens stack

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use lens_math::{
    distance_for_size, focal_length, size_at_distance, BeamParameters, LensElement, LensSet,
    STANDARD_LENS_RADII,
};
use lens_stack::sim::{sim_stage, JogStep, ScriptedOperator, SimAttenuator};
use lens_stack::{LensStack, MemoryPresetStore, SafetyInterlock, SettingsStorage, StackSettings};
use tracing::info;

/// Parse a lens group "COUNTxRADIUS_UM" (e.g. "10x100") or "COUNTxflat".
fn parse_lens(s: &str) -> Result<LensElement> {
    let (count, radius) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("expected COUNTxRADIUS_UM, got '{s}'"))?;
    let count: u32 = count.trim().parse().context("invalid lens count")?;
    let radius = match radius.trim() {
        "flat" => None,
        r => Some(r.parse::<f64>().context("invalid lens radius")? * 1e-6),
    };
    Ok(LensElement::new(count, radius)?)
}

/// CRL lens stack tool
#[derive(Parser, Debug)]
#[command(name = "lens_tool")]
#[command(about = "Optics and control tool for a motorized CRL lens stack")]
#[command(version)]
struct Cli {
    /// Settings directory (default ~/.xfls_config)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct OpticsArgs {
    /// Photon energy in keV (default from settings)
    #[arg(short, long)]
    energy: Option<f64>,

    /// Lens group COUNTxRADIUS_UM, repeatable (default: installed lens set)
    #[arg(short, long = "lens", value_parser = parse_lens)]
    lenses: Vec<LensElement>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Focal length and waist of the lens set
    Focal {
        #[command(flatten)]
        optics: OpticsArgs,
    },

    /// FWHM beam size at a lens-to-sample distance
    Size {
        #[command(flatten)]
        optics: OpticsArgs,

        /// Lens-to-sample distance in meters
        #[arg(short, long)]
        distance: f64,
    },

    /// Lens-to-sample distances for a FWHM beam size
    Distance {
        #[command(flatten)]
        optics: OpticsArgs,

        /// Target FWHM beam size in µm
        #[arg(short, long)]
        size_um: f64,
    },

    /// List standard lens radii
    Radii,

    /// Installed lens set
    Lens {
        #[command(subcommand)]
        action: LensAction,
    },

    /// Align a simulated lens stack and move it along the beam
    SimAlign {
        /// Beam x, y at the low z limit
        #[arg(long, num_args = 2, default_values_t = [0.0, 0.0])]
        low: Vec<f64>,

        /// Beam x, y at the high z limit
        #[arg(long, num_args = 2, default_values_t = [1.0, 2.0])]
        high: Vec<f64>,

        /// Calibrated z to move to after alignment
        #[arg(short, long, default_value = "0")]
        z: f64,

        /// Beam size to move to afterwards, µm
        #[arg(short, long)]
        size_um: Option<f64>,
    },
}

#[derive(Subcommand, Debug)]
enum LensAction {
    /// Print the installed lens set
    Show,

    /// Replace the installed lens set (the previous file is backed up)
    Set {
        /// Lens group COUNTxRADIUS_UM, repeatable
        #[arg(short, long = "lens", value_parser = parse_lens, required = true)]
        lenses: Vec<LensElement>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let storage = match cli.config_dir {
        Some(path) => SettingsStorage::with_path(path),
        None => SettingsStorage::new()?,
    };
    let settings = storage
        .settings_or_default()
        .with_context(|| format!("reading settings in {}", storage.root_path().display()))?;

    match cli.command {
        Command::Focal { optics } => {
            let (energy, lenses) = resolve_optics(&storage, &settings, optics)?;
            cmd_focal(&settings, energy, &lenses)
        }
        Command::Size { optics, distance } => {
            let (energy, lenses) = resolve_optics(&storage, &settings, optics)?;
            let size = size_at_distance(
                energy,
                &lenses,
                distance,
                &settings.material,
                settings.density,
                settings.unfocused_fwhm_m,
            )?;
            println!("Beam size at {distance:.4} m: {:.3} µm FWHM", size * 1e6);
            Ok(())
        }
        Command::Distance { optics, size_um } => {
            let (energy, lenses) = resolve_optics(&storage, &settings, optics)?;
            let (near, far) = distance_for_size(
                size_um * 1e-6,
                energy,
                &lenses,
                &settings.material,
                settings.density,
                settings.unfocused_fwhm_m,
            )?;
            println!("{size_um:.3} µm FWHM at {near:.5} m (before focus) or {far:.5} m (after focus)");
            Ok(())
        }
        Command::Radii => {
            for radius in STANDARD_LENS_RADII {
                println!("{:>6.0} µm", radius * 1e6);
            }
            Ok(())
        }
        Command::Lens { action } => cmd_lens(&storage, action),
        Command::SimAlign {
            low,
            high,
            z,
            size_um,
        } => {
            let lenses = sim_lenses(&storage)?;
            cmd_sim_align(&settings, lenses, (low[0], low[1]), (high[0], high[1]), z, size_um)
        }
    }
}

/// Energy and lens set from the command line, falling back to stored settings.
fn resolve_optics(
    storage: &SettingsStorage,
    settings: &StackSettings,
    optics: OpticsArgs,
) -> Result<(f64, LensSet)> {
    let energy = optics.energy.unwrap_or(settings.energy_kev);
    let lenses = if optics.lenses.is_empty() {
        let file = storage.lens_file();
        if !file.exists() {
            bail!(
                "No lens set installed in {}; pass --lens or run `lens set`",
                file.path().display()
            );
        }
        file.load()?
    } else {
        LensSet::new(optics.lenses)?
    };
    Ok((energy, lenses))
}

/// Installed lens set, or 10 x 100 µm when none is installed.
fn sim_lenses(storage: &SettingsStorage) -> Result<LensSet> {
    let file = storage.lens_file();
    if !file.exists() {
        info!("No lens set installed, simulating 10 x 100 µm");
        return Ok(LensSet::new(vec![LensElement::new(10, Some(100e-6))?])?);
    }
    file.load()
        .with_context(|| format!("reading {}", file.path().display()))
}

fn print_lenses(lenses: &LensSet) {
    for element in lenses.elements() {
        match element.radius {
            Some(r) => println!("  {:>3} x {:>6.0} µm", element.count, r * 1e6),
            None => println!("  {:>3} x   flat", element.count),
        }
    }
}

fn cmd_focal(settings: &StackSettings, energy: f64, lenses: &LensSet) -> Result<()> {
    let f = focal_length(energy, lenses, &settings.material, settings.density)?;
    let beam = BeamParameters::compute(
        energy,
        lenses,
        &settings.material,
        settings.density,
        settings.unfocused_fwhm_m,
    )?;

    println!("Lens set ({} lenses) at {energy} keV:", lenses.lens_count());
    print_lenses(lenses);
    println!("Focal length:   {f:.5} m");
    println!("Waist:          {:.3} µm FWHM", beam.waist_fwhm() * 1e6);
    println!("Rayleigh range: {:.3} mm", beam.rayleigh_range * 1e3);
    Ok(())
}

fn cmd_lens(storage: &SettingsStorage, action: LensAction) -> Result<()> {
    let file = storage.lens_file();
    match action {
        LensAction::Show => {
            let lenses = file
                .load()
                .with_context(|| format!("reading {}", file.path().display()))?;
            println!("Installed lens set ({}):", file.path().display());
            print_lenses(&lenses);
        }
        LensAction::Set { lenses } => {
            let lenses = LensSet::new(lenses)?;
            if let Some(backup) = file.save(&lenses)? {
                println!("Previous lens set backed up to {}", backup.display());
            }
            println!("Installed lens set:");
            print_lenses(&lenses);
        }
    }
    Ok(())
}

fn cmd_sim_align(
    settings: &StackSettings,
    lenses: LensSet,
    low: (f64, f64),
    high: (f64, f64),
    z: f64,
    size_um: Option<f64>,
) -> Result<()> {
    let interlock = SafetyInterlock::new(Box::new(SimAttenuator::new(&[20e-6, 320e-6, 1280e-6])))
        .with_settle_time(Duration::from_millis(settings.settle_time_ms));
    let mut stack = LensStack::new(
        sim_stage(),
        settings.to_config(lenses),
        interlock,
        Box::new(MemoryPresetStore::new()),
    )?
    .with_tolerance(settings.tolerance);

    let mut operator = ScriptedOperator::new(vec![
        JogStep::MoveTo {
            x: low.0,
            y: low.1,
        },
        JogStep::MoveTo {
            x: high.0,
            y: high.1,
        },
    ]);
    let calibration = stack.align(&mut operator, Some(z))?;
    let (p1, p2) = (calibration.line.point_one(), calibration.line.point_two());
    info!(
        "Calibration v{}: ({:.3}, {:.3}, {:.3}) -> ({:.3}, {:.3}, {:.3})",
        calibration.version, p1.x, p1.y, p1.z, p2.x, p2.y, p2.z
    );

    if let Some(size_um) = size_um {
        stack.move_beam_size(size_um * 1e-6)?;
    }

    let real = stack.real_position()?;
    let pseudo = stack.position()?;
    println!("Stage:  x={:.4} y={:.4} z={:.4}", real.x, real.y, real.z);
    println!(
        "Pseudo: calib_z={:.4} beam_size={:.3} µm",
        pseudo.calib_z,
        pseudo.beam_size * 1e6
    );
    Ok(())
}
