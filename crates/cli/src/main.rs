//! Zel'dovich initial-conditions generator command-line interface.
//!
//! Reads a TOML parameter file, runs the two-pass out-of-core pipeline,
//! and reports the closing diagnostics: the rms pixel density next to its
//! linear-theory prediction, the maximum component-wise displacements, and
//! the implied planning bound for the downstream 2LPT scheduler.

use std::path::PathBuf;

use clap::Parser;

use zeldovich_core::config::Config;
use zeldovich_core::eigenmodes::{PlaneWave, PltTable, ShapeVectors};
use zeldovich_core::output::ParticleWriter;
use zeldovich_core::pipeline::Pipeline;
use zeldovich_core::power::PowerSpectrum;

#[derive(Parser, Debug)]
#[command(name = "zeldovich", about = "Zel'dovich initial conditions generator")]
struct Cli {
    /// Path to the TOML parameter file
    param_file: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    initialize_logging();
    if let Err(e) = run(&cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn initialize_logging() {
    use std::io::Write;
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "{:5} {}", record.level(), record.args()))
        .init();
}

fn run(cli: &Cli) -> zeldovich_core::Result<()> {
    let cfg = Config::from_file(&cli.param_file)?;
    let power = PowerSpectrum::load(&cfg.pk_filename)?;

    let shape: Box<dyn ShapeVectors> = match &cfg.plt_filename {
        Some(path) if cfg.qplt => {
            log::info!("using PLT eigenmodes from {}", path.display());
            Box::new(PltTable::load(path, cfg.ppd)?)
        }
        _ => Box::new(PlaneWave),
    };

    report_geometry(&cfg);

    let mut writer = ParticleWriter::create(&cfg)?;
    let pipeline = Pipeline::new(&cfg, &power, shape.as_ref())?;
    pipeline.run(&mut writer)?;
    let stats = writer.finish()?;

    let lattice = cfg.lattice();
    let ppd3 = (cfg.ppd as f64).powi(3);
    let rms = (stats.density_variance / ppd3).sqrt();
    let predicted = power.sigma_r(lattice.separation() / 4.0) * cfg.boxsize.powf(1.5);
    println!("The rms density variation of the pixels is {rms}");
    println!("This could be compared to the P(k) prediction of {predicted}");
    println!(
        "The maximum component-wise displacements are ({:.6e}, {:.6e}, {:.6e}).",
        stats.max_disp[0], stats.max_disp[1], stats.max_disp[2]
    );
    // The slab direction of the downstream simulator is z.
    let max_cpd = (cfg.boxsize / (2.0 * stats.max_disp[2])) as i64;
    println!("For a 2LPT consumer with unit finish radius, this implies a maximum CPD of {max_cpd}");
    Ok(())
}

fn report_geometry(cfg: &Config) {
    let cube_gb = (cfg.ppd as f64 / 1024.0).powi(3) * cfg.narray() as f64 * 16.0;
    log::info!("total Fourier cube (GB): {:.3}", cube_gb);
    log::info!(
        "two-slab working set (GB): {:.3}",
        cube_gb / cfg.numblock as f64 * 2.0
    );
    log::info!(
        "block file size (GB): {:.3}",
        cube_gb / (cfg.numblock * cfg.numblock) as f64
    );
    if cfg.k_cutoff != 1.0 {
        log::info!(
            "using k_cutoff = {} (effective ppd = {})",
            cfg.k_cutoff,
            (cfg.ppd as f64 / cfg.k_cutoff + 0.5) as i64
        );
    }
}
