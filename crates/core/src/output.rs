//! Particle and density output encoding.
//!
//! Consumes finished z-slabs from the pipeline and writes per-particle
//! records: lattice site plus displacement as centered physical
//! coordinates, optionally followed by velocities. Formats:
//!
//! - `zeldovich_ascii`: one text line per particle
//! - `zeldovich_3float`: packed little-endian f32 positions
//! - `zeldovich_6float`: positions + velocities
//! - `zeldovich_1float`: density field (separate file)
//!
//! Binary files carry the same text header as ASCII ones unless
//! `qnoheader` is set. The encoder also owns the run accumulators: the
//! sum of squared pixel densities and the component-wise maximum
//! absolute displacement.

use std::fs::{self, File};
use std::io::{BufWriter, Write};

use num_complex::Complex64;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::pipeline::SlabSink;

/// Accumulated diagnostics, reported at shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputStats {
    /// Sum of δ² over all emitted pixels.
    pub density_variance: f64,
    /// Component-wise maximum |Ψ|.
    pub max_disp: [f64; 3],
}

pub struct ParticleWriter {
    ppd: usize,
    separation: f64,
    boxsize: f64,
    ascii: bool,
    velocity: bool,
    out: BufWriter<File>,
    density: Option<BufWriter<File>>,
    stats: OutputStats,
}

impl ParticleWriter {
    pub fn create(cfg: &Config) -> Result<Self> {
        fs::create_dir_all(&cfg.output_dir)?;
        let path = cfg.output_dir.join("ic");
        let mut out = BufWriter::new(File::create(path)?);
        if !cfg.qnoheader {
            write_header(&mut out, cfg, particle_format(cfg))?;
        }

        let density = if cfg.qdensity {
            let path = cfg
                .density_filename
                .clone()
                .ok_or_else(|| Error::Config("qdensity set without density_filename".into()))?;
            let mut w = BufWriter::new(File::create(path)?);
            if !cfg.qnoheader {
                write_header(&mut w, cfg, "zeldovich_1float")?;
            }
            Some(w)
        } else {
            None
        };

        let lattice = cfg.lattice();
        Ok(Self {
            ppd: cfg.ppd,
            separation: lattice.separation(),
            boxsize: cfg.boxsize,
            ascii: cfg.qascii,
            velocity: cfg.qvelocity,
            out,
            density,
            stats: OutputStats::default(),
        })
    }

    /// Flush everything and hand back the accumulated diagnostics.
    pub fn finish(mut self) -> Result<OutputStats> {
        self.out.flush()?;
        if let Some(d) = self.density.as_mut() {
            d.flush()?;
        }
        Ok(self.stats)
    }

    fn write_record(&mut self, pos: [f64; 3], vel: Option<[f64; 3]>) -> Result<()> {
        if self.ascii {
            match vel {
                Some(v) => writeln!(
                    self.out,
                    "{:e} {:e} {:e} {:e} {:e} {:e}",
                    pos[0], pos[1], pos[2], v[0], v[1], v[2]
                )?,
                None => writeln!(self.out, "{:e} {:e} {:e}", pos[0], pos[1], pos[2])?,
            }
        } else {
            for p in pos {
                self.out.write_all(&(p as f32).to_le_bytes())?;
            }
            if let Some(v) = vel {
                for c in v {
                    self.out.write_all(&(c as f32).to_le_bytes())?;
                }
            }
        }
        Ok(())
    }
}

impl SlabSink for ParticleWriter {
    fn emit(&mut self, z: usize, planes: &[&[Complex64]]) -> Result<()> {
        let ppd = self.ppd;
        let half = self.boxsize / 2.0;
        let a0 = planes[0];
        let a1 = planes[1];
        for y in 0..ppd {
            for x in 0..ppd {
                let idx = y * ppd + x;
                let delta = a0[idx].re;
                let disp = [a0[idx].im, a1[idx].re, a1[idx].im];

                self.stats.density_variance += delta * delta;
                for (m, d) in self.stats.max_disp.iter_mut().zip(disp) {
                    *m = m.max(d.abs());
                }

                let site = [x, y, z];
                let mut pos = [0.0; 3];
                for i in 0..3 {
                    pos[i] = site[i] as f64 * self.separation - half + disp[i];
                }

                let vel = self.velocity.then(|| {
                    let a2 = planes[2];
                    let a3 = planes[3];
                    [a2[idx].im, a3[idx].re, a3[idx].im]
                });

                self.write_record(pos, vel)?;
                if let Some(d) = self.density.as_mut() {
                    d.write_all(&(delta as f32).to_le_bytes())?;
                }
            }
        }
        Ok(())
    }
}

fn particle_format(cfg: &Config) -> &'static str {
    if cfg.qascii {
        "zeldovich_ascii"
    } else if cfg.qvelocity {
        "zeldovich_6float"
    } else {
        "zeldovich_3float"
    }
}

fn write_header(w: &mut impl Write, cfg: &Config, format: &str) -> Result<()> {
    let lattice = cfg.lattice();
    writeln!(w, "format = {format}")?;
    writeln!(w, "ppd = {}", cfg.ppd)?;
    writeln!(w, "numblock = {}", cfg.numblock)?;
    writeln!(w, "boxsize = {}", cfg.boxsize)?;
    writeln!(w, "separation = {}", lattice.separation())?;
    writeln!(w, "fundamental = {}", lattice.fundamental())?;
    writeln!(w, "nyquist = {}", lattice.nyquist())?;
    writeln!(w, "seed = {}", cfg.seed)?;
    writeln!(w, "k_cutoff = {}", cfg.k_cutoff)?;
    writeln!(w, "qPLT = {}", cfg.qplt)?;
    writeln!(w, "end_header")?;
    Ok(())
}
