//! Parameter-file parsing and validation.
//!
//! The generator is driven by a single TOML parameter file. Historical
//! option names are kept verbatim, including the non-snake-case ones
//! (`Pk_filename`, `qPLT`, `PLT_filename`, `qPLTrescale`, `PLT_target_z`).
//!
//! # File format
//!
//! ```toml
//! ppd = 512
//! numblock = 8
//! boxsize = 600.0
//! Pk_filename = "camb_matterpower.dat"
//! output_dir = "/scratch/ic"
//! seed = 8675309
//!
//! k_cutoff = 1.0
//! qPLT = true
//! PLT_filename = "eigmodes128"
//! qPLTrescale = true
//! z_initial = 49.0
//! PLT_target_z = 5.0
//!
//! qdensity = true
//! density_filename = "/scratch/ic/density"
//! qvelocity = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lattice::Lattice;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Particles per dimension; side of the cubic lattice. Must be even.
    pub ppd: usize,

    /// Tiling factor of the out-of-core transform. Must be even and divide
    /// `ppd`; the in-memory slab holds `ppd/numblock` planes.
    pub numblock: usize,

    /// Physical side length of the box.
    pub boxsize: f64,

    /// Two-column (k, P(k)) text table.
    #[serde(rename = "Pk_filename")]
    pub pk_filename: PathBuf,

    /// Directory for the block files and the particle output.
    pub output_dir: PathBuf,

    /// Hint that `output_dir` lives on a ramdisk.
    #[serde(default)]
    pub ramdisk: bool,

    /// Seed of the mode realization.
    pub seed: u64,

    /// Oversampling factor (≥ 1). The Nyquist wavenumber is divided by this,
    /// so lattices sharing a physical cutoff realize identical modes.
    #[serde(default = "default_k_cutoff")]
    pub k_cutoff: f64,

    /// Zero every mode except `one_mode` (debugging aid).
    #[serde(default)]
    pub qonemode: bool,

    /// The surviving (kx, ky, kz) when `qonemode` is set.
    #[serde(default)]
    pub one_mode: [i64; 3],

    /// Emit only the z-slab with this index; negative emits all slabs.
    #[serde(default = "default_qoneslab")]
    pub qoneslab: i64,

    /// Displace along particle-linear-theory eigenmodes instead of k̂.
    #[serde(rename = "qPLT", default)]
    pub qplt: bool,

    /// Binary eigenmode table (required with `qPLT`).
    #[serde(rename = "PLT_filename", default)]
    pub plt_filename: Option<PathBuf>,

    /// Rescale displacement amplitudes by the PLT growth exponent.
    #[serde(rename = "qPLTrescale", default)]
    pub qplt_rescale: bool,

    /// Redshift of the initial conditions.
    #[serde(default)]
    pub z_initial: f64,

    /// Redshift the PLT rescaling targets.
    #[serde(rename = "PLT_target_z", default)]
    pub plt_target_z: f64,

    /// Also write the density field.
    #[serde(default)]
    pub qdensity: bool,

    /// Destination of the density field (required with `qdensity`).
    #[serde(default)]
    pub density_filename: Option<PathBuf>,

    /// Suppress the text header on the output files.
    #[serde(default)]
    pub qnoheader: bool,

    /// Write ASCII records instead of packed little-endian f32.
    #[serde(default)]
    pub qascii: bool,

    /// Append velocities to each particle record (requires `qPLT`).
    #[serde(default)]
    pub qvelocity: bool,

    // Derivable quantities. Accepted for compatibility with old parameter
    // files and checked for consistency against ppd/boxsize.
    #[serde(default)]
    pub separation: Option<f64>,
    #[serde(default)]
    pub fundamental: Option<f64>,
    #[serde(default)]
    pub nyquist: Option<f64>,
}

fn default_k_cutoff() -> f64 {
    1.0
}

fn default_qoneslab() -> i64 {
    -1
}

impl Config {
    /// Load and validate a parameter file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_str(&raw)
    }

    /// Parse and validate a parameter file from a string.
    pub fn from_str(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ppd == 0 || self.ppd % 2 != 0 {
            return Err(Error::Config(format!(
                "ppd must be positive and even, got {}",
                self.ppd
            )));
        }
        if self.numblock == 0 || self.numblock % 2 != 0 {
            return Err(Error::Config(format!(
                "numblock must be positive and even, got {}",
                self.numblock
            )));
        }
        if self.ppd % self.numblock != 0 {
            return Err(Error::Config(format!(
                "numblock ({}) must divide ppd ({})",
                self.numblock, self.ppd
            )));
        }
        if !(self.boxsize > 0.0) {
            return Err(Error::Config(format!(
                "boxsize must be positive, got {}",
                self.boxsize
            )));
        }
        if !(self.k_cutoff >= 1.0) {
            return Err(Error::Config(format!(
                "k_cutoff must be >= 1, got {}",
                self.k_cutoff
            )));
        }
        if self.qplt && self.plt_filename.is_none() {
            return Err(Error::Config("qPLT requires PLT_filename".into()));
        }
        if self.qdensity && self.density_filename.is_none() {
            return Err(Error::Config("qdensity requires density_filename".into()));
        }
        if self.qvelocity && !self.qplt {
            return Err(Error::Config(
                "qvelocity requires qPLT (velocity arrays only exist in PLT mode)".into(),
            ));
        }
        if self.qoneslab >= self.ppd as i64 {
            return Err(Error::Config(format!(
                "qoneslab ({}) is outside the lattice (ppd = {})",
                self.qoneslab, self.ppd
            )));
        }

        let lattice = self.lattice();
        check_derived("separation", self.separation, lattice.separation())?;
        check_derived("fundamental", self.fundamental, lattice.fundamental())?;
        check_derived("nyquist", self.nyquist, lattice.nyquist())?;
        Ok(())
    }

    pub fn lattice(&self) -> Lattice {
        Lattice::new(self.ppd, self.boxsize)
    }

    /// Planes per block, ppd/numblock.
    pub fn block(&self) -> usize {
        self.ppd / self.numblock
    }

    /// Coupled complex arrays: density + displacements, plus velocities in
    /// PLT mode.
    pub fn narray(&self) -> usize {
        if self.qplt {
            4
        } else {
            2
        }
    }

    /// The surviving mode, when one-mode isolation is active.
    pub fn one_mode(&self) -> Option<[i64; 3]> {
        if self.qonemode {
            Some(self.one_mode)
        } else {
            None
        }
    }
}

fn check_derived(name: &str, given: Option<f64>, derived: f64) -> Result<()> {
    if let Some(v) = given {
        if (v - derived).abs() > 1e-9 * derived.abs().max(1.0) {
            return Err(Error::Config(format!(
                "{name} = {v} disagrees with the derived value {derived}"
            )));
        }
    }
    Ok(())
}
