//! Tabulated power spectrum and the Gaussian mode draws.
//!
//! The table is a two-column text file of (k, P(k)) rows, splined at load
//! time. A mode draw is one complex Gaussian with `E|D|² = P(k)`, pulled
//! from a per-row random stream so that the realization of every mode
//! inside the k-cutoff is independent of the lattice size.

use std::f64::consts::PI;
use std::path::Path;

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

// ============================================================================
// Natural cubic spline
// ============================================================================

/// Natural cubic spline over strictly increasing abscissae. Evaluation
/// clamps to the endpoint values outside the table.
#[derive(Debug, Clone)]
pub struct Spline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    y2: Vec<f64>,
}

impl Spline {
    /// Build the spline. `xs` must be strictly increasing with at least
    /// two entries; both slices must have equal length.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Self {
        assert_eq!(xs.len(), ys.len(), "spline inputs must have equal length");
        assert!(xs.len() >= 2, "spline needs at least two points");
        let n = xs.len();
        let mut y2 = vec![0.0; n];
        let mut u = vec![0.0; n];
        for i in 1..n - 1 {
            let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
            let p = sig * y2[i - 1] + 2.0;
            y2[i] = (sig - 1.0) / p;
            let d = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i])
                - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
            u[i] = (6.0 * d / (xs[i + 1] - xs[i - 1]) - sig * u[i - 1]) / p;
        }
        for i in (0..n - 1).rev() {
            y2[i] = y2[i] * y2[i + 1] + u[i];
        }
        Self { xs, ys, y2 }
    }

    pub fn min_x(&self) -> f64 {
        self.xs[0]
    }

    pub fn max_x(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }

    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[n - 1] {
            return self.ys[n - 1];
        }
        let j = self.xs.partition_point(|&v| v <= x) - 1;
        let h = self.xs[j + 1] - self.xs[j];
        let a = (self.xs[j + 1] - x) / h;
        let b = (x - self.xs[j]) / h;
        a * self.ys[j]
            + b * self.ys[j + 1]
            + ((a * a * a - a) * self.y2[j] + (b * b * b - b) * self.y2[j + 1]) * h * h / 6.0
    }
}

// ============================================================================
// Power spectrum
// ============================================================================

#[derive(Debug, Clone)]
pub struct PowerSpectrum {
    spline: Spline,
}

impl PowerSpectrum {
    /// Load a two-column (k, P(k)) text table. `#` comments and blank
    /// lines are skipped; k must be strictly increasing.
    pub fn load(path: &Path) -> Result<Self> {
        let fail = |reason: String| Error::PowerSpectrum {
            path: path.to_path_buf(),
            reason,
        };
        let raw = std::fs::read_to_string(path)
            .map_err(|e| fail(e.to_string()))?;

        let mut ks = Vec::new();
        let mut ps = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut cols = line.split_whitespace();
            let k = parse_column(cols.next(), lineno).map_err(&fail)?;
            let p = parse_column(cols.next(), lineno).map_err(&fail)?;
            if let Some(&prev) = ks.last() {
                if k <= prev {
                    return Err(fail(format!("k not strictly increasing at line {}", lineno + 1)));
                }
            }
            if p < 0.0 {
                return Err(fail(format!("negative P(k) at line {}", lineno + 1)));
            }
            ks.push(k);
            ps.push(p);
        }
        if ks.len() < 2 {
            return Err(fail(format!("table has {} rows, need at least 2", ks.len())));
        }
        Ok(Self {
            spline: Spline::new(ks, ps),
        })
    }

    pub fn from_table(ks: Vec<f64>, ps: Vec<f64>) -> Self {
        Self {
            spline: Spline::new(ks, ps),
        }
    }

    /// P(k), clamped to the endpoint values outside the table.
    pub fn power(&self, k: f64) -> f64 {
        self.spline.eval(k).max(0.0)
    }

    /// One complex Gaussian draw with `E|D|² = P(k)`: Rayleigh amplitude
    /// `sqrt(-P ln u₁)` and uniform phase. Consumes exactly two uniforms.
    pub fn gauss_mode(&self, k: f64, rng: &mut StdRng) -> Complex64 {
        let p = self.power(k);
        let u1 = 1.0 - rng.gen::<f64>();
        let u2 = rng.gen::<f64>();
        let amp = (-p * u1.ln()).sqrt();
        Complex64::from_polar(amp, 2.0 * PI * u2)
    }

    /// Linear-theory rms σ_R with a spherical top-hat window of radius `r`:
    /// σ_R² = 1/(2π²) ∫ P(k) W²(kR) k² dk over the tabulated range.
    pub fn sigma_r(&self, r: f64) -> f64 {
        const N: usize = 10_000;
        let k0 = self.spline.min_x();
        let k1 = self.spline.max_x();
        let dk = (k1 - k0) / N as f64;
        let integrand = |k: f64| {
            let w = tophat(k * r);
            self.power(k) * w * w * k * k
        };
        let mut sum = 0.5 * (integrand(k0) + integrand(k1));
        for i in 1..N {
            sum += integrand(k0 + i as f64 * dk);
        }
        (sum * dk / (2.0 * PI * PI)).sqrt()
    }
}

fn parse_column(col: Option<&str>, lineno: usize) -> std::result::Result<f64, String> {
    col.ok_or_else(|| format!("missing column at line {}", lineno + 1))?
        .parse::<f64>()
        .map_err(|e| format!("bad number at line {}: {}", lineno + 1, e))
}

/// Spherical top-hat window, 3(sin x − x cos x)/x³.
fn tophat(x: f64) -> f64 {
    if x.abs() < 1e-4 {
        1.0
    } else {
        3.0 * (x.sin() - x * x.cos()) / (x * x * x)
    }
}

// ============================================================================
// Per-row random streams
// ============================================================================

/// Independent sub-stream for one synthesized y-row. Keyed on the global
/// seed and the row's wavenumber index only, never on the lattice size:
/// this is what makes oversampled lattices share mode values.
pub fn row_rng(seed: u64, ky: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (ky as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}
