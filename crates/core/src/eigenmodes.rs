//! Shape vectors for the displacement field.
//!
//! The displacement of a mode points along its shape vector e(k). Standard
//! Zel'dovich displacements use the plane-wave direction k̂; particle linear
//! theory (PLT) replaces it with the eigenvector of the discrete-lattice
//! dynamics, tabulated on a (possibly coarser) grid of side E together with
//! the growth eigenvalue α. The provider is chosen once at startup.
//!
//! # Eigenmode file format
//!
//! Little-endian binary: a 32-bit signed integer E, then
//! `E · E · (E/2+1) · 4` 64-bit floats indexed `[ikx][iky][ikz][component]`
//! with components (ê_x, ê_y, ê_z, α). Only the +kz half-space is stored;
//! the ê_z sign is restored from the sign of kz at lookup time.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// Shape vector and growth eigenvalue of one mode. The vector carries the
/// k²/(k·ê) reweighting, so dividing by k² downstream reduces to the plain
/// Zel'dovich kernel when ê = k̂.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eigenmode {
    pub vec: [f64; 3],
    pub val: f64,
}

pub trait ShapeVectors: Send + Sync {
    fn eigenmode(&self, kx: i64, ky: i64, kz: i64) -> Eigenmode;
}

// ============================================================================
// Standard Zel'dovich
// ============================================================================

/// Plane-wave shape vectors: e = k, unit growth.
pub struct PlaneWave;

impl ShapeVectors for PlaneWave {
    fn eigenmode(&self, kx: i64, ky: i64, kz: i64) -> Eigenmode {
        Eigenmode {
            vec: [kx as f64, ky as f64, kz as f64],
            val: 1.0,
        }
    }
}

// ============================================================================
// PLT eigenmode table
// ============================================================================

pub struct PltTable {
    /// Grid side E of the table.
    side: usize,
    /// E/2 + 1 stored kz entries (half-space).
    zside: usize,
    /// Working lattice side the lookups are asked on.
    ppd: usize,
    /// Flat [ikx][iky][ikz][component] storage.
    data: Vec<f64>,
}

impl PltTable {
    /// Load the binary eigenmode table; the file size must match the header
    /// exactly.
    pub fn load(path: &Path, ppd: usize) -> Result<Self> {
        let fail = |reason: String| Error::Eigenmode {
            path: path.to_path_buf(),
            reason,
        };
        let mut file = File::open(path).map_err(|e| fail(e.to_string()))?;

        let mut header = [0u8; 4];
        file.read_exact(&mut header).map_err(|e| fail(e.to_string()))?;
        let side = i32::from_le_bytes(header);
        if side <= 0 {
            return Err(fail(format!("non-positive grid side {side} in header")));
        }
        let side = side as usize;
        let zside = side / 2 + 1;

        let count = side * side * zside * 4;
        let expected = 4 + 8 * count as u64;
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(Error::EigenmodeSize {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }

        let mut body = vec![0u8; 8 * count];
        file.read_exact(&mut body).map_err(|e| fail(e.to_string()))?;
        let mut data = Vec::with_capacity(count);
        for chunk in body.chunks_exact(8) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            data.push(f64::from_le_bytes(raw));
        }

        Ok(Self {
            side,
            zside,
            ppd,
            data,
        })
    }

    /// Table backed by an in-memory body (used by tests and synthetic
    /// reductions); layout identical to the file body.
    pub fn from_raw(side: usize, ppd: usize, data: Vec<f64>) -> Self {
        let zside = side / 2 + 1;
        assert_eq!(data.len(), side * side * zside * 4);
        Self {
            side,
            zside,
            ppd,
            data,
        }
    }

    #[inline]
    fn entry(&self, ix: usize, iy: usize, iz: usize, comp: usize) -> f64 {
        self.data[((ix * self.side + iy) * self.zside + iz) * 4 + comp]
    }

    /// Table value at working-lattice indices, trilinearly interpolated on
    /// the E-grid. When E is a multiple of the lattice side the lookup is
    /// exact.
    pub(crate) fn interp(&self, ikx: usize, iky: usize, ikz: usize, comp: usize) -> f64 {
        let e = self.side;
        if e % self.ppd == 0 {
            let s = e / self.ppd;
            return self.entry(ikx * s, iky * s, ikz * s, comp);
        }

        let scale = e as f64 / self.ppd as f64;
        let fx = snap_past_nyquist(scale * ikx as f64, e);
        let fy = snap_past_nyquist(scale * iky as f64, e);
        let fz = snap_past_nyquist(scale * ikz as f64, e);

        let (xl, xh, tx) = bracket(fx, e);
        let (yl, yh, ty) = bracket(fy, e);
        let (zl, mut zh, tz) = bracket(fz, e);
        // The z index never exceeds E/2, so a high corner of E/2+1 can only
        // appear with zero weight; clamp it instead of reading past the
        // half-space.
        if zh >= self.zside {
            zh = self.zside - 1;
        }

        let c = |ix, iy, iz| self.entry(ix, iy, iz, comp);
        (1.0 - tx) * (1.0 - ty) * (1.0 - tz) * c(xl, yl, zl)
            + (1.0 - tx) * (1.0 - ty) * tz * c(xl, yl, zh)
            + (1.0 - tx) * ty * (1.0 - tz) * c(xl, yh, zl)
            + (1.0 - tx) * ty * tz * c(xl, yh, zh)
            + tx * (1.0 - ty) * (1.0 - tz) * c(xh, yl, zl)
            + tx * (1.0 - ty) * tz * c(xh, yl, zh)
            + tx * ty * (1.0 - tz) * c(xh, yh, zl)
            + tx * ty * tz * c(xh, yh, zh)
    }
}

/// The table stores positive frequencies in [0, E/2] and negative ones
/// above; a fractional index strictly between them must not interpolate
/// across the discontinuity, so it rounds up to the next stored frequency.
fn snap_past_nyquist(f: f64, e: usize) -> f64 {
    let half = (e / 2) as f64;
    let f = if f > half && f < half + 1.0 {
        (f + 1.0).floor()
    } else {
        f
    };
    if f >= e as f64 {
        f - e as f64
    } else {
        f
    }
}

/// Low/high corner indices and the fractional offset; a high corner of E
/// wraps to 0 (periodic closure).
fn bracket(f: f64, e: usize) -> (usize, usize, f64) {
    let l = f as usize;
    let h = if l + 1 == e { 0 } else { l + 1 };
    (l, h, f - l as f64)
}

impl ShapeVectors for PltTable {
    fn eigenmode(&self, kx: i64, ky: i64, kz: i64) -> Eigenmode {
        let n = self.ppd as i64;
        // Array indices on the working lattice; kz folds onto the stored
        // +kz half-space.
        let ikx = if kx < 0 { n + kx } else { kx } as usize;
        let iky = if ky < 0 { n + ky } else { ky } as usize;
        let ikz = if kz < 0 { n + kz } else { kz } as usize;
        let ikz = if ikz > self.ppd / 2 {
            self.ppd - ikz
        } else {
            ikz
        };

        let mut vec = [
            self.interp(ikx, iky, ikz, 0),
            self.interp(ikx, iky, ikz, 1),
            self.interp(ikx, iky, ikz, 2),
        ];
        let val = self.interp(ikx, iky, ikz, 3);

        vec[2] *= if kz < 0 { -1.0 } else { 1.0 };

        // Interpolation does not preserve |ê| = 1.
        let mag = (vec[0] * vec[0] + vec[1] * vec[1] + vec[2] * vec[2]).sqrt();
        for v in vec.iter_mut() {
            *v /= mag;
        }

        // Upweight by k²/(k·ê) so that e/k² matches the plane-wave kernel
        // when ê = k̂.
        let k2 = (kx * kx + ky * ky + kz * kz) as f64;
        let norm = k2 / (kx as f64 * vec[0] + ky as f64 * vec[1] + kz as f64 * vec[2]);
        if k2 == 0.0 || !norm.is_finite() {
            vec = [0.0; 3];
        } else {
            for v in vec.iter_mut() {
                *v *= norm;
            }
        }

        Eigenmode { vec, val }
    }
}
