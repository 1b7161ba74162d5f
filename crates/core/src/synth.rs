//! Fourier mode synthesis.
//!
//! For one lattice site (x, y, z) the synthesizer produces the packed
//! complex coefficients of every coupled array, together with their
//! Hermitian mirror. Packing convention:
//!
//! - array 0: D + i·F, density draw and x-displacement
//! - array 1: G + i·H, y- and z-displacement
//! - array 2: i·F·f, x-velocity (PLT mode only)
//! - array 3: G·f + i·H·f, y- and z-velocity (PLT mode only)
//!
//! where F = rescale·i·e_x·D/k² and f is the PLT velocity growth factor.
//! The Gaussian draw is consumed only inside the cutoff region, so the
//! stream position at any in-cutoff mode does not depend on the lattice
//! size.

use num_complex::Complex64;
use rand::rngs::StdRng;

use crate::config::Config;
use crate::eigenmodes::ShapeVectors;
use crate::lattice::Lattice;
use crate::power::PowerSpectrum;

pub const MAX_ARRAYS: usize = 4;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

/// Coefficients for one site: the primary packing and the per-component
/// conjugate destined for the reflected site.
#[derive(Debug, Clone, Copy)]
pub struct ModePair {
    pub primary: [Complex64; MAX_ARRAYS],
    pub mirror: [Complex64; MAX_ARRAYS],
}

struct Rescale {
    a_nl: f64,
    a0: f64,
}

pub struct Synthesizer<'a> {
    lattice: Lattice,
    narray: usize,
    kmax: i64,
    k2_cutoff: f64,
    one_mode: Option<[i64; 3]>,
    rescale: Option<Rescale>,
    power: &'a PowerSpectrum,
    shape: &'a dyn ShapeVectors,
}

impl<'a> Synthesizer<'a> {
    pub fn new(cfg: &Config, power: &'a PowerSpectrum, shape: &'a dyn ShapeVectors) -> Self {
        let lattice = cfg.lattice();
        let rescale = cfg.qplt_rescale.then(|| Rescale {
            a_nl: 1.0 / (1.0 + cfg.plt_target_z),
            a0: 1.0 / (1.0 + cfg.z_initial),
        });
        Self {
            lattice,
            narray: cfg.narray(),
            kmax: lattice.kmax_index(cfg.k_cutoff),
            k2_cutoff: lattice.k2_cutoff(cfg.k_cutoff),
            one_mode: cfg.one_mode(),
            rescale,
            power,
            shape,
        }
    }

    pub fn narray(&self) -> usize {
        self.narray
    }

    /// Synthesize the mode at lattice indices (x, y, z), drawing from the
    /// row's random stream when the mode survives the cutoff rules.
    pub fn synthesize(&self, x: usize, y: usize, z: usize, rng: &mut StdRng) -> ModePair {
        let kx = self.lattice.wrap(x);
        let ky = self.lattice.wrap(y);
        let kz = self.lattice.wrap(z);
        let fundamental = self.lattice.fundamental();
        let k2 = ((kx * kx + ky * ky + kz * kz) as f64) * fundamental * fundamental;

        // Nyquist components are zeroed outright (reality after the inverse
        // transform), then the cutoff sphere, then one-mode isolation. The
        // draw happens only in the surviving branch.
        let d = if kx.abs() == self.kmax || kz.abs() == self.kmax || ky.abs() == self.kmax {
            ZERO
        } else if k2 >= self.k2_cutoff {
            ZERO
        } else if self.one_mode.map_or(false, |m| m != [kx, ky, kz]) {
            ZERO
        } else {
            self.power.gauss_mode(k2.sqrt(), rng)
        };

        // One factor of the fundamental drops out so the displacements come
        // out in physical length units; 1 at the origin to avoid the
        // division (the origin is zeroed later anyway).
        let mut k2_kernel = k2 / fundamental;
        if k2_kernel == 0.0 {
            k2_kernel = 1.0;
        }

        let e = self.shape.eigenmode(kx, ky, kz);
        let rescale = match &self.rescale {
            Some(r) => {
                let alpha_m = ((1.0 + 24.0 * e.val).sqrt() - 1.0) / 6.0;
                (r.a_nl / r.a0).powf(1.0 - 1.5 * alpha_m)
            }
            None => 1.0,
        };

        let i = Complex64::new(0.0, 1.0);
        let fx = i * (rescale * e.vec[0] / k2_kernel) * d;
        let gy = i * (rescale * e.vec[1] / k2_kernel) * d;
        let hz = i * (rescale * e.vec[2] / k2_kernel) * d;

        let mut primary = [ZERO; MAX_ARRAYS];
        let mut mirror = [ZERO; MAX_ARRAYS];
        primary[0] = d + i * fx;
        primary[1] = gy + i * hz;
        mirror[0] = d.conj() + i * fx.conj();
        mirror[1] = gy.conj() + i * hz.conj();

        if self.narray == 4 {
            // 1/4 instead of 1/6 because v = (3/2)·H·α·Ψ.
            let f = ((1.0 + 24.0 * e.val).sqrt() - 1.0) * 0.25;
            primary[2] = i * (fx * f);
            primary[3] = gy * f + i * (hz * f);
            mirror[2] = i * (fx * f).conj();
            mirror[3] = (gy * f).conj() + i * (hz * f).conj();
        }

        ModePair { primary, mirror }
    }
}
