//! Periodic cubic lattice geometry and wavenumber bookkeeping.

use std::f64::consts::PI;

/// A periodic cube of `ppd` sites per dimension spanning `boxsize` physical
/// units. Fourier indices follow the standard wrap: index `i` maps to
/// wavenumber `i` for `i <= ppd/2` and `i - ppd` above.
#[derive(Debug, Clone, Copy)]
pub struct Lattice {
    pub ppd: usize,
    pub boxsize: f64,
}

impl Lattice {
    pub fn new(ppd: usize, boxsize: f64) -> Self {
        Self { ppd, boxsize }
    }

    /// Inter-particle spacing.
    pub fn separation(&self) -> f64 {
        self.boxsize / self.ppd as f64
    }

    /// Spacing of the Fourier lattice, 2π/L.
    pub fn fundamental(&self) -> f64 {
        2.0 * PI / self.boxsize
    }

    /// Nyquist wavenumber, π·ppd/L.
    pub fn nyquist(&self) -> f64 {
        PI * self.ppd as f64 / self.boxsize
    }

    pub fn half(&self) -> usize {
        self.ppd / 2
    }

    /// Signed wavenumber index for lattice index `i`.
    #[inline]
    pub fn wrap(&self, i: usize) -> i64 {
        let i = i as i64;
        let n = self.ppd as i64;
        if i > n / 2 {
            i - n
        } else {
            i
        }
    }

    /// Effective Nyquist index under a k-cutoff: floor(ppd/(2·cutoff) + ½).
    /// Any mode with a component at this index is zeroed.
    pub fn kmax_index(&self, k_cutoff: f64) -> i64 {
        (self.ppd as f64 / 2.0 / k_cutoff + 0.5) as i64
    }

    /// Squared physical cutoff wavenumber, (k_Nyquist/cutoff)².
    pub fn k2_cutoff(&self, k_cutoff: f64) -> f64 {
        let kc = self.nyquist() / k_cutoff;
        kc * kc
    }
}
