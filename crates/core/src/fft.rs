//! Inverse FFT facade built on rustfft.
//!
//! One complex-to-complex inverse plan of side `n` is created at startup
//! and shared; rustfft plans execute concurrently on disjoint buffers.
//! Transforms are unnormalized (positive-exponent convention): the mode
//! amplitude convention already carries the normalization, matching the
//! variance diagnostics downstream.

use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

pub struct FftEngine {
    n: usize,
    plan: Arc<dyn Fft<f64>>,
}

impl FftEngine {
    pub fn new(n: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            n,
            plan: planner.plan_fft_inverse(n),
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// In-place inverse transform of one contiguous skewer.
    pub fn inverse_1d(&self, buf: &mut [Complex64]) {
        debug_assert_eq!(buf.len(), self.n);
        self.plan.process(buf);
    }

    /// Inverse transform along the long-stride index of a square plane
    /// packed as `plane[j*n + i]`: one 1D transform over j for every i,
    /// gathered through a scratch column.
    pub fn inverse_long_stride(&self, plane: &mut [Complex64]) {
        let n = self.n;
        debug_assert_eq!(plane.len(), n * n);
        let mut column = vec![Complex64::default(); n];
        for i in 0..n {
            for j in 0..n {
                column[j] = plane[j * n + i];
            }
            self.plan.process(&mut column);
            for j in 0..n {
                plane[j * n + i] = column[j];
            }
        }
    }

    /// In-place 2D inverse transform of a square plane: contiguous rows
    /// first, then the long-stride columns.
    pub fn inverse_2d(&self, plane: &mut [Complex64]) {
        let n = self.n;
        debug_assert_eq!(plane.len(), n * n);
        for row in plane.chunks_mut(n) {
            self.plan.process(row);
        }
        self.inverse_long_stride(plane);
    }
}
