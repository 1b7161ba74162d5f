//! In-memory slab buffers.
//!
//! A slab holds `block` consecutive planes of the full ppd×ppd
//! cross-section across every coupled array, as one contiguous
//! allocation. A row (one yres in pass 1, one zres in pass 2) is a
//! contiguous chunk of `narray · ppd²` values, the unit of parallel work.

use num_complex::Complex64;

#[derive(Debug)]
pub struct Slab {
    ppd: usize,
    narray: usize,
    block: usize,
    data: Vec<Complex64>,
}

impl Slab {
    pub fn new(ppd: usize, narray: usize, block: usize) -> Self {
        Self {
            ppd,
            narray,
            block,
            data: vec![Complex64::default(); block * narray * ppd * ppd],
        }
    }

    pub fn block(&self) -> usize {
        self.block
    }

    /// Length of one row chunk.
    pub fn row_len(&self) -> usize {
        self.narray * self.ppd * self.ppd
    }

    pub fn data_mut(&mut self) -> &mut [Complex64] {
        &mut self.data
    }

    pub fn row(&self, r: usize) -> &[Complex64] {
        let len = self.row_len();
        &self.data[r * len..(r + 1) * len]
    }

    /// One x-skewer: array `a`, plane index `j` within row `r`.
    pub fn skewer(&self, r: usize, a: usize, j: usize) -> &[Complex64] {
        let start = ((r * self.narray + a) * self.ppd + j) * self.ppd;
        &self.data[start..start + self.ppd]
    }

    pub fn skewer_mut(&mut self, r: usize, a: usize, j: usize) -> &mut [Complex64] {
        let start = ((r * self.narray + a) * self.ppd + j) * self.ppd;
        &mut self.data[start..start + self.ppd]
    }
}

/// Mutable view of one slab row, indexed (array, plane index, x).
pub struct RowView<'a> {
    ppd: usize,
    narray: usize,
    data: &'a mut [Complex64],
}

impl<'a> RowView<'a> {
    pub fn new(data: &'a mut [Complex64], ppd: usize, narray: usize) -> Self {
        debug_assert_eq!(data.len(), narray * ppd * ppd);
        Self { ppd, narray, data }
    }

    #[inline]
    fn index(&self, a: usize, j: usize, i: usize) -> usize {
        (a * self.ppd + j) * self.ppd + i
    }

    #[inline]
    pub fn get(&self, a: usize, j: usize, i: usize) -> Complex64 {
        self.data[self.index(a, j, i)]
    }

    #[inline]
    pub fn set(&mut self, a: usize, j: usize, i: usize, value: Complex64) {
        let idx = self.index(a, j, i);
        self.data[idx] = value;
    }

    /// The full ppd×ppd plane of one array.
    pub fn plane_mut(&mut self, a: usize) -> &mut [Complex64] {
        let len = self.ppd * self.ppd;
        &mut self.data[a * len..(a + 1) * len]
    }

    pub fn narray(&self) -> usize {
        self.narray
    }
}
