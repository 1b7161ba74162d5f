//! The two-pass out-of-core inverse FFT pipeline.
//!
//! Pass 1 ("Z-transform") walks the lower half of the y range: each plane
//! pair is synthesized in Fourier space (the mirrored plane holding the
//! complex conjugates), inverse-transformed along z, and streamed to the
//! block store. Pass 2 ("XY-transform") re-reads one z-slab at a time,
//! undoes the intentional one-position y shift of the mirrored half, zeroes
//! the y-Nyquist row, finishes the transform in the (y, x) plane, and hands
//! each completed z-slab to the output encoder in increasing z.
//!
//! Parallelism is fork-join over slab rows; every worker owns a disjoint
//! row pair and I/O runs on the calling thread only.

use num_complex::Complex64;
use rayon::prelude::*;

use crate::blockstore::BlockStore;
use crate::config::Config;
use crate::eigenmodes::ShapeVectors;
use crate::error::Result;
use crate::fft::FftEngine;
use crate::power::{row_rng, PowerSpectrum};
use crate::slab::{RowView, Slab};
use crate::synth::Synthesizer;

/// Consumer of finished z-slabs. Receives, per slab, the `narray` packed
/// (y, x) planes in increasing z.
pub trait SlabSink {
    fn emit(&mut self, z: usize, planes: &[&[Complex64]]) -> Result<()>;
}

/// Everything the two drivers share: geometry, mode synthesis, FFT plans,
/// and the block store.
pub struct Pipeline<'a> {
    cfg: &'a Config,
    synth: Synthesizer<'a>,
    fft: FftEngine,
    store: BlockStore,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        cfg: &'a Config,
        power: &'a PowerSpectrum,
        shape: &'a dyn ShapeVectors,
    ) -> Result<Self> {
        Ok(Self {
            cfg,
            synth: Synthesizer::new(cfg, power, shape),
            fft: FftEngine::new(cfg.ppd),
            store: BlockStore::new(&cfg.output_dir, cfg.ramdisk)?,
        })
    }

    /// Run both passes. Pass 1 completes (and its files are durable)
    /// before pass 2 opens anything.
    pub fn run(&self, sink: &mut dyn SlabSink) -> Result<()> {
        self.pass_z()?;
        self.pass_xy(sink)
    }

    // ========================================================================
    // Pass 1: synthesis + z transform
    // ========================================================================

    fn pass_z(&self) -> Result<()> {
        let ppd = self.cfg.ppd;
        let block = self.cfg.block();
        let numblock = self.cfg.numblock;
        let narray = self.cfg.narray();

        let mut slab = Slab::new(ppd, narray, block);
        let mut slab_her = Slab::new(ppd, narray, block);
        let row_len = slab.row_len();

        for yblock in 0..numblock / 2 {
            log::info!("pass 1: y-block {}/{}", yblock + 1, numblock / 2);

            // Each worker owns one yres row of the primary slab and the
            // reflected row of the Hermitian slab.
            slab.data_mut()
                .par_chunks_mut(row_len)
                .zip(slab_her.data_mut().par_chunks_mut(row_len).rev())
                .enumerate()
                .for_each(|(yres, (row, row_her))| {
                    let mut row = RowView::new(row, ppd, narray);
                    let mut row_her = RowView::new(row_her, ppd, narray);
                    self.load_plane(yblock, yres, &mut row, &mut row_her);
                });

            for zblock in 0..numblock {
                self.store_block(&slab, yblock, zblock)?;
                self.store_block(&slab_her, numblock - 1 - yblock, zblock)?;
            }
        }
        Ok(())
    }

    /// Synthesize one plane pair and run its z transforms.
    pub(crate) fn load_plane(
        &self,
        yblock: usize,
        yres: usize,
        row: &mut RowView,
        row_her: &mut RowView,
    ) {
        self.fill_row(yblock, yres, row, row_her);
        if yblock == 0 && yres == 0 {
            self.hermitian_fix(row, row_her);
        }
        for a in 0..self.cfg.narray() {
            self.fft.inverse_long_stride(row.plane_mut(a));
            self.fft.inverse_long_stride(row_her.plane_mut(a));
        }
    }

    /// Fill one y plane with synthesized modes and the mirrored plane with
    /// their conjugates. The mirrored plane sits one y position shifted;
    /// pass 2 undoes the shift when it reloads. This also leaves the y = 0
    /// conjugates in the mirrored slab for the half-plane copy below.
    pub(crate) fn fill_row(
        &self,
        yblock: usize,
        yres: usize,
        row: &mut RowView,
        row_her: &mut RowView,
    ) {
        let ppd = self.cfg.ppd;
        let narray = self.cfg.narray();
        let y = yres + yblock * self.cfg.block();
        let mut rng = row_rng(self.cfg.seed, y);

        for z in 0..ppd {
            let z_her = if z == 0 { 0 } else { ppd - z };
            for x in 0..ppd {
                let x_her = if x == 0 { 0 } else { ppd - x };
                let pair = self.synth.synthesize(x, y, z, &mut rng);
                for a in 0..narray {
                    row.set(a, z, x, pair.primary[a]);
                    row_her.set(a, z_her, x_her, pair.mirror[a]);
                }
            }
        }
    }

    /// Enforce the Hermitian structure of the y = 0 plane: the whole plane
    /// was stored in reflection and conjugate in the mirrored slab, so half
    /// of it is copied back (the y = z = 0 line being a half-line), and the
    /// origin is zeroed for every array.
    fn hermitian_fix(&self, row: &mut RowView, row_her: &RowView) {
        let ppd = self.cfg.ppd;
        let narray = self.cfg.narray();
        for z in 0..ppd / 2 {
            let z_her = if z == 0 { 0 } else { ppd - z };
            let xmax = if z == 0 { ppd / 2 } else { ppd };
            for x in 0..xmax {
                let x_her = if x == 0 { 0 } else { ppd - x };
                for a in 0..narray {
                    row.set(a, z_her, x_her, row_her.get(a, z_her, x_her));
                }
            }
        }
        for a in 0..narray {
            row.set(a, 0, 0, Complex64::default());
        }
    }

    /// Stream the (yblock, zblock) subregion of a slab to its block file:
    /// array-major, then z-residual, then y-residual, whole x skewers.
    fn store_block(&self, slab: &Slab, yblock: usize, zblock: usize) -> Result<()> {
        let block = self.cfg.block();
        let narray = self.cfg.narray();
        let mut writer = self.store.writer(yblock, zblock)?;
        for a in 0..narray {
            for zres in 0..block {
                let z = zres + block * zblock;
                for yres in 0..block {
                    writer.write_modes(slab.skewer(yres, a, z))?;
                }
            }
        }
        writer.finish()
    }

    // ========================================================================
    // Pass 2: y shift + (y, x) transform
    // ========================================================================

    fn pass_xy(&self, sink: &mut dyn SlabSink) -> Result<()> {
        let ppd = self.cfg.ppd;
        let block = self.cfg.block();
        let numblock = self.cfg.numblock;
        let narray = self.cfg.narray();

        let mut slab = Slab::new(ppd, narray, block);
        let row_len = slab.row_len();

        for zblock in 0..numblock {
            log::info!("pass 2: z-block {}/{}", zblock + 1, numblock);

            for yblock in 0..numblock {
                self.load_block(&mut slab, yblock, zblock)?;
            }

            // The y data were stored one position shifted, so the Nyquist
            // row y = ppd/2 holds stale values and must vanish.
            for zres in 0..block {
                for a in 0..narray {
                    slab.skewer_mut(zres, a, ppd / 2).fill(Complex64::default());
                }
            }

            slab.data_mut().par_chunks_mut(row_len).for_each(|row| {
                for plane in row.chunks_mut(ppd * ppd) {
                    self.fft.inverse_2d(plane);
                }
            });

            for zres in 0..block {
                let z = zres + block * zblock;
                if self.cfg.qoneslab >= 0 && z as i64 != self.cfg.qoneslab {
                    continue;
                }
                let row = slab.row(zres);
                let planes: Vec<&[Complex64]> = (0..narray)
                    .map(|a| &row[a * ppd * ppd..(a + 1) * ppd * ppd])
                    .collect();
                sink.emit(z, &planes)?;
            }
        }
        Ok(())
    }

    /// Read one block file back into the slab, undoing the pass-1 y shift.
    fn load_block(&self, slab: &mut Slab, yblock: usize, zblock: usize) -> Result<()> {
        let ppd = self.cfg.ppd;
        let block = self.cfg.block();
        let narray = self.cfg.narray();
        let expected = (narray * block * block * ppd) as u64;
        let mut reader = self.store.reader(yblock, zblock, expected)?;
        for a in 0..narray {
            for zres in 0..block {
                for yres in 0..block {
                    let y = yres + block * yblock;
                    reader.read_modes(slab.skewer_mut(zres, a, shifted_y(y, ppd)))?;
                }
            }
        }
        reader.finish()
    }
}

/// The reflected half of the y range was stored one position shifted in
/// pass 1; rows at y ≥ ppd/2 move up by one and the row that would land at
/// ppd parks on the Nyquist row, which is zeroed afterwards. Requires an
/// even ppd (enforced at configuration time).
pub(crate) fn shifted_y(y: usize, ppd: usize) -> usize {
    let shifted = if y >= ppd / 2 { y + 1 } else { y };
    if shifted == ppd {
        ppd / 2
    } else {
        shifted
    }
}
