#![cfg(test)]

use std::f64::consts::PI;
use std::fs;

use num_complex::Complex64;

use crate::_tests_util::{base_config, khat_table_body, scratch_dir};
use crate::config::Config;
use crate::eigenmodes::{PlaneWave, PltTable, ShapeVectors};
use crate::error::Result;
use crate::pipeline::{shifted_y, Pipeline, SlabSink};
use crate::power::{row_rng, PowerSpectrum};
use crate::synth::{ModePair, Synthesizer};

/// Sink that keeps every emitted slab in memory.
#[derive(Default)]
struct VecSink {
    slabs: Vec<(usize, Vec<Vec<Complex64>>)>,
}

impl SlabSink for VecSink {
    fn emit(&mut self, z: usize, planes: &[&[Complex64]]) -> Result<()> {
        self.slabs
            .push((z, planes.iter().map(|p| p.to_vec()).collect()));
        Ok(())
    }
}

fn run_pipeline(cfg: &Config, shape: &dyn ShapeVectors) -> VecSink {
    let power = PowerSpectrum::load(&cfg.pk_filename).unwrap();
    let pipeline = Pipeline::new(cfg, &power, shape).unwrap();
    let mut sink = VecSink::default();
    pipeline.run(&mut sink).unwrap();
    sink
}

/// Fourier coefficient of one output array at a single wavenumber triple:
/// F(k) = (1/ppd^3) sum_x A(x) e^{-i k·x}.
fn spectral_coefficient(sink: &VecSink, a: usize, ppd: usize, k: [i64; 3]) -> Complex64 {
    let mut sum = Complex64::default();
    for (z, planes) in &sink.slabs {
        for y in 0..ppd {
            for x in 0..ppd {
                let dot = k[0] * x as i64 + k[1] * y as i64 + k[2] * *z as i64;
                let phase = -2.0 * PI * dot as f64 / ppd as f64;
                sum += planes[a][y * ppd + x] * Complex64::from_polar(1.0, phase);
            }
        }
    }
    sum / (ppd as f64).powi(3)
}

/// Replay the synthesis of one y-row exactly as pass 1 consumes it, and
/// capture the pair at the requested (z, x) site.
fn replay(cfg: &Config, shape: &dyn ShapeVectors, y: usize, zt: usize, xt: usize) -> ModePair {
    let power = PowerSpectrum::load(&cfg.pk_filename).unwrap();
    let synth = Synthesizer::new(cfg, &power, shape);
    let mut rng = row_rng(cfg.seed, y);
    let mut out = None;
    for z in 0..cfg.ppd {
        for x in 0..cfg.ppd {
            let pair = synth.synthesize(x, y, z, &mut rng);
            if z == zt && x == xt {
                out = Some(pair);
            }
        }
    }
    out.expect("target site not visited")
}

#[test]
fn y_shift_restores_conventional_indexing() {
    // Lower half untouched, upper half moves up one, the wrap parks on the
    // Nyquist row (which is zeroed afterwards).
    assert_eq!(shifted_y(0, 8), 0);
    assert_eq!(shifted_y(3, 8), 3);
    assert_eq!(shifted_y(4, 8), 5);
    assert_eq!(shifted_y(6, 8), 7);
    assert_eq!(shifted_y(7, 8), 4);
}

#[test]
fn output_spectrum_matches_the_synthesized_modes() {
    let dir = scratch_dir("pipeline_spectrum");
    let cfg = base_config(&dir, 8, 2, 11);
    let sink = run_pipeline(&cfg, &PlaneWave);

    // All 8 z-slabs arrive, in increasing z.
    let zs: Vec<usize> = sink.slabs.iter().map(|s| s.0).collect();
    assert_eq!(zs, (0..8).collect::<Vec<_>>());

    // The coefficient landing at (1, 2, 3) must be exactly the pair the
    // synthesizer produced for row ky = 2, and its reflection must carry
    // the Hermitian mirror.
    let pair = replay(&cfg, &PlaneWave, 2, 3, 1);
    for a in 0..2 {
        let fwd = spectral_coefficient(&sink, a, 8, [1, 2, 3]);
        let bwd = spectral_coefficient(&sink, a, 8, [-1, -2, -3]);
        assert!(
            (fwd - pair.primary[a]).norm() < 1e-9,
            "array {a}: {fwd} vs {}",
            pair.primary[a]
        );
        assert!(
            (bwd - pair.mirror[a]).norm() < 1e-9,
            "array {a} mirror: {bwd} vs {}",
            pair.mirror[a]
        );
    }

    // Origin, Nyquist, and beyond-cutoff coefficients all vanish.
    for a in 0..2 {
        assert!(spectral_coefficient(&sink, a, 8, [0, 0, 0]).norm() < 1e-9);
        assert!(spectral_coefficient(&sink, a, 8, [4, 0, 0]).norm() < 1e-9);
        assert!(spectral_coefficient(&sink, a, 8, [0, 4, 0]).norm() < 1e-9);
        assert!(spectral_coefficient(&sink, a, 8, [0, 0, 4]).norm() < 1e-9);
        assert!(spectral_coefficient(&sink, a, 8, [3, 3, 3]).norm() < 1e-9);
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn runs_are_deterministic_for_a_fixed_seed() {
    let dir_a = scratch_dir("pipeline_det_a");
    let dir_b = scratch_dir("pipeline_det_b");
    let mut cfg_a = base_config(&dir_a, 8, 4, 77);
    let cfg_b = base_config(&dir_b, 8, 4, 77);
    // numblock only changes the staging, never the field.
    cfg_a.numblock = 2;

    let a = run_pipeline(&cfg_a, &PlaneWave);
    let b = run_pipeline(&cfg_b, &PlaneWave);
    assert_eq!(a.slabs.len(), b.slabs.len());
    for ((za, pa), (zb, pb)) in a.slabs.iter().zip(&b.slabs) {
        assert_eq!(za, zb);
        for (plane_a, plane_b) in pa.iter().zip(pb) {
            for (va, vb) in plane_a.iter().zip(plane_b) {
                assert!((va - vb).norm() < 1e-12);
            }
        }
    }

    let _ = fs::remove_dir_all(&dir_a);
    let _ = fs::remove_dir_all(&dir_b);
}

#[test]
fn one_mode_run_is_a_single_sinusoid_along_x() {
    let dir = scratch_dir("pipeline_onemode");
    let mut cfg = base_config(&dir, 8, 2, 4);
    cfg.qonemode = true;
    cfg.one_mode = [1, 0, 0];
    let sink = run_pipeline(&cfg, &PlaneWave);

    // Uniform in y and z: every row of every slab equals the first row.
    let first: Vec<Complex64> = sink.slabs[0].1[0][0..8].to_vec();
    for (_, planes) in &sink.slabs {
        for y in 0..8 {
            for x in 0..8 {
                assert!((planes[0][y * 8 + x] - first[x]).norm() < 1e-9);
            }
        }
    }

    // The density is a pure cosine at the fundamental along x: its DFT has
    // support only at kx = +-1.
    for kx in 0..8i64 {
        let c = spectral_coefficient(&sink, 0, 8, [kx, 0, 0]);
        let delta_k = Complex64::new(
            first.iter().enumerate().map(|(x, v)| v.re * (2.0 * PI * kx as f64 * x as f64 / 8.0).cos()).sum::<f64>() / 8.0,
            first.iter().enumerate().map(|(x, v)| -v.re * (2.0 * PI * kx as f64 * x as f64 / 8.0).sin()).sum::<f64>() / 8.0,
        );
        if kx == 1 || kx == 7 {
            assert!(c.norm() > 1e-12, "kx = {kx} should survive");
            assert!(delta_k.norm() > 1e-12);
        } else {
            assert!(delta_k.norm() < 1e-9, "kx = {kx} leaked: {delta_k}");
        }
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn one_slab_filter_emits_exactly_the_requested_z() {
    let dir = scratch_dir("pipeline_oneslab");
    let mut cfg = base_config(&dir, 8, 2, 4);
    cfg.qoneslab = 3;
    let sink = run_pipeline(&cfg, &PlaneWave);
    let zs: Vec<usize> = sink.slabs.iter().map(|s| s.0).collect();
    assert_eq!(zs, vec![3]);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn identity_eigenmode_table_reproduces_the_plane_wave_run() {
    let dir_a = scratch_dir("pipeline_plt_a");
    let dir_b = scratch_dir("pipeline_plt_b");
    let plain = base_config(&dir_a, 8, 2, 23);
    let mut plt = base_config(&dir_b, 8, 2, 23);
    plt.qplt = true;
    plt.plt_filename = Some(dir_b.join("unused"));

    let a = run_pipeline(&plain, &PlaneWave);
    let table = PltTable::from_raw(8, 8, khat_table_body(8));
    let b = run_pipeline(&plt, &table);

    assert_eq!(a.slabs.len(), b.slabs.len());
    for ((_, pa), (_, pb)) in a.slabs.iter().zip(&b.slabs) {
        assert_eq!(pa.len(), 2);
        assert_eq!(pb.len(), 4);
        // Density and displacements agree.
        for arr in 0..2 {
            for (va, vb) in pa[arr].iter().zip(&pb[arr]) {
                assert!((va - vb).norm() < 1e-9);
            }
        }
        // alpha = 0 zeroes the velocity growth factor.
        for arr in 2..4 {
            for v in &pb[arr] {
                assert!(v.norm() < 1e-9);
            }
        }
    }

    let _ = fs::remove_dir_all(&dir_a);
    let _ = fs::remove_dir_all(&dir_b);
}

#[test]
fn density_variance_tracks_the_flat_spectrum() {
    // With P(k) = 1 the expected pixel variance is the number of surviving
    // modes: sum over k of E|D|^2, divided by ppd^3 through Parseval. One
    // realization scatters around that, so the band is wide; it still
    // catches any normalization slip.
    let dir = scratch_dir("pipeline_variance");
    let cfg = base_config(&dir, 8, 2, 19);
    let sink = run_pipeline(&cfg, &PlaneWave);

    let mut sum_sq = 0.0;
    for (_, planes) in &sink.slabs {
        for v in &planes[0] {
            sum_sq += v.re * v.re;
        }
    }
    let measured = sum_sq / 8f64.powi(3);

    let mut modes = 0;
    for kx in -3i64..=3 {
        for ky in -3i64..=3 {
            for kz in -3i64..=3 {
                if (kx, ky, kz) != (0, 0, 0) && kx * kx + ky * ky + kz * kz < 16 {
                    modes += 1;
                }
            }
        }
    }
    let expected = modes as f64;
    assert!(
        measured > 0.5 * expected && measured < 1.5 * expected,
        "variance {measured}, expected around {expected}"
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn block_files_are_consumed_by_the_second_pass() {
    let dir = scratch_dir("pipeline_cleanup");
    let cfg = base_config(&dir, 8, 2, 2);
    let _ = run_pipeline(&cfg, &PlaneWave);
    let leftovers: Vec<_> = fs::read_dir(dir.join("blocks"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |x| x == "zbk"))
        .collect();
    assert!(leftovers.is_empty());
    let _ = fs::remove_dir_all(&dir);
}
