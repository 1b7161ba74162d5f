//! Zel'dovich initial conditions for cosmological N-body simulations.
//!
//! Realizes a Gaussian random density field with a prescribed power
//! spectrum on a periodic lattice and produces per-particle displacements
//! (and optionally velocities) under the Zel'dovich approximation,
//! optionally along particle-linear-theory eigenmodes. The full Fourier
//! cube never lives in memory: the 3D inverse transform is blocked into a
//! z pass and a (y, x) pass staged through per-block files on disk.

pub mod blockstore;
pub mod config;
pub mod eigenmodes;
pub mod error;
pub mod fft;
pub mod lattice;
pub mod output;
pub mod pipeline;
pub mod power;
pub mod slab;
pub mod synth;

pub use error::{Error, Result};

#[cfg(test)]
mod _tests_pipeline;
