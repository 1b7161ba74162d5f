//! Error types for the pipeline.
//!
//! Every failure here is terminal: the generator produces its outputs
//! all-or-nothing, so there is no retry or partial-recovery machinery.
//! The one deliberate exception is the non-finite PLT normalization,
//! which zeroes the affected mode instead of surfacing an error.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parameter file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("power spectrum file {}: {reason}", .path.display())]
    PowerSpectrum { path: PathBuf, reason: String },

    #[error("eigenmode file {}: {reason}", .path.display())]
    Eigenmode { path: PathBuf, reason: String },

    #[error("eigenmode file {}: size {actual} bytes, expected {expected}", .path.display())]
    EigenmodeSize {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("block file {}: {reason}", .path.display())]
    BlockFile { path: PathBuf, reason: String },

    #[error("block file {}: size {actual} bytes, expected {expected}", .path.display())]
    BlockFileSize {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
