//! Disk-backed block store for the out-of-core transpose.
//!
//! One binary file per (yblock, zblock) pair under the output directory,
//! streamed strictly sequentially: complex values as little-endian f64
//! re/im pairs, no seeking, no geometry. Pass 1 writes every file once;
//! pass 2 reads it back once and discards it.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use num_complex::Complex64;

use crate::error::{Error, Result};

const BYTES_PER_MODE: u64 = 16;

pub struct BlockStore {
    dir: PathBuf,
}

impl BlockStore {
    pub fn new(dir: &Path, ramdisk: bool) -> Result<Self> {
        fs::create_dir_all(dir)?;
        if ramdisk {
            log::debug!("block store on ramdisk: {}", dir.display());
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Deterministic file name for a block.
    pub fn path(&self, yblock: usize, zblock: usize) -> PathBuf {
        self.dir.join(format!("block_{yblock:03}_{zblock:03}.zbk"))
    }

    pub fn writer(&self, yblock: usize, zblock: usize) -> Result<BlockWriter> {
        let path = self.path(yblock, zblock);
        let file = File::create(&path).map_err(|e| Error::BlockFile {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(BlockWriter {
            writer: BufWriter::new(file),
            buf: Vec::new(),
            path,
        })
    }

    /// Open a block for reading; the file must hold exactly
    /// `expected_modes` complex values.
    pub fn reader(&self, yblock: usize, zblock: usize, expected_modes: u64) -> Result<BlockReader> {
        let path = self.path(yblock, zblock);
        let file = File::open(&path).map_err(|e| Error::BlockFile {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let expected = expected_modes * BYTES_PER_MODE;
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(Error::BlockFileSize {
                path,
                expected,
                actual,
            });
        }
        Ok(BlockReader {
            reader: BufReader::new(file),
            buf: Vec::new(),
            path,
        })
    }
}

pub struct BlockWriter {
    writer: BufWriter<File>,
    buf: Vec<u8>,
    path: PathBuf,
}

impl BlockWriter {
    /// Append a run of complex values.
    pub fn write_modes(&mut self, modes: &[Complex64]) -> Result<()> {
        self.buf.clear();
        for c in modes {
            self.buf.extend_from_slice(&c.re.to_le_bytes());
            self.buf.extend_from_slice(&c.im.to_le_bytes());
        }
        self.writer.write_all(&self.buf).map_err(|e| Error::BlockFile {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush().map_err(|e| Error::BlockFile {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

pub struct BlockReader {
    reader: BufReader<File>,
    buf: Vec<u8>,
    path: PathBuf,
}

impl BlockReader {
    /// Consume a run of complex values.
    pub fn read_modes(&mut self, out: &mut [Complex64]) -> Result<()> {
        self.buf.resize(out.len() * BYTES_PER_MODE as usize, 0);
        self.reader.read_exact(&mut self.buf).map_err(|e| Error::BlockFile {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        for (c, chunk) in out.iter_mut().zip(self.buf.chunks_exact(16)) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&chunk[..8]);
            let re = f64::from_le_bytes(raw);
            raw.copy_from_slice(&chunk[8..]);
            let im = f64::from_le_bytes(raw);
            *c = Complex64::new(re, im);
        }
        Ok(())
    }

    /// Close the block and remove it; a block is read exactly once.
    pub fn finish(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        fs::remove_file(&path)?;
        Ok(())
    }
}
