use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use bm_tensor::{BlockIndexer, DType, Element, Matrix};

use crate::error::{CheckError, Result};

/// Identifies one stored reference result.
///
/// A record is only valid for the exact element type, matrix size, block
/// size and repetition count it was generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceKey {
    pub dtype: DType,
    pub matrix_size: usize,
    pub block_size: usize,
    pub repetitions: usize,
}

impl ReferenceKey {
    pub fn new(dtype: DType, matrix_size: usize, block_size: usize, repetitions: usize) -> Self {
        ReferenceKey {
            dtype,
            matrix_size,
            block_size,
            repetitions,
        }
    }

    /// Key describing `matrix` after `repetitions` runs.
    pub fn for_matrix<T: Element>(matrix: &Matrix<T>, repetitions: usize) -> Self {
        Self::new(T::DTYPE, matrix.size(), matrix.block_size(), repetitions)
    }

    /// `matmul_{dtype}_{matrix}_{block}_{reps}.ref`
    pub fn file_name(&self) -> String {
        format!(
            "matmul_{}_{}_{}_{}.ref",
            self.dtype.tag(),
            self.matrix_size,
            self.block_size,
            self.repetitions
        )
    }

    /// Exact size of a well-formed record. Saturates for geometries no
    /// matrix can have.
    pub fn byte_len(&self) -> u64 {
        let m = self.matrix_size as u64;
        m.saturating_mul(m)
            .saturating_mul(self.dtype.size_in_bytes() as u64)
    }
}

/// Directory of reference records.
///
/// A record is the matrix's raw storage, block after block in storage
/// order, as little-endian elements with no header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceStore {
    dir: PathBuf,
}

impl ReferenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ReferenceStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, key: &ReferenceKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub fn exists(&self, key: &ReferenceKey) -> bool {
        self.path(key).is_file()
    }

    /// Path of the record for `key`, or `ReferenceMissing`.
    pub fn require(&self, key: &ReferenceKey) -> Result<PathBuf> {
        let path = self.path(key);
        if !path.is_file() {
            return Err(CheckError::ReferenceMissing { path });
        }
        Ok(path)
    }

    /// Write `matrix` as the record for `key`, replacing any existing one.
    pub fn save<T: Element>(&self, key: &ReferenceKey, matrix: &Matrix<T>) -> Result<PathBuf> {
        check_key::<T>(key, matrix.size(), matrix.block_size())?;
        fs::create_dir_all(&self.dir)?;

        let path = self.path(key);
        let mut out = BufWriter::new(File::create(&path)?);
        for &v in matrix.as_slice() {
            v.write_le(&mut out)?;
        }
        out.flush()?;

        tracing::info!(path = %path.display(), bytes = key.byte_len(), "stored reference");
        Ok(path)
    }

    /// Read the record for `key`.
    pub fn load<T: Element>(&self, key: &ReferenceKey) -> Result<Matrix<T>> {
        check_key::<T>(key, key.matrix_size, key.block_size)?;
        BlockIndexer::new(key.matrix_size, key.block_size)?;
        let path = self.path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CheckError::ReferenceMissing { path });
            }
            Err(e) => return Err(e.into()),
        };

        let expected = key.byte_len();
        if bytes.len() as u64 != expected {
            return Err(CheckError::ReferenceSize {
                path,
                expected,
                got: bytes.len() as u64,
            });
        }

        let data: Vec<T> = bytes
            .chunks_exact(T::DTYPE.size_in_bytes())
            .map(T::from_le_slice)
            .collect();
        tracing::debug!(path = %path.display(), "loaded reference");
        Ok(Matrix::from_vec(data, key.matrix_size, key.block_size)?)
    }
}

fn check_key<T: Element>(key: &ReferenceKey, size: usize, block_size: usize) -> Result<()> {
    if key.dtype != T::DTYPE {
        return Err(CheckError::DTypeMismatch {
            record: key.dtype,
            matrix: T::DTYPE,
        });
    }
    if key.matrix_size != size || key.block_size != block_size {
        return Err(CheckError::LayoutMismatch {
            computed_size: size,
            computed_block: block_size,
            expected_size: key.matrix_size,
            expected_block: key.block_size,
        });
    }
    Ok(())
}
