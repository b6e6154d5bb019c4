//! Re-openable table sources.
//!
//! Every pipeline needs several full passes over the same data, so inputs are
//! described by a [`TableSource`]: a factory that can open a fresh reader any
//! number of times. Nothing is cached between passes, and each reader is
//! closed when the pass that opened it is dropped.
//!
//! # Sources
//!
//! - [`FileSource`]: a file on disk, decompressed on the fly when the path ends
//!   in `.gz`
//! - [`MemorySource`]: an in-memory buffer, mainly for tests and small inputs

use std::{
    fmt,
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use flate2::read::MultiGzDecoder;

use crate::error::TableError;

/// A logical table that can be read from the start any number of times.
pub trait TableSource {
    /// Human-readable name used in logs and error messages.
    fn name(&self) -> String;

    /// Opens a new reader positioned at the first byte of the table.
    fn open(&self) -> Result<Box<dyn Read + '_>, TableError>;
}

impl<S> TableSource for &S
where
    S: TableSource + ?Sized,
{
    fn name(&self) -> String {
        (**self).name()
    }

    fn open(&self) -> Result<Box<dyn Read + '_>, TableError> {
        (**self).open()
    }
}

/// A table stored in a file, plain or gzip-compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file is decompressed when opened.
    #[must_use]
    pub fn is_gzip(&self) -> bool {
        self.path.extension().is_some_and(|ext| ext == "gz")
    }
}

impl TableSource for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&self) -> Result<Box<dyn Read + '_>, TableError> {
        let file = File::open(&self.path).map_err(|source| TableError::Open {
            source_name: self.name(),
            source,
        })?;
        let reader = BufReader::new(file);
        if self.is_gzip() {
            Ok(Box::new(MultiGzDecoder::new(reader)))
        } else {
            Ok(Box::new(reader))
        }
    }
}

/// A table held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl From<&str> for MemorySource {
    fn from(text: &str) -> Self {
        Self::new("<memory>", text)
    }
}

impl From<String> for MemorySource {
    fn from(text: String) -> Self {
        Self::new("<memory>", text)
    }
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySource")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

impl TableSource for MemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn open(&self) -> Result<Box<dyn Read + '_>, TableError> {
        Ok(Box::new(self.data.as_slice()))
    }
}
