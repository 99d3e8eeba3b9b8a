//! Backing entries: the unit of readable content behind a resource key.

use anyhow::{Context, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::SharedArchive;

pub type ByteStream = Box<dyn Read + Send>;

#[derive(Debug)]
pub enum StructEntry {
    /// A loose file; every open is an independent stream.
    File { path: PathBuf },
    /// A member of a shared archive.
    Archive {
        archive: Arc<SharedArchive>,
        index: usize,
        name: String,
    },
}

impl StructEntry {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    pub fn archive(archive: Arc<SharedArchive>, index: usize, name: impl Into<String>) -> Self {
        Self::Archive {
            archive,
            index,
            name: name.into(),
        }
    }

    pub fn open(&self) -> Result<ByteStream> {
        match self {
            Self::File { path } => {
                let file = File::open(path)
                    .with_context(|| format!("Failed to open file: {}", path.display()))?;
                Ok(Box::new(BufReader::new(file)))
            }
            Self::Archive { archive, index, .. } => {
                Ok(Box::new(Cursor::new(archive.read_member(*index)?)))
            }
        }
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        match self {
            Self::File { path } => std::fs::read(path)
                .with_context(|| format!("Failed to read file: {}", path.display())),
            Self::Archive { .. } => {
                let mut bytes = Vec::new();
                self.open()?
                    .read_to_end(&mut bytes)
                    .with_context(|| format!("Failed to read {self}"))?;
                Ok(bytes)
            }
        }
    }

    /// No-op for files. For archive members this closes the shared archive,
    /// which cuts off every other member of the same archive too.
    pub fn close(&self) -> Result<()> {
        match self {
            Self::File { .. } => Ok(()),
            Self::Archive { archive, .. } => archive.close(),
        }
    }

    pub fn archive_path(&self) -> Option<&Path> {
        match self {
            Self::File { .. } => None,
            Self::Archive { archive, .. } => Some(archive.path()),
        }
    }
}

impl fmt::Display for StructEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path } => write!(f, "{}", path.display()),
            Self::Archive { archive, name, .. } => {
                write!(f, "{}!/{}", archive.path().display(), name)
            }
        }
    }
}
