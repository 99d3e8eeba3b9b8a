//! Shared handle over one opened archive.
//!
//! Every member registered from a jar/zip holds an `Arc` to the same
//! `SharedArchive`. Closing it releases the memory map for all of them and
//! is idempotent.

use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use zip::ZipArchive;

use crate::error::StoreError;

type MappedZip = ZipArchive<Cursor<Mmap>>;

/// Upper bound on the buffer reserved from a member's declared size.
const PREALLOC_LIMIT: u64 = 1 << 20;

/// One archive member, as seen while enumerating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    pub index: usize,
    pub name: String,
    pub is_dir: bool,
}

pub struct SharedArchive {
    path: PathBuf,
    zip: Mutex<Option<MappedZip>>,
}

impl fmt::Debug for SharedArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedArchive")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SharedArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open archive: {}", path.display()))?;
        // SAFETY: The file is opened read-only and the map is never written through.
        // The map owns its own reference to the file, so dropping `file` is fine.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to mmap archive: {}", path.display()))?;
        let zip = ZipArchive::new(Cursor::new(mmap))
            .with_context(|| format!("Failed to read zip structure: {}", path.display()))?;
        debug!(path = %path.display(), members = zip.len(), "opened archive");
        Ok(Self {
            path: path.to_path_buf(),
            zip: Mutex::new(Some(zip)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Option<MappedZip>> {
        self.zip.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Members in the archive's own enumeration order.
    pub fn members(&self) -> Result<Vec<ArchiveMember>> {
        let mut guard = self.lock();
        let zip = guard
            .as_mut()
            .ok_or_else(|| StoreError::ArchiveClosed(self.path.clone()))?;
        let mut members = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let file = zip.by_index(index).with_context(|| {
                format!("Failed to read member {index} of {}", self.path.display())
            })?;
            members.push(ArchiveMember {
                index,
                name: file.name().to_string(),
                is_dir: file.is_dir(),
            });
        }
        Ok(members)
    }

    /// Decompresses one member fully into memory.
    pub fn read_member(&self, index: usize) -> Result<Vec<u8>> {
        let mut guard = self.lock();
        let zip = guard
            .as_mut()
            .ok_or_else(|| StoreError::ArchiveClosed(self.path.clone()))?;
        let mut file = zip
            .by_index(index)
            .with_context(|| format!("Failed to open member {index} of {}", self.path.display()))?;
        let mut bytes = Vec::with_capacity(file.size().min(PREALLOC_LIMIT) as usize);
        file.read_to_end(&mut bytes).with_context(|| {
            format!("Failed to read {} from {}", file.name(), self.path.display())
        })?;
        Ok(bytes)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Releases the archive. Closing an already closed archive is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.lock().take().is_some() {
            debug!(path = %self.path.display(), "closed archive");
        }
        Ok(())
    }
}
