//! Error taxonomy for the store.
//!
//! Operations return `anyhow::Result`; the variants here are raised through
//! anyhow so callers can `downcast_ref` the conditions they care about.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot register {entry} as {key}, already registered to {current}")]
    DuplicateResource {
        key: String,
        entry: String,
        current: String,
    },

    #[error("duplicate class: {0}")]
    DuplicateClass(String),

    #[error("directory scanning is not supported by this context: {}", .0.display())]
    DirectoryScanUnsupported(PathBuf),

    #[error("archive already closed: {}", .0.display())]
    ArchiveClosed(PathBuf),

    #[error("failed to close struct entries: {first:#} ({} more suppressed)", .suppressed.len())]
    CloseFailed {
        first: anyhow::Error,
        suppressed: Vec<anyhow::Error>,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassFormatError {
    #[error("wrong magic number {0:#010x}")]
    WrongMagic(u32),

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },

    #[error("constant pool index {index} out of range (pool size {size})")]
    PoolIndexOutOfRange { index: u16, size: u16 },

    #[error("constant pool entry {index} is not a {expected}")]
    PoolTypeMismatch { index: u16, expected: &'static str },

    #[error("attribute {name} is shorter than its fixed header ({length} bytes)")]
    TruncatedAttribute { name: String, length: u32 },
}

/// Folds every close failure into one error: the first is reported as the
/// primary cause, the rest travel along as suppressed.
pub(crate) fn collect_close_failures(failures: Vec<anyhow::Error>) -> anyhow::Result<()> {
    let mut failures = failures.into_iter();
    match failures.next() {
        None => Ok(()),
        Some(first) => Err(StoreError::CloseFailed {
            first,
            suppressed: failures.collect(),
        }
        .into()),
    }
}
