//! # class-store
//!
//! Class-file ingestion and storage for a JVM bytecode decompiler.
//!
//! ## Architecture
//!
//! - **context**: The entry registry: scans class files, directories and jar/zip
//!   archives, maps resource keys to backing entries and class names to headers
//! - **entry**: Backing entries (loose files and archive members) behind a resource key
//! - **archive**: Shared, idempotently closable handle over one memory-mapped archive
//! - **walk**: Directory walking strategies for directory scans
//! - **class**: Class headers parsed from one pass over the class bytes
//! - **consts**: Constant pool decoding, lookup and skipping
//! - **lazy**: On-demand re-parsing to extract a single method's bytecode
//! - **stream**: Big-endian cursor over class-file bytes
//! - **naming**: Source entry names for rendered classes
//! - **config** / **cli**: Runtime configuration and the command-line surface

pub mod archive;
pub mod class;
pub mod cli;
pub mod config;
pub mod consts;
pub mod context;
pub mod entry;
pub mod error;
pub mod lazy;
pub mod naming;
pub mod stream;
pub mod walk;

#[cfg(test)]
mod testing;

pub use class::{StructClass, StructField, StructMethod};
pub use consts::{Constant, ConstantPool, MemberKind};
pub use context::{ClassMap, FileStructContext, StructContext};
pub use entry::StructEntry;
pub use error::{ClassFormatError, StoreError};
