//! Class headers: identity, member tables and the resident constant pool.
//!
//! A header is built from one full pass over the class bytes. Method code is
//! never retained; only its length is recorded so that [`crate::lazy`] can
//! carve the instructions out again on demand.

use anyhow::{Context, Result, bail};
use arc_swap::ArcSwapOption;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::consts::{ConstantPool, MemberKind};
use crate::context::StructContext;
use crate::error::ClassFormatError;
use crate::lazy;
use crate::stream::ClassStream;

pub const MAGIC: u32 = 0xCAFE_BABE;
pub const ATTRIBUTE_CODE: &str = "Code";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructMethod {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    /// Length of the `Code` attribute's instruction array, if the method has one.
    pub code_length: Option<u32>,
}

impl StructMethod {
    /// Re-reads `class` through `ctx` and returns this method's instructions.
    pub fn bytecode(
        &self,
        ctx: &dyn StructContext,
        class: &StructClass,
    ) -> Result<Option<Vec<u8>>> {
        let Some(code_length) = self.code_length else {
            return Ok(None);
        };
        lazy::load_bytecode(ctx, class, &self.name, &self.descriptor, code_length as usize)
    }
}

#[derive(Debug)]
pub struct StructClass {
    /// Internal form, e.g. `java/lang/String`.
    pub qualified_name: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub access_flags: u16,
    pub minor_version: u16,
    pub major_version: u16,
    pub fields: Vec<StructField>,
    pub methods: Vec<StructMethod>,
    /// Resource key of the backing bytes.
    pub source: String,
    /// Hex sha256 of the bytes the header was parsed from.
    pub content_hash: String,
    own: bool,
    pool: ArcSwapOption<ConstantPool>,
}

impl StructClass {
    pub fn parse(bytes: &[u8], own: bool, source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        Self::parse_inner(bytes, own, source.clone())
            .with_context(|| format!("Failed to parse class file: {source}"))
    }

    fn parse_inner(bytes: &[u8], own: bool, source: String) -> Result<Self> {
        let mut stream = ClassStream::new(bytes);

        let magic = stream.read_u32()?;
        if magic != MAGIC {
            bail!(ClassFormatError::WrongMagic(magic));
        }
        let minor_version = stream.read_u16()?;
        let major_version = stream.read_u16()?;

        let pool = ConstantPool::parse(&mut stream)?;

        let access_flags = stream.read_u16()?;
        let this_class = stream.read_u16()?;
        let super_index = stream.read_u16()?;
        let qualified_name = pool.class_name(this_class)?.to_string();
        let super_class = match super_index {
            0 => None,
            index => Some(pool.class_name(index)?.to_string()),
        };

        let interface_count = stream.read_u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(pool.class_name(stream.read_u16()?)?.to_string());
        }

        let field_count = stream.read_u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let access_flags = stream.read_u16()?;
            let name_index = stream.read_u16()?;
            let descriptor_index = stream.read_u16()?;
            let (name, descriptor) = pool.class_element(
                MemberKind::Field,
                &qualified_name,
                name_index,
                descriptor_index,
            )?;
            fields.push(StructField {
                access_flags,
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            });
            lazy::skip_attributes(&mut stream)?;
        }

        let method_count = stream.read_u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            let access_flags = stream.read_u16()?;
            let name_index = stream.read_u16()?;
            let descriptor_index = stream.read_u16()?;
            let (name, descriptor) = pool.class_element(
                MemberKind::Method,
                &qualified_name,
                name_index,
                descriptor_index,
            )?;
            let code_length = read_code_length(&mut stream, &pool)?;
            methods.push(StructMethod {
                access_flags,
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                code_length,
            });
        }

        Ok(Self {
            qualified_name,
            super_class,
            interfaces,
            access_flags,
            minor_version,
            major_version,
            fields,
            methods,
            source,
            content_hash: hash_bytes(bytes),
            own,
            pool: ArcSwapOption::from_pointee(pool),
        })
    }

    pub fn is_own(&self) -> bool {
        self.own
    }

    /// The resident pool, if it has not been released.
    pub fn pool(&self) -> Option<Arc<ConstantPool>> {
        self.pool.load_full()
    }

    pub fn release_pool(&self) {
        self.pool.store(None);
    }

    /// Returns the resident pool, re-decoding and caching it when released.
    /// Absent when the class bytes can no longer be read through `ctx`.
    pub fn pool_or_load(&self, ctx: &dyn StructContext) -> Result<Option<Arc<ConstantPool>>> {
        if let Some(pool) = self.pool() {
            return Ok(Some(pool));
        }
        let Some(pool) = lazy::load_pool(ctx, self)? else {
            return Ok(None);
        };
        let pool = Arc::new(pool);
        self.pool.store(Some(Arc::clone(&pool)));
        Ok(Some(pool))
    }

    /// First method whose name and descriptor both match.
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&StructMethod> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn field(&self, name: &str, descriptor: &str) -> Option<&StructField> {
        self.fields
            .iter()
            .find(|f| f.name == name && f.descriptor == descriptor)
    }
}

/// Walks a method's attribute table and returns the `code_length` of its
/// `Code` attribute, leaving the stream after the table.
fn read_code_length(stream: &mut ClassStream<'_>, pool: &ConstantPool) -> Result<Option<u32>> {
    let mut code_length = None;
    let attribute_count = stream.read_u16()?;
    for _ in 0..attribute_count {
        let name = pool.utf8(stream.read_u16()?)?;
        let length = stream.read_u32()?;
        if code_length.is_none() && name == ATTRIBUTE_CODE {
            let Some(rest) = length.checked_sub(8) else {
                bail!(ClassFormatError::TruncatedAttribute {
                    name: name.to_string(),
                    length,
                });
            };
            stream.discard(4)?; // max_stack, max_locals
            code_length = Some(stream.read_u32()?);
            stream.discard(rest as usize)?;
        } else {
            stream.discard(length as usize)?;
        }
    }
    Ok(code_length)
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
