//! On-demand re-parsing of class bytes.
//!
//! Headers keep no bytecode. When a method's instructions are needed the
//! class is read again from its context and walked until that one method's
//! `Code` attribute is found; everything else is skipped by declared length.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::trace;

use crate::class::{ATTRIBUTE_CODE, StructClass};
use crate::consts::{ConstantPool, MemberKind};
use crate::context::StructContext;
use crate::stream::ClassStream;

/// magic + minor_version + major_version
const HEADER_LENGTH: usize = 8;
/// access_flags + this_class + super_class
const CLASS_INFO_LENGTH: usize = 6;
/// attribute_length + max_stack + max_locals + code_length
const CODE_PREFIX_LENGTH: usize = 12;

/// Decodes a fresh pool from the class bytes held by `ctx`.
pub fn load_pool(ctx: &dyn StructContext, class: &StructClass) -> Result<Option<ConstantPool>> {
    let Some(bytes) = ctx.read_class_of(class)? else {
        return Ok(None);
    };
    let mut stream = ClassStream::new(&bytes);
    stream.discard(HEADER_LENGTH)?;
    let pool = ConstantPool::parse(&mut stream)
        .with_context(|| format!("Failed to load constant pool of {}", class.qualified_name))?;
    Ok(Some(pool))
}

/// Extracts exactly `code_full_length` instruction bytes of the first method
/// in `class` whose name and descriptor match.
///
/// Returns `Ok(None)` when the class bytes are gone, no method matches, or
/// the matching method has no `Code` attribute. Any read failure is an error.
pub fn load_bytecode(
    ctx: &dyn StructContext,
    class: &StructClass,
    name: &str,
    descriptor: &str,
    code_full_length: usize,
) -> Result<Option<Vec<u8>>> {
    let Some(bytes) = ctx.read_class_of(class)? else {
        return Ok(None);
    };
    find_code(&bytes, class, name, descriptor, code_full_length).with_context(|| {
        format!(
            "Failed to load bytecode of {}.{}{}",
            class.qualified_name, name, descriptor
        )
    })
}

fn find_code(
    bytes: &[u8],
    class: &StructClass,
    name: &str,
    descriptor: &str,
    code_full_length: usize,
) -> Result<Option<Vec<u8>>> {
    let class_name = class.qualified_name.as_str();
    let mut stream = ClassStream::new(bytes);
    stream.discard(HEADER_LENGTH)?;

    let pool = match class.pool() {
        Some(pool) => {
            ConstantPool::skip(&mut stream)?;
            pool
        }
        None => Arc::new(ConstantPool::parse(&mut stream)?),
    };

    stream.discard(CLASS_INFO_LENGTH)?;

    let interface_count = stream.read_u16()?;
    stream.discard(interface_count as usize * 2)?;

    let field_count = stream.read_u16()?;
    for _ in 0..field_count {
        stream.discard(6)?;
        skip_attributes(&mut stream)?;
    }

    let method_count = stream.read_u16()?;
    for _ in 0..method_count {
        stream.discard(2)?;
        let name_index = stream.read_u16()?;
        let descriptor_index = stream.read_u16()?;

        let (method_name, method_descriptor) =
            pool.class_element(MemberKind::Method, class_name, name_index, descriptor_index)?;
        if method_name != name || method_descriptor != descriptor {
            skip_attributes(&mut stream)?;
            continue;
        }

        let attribute_count = stream.read_u16()?;
        for _ in 0..attribute_count {
            let attribute_name = pool.string_at(stream.read_u16()?)?;
            if attribute_name != ATTRIBUTE_CODE {
                let length = stream.read_u32()?;
                stream.discard(length as usize)?;
                continue;
            }

            stream.discard(CODE_PREFIX_LENGTH)?;
            let code = stream.read_full(code_full_length)?;
            trace!(
                class = class_name,
                method = name,
                descriptor,
                len = code.len(),
                "loaded bytecode"
            );
            return Ok(Some(code));
        }

        break;
    }

    Ok(None)
}

/// Skips a count-prefixed attribute table.
pub fn skip_attributes(stream: &mut ClassStream<'_>) -> Result<()> {
    let count = stream.read_u16()?;
    for _ in 0..count {
        stream.discard(2)?;
        let length = stream.read_u32()?;
        stream.discard(length as usize)?;
    }
    Ok(())
}
