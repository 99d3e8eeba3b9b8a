//! Constant pool decoding.
//!
//! The pool is decoded into a 1-indexed table that mirrors class-file slot
//! numbering: slot 0 and the second slot of every `long`/`double` constant
//! stay empty. References between entries are kept as raw indices and are
//! resolved on lookup.

use anyhow::{Context, Result};
use std::fmt;

use crate::error::ClassFormatError;
use crate::stream::ClassStream;

pub const CONSTANT_UTF8: u8 = 1;
pub const CONSTANT_INTEGER: u8 = 3;
pub const CONSTANT_FLOAT: u8 = 4;
pub const CONSTANT_LONG: u8 = 5;
pub const CONSTANT_DOUBLE: u8 = 6;
pub const CONSTANT_CLASS: u8 = 7;
pub const CONSTANT_STRING: u8 = 8;
pub const CONSTANT_FIELDREF: u8 = 9;
pub const CONSTANT_METHODREF: u8 = 10;
pub const CONSTANT_INTERFACE_METHODREF: u8 = 11;
pub const CONSTANT_NAME_AND_TYPE: u8 = 12;
pub const CONSTANT_METHOD_HANDLE: u8 = 15;
pub const CONSTANT_METHOD_TYPE: u8 = 16;
pub const CONSTANT_DYNAMIC: u8 = 17;
pub const CONSTANT_INVOKE_DYNAMIC: u8 = 18;
pub const CONSTANT_MODULE: u8 = 19;
pub const CONSTANT_PACKAGE: u8 = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
}

impl Constant {
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => CONSTANT_UTF8,
            Constant::Integer(_) => CONSTANT_INTEGER,
            Constant::Float(_) => CONSTANT_FLOAT,
            Constant::Long(_) => CONSTANT_LONG,
            Constant::Double(_) => CONSTANT_DOUBLE,
            Constant::Class { .. } => CONSTANT_CLASS,
            Constant::String { .. } => CONSTANT_STRING,
            Constant::FieldRef { .. } => CONSTANT_FIELDREF,
            Constant::MethodRef { .. } => CONSTANT_METHODREF,
            Constant::InterfaceMethodRef { .. } => CONSTANT_INTERFACE_METHODREF,
            Constant::NameAndType { .. } => CONSTANT_NAME_AND_TYPE,
            Constant::MethodHandle { .. } => CONSTANT_METHOD_HANDLE,
            Constant::MethodType { .. } => CONSTANT_METHOD_TYPE,
            Constant::Dynamic { .. } => CONSTANT_DYNAMIC,
            Constant::InvokeDynamic { .. } => CONSTANT_INVOKE_DYNAMIC,
            Constant::Module { .. } => CONSTANT_MODULE,
            Constant::Package { .. } => CONSTANT_PACKAGE,
        }
    }

    /// Number of pool slots the entry occupies.
    pub fn slots(&self) -> u16 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Shape of a class member reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Field => f.write_str("field"),
            MemberKind::Method => f.write_str("method"),
        }
    }
}

/// A resolved `Fieldref`/`Methodref`/`InterfaceMethodref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub class_name: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Option<Constant>>,
}

impl ConstantPool {
    /// Decodes a pool from a stream positioned right after the 8-byte header.
    pub fn parse(stream: &mut ClassStream<'_>) -> Result<Self> {
        let count = stream.read_u16().context("reading constant pool count")?;
        let mut entries: Vec<Option<Constant>> = Vec::with_capacity(count as usize);
        entries.push(None);

        let mut index: u16 = 1;
        while index < count {
            let constant = read_constant(stream, index)
                .with_context(|| format!("reading constant pool entry {index}"))?;
            let slots = constant.slots();
            entries.push(Some(constant));
            if slots == 2 && index + 1 < count {
                entries.push(None);
            }
            index = index.saturating_add(slots);
        }

        Ok(Self { entries })
    }

    /// Advances past a pool without materializing any entry.
    pub fn skip(stream: &mut ClassStream<'_>) -> Result<()> {
        let count = stream.read_u16().context("reading constant pool count")?;
        let mut index: u16 = 1;
        while index < count {
            let tag = stream.read_u8()?;
            match tag {
                CONSTANT_UTF8 => {
                    let len = stream.read_u16()?;
                    stream.discard(len as usize)?;
                }
                CONSTANT_CLASS | CONSTANT_STRING | CONSTANT_METHOD_TYPE | CONSTANT_MODULE
                | CONSTANT_PACKAGE => stream.discard(2)?,
                CONSTANT_METHOD_HANDLE => stream.discard(3)?,
                CONSTANT_INTEGER
                | CONSTANT_FLOAT
                | CONSTANT_FIELDREF
                | CONSTANT_METHODREF
                | CONSTANT_INTERFACE_METHODREF
                | CONSTANT_NAME_AND_TYPE
                | CONSTANT_DYNAMIC
                | CONSTANT_INVOKE_DYNAMIC => stream.discard(4)?,
                CONSTANT_LONG | CONSTANT_DOUBLE => {
                    stream.discard(8)?;
                    index = index.saturating_add(1);
                }
                _ => return Err(ClassFormatError::UnknownConstantTag { tag, index }.into()),
            }
            index = index.saturating_add(1);
        }
        Ok(())
    }

    /// The declared `constant_pool_count`, i.e. the highest valid index plus one.
    pub fn size(&self) -> u16 {
        self.entries.len() as u16
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(index as usize).and_then(Option::as_ref)
    }

    fn entry(&self, index: u16) -> Result<&Constant> {
        self.get(index).ok_or_else(|| {
            ClassFormatError::PoolIndexOutOfRange {
                index,
                size: self.size(),
            }
            .into()
        })
    }

    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.entry(index)? {
            Constant::Utf8(value) => Ok(value),
            _ => Err(mismatch(index, "Utf8")),
        }
    }

    /// Textual value of a string-like constant: `Utf8` itself, or the name a
    /// `Class`, `String`, `MethodType`, `Module` or `Package` entry points at.
    pub fn string_at(&self, index: u16) -> Result<&str> {
        match self.entry(index)? {
            Constant::Utf8(value) => Ok(value),
            Constant::Class { name_index: target }
            | Constant::String {
                string_index: target,
            }
            | Constant::MethodType {
                descriptor_index: target,
            }
            | Constant::Module { name_index: target }
            | Constant::Package { name_index: target } => self.utf8(*target),
            _ => Err(mismatch(index, "string-like constant")),
        }
    }

    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.entry(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(mismatch(index, "Class")),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.entry(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => Err(mismatch(index, "NameAndType")),
        }
    }

    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>> {
        match self.entry(index)? {
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            }
            | Constant::MethodRef {
                class_index,
                name_and_type_index,
            }
            | Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok(MemberRef {
                    class_name: self.class_name(*class_index)?,
                    name,
                    descriptor,
                })
            }
            _ => Err(mismatch(index, "member reference")),
        }
    }

    /// Resolves the name and descriptor of a member declared in `class_name`
    /// from the two indices stored in its field or method table entry.
    pub fn class_element(
        &self,
        kind: MemberKind,
        class_name: &str,
        name_index: u16,
        descriptor_index: u16,
    ) -> Result<(&str, &str)> {
        let name = self
            .utf8(name_index)
            .with_context(|| format!("resolving {kind} name in {class_name}"))?;
        let descriptor = self
            .utf8(descriptor_index)
            .with_context(|| format!("resolving {kind} descriptor of {class_name}.{name}"))?;
        Ok((name, descriptor))
    }
}

fn mismatch(index: u16, expected: &'static str) -> anyhow::Error {
    ClassFormatError::PoolTypeMismatch { index, expected }.into()
}

fn read_constant(stream: &mut ClassStream<'_>, index: u16) -> Result<Constant> {
    let tag = stream.read_u8()?;
    let constant = match tag {
        CONSTANT_UTF8 => {
            let len = stream.read_u16()?;
            Constant::Utf8(decode_modified_utf8(stream.read_slice(len as usize)?))
        }
        CONSTANT_INTEGER => Constant::Integer(stream.read_i32()?),
        CONSTANT_FLOAT => Constant::Float(stream.read_f32()?),
        CONSTANT_LONG => Constant::Long(stream.read_i64()?),
        CONSTANT_DOUBLE => Constant::Double(stream.read_f64()?),
        CONSTANT_CLASS => Constant::Class {
            name_index: stream.read_u16()?,
        },
        CONSTANT_STRING => Constant::String {
            string_index: stream.read_u16()?,
        },
        CONSTANT_FIELDREF => Constant::FieldRef {
            class_index: stream.read_u16()?,
            name_and_type_index: stream.read_u16()?,
        },
        CONSTANT_METHODREF => Constant::MethodRef {
            class_index: stream.read_u16()?,
            name_and_type_index: stream.read_u16()?,
        },
        CONSTANT_INTERFACE_METHODREF => Constant::InterfaceMethodRef {
            class_index: stream.read_u16()?,
            name_and_type_index: stream.read_u16()?,
        },
        CONSTANT_NAME_AND_TYPE => Constant::NameAndType {
            name_index: stream.read_u16()?,
            descriptor_index: stream.read_u16()?,
        },
        CONSTANT_METHOD_HANDLE => Constant::MethodHandle {
            reference_kind: stream.read_u8()?,
            reference_index: stream.read_u16()?,
        },
        CONSTANT_METHOD_TYPE => Constant::MethodType {
            descriptor_index: stream.read_u16()?,
        },
        CONSTANT_DYNAMIC => Constant::Dynamic {
            bootstrap_method_index: stream.read_u16()?,
            name_and_type_index: stream.read_u16()?,
        },
        CONSTANT_INVOKE_DYNAMIC => Constant::InvokeDynamic {
            bootstrap_method_index: stream.read_u16()?,
            name_and_type_index: stream.read_u16()?,
        },
        CONSTANT_MODULE => Constant::Module {
            name_index: stream.read_u16()?,
        },
        CONSTANT_PACKAGE => Constant::Package {
            name_index: stream.read_u16()?,
        },
        _ => return Err(ClassFormatError::UnknownConstantTag { tag, index }.into()),
    };
    Ok(constant)
}

/// Decodes the JVM's modified UTF-8 (`\0` as `C0 80`, supplementary
/// characters as surrogate pairs). Malformed sequences become U+FFFD.
pub fn decode_modified_utf8(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 && i + 1 < bytes.len() {
            units.push(((b & 0x1F) as u16) << 6 | (bytes[i + 1] & 0x3F) as u16);
            i += 2;
        } else if b & 0xF0 == 0xE0 && i + 2 < bytes.len() {
            units.push(
                ((b & 0x0F) as u16) << 12
                    | ((bytes[i + 1] & 0x3F) as u16) << 6
                    | (bytes[i + 2] & 0x3F) as u16,
            );
            i += 3;
        } else {
            units.push(0xFFFD);
            i += 1;
        }
    }
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_bytes() -> Vec<u8> {
        let mut b = Vec::new();
        // count = 9: #1 Utf8, #2 Class, #3-4 Long, #5 Utf8, #6 Utf8, #7 NameAndType, #8 Methodref
        b.extend(9u16.to_be_bytes());
        b.push(CONSTANT_UTF8);
        b.extend(5u16.to_be_bytes());
        b.extend(b"a/Foo");
        b.push(CONSTANT_CLASS);
        b.extend(1u16.to_be_bytes());
        b.push(CONSTANT_LONG);
        b.extend(42i64.to_be_bytes());
        b.push(CONSTANT_UTF8);
        b.extend(3u16.to_be_bytes());
        b.extend(b"run");
        b.push(CONSTANT_UTF8);
        b.extend(3u16.to_be_bytes());
        b.extend(b"()V");
        b.push(CONSTANT_NAME_AND_TYPE);
        b.extend(5u16.to_be_bytes());
        b.extend(6u16.to_be_bytes());
        b.push(CONSTANT_METHODREF);
        b.extend(2u16.to_be_bytes());
        b.extend(7u16.to_be_bytes());
        b
    }

    #[test]
    fn two_slot_entry_in_last_slot_keeps_declared_size() {
        let mut b = Vec::new();
        b.extend(u16::MAX.to_be_bytes());
        for value in 1..u16::MAX - 1 {
            b.push(CONSTANT_INTEGER);
            b.extend(i32::from(value).to_be_bytes());
        }
        b.push(CONSTANT_LONG);
        b.extend(7i64.to_be_bytes());

        let mut stream = ClassStream::new(&b);
        let pool = ConstantPool::parse(&mut stream).unwrap();
        assert_eq!(stream.remaining(), 0);
        assert_eq!(pool.size(), u16::MAX);
        assert_eq!(pool.get(u16::MAX - 1), Some(&Constant::Long(7)));
        assert_eq!(pool.get(1), Some(&Constant::Integer(1)));
    }

    #[test]
    fn parse_honours_two_slot_entries() {
        let bytes = pool_bytes();
        let mut stream = ClassStream::new(&bytes);
        let pool = ConstantPool::parse(&mut stream).unwrap();

        assert_eq!(stream.remaining(), 0);
        assert_eq!(pool.size(), 9);
        assert_eq!(pool.get(3), Some(&Constant::Long(42)));
        assert_eq!(pool.get(4), None);
        assert_eq!(pool.class_name(2).unwrap(), "a/Foo");
        assert_eq!(pool.utf8(5).unwrap(), "run");

        let member = pool.member_ref(8).unwrap();
        assert_eq!(member.class_name, "a/Foo");
        assert_eq!((member.name, member.descriptor), ("run", "()V"));
    }

    #[test]
    fn skip_lands_where_parse_does() {
        let mut bytes = pool_bytes();
        bytes.extend([0xAB, 0xCD]);

        let mut parsed = ClassStream::new(&bytes);
        ConstantPool::parse(&mut parsed).unwrap();
        let mut skipped = ClassStream::new(&bytes);
        ConstantPool::skip(&mut skipped).unwrap();

        assert_eq!(parsed.position(), skipped.position());
        assert_eq!(skipped.read_u16().unwrap(), 0xABCD);
    }

    #[test]
    fn string_at_follows_class_and_rejects_numbers() {
        let bytes = pool_bytes();
        let pool = ConstantPool::parse(&mut ClassStream::new(&bytes)).unwrap();

        assert_eq!(pool.string_at(2).unwrap(), "a/Foo");
        let err = pool.string_at(3).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClassFormatError>(),
            Some(ClassFormatError::PoolTypeMismatch { index: 3, .. })
        ));
        let err = pool.utf8(40).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClassFormatError>(),
            Some(ClassFormatError::PoolIndexOutOfRange { index: 40, size: 9 })
        ));
    }

    #[test]
    fn class_element_resolves_name_and_descriptor() {
        let bytes = pool_bytes();
        let pool = ConstantPool::parse(&mut ClassStream::new(&bytes)).unwrap();
        let (name, descriptor) = pool.class_element(MemberKind::Method, "a/Foo", 5, 6).unwrap();
        assert_eq!((name, descriptor), ("run", "()V"));
        assert!(pool.class_element(MemberKind::Method, "a/Foo", 2, 6).is_err());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let bytes = [0x00, 0x02, 0x63];
        let err = ConstantPool::parse(&mut ClassStream::new(&bytes)).unwrap_err();
        assert!(err.chain().any(|cause| matches!(
            cause.downcast_ref::<ClassFormatError>(),
            Some(ClassFormatError::UnknownConstantTag { tag: 0x63, index: 1 })
        )));
        assert!(ConstantPool::skip(&mut ClassStream::new(&bytes)).is_err());
    }

    #[test]
    fn modified_utf8_handles_nul_and_surrogates() {
        assert_eq!(decode_modified_utf8(b"plain"), "plain");
        assert_eq!(decode_modified_utf8(&[b'a', 0xC0, 0x80, b'b']), "a\0b");
        // U+1F600 as a CESU-8 surrogate pair
        let emoji = [0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];
        assert_eq!(decode_modified_utf8(&emoji), "\u{1F600}");
    }
}
