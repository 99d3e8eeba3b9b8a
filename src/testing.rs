//! Class-file builder for tests.
//!
//! Every field and method carries a 3-byte `Marker` attribute ahead of its
//! `Code` attribute so that attribute skipping is always exercised.

use std::collections::HashMap;

use crate::class::MAGIC;
use crate::consts::*;

struct PoolWriter {
    bytes: Vec<u8>,
    next: u16,
    utf8: HashMap<String, u16>,
}

impl PoolWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            next: 1,
            utf8: HashMap::new(),
        }
    }

    fn push(&mut self, entry: &[u8], slots: u16) -> u16 {
        let index = self.next;
        self.bytes.extend_from_slice(entry);
        self.next += slots;
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(&index) = self.utf8.get(value) {
            return index;
        }
        let mut entry = vec![CONSTANT_UTF8];
        entry.extend((value.len() as u16).to_be_bytes());
        entry.extend(value.as_bytes());
        let index = self.push(&entry, 1);
        self.utf8.insert(value.to_string(), index);
        index
    }

    fn with_index(&mut self, tag: u8, target: u16) -> u16 {
        let mut entry = vec![tag];
        entry.extend(target.to_be_bytes());
        self.push(&entry, 1)
    }

    fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        self.with_index(CONSTANT_CLASS, name)
    }
}

enum ExtraConstant {
    Long(i64),
    Double(f64),
    String(String),
    MethodRef(String, String, String),
}

struct MethodSpec {
    name: String,
    descriptor: String,
    code: Option<Vec<u8>>,
}

pub(crate) struct ClassFileBuilder {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    extras: Vec<ExtraConstant>,
    fields: Vec<(String, String)>,
    methods: Vec<MethodSpec>,
}

impl ClassFileBuilder {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            extras: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub(crate) fn no_super(mut self) -> Self {
        self.super_name = None;
        self
    }

    pub(crate) fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    pub(crate) fn long_constant(mut self, value: i64) -> Self {
        self.extras.push(ExtraConstant::Long(value));
        self
    }

    pub(crate) fn double_constant(mut self, value: f64) -> Self {
        self.extras.push(ExtraConstant::Double(value));
        self
    }

    pub(crate) fn string_constant(mut self, value: &str) -> Self {
        self.extras.push(ExtraConstant::String(value.to_string()));
        self
    }

    pub(crate) fn method_ref(mut self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.extras.push(ExtraConstant::MethodRef(
            owner.to_string(),
            name.to_string(),
            descriptor.to_string(),
        ));
        self
    }

    pub(crate) fn field(mut self, name: &str, descriptor: &str) -> Self {
        self.fields.push((name.to_string(), descriptor.to_string()));
        self
    }

    pub(crate) fn method(mut self, name: &str, descriptor: &str, code: Option<Vec<u8>>) -> Self {
        self.methods.push(MethodSpec {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code,
        });
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut pool = PoolWriter::new();

        for extra in &self.extras {
            match extra {
                ExtraConstant::Long(value) => {
                    let mut entry = vec![CONSTANT_LONG];
                    entry.extend(value.to_be_bytes());
                    pool.push(&entry, 2);
                }
                ExtraConstant::Double(value) => {
                    let mut entry = vec![CONSTANT_DOUBLE];
                    entry.extend(value.to_be_bytes());
                    pool.push(&entry, 2);
                }
                ExtraConstant::String(value) => {
                    let utf8 = pool.utf8(value);
                    pool.with_index(CONSTANT_STRING, utf8);
                }
                ExtraConstant::MethodRef(owner, name, descriptor) => {
                    let class = pool.class(owner);
                    let name = pool.utf8(name);
                    let descriptor = pool.utf8(descriptor);
                    let mut nat = vec![CONSTANT_NAME_AND_TYPE];
                    nat.extend(name.to_be_bytes());
                    nat.extend(descriptor.to_be_bytes());
                    let nat = pool.push(&nat, 1);
                    let mut entry = vec![CONSTANT_METHODREF];
                    entry.extend(class.to_be_bytes());
                    entry.extend(nat.to_be_bytes());
                    pool.push(&entry, 1);
                }
            }
        }

        let this_class = pool.class(&self.name);
        let super_class = self.super_name.as_deref().map_or(0, |s| pool.class(s));
        let interfaces: Vec<u16> = self.interfaces.iter().map(|i| pool.class(i)).collect();
        let code_name = pool.utf8("Code");
        let marker_name = pool.utf8("Marker");
        let fields: Vec<(u16, u16)> = self
            .fields
            .iter()
            .map(|(name, descriptor)| (pool.utf8(name), pool.utf8(descriptor)))
            .collect();
        let methods: Vec<(u16, u16, Option<&Vec<u8>>)> = self
            .methods
            .iter()
            .map(|m| (pool.utf8(&m.name), pool.utf8(&m.descriptor), m.code.as_ref()))
            .collect();

        let marker = |out: &mut Vec<u8>| {
            out.extend(marker_name.to_be_bytes());
            out.extend(3u32.to_be_bytes());
            out.extend([1, 2, 3]);
        };

        let mut out = Vec::new();
        out.extend(MAGIC.to_be_bytes());
        out.extend(0u16.to_be_bytes());
        out.extend(52u16.to_be_bytes());
        out.extend(pool.next.to_be_bytes());
        out.extend(&pool.bytes);

        out.extend(0x0021u16.to_be_bytes());
        out.extend(this_class.to_be_bytes());
        out.extend(super_class.to_be_bytes());
        out.extend((interfaces.len() as u16).to_be_bytes());
        for interface in interfaces {
            out.extend(interface.to_be_bytes());
        }

        out.extend((fields.len() as u16).to_be_bytes());
        for (name, descriptor) in fields {
            out.extend(0x0002u16.to_be_bytes());
            out.extend(name.to_be_bytes());
            out.extend(descriptor.to_be_bytes());
            out.extend(1u16.to_be_bytes());
            marker(&mut out);
        }

        out.extend((methods.len() as u16).to_be_bytes());
        for (name, descriptor, code) in methods {
            out.extend(0x0001u16.to_be_bytes());
            out.extend(name.to_be_bytes());
            out.extend(descriptor.to_be_bytes());
            match code {
                Some(code) => {
                    out.extend(2u16.to_be_bytes());
                    marker(&mut out);
                    out.extend(code_name.to_be_bytes());
                    out.extend((12 + code.len() as u32).to_be_bytes());
                    out.extend(2u16.to_be_bytes()); // max_stack
                    out.extend(1u16.to_be_bytes()); // max_locals
                    out.extend((code.len() as u32).to_be_bytes());
                    out.extend(code);
                    out.extend(0u16.to_be_bytes()); // exception table
                    out.extend(0u16.to_be_bytes()); // attributes
                }
                None => {
                    out.extend(1u16.to_be_bytes());
                    marker(&mut out);
                }
            }
        }

        out.extend(0u16.to_be_bytes());
        out
    }
}
