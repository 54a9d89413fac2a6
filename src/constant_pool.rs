use crate::error::{Error, Result};

/// Constant pool entry as stored in the class file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Constant {
    /// Index 0 and the second slot of long/double entries.
    Unusable,
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
}

mod tags {
    pub(super) const UTF8: u8 = 1;
    pub(super) const INTEGER: u8 = 3;
    pub(super) const FLOAT: u8 = 4;
    pub(super) const LONG: u8 = 5;
    pub(super) const DOUBLE: u8 = 6;
    pub(super) const CLASS: u8 = 7;
    pub(super) const STRING: u8 = 8;
    pub(super) const FIELD_REF: u8 = 9;
    pub(super) const METHOD_REF: u8 = 10;
    pub(super) const INTERFACE_METHOD_REF: u8 = 11;
    pub(super) const NAME_AND_TYPE: u8 = 12;
    pub(super) const METHOD_HANDLE: u8 = 15;
    pub(super) const METHOD_TYPE: u8 = 16;
    pub(super) const DYNAMIC: u8 = 17;
    pub(super) const INVOKE_DYNAMIC: u8 = 18;
    pub(super) const MODULE: u8 = 19;
    pub(super) const PACKAGE: u8 = 20;
}

impl Constant {
    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }

    /// Decode one entry starting at `bytes[0]`; returns the entry and its encoded length.
    pub(crate) fn decode(bytes: &[u8], offset: usize) -> Result<(Constant, usize)> {
        let tag = *bytes.first().ok_or(Error::Truncated(offset))?;
        let u8_at = |at: usize| bytes.get(at).copied().ok_or(Error::Truncated(offset + at));
        let u16_at =
            |at: usize| -> Result<u16> { Ok(u16::from_be_bytes([u8_at(at)?, u8_at(at + 1)?])) };
        let u32_at = |at: usize| -> Result<u32> {
            Ok(u32::from(u16_at(at)?) << 16 | u32::from(u16_at(at + 2)?))
        };
        let u64_at = |at: usize| -> Result<u64> {
            Ok(u64::from(u32_at(at)?) << 32 | u64::from(u32_at(at + 4)?))
        };
        let decoded = match tag {
            tags::UTF8 => {
                let len = usize::from(u16_at(1)?);
                let value = bytes
                    .get(3..3 + len)
                    .ok_or(Error::Truncated(offset + 3))?
                    .to_vec();
                (Constant::Utf8(value), 3 + len)
            }
            tags::INTEGER => (Constant::Integer(u32_at(1)?), 5),
            tags::FLOAT => (Constant::Float(u32_at(1)?), 5),
            tags::LONG => (Constant::Long(u64_at(1)?), 9),
            tags::DOUBLE => (Constant::Double(u64_at(1)?), 9),
            tags::CLASS => (Constant::Class(u16_at(1)?), 3),
            tags::STRING => (Constant::String(u16_at(1)?), 3),
            tags::FIELD_REF => (Constant::FieldRef(u16_at(1)?, u16_at(3)?), 5),
            tags::METHOD_REF => (Constant::MethodRef(u16_at(1)?, u16_at(3)?), 5),
            tags::INTERFACE_METHOD_REF => {
                (Constant::InterfaceMethodRef(u16_at(1)?, u16_at(3)?), 5)
            }
            tags::NAME_AND_TYPE => (Constant::NameAndType(u16_at(1)?, u16_at(3)?), 5),
            tags::METHOD_HANDLE => (Constant::MethodHandle(u8_at(1)?, u16_at(2)?), 4),
            tags::METHOD_TYPE => (Constant::MethodType(u16_at(1)?), 3),
            tags::DYNAMIC => (Constant::Dynamic(u16_at(1)?, u16_at(3)?), 5),
            tags::INVOKE_DYNAMIC => (Constant::InvokeDynamic(u16_at(1)?, u16_at(3)?), 5),
            tags::MODULE => (Constant::Module(u16_at(1)?), 3),
            tags::PACKAGE => (Constant::Package(u16_at(1)?), 3),
            _ => {
                return Err(Error::InvalidConstant {
                    index: 0,
                    reason: "unknown tag",
                });
            }
        };
        Ok(decoded)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Constant::Unusable => {}
            Constant::Utf8(value) => {
                out.push(tags::UTF8);
                out.extend_from_slice(&(value.len() as u16).to_be_bytes());
                out.extend_from_slice(value);
            }
            Constant::Integer(value) => encode_u32(out, tags::INTEGER, *value),
            Constant::Float(value) => encode_u32(out, tags::FLOAT, *value),
            Constant::Long(value) => {
                out.push(tags::LONG);
                out.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Double(value) => {
                out.push(tags::DOUBLE);
                out.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Class(index) => encode_u16(out, tags::CLASS, *index),
            Constant::String(index) => encode_u16(out, tags::STRING, *index),
            Constant::FieldRef(a, b) => encode_pair(out, tags::FIELD_REF, *a, *b),
            Constant::MethodRef(a, b) => encode_pair(out, tags::METHOD_REF, *a, *b),
            Constant::InterfaceMethodRef(a, b) => {
                encode_pair(out, tags::INTERFACE_METHOD_REF, *a, *b)
            }
            Constant::NameAndType(a, b) => encode_pair(out, tags::NAME_AND_TYPE, *a, *b),
            Constant::MethodHandle(kind, index) => {
                out.push(tags::METHOD_HANDLE);
                out.push(*kind);
                out.extend_from_slice(&index.to_be_bytes());
            }
            Constant::MethodType(index) => encode_u16(out, tags::METHOD_TYPE, *index),
            Constant::Dynamic(a, b) => encode_pair(out, tags::DYNAMIC, *a, *b),
            Constant::InvokeDynamic(a, b) => encode_pair(out, tags::INVOKE_DYNAMIC, *a, *b),
            Constant::Module(index) => encode_u16(out, tags::MODULE, *index),
            Constant::Package(index) => encode_u16(out, tags::PACKAGE, *index),
        }
    }
}

fn encode_u16(out: &mut Vec<u8>, tag: u8, value: u16) {
    out.push(tag);
    out.extend_from_slice(&value.to_be_bytes());
}

fn encode_u32(out: &mut Vec<u8>, tag: u8, value: u32) {
    out.push(tag);
    out.extend_from_slice(&value.to_be_bytes());
}

fn encode_pair(out: &mut Vec<u8>, tag: u8, first: u16, second: u16) {
    out.push(tag);
    out.extend_from_slice(&first.to_be_bytes());
    out.extend_from_slice(&second.to_be_bytes());
}

/// Constant pool with one-based indexing. New entries are only ever appended,
/// so indices embedded in undecoded bytes stay valid across a rewrite.
#[derive(Clone, Debug)]
pub(crate) struct ConstantPool {
    entries: Vec<Constant>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    pub(crate) fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }

    /// Parse `constant_pool_count - 1` entries from `bytes`, returning the pool and bytes consumed.
    pub(crate) fn parse(bytes: &[u8], base_offset: usize) -> Result<(Self, usize)> {
        let count = bytes
            .get(0..2)
            .map(|raw| u16::from_be_bytes([raw[0], raw[1]]))
            .ok_or(Error::Truncated(base_offset))?;
        let mut pool = Self::new();
        let mut cursor = 2;
        while pool.entries.len() < usize::from(count) {
            let index = pool.entries.len() as u16;
            let (constant, len) = Constant::decode(&bytes[cursor..], base_offset + cursor)
                .map_err(|err| match err {
                    Error::InvalidConstant { reason, .. } => {
                        Error::InvalidConstant { index, reason }
                    }
                    other => other,
                })?;
            let wide = constant.is_wide();
            pool.entries.push(constant);
            if wide {
                pool.entries.push(Constant::Unusable);
            }
            cursor += len;
        }
        if pool.entries.len() != usize::from(count) {
            return Err(Error::InvalidConstant {
                index: count.saturating_sub(1),
                reason: "wide constant overflows pool count",
            });
        }
        Ok((pool, cursor))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn get(&self, index: u16) -> Result<&Constant> {
        match self.entries.get(usize::from(index)) {
            Some(Constant::Unusable) | None => Err(Error::InvalidConstant {
                index,
                reason: "index out of range",
            }),
            Some(constant) => Ok(constant),
        }
    }

    pub(crate) fn utf8(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Utf8(bytes) => decode_modified_utf8(bytes),
            _ => Err(Error::InvalidConstant {
                index,
                reason: "expected CONSTANT_Utf8",
            }),
        }
    }

    pub(crate) fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Class(name_index) => self.utf8(*name_index),
            _ => Err(Error::InvalidConstant {
                index,
                reason: "expected CONSTANT_Class",
            }),
        }
    }

    pub(crate) fn add_utf8(&mut self, value: &str) -> Result<u16> {
        self.intern(Constant::Utf8(encode_modified_utf8(value)))
    }

    pub(crate) fn add_class(&mut self, name: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        self.intern(Constant::Class(name_index))
    }

    pub(crate) fn add_string(&mut self, value: &str) -> Result<u16> {
        let utf8_index = self.add_utf8(value)?;
        self.intern(Constant::String(utf8_index))
    }

    pub(crate) fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.intern(Constant::NameAndType(name_index, descriptor_index))
    }

    pub(crate) fn add_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        interface: bool,
    ) -> Result<u16> {
        let class_index = self.add_class(owner)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        if interface {
            self.intern(Constant::InterfaceMethodRef(class_index, name_and_type_index))
        } else {
            self.intern(Constant::MethodRef(class_index, name_and_type_index))
        }
    }

    /// Return the index of an equal entry, appending one if none exists.
    fn intern(&mut self, constant: Constant) -> Result<u16> {
        if let Some(index) = self.entries.iter().position(|entry| *entry == constant) {
            return Ok(index as u16);
        }
        let slots = if constant.is_wide() { 2 } else { 1 };
        if self.entries.len() + slots > usize::from(u16::MAX) {
            return Err(Error::ConstantPoolOverflow);
        }
        let index = self.entries.len() as u16;
        self.entries.push(constant);
        Ok(index)
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for entry in &self.entries {
            entry.encode(out);
        }
    }
}

/// Encode a string in the JVM's modified UTF-8 (NUL as two bytes, supplementary
/// characters as surrogate pairs).
pub(crate) fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}

pub(crate) fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        let first = u16::from(bytes[index]);
        let continuation = |at: usize| -> Result<u16> {
            match bytes.get(at) {
                Some(byte) if byte & 0xc0 == 0x80 => Ok(u16::from(byte & 0x3f)),
                _ => Err(Error::InvalidUtf8),
            }
        };
        if first & 0x80 == 0 {
            units.push(first);
            index += 1;
        } else if first & 0xe0 == 0xc0 {
            units.push((first & 0x1f) << 6 | continuation(index + 1)?);
            index += 2;
        } else if first & 0xf0 == 0xe0 {
            units.push(
                (first & 0x0f) << 12 | continuation(index + 1)? << 6 | continuation(index + 2)?,
            );
            index += 3;
        } else {
            return Err(Error::InvalidUtf8);
        }
    }
    String::from_utf16(&units).map_err(|_| Error::InvalidUtf8)
}
