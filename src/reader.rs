use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::ir::{
    Annotation, AttributeSlot, ClassUnit, Code, ExceptionHandler, Field, Instruction, Method,
    RawAttribute,
};
use crate::opcodes;

const MAGIC: u32 = 0xCAFE_BABE;

pub(crate) const CODE: &str = "Code";
pub(crate) const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
pub(crate) const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";

/// Big-endian cursor over class file bytes.
struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let slice = self
            .data
            .get(self.offset..self.offset + len)
            .ok_or(Error::Truncated(self.offset))?;
        self.offset += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let raw = self.bytes(2)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let raw = self.bytes(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }
}

/// Parse a class file into a mutable [`ClassUnit`].
pub(crate) fn read_class(data: &[u8]) -> Result<ClassUnit> {
    let mut cursor = Cursor::new(data);
    let magic = cursor.u32()?;
    if magic != MAGIC {
        return Err(Error::BadMagic(magic));
    }
    let minor_version = cursor.u16()?;
    let major_version = cursor.u16()?;

    let (constant_pool, consumed) = ConstantPool::parse(&data[cursor.offset..], cursor.offset)?;
    cursor.offset += consumed;

    let access = cursor.u16()?;
    let name = constant_pool.class_name(cursor.u16()?)?;
    let super_name = match cursor.u16()? {
        0 => None,
        index => Some(constant_pool.class_name(index)?),
    };

    let interface_count = cursor.u16()?;
    let mut interfaces = Vec::with_capacity(usize::from(interface_count));
    for _ in 0..interface_count {
        interfaces.push(cursor.u16()?);
    }

    let field_count = cursor.u16()?;
    let mut fields = Vec::with_capacity(usize::from(field_count));
    for _ in 0..field_count {
        fields.push(Field {
            access: cursor.u16()?,
            name_index: cursor.u16()?,
            descriptor_index: cursor.u16()?,
            attributes: read_raw_attributes(&mut cursor)?,
        });
    }

    let method_count = cursor.u16()?;
    let mut methods = Vec::with_capacity(usize::from(method_count));
    for _ in 0..method_count {
        methods.push(read_method(&mut cursor, &constant_pool)?);
    }

    let attributes = read_raw_attributes(&mut cursor)?;
    if !cursor.is_empty() {
        return Err(Error::Truncated(cursor.offset));
    }

    Ok(ClassUnit {
        minor_version,
        major_version,
        constant_pool,
        access,
        name,
        super_name,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

fn read_raw_attributes(cursor: &mut Cursor<'_>) -> Result<Vec<RawAttribute>> {
    let count = cursor.u16()?;
    let mut attributes = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let name_index = cursor.u16()?;
        let len = cursor.u32()? as usize;
        attributes.push(RawAttribute {
            name_index,
            info: cursor.bytes(len)?.to_vec(),
        });
    }
    Ok(attributes)
}

fn read_method(cursor: &mut Cursor<'_>, pool: &ConstantPool) -> Result<Method> {
    let access = cursor.u16()?;
    let name = pool.utf8(cursor.u16()?)?;
    let descriptor = pool.utf8(cursor.u16()?)?;
    let mut method = Method::new(access, &name, &descriptor);

    for attribute in read_raw_attributes(cursor)? {
        let slot = match pool.utf8(attribute.name_index)?.as_str() {
            CODE if method.code.is_none() => {
                method.code = Some(read_code(&attribute.info, pool)?);
                AttributeSlot::Code
            }
            RUNTIME_VISIBLE_ANNOTATIONS if method.visible_annotations.is_none() => {
                method.visible_annotations = Some(read_annotations(&attribute.info, pool)?);
                AttributeSlot::VisibleAnnotations
            }
            RUNTIME_INVISIBLE_ANNOTATIONS if method.invisible_annotations.is_none() => {
                method.invisible_annotations = Some(read_annotations(&attribute.info, pool)?);
                AttributeSlot::InvisibleAnnotations
            }
            _ => AttributeSlot::Raw(attribute),
        };
        method.attribute_order.push(slot);
    }
    Ok(method)
}

fn read_code(info: &[u8], pool: &ConstantPool) -> Result<Code> {
    let mut cursor = Cursor::new(info);
    let max_stack = cursor.u16()?;
    let max_locals = cursor.u16()?;
    let code_length = cursor.u32()? as usize;
    let bytecode = cursor.bytes(code_length)?;
    let instructions = decode_instructions(bytecode)?;

    let handler_count = cursor.u16()?;
    let mut exception_table = Vec::with_capacity(usize::from(handler_count));
    for _ in 0..handler_count {
        exception_table.push(ExceptionHandler {
            start_pc: cursor.u16()?,
            end_pc: cursor.u16()?,
            handler_pc: cursor.u16()?,
            catch_type: cursor.u16()?,
        });
    }
    let attributes = read_raw_attributes(&mut cursor)?;
    for attribute in &attributes {
        pool.utf8(attribute.name_index)?;
    }

    Ok(Code {
        max_stack: Some(max_stack),
        max_locals: Some(max_locals),
        instructions,
        exception_table,
        attributes,
    })
}

/// Split bytecode into per-instruction byte runs.
fn decode_instructions(code: &[u8]) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        let len = opcodes::opcode_length(code, offset)?;
        instructions.push(Instruction::Raw(code[offset..offset + len].to_vec()));
        offset += len;
    }
    Ok(instructions)
}

fn read_annotations(info: &[u8], pool: &ConstantPool) -> Result<Vec<Annotation>> {
    let mut cursor = Cursor::new(info);
    let count = cursor.u16()?;
    let mut annotations = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let descriptor = pool.utf8(cursor.u16()?)?;
        let start = cursor.offset;
        skip_element_pairs(&mut cursor)?;
        annotations.push(Annotation {
            descriptor,
            elements: info[start..cursor.offset].to_vec(),
        });
    }
    if !cursor.is_empty() {
        return Err(Error::Truncated(cursor.offset));
    }
    Ok(annotations)
}

fn skip_element_pairs(cursor: &mut Cursor<'_>) -> Result<()> {
    let pairs = cursor.u16()?;
    for _ in 0..pairs {
        cursor.u16()?;
        skip_element_value(cursor)?;
    }
    Ok(())
}

fn skip_element_value(cursor: &mut Cursor<'_>) -> Result<()> {
    match cursor.u8()? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
            cursor.u16()?;
        }
        b'e' => {
            cursor.u16()?;
            cursor.u16()?;
        }
        b'@' => {
            cursor.u16()?;
            skip_element_pairs(cursor)?;
        }
        b'[' => {
            let values = cursor.u16()?;
            for _ in 0..values {
                skip_element_value(cursor)?;
            }
        }
        _ => return Err(Error::Truncated(cursor.offset - 1)),
    }
    Ok(())
}
