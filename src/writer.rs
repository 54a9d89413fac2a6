use crate::constant_pool::ConstantPool;
use crate::descriptor::{parameter_slots, parse_method_descriptor, slot_size};
use crate::error::{Error, Result};
use crate::ir::{Annotation, AttributeSlot, ClassUnit, Code, Instruction, Method, RawAttribute};
use crate::opcodes;
use crate::reader::{CODE, RUNTIME_INVISIBLE_ANNOTATIONS, RUNTIME_VISIBLE_ANNOTATIONS};

const MAGIC: u32 = 0xCAFE_BABE;

/// Serialize a [`ClassUnit`]. New constants are appended to a copy of the
/// class's pool; methods that were not modified come out byte-identical.
pub(crate) fn write_class(class: &ClassUnit) -> Result<Vec<u8>> {
    let mut pool = class.constant_pool.clone();
    let mut body = Vec::new();

    put_u16(&mut body, class.access);
    put_u16(&mut body, pool.add_class(&class.name)?);
    let super_index = match &class.super_name {
        Some(super_name) => pool.add_class(super_name)?,
        None => 0,
    };
    put_u16(&mut body, super_index);

    put_u16(&mut body, class.interfaces.len() as u16);
    for interface in &class.interfaces {
        put_u16(&mut body, *interface);
    }

    put_u16(&mut body, class.fields.len() as u16);
    for field in &class.fields {
        put_u16(&mut body, field.access);
        put_u16(&mut body, field.name_index);
        put_u16(&mut body, field.descriptor_index);
        put_raw_attributes(&mut body, &field.attributes);
    }

    put_u16(&mut body, class.methods.len() as u16);
    for method in &class.methods {
        write_method(method, &mut pool, &mut body)?;
    }

    put_raw_attributes(&mut body, &class.attributes);

    let mut out = Vec::with_capacity(body.len() + 10 + pool.len() * 8);
    out.extend_from_slice(&MAGIC.to_be_bytes());
    put_u16(&mut out, class.minor_version);
    put_u16(&mut out, class.major_version);
    pool.write(&mut out);
    out.extend_from_slice(&body);
    Ok(out)
}

fn write_method(method: &Method, pool: &mut ConstantPool, out: &mut Vec<u8>) -> Result<()> {
    put_u16(out, method.access);
    put_u16(out, pool.add_utf8(&method.name)?);
    put_u16(out, pool.add_utf8(&method.descriptor)?);

    let mut attributes = Vec::new();
    let (mut wrote_code, mut wrote_visible, mut wrote_invisible) = (false, false, false);
    for slot in &method.attribute_order {
        match slot {
            AttributeSlot::Code => {
                if let Some(code) = &method.code {
                    attributes.push(code_attribute(method, code, pool)?);
                    wrote_code = true;
                }
            }
            AttributeSlot::VisibleAnnotations => {
                if let Some(annotations) = &method.visible_annotations {
                    attributes.push(annotations_attribute(
                        RUNTIME_VISIBLE_ANNOTATIONS,
                        annotations,
                        pool,
                    )?);
                    wrote_visible = true;
                }
            }
            AttributeSlot::InvisibleAnnotations => {
                if let Some(annotations) = &method.invisible_annotations {
                    attributes.push(annotations_attribute(
                        RUNTIME_INVISIBLE_ANNOTATIONS,
                        annotations,
                        pool,
                    )?);
                    wrote_invisible = true;
                }
            }
            AttributeSlot::Raw(raw) => attributes.push(raw.clone()),
        }
    }
    // Attributes created after reading go after the original ones.
    if let (false, Some(code)) = (wrote_code, &method.code) {
        attributes.push(code_attribute(method, code, pool)?);
    }
    if let (false, Some(annotations)) = (wrote_visible, &method.visible_annotations) {
        attributes.push(annotations_attribute(
            RUNTIME_VISIBLE_ANNOTATIONS,
            annotations,
            pool,
        )?);
    }
    if let (false, Some(annotations)) = (wrote_invisible, &method.invisible_annotations) {
        attributes.push(annotations_attribute(
            RUNTIME_INVISIBLE_ANNOTATIONS,
            annotations,
            pool,
        )?);
    }

    put_raw_attributes(out, &attributes);
    Ok(())
}

fn code_attribute(method: &Method, code: &Code, pool: &mut ConstantPool) -> Result<RawAttribute> {
    let name_index = pool.add_utf8(CODE)?;
    let (max_stack, max_locals) = match (code.max_stack, code.max_locals) {
        (Some(max_stack), Some(max_locals)) => (max_stack, max_locals),
        _ => compute_maxs(method, code)?,
    };

    let mut bytecode = Vec::new();
    for instruction in &code.instructions {
        encode_instruction(instruction, pool, &mut bytecode)?;
    }

    let mut info = Vec::with_capacity(bytecode.len() + 12);
    put_u16(&mut info, max_stack);
    put_u16(&mut info, max_locals);
    info.extend_from_slice(&(bytecode.len() as u32).to_be_bytes());
    info.extend_from_slice(&bytecode);
    put_u16(&mut info, code.exception_table.len() as u16);
    for handler in &code.exception_table {
        put_u16(&mut info, handler.start_pc);
        put_u16(&mut info, handler.end_pc);
        put_u16(&mut info, handler.handler_pc);
        put_u16(&mut info, handler.catch_type);
    }
    put_raw_attributes(&mut info, &code.attributes);
    Ok(RawAttribute { name_index, info })
}

fn annotations_attribute(
    name: &str,
    annotations: &[Annotation],
    pool: &mut ConstantPool,
) -> Result<RawAttribute> {
    let name_index = pool.add_utf8(name)?;
    let mut info = Vec::new();
    put_u16(&mut info, annotations.len() as u16);
    for annotation in annotations {
        put_u16(&mut info, pool.add_utf8(&annotation.descriptor)?);
        info.extend_from_slice(&annotation.elements);
    }
    Ok(RawAttribute { name_index, info })
}

fn encode_instruction(
    instruction: &Instruction,
    pool: &mut ConstantPool,
    out: &mut Vec<u8>,
) -> Result<()> {
    match instruction {
        Instruction::Var { opcode, index } => {
            let short_form = match *opcode {
                opcodes::ILOAD..=opcodes::ALOAD => {
                    Some(opcodes::ILOAD_0 + (opcode - opcodes::ILOAD) * 4)
                }
                _ => None,
            };
            match (short_form, *index) {
                (Some(base), 0..=3) => out.push(base + *index as u8),
                (_, 0..=255) => out.extend_from_slice(&[*opcode, *index as u8]),
                _ => {
                    out.extend_from_slice(&[opcodes::WIDE, *opcode]);
                    put_u16(out, *index);
                }
            }
        }
        Instruction::Method {
            opcode,
            owner,
            name,
            descriptor,
            interface,
        } => {
            let index = pool.add_method_ref(owner, name, descriptor, *interface)?;
            out.push(*opcode);
            put_u16(out, index);
            if *opcode == opcodes::INVOKEINTERFACE {
                let parsed = parse_method_descriptor(descriptor)?;
                out.push((parameter_slots(&parsed) + 1) as u8);
                out.push(0);
            }
        }
        Instruction::Ldc(value) => {
            let index = pool.add_string(value)?;
            if index <= u16::from(u8::MAX) {
                out.extend_from_slice(&[opcodes::LDC, index as u8]);
            } else {
                out.push(opcodes::LDC_W);
                put_u16(out, index);
            }
        }
        Instruction::Insn(opcode) => out.push(*opcode),
        Instruction::Raw(bytes) => out.extend_from_slice(bytes),
    }
    Ok(())
}

/// Recompute `max_stack` and `max_locals` for a straight-line body of generated instructions.
fn compute_maxs(method: &Method, code: &Code) -> Result<(u16, u16)> {
    let descriptor = parse_method_descriptor(&method.descriptor)?;
    let mut max_locals = parameter_slots(&descriptor) + u16::from(!method.is_static());
    let mut depth: i32 = 0;
    let mut max_depth: i32 = 0;

    for instruction in &code.instructions {
        let uncomputable = || Error::UncomputableMaxs {
            method: format!("{}{}", method.name, method.descriptor),
            opcode: instruction.opcode(),
        };
        let (pop, push): (u16, u16) = match instruction {
            Instruction::Var { opcode, index } => {
                let size = match *opcode {
                    opcodes::LLOAD | opcodes::DLOAD => 2,
                    _ => 1,
                };
                max_locals = max_locals.max(index + size);
                (0, size)
            }
            Instruction::Method {
                opcode, descriptor, ..
            } => {
                let parsed = parse_method_descriptor(descriptor)?;
                let receiver = u16::from(*opcode != opcodes::INVOKESTATIC);
                (parameter_slots(&parsed) + receiver, slot_size(parsed.return_type()))
            }
            Instruction::Ldc(_) => (0, 1),
            Instruction::Insn(opcode) => match *opcode {
                opcodes::RETURN => (0, 0),
                opcodes::IRETURN | opcodes::FRETURN | opcodes::ARETURN | opcodes::ATHROW => (1, 0),
                opcodes::LRETURN | opcodes::DRETURN => (2, 0),
                opcodes::ACONST_NULL => (0, 1),
                _ => return Err(uncomputable()),
            },
            Instruction::Raw(_) => return Err(uncomputable()),
        };
        depth = depth - i32::from(pop) + i32::from(push);
        max_depth = max_depth.max(depth);
    }

    Ok((max_depth as u16, max_locals))
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_raw_attributes(out: &mut Vec<u8>, attributes: &[RawAttribute]) {
    put_u16(out, attributes.len() as u16);
    for attribute in attributes {
        put_u16(out, attribute.name_index);
        out.extend_from_slice(&(attribute.info.len() as u32).to_be_bytes());
        out.extend_from_slice(&attribute.info);
    }
}

/// Builder for emitting a class from scratch, visitor style.
#[derive(Debug)]
pub(crate) struct ClassWriter {
    class: ClassUnit,
}

impl Default for ClassWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassWriter {
    pub(crate) fn new() -> Self {
        Self {
            class: ClassUnit::new(opcodes::V1_8, 0, "", None),
        }
    }

    pub(crate) fn visit(
        &mut self,
        version: u16,
        access: u16,
        name: &str,
        super_name: Option<&str>,
    ) {
        self.class = ClassUnit::new(version, access, name, super_name);
    }

    pub(crate) fn visit_method(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
    ) -> MethodWriter<'_> {
        let mut method = Method::new(access, name, descriptor);
        method.code = Some(Code::default());
        self.class.methods.push(method);
        let index = self.class.methods.len() - 1;
        MethodWriter::new(&mut self.class.methods[index])
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        write_class(&self.class)
    }
}

/// Appends instructions to a method created by [`ClassWriter::visit_method`].
#[derive(Debug)]
pub(crate) struct MethodWriter<'a> {
    method: &'a mut Method,
}

impl<'a> MethodWriter<'a> {
    /// Reopen an existing method; instructions are appended to its current body.
    pub(crate) fn new(method: &'a mut Method) -> Self {
        Self { method }
    }

    pub(crate) fn visit_annotation(&mut self, descriptor: &str, visible: bool) {
        let list = if visible {
            &mut self.method.visible_annotations
        } else {
            &mut self.method.invisible_annotations
        };
        list.get_or_insert_with(Vec::new)
            .push(Annotation::marker(descriptor));
    }

    pub(crate) fn visit_var_insn(&mut self, opcode: u8, index: u16) {
        self.push(Instruction::Var { opcode, index });
    }

    pub(crate) fn visit_method_insn(
        &mut self,
        opcode: u8,
        owner: &str,
        name: &str,
        descriptor: &str,
        interface: bool,
    ) {
        self.push(Instruction::Method {
            opcode,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            interface,
        });
    }

    pub(crate) fn visit_ldc_insn(&mut self, value: &str) {
        self.push(Instruction::Ldc(value.to_string()));
    }

    pub(crate) fn visit_insn(&mut self, opcode: u8) {
        self.push(Instruction::Insn(opcode));
    }

    /// Fix the frame sizes instead of letting the writer compute them.
    pub(crate) fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) {
        let code = self.method.code_mut();
        code.max_stack = Some(max_stack);
        code.max_locals = Some(max_locals);
    }

    fn push(&mut self, instruction: Instruction) {
        self.method.code_mut().instructions.push(instruction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::{ACC_PUBLIC, ACC_STATIC};
    use crate::reader::read_class;

    fn sample_class() -> Vec<u8> {
        let mut writer = ClassWriter::new();
        writer.visit(opcodes::V1_8, ACC_PUBLIC, "com/example/Sample", Some("java/lang/Object"));
        let mut method = writer.visit_method(ACC_PUBLIC | ACC_STATIC, "add", "(JI)J");
        method.visit_annotation("Lcom/example/Marker;", false);
        method.visit_var_insn(opcodes::LLOAD, 0);
        method.visit_var_insn(opcodes::ILOAD, 2);
        method.visit_method_insn(
            opcodes::INVOKESTATIC,
            "com/example/Other",
            "add",
            "(JI)J",
            false,
        );
        method.visit_insn(opcodes::LRETURN);
        let mut instance = writer.visit_method(ACC_PUBLIC, "fail", "()V");
        instance.visit_insn(opcodes::ACONST_NULL);
        instance.visit_insn(opcodes::ATHROW);
        writer.to_bytes().expect("write class")
    }

    #[test]
    fn read_then_write_is_identity() {
        let bytes = sample_class();

        let class = read_class(&bytes).expect("read class");
        let rewritten = write_class(&class).expect("write class");

        assert_eq!(bytes, rewritten);
    }

    #[test]
    fn computes_maxs_for_generated_code() {
        let class = read_class(&sample_class()).expect("read class");

        let add = class.method("add", "(JI)J").expect("add");
        let code = add.code.as_ref().expect("code");
        assert_eq!(Some(3), code.max_stack);
        assert_eq!(Some(3), code.max_locals);

        let fail = class.method("fail", "()V").expect("fail");
        let code = fail.code.as_ref().expect("code");
        assert_eq!(Some(1), code.max_stack);
        assert_eq!(Some(1), code.max_locals);
    }

    #[test]
    fn short_forms_and_wide_loads() {
        let mut pool = ConstantPool::new();
        let mut out = Vec::new();
        for instruction in [
            Instruction::Var {
                opcode: opcodes::ALOAD,
                index: 3,
            },
            Instruction::Var {
                opcode: opcodes::DLOAD,
                index: 4,
            },
            Instruction::Var {
                opcode: opcodes::ILOAD,
                index: 300,
            },
        ] {
            encode_instruction(&instruction, &mut pool, &mut out).expect("encode");
        }

        assert_eq!(
            vec![0x2d, opcodes::DLOAD, 4, opcodes::WIDE, opcodes::ILOAD, 0x01, 0x2c],
            out
        );
    }

    #[test]
    fn opaque_instructions_need_explicit_maxs() {
        let mut method = Method::new(ACC_STATIC, "raw", "()V");
        method.code_mut().instructions.push(Instruction::Raw(vec![0x00]));
        let mut class = ClassUnit::new(opcodes::V1_8, ACC_PUBLIC, "a/B", Some("java/lang/Object"));
        class.methods.push(method);

        let err = write_class(&class).expect_err("maxs unknown");

        assert!(matches!(err, Error::UncomputableMaxs { opcode: 0x00, .. }));
    }

    #[test]
    fn explicit_maxs_are_kept() {
        let mut writer = ClassWriter::new();
        writer.visit(opcodes::V1_8, ACC_PUBLIC, "a/B", Some("java/lang/Object"));
        let mut method = writer.visit_method(ACC_STATIC, "raw", "()V");
        method.visit_insn(opcodes::RETURN);
        method.visit_maxs(4, 2);

        let class = read_class(&writer.to_bytes().expect("write")).expect("read");
        let code = class.methods[0].code.as_ref().expect("code");

        assert_eq!(Some(4), code.max_stack);
        assert_eq!(Some(2), code.max_locals);
    }
}
