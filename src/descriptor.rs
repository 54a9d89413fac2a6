use jdescriptor::{MethodDescriptor, TypeDescriptor};

use crate::error::{Error, Result};
use crate::opcodes;

/// Parse a method descriptor such as `(IJ)V`.
///
/// `jdescriptor` accepts a few shapes the JVM does not (void parameters,
/// trailing characters, empty class names); those are rejected here.
pub(crate) fn parse_method_descriptor(descriptor: &str) -> Result<MethodDescriptor> {
    let malformed = || Error::MalformedDescriptor(descriptor.to_string());
    let parsed: MethodDescriptor = descriptor.parse().map_err(|_| malformed())?;
    let parameters_ok = parsed
        .parameter_types()
        .iter()
        .all(|parameter| *parameter != TypeDescriptor::Void && has_class_name(parameter));
    if !parameters_ok || !has_class_name(parsed.return_type()) || parsed.to_string() != descriptor {
        return Err(malformed());
    }
    Ok(parsed)
}

fn has_class_name(descriptor: &TypeDescriptor) -> bool {
    match descriptor {
        TypeDescriptor::Object(name) => !name.is_empty(),
        TypeDescriptor::Array(component, _) => has_class_name(component),
        _ => true,
    }
}

/// Local variable slots (and operand stack words) a value of this type occupies.
pub(crate) fn slot_size(descriptor: &TypeDescriptor) -> u16 {
    match descriptor {
        TypeDescriptor::Void => 0,
        TypeDescriptor::Long | TypeDescriptor::Double => 2,
        _ => 1,
    }
}

pub(crate) fn parameter_slots(descriptor: &MethodDescriptor) -> u16 {
    descriptor.parameter_types().iter().map(slot_size).sum()
}

pub(crate) fn load_opcode(descriptor: &TypeDescriptor) -> u8 {
    match descriptor {
        TypeDescriptor::Long => opcodes::LLOAD,
        TypeDescriptor::Float => opcodes::FLOAD,
        TypeDescriptor::Double => opcodes::DLOAD,
        TypeDescriptor::Object(_) | TypeDescriptor::Array(..) => opcodes::ALOAD,
        _ => opcodes::ILOAD,
    }
}

pub(crate) fn return_opcode(descriptor: &TypeDescriptor) -> u8 {
    match descriptor {
        TypeDescriptor::Void => opcodes::RETURN,
        TypeDescriptor::Long => opcodes::LRETURN,
        TypeDescriptor::Float => opcodes::FRETURN,
        TypeDescriptor::Double => opcodes::DRETURN,
        TypeDescriptor::Object(_) | TypeDescriptor::Array(..) => opcodes::ARETURN,
        _ => opcodes::IRETURN,
    }
}
