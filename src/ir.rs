use crate::constant_pool::ConstantPool;
use crate::opcodes;

/// Mutable model of a parsed JVM class.
#[derive(Clone, Debug)]
pub(crate) struct ClassUnit {
    pub(crate) minor_version: u16,
    pub(crate) major_version: u16,
    pub(crate) constant_pool: ConstantPool,
    pub(crate) access: u16,
    pub(crate) name: String,
    pub(crate) super_name: Option<String>,
    /// Constant pool indices of implemented interfaces.
    pub(crate) interfaces: Vec<u16>,
    pub(crate) fields: Vec<Field>,
    pub(crate) methods: Vec<Method>,
    pub(crate) attributes: Vec<RawAttribute>,
}

impl ClassUnit {
    pub(crate) fn new(
        major_version: u16,
        access: u16,
        name: &str,
        super_name: Option<&str>,
    ) -> Self {
        Self {
            minor_version: 0,
            major_version,
            constant_pool: ConstantPool::new(),
            access,
            name: name.to_string(),
            super_name: super_name.map(str::to_string),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn method(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }
}

/// Field kept verbatim; the rewriter never touches fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Field {
    pub(crate) access: u16,
    pub(crate) name_index: u16,
    pub(crate) descriptor_index: u16,
    pub(crate) attributes: Vec<RawAttribute>,
}

/// Attribute whose payload is carried through untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RawAttribute {
    pub(crate) name_index: u16,
    pub(crate) info: Vec<u8>,
}

/// Method with its decoded body and annotation lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Method {
    pub(crate) access: u16,
    pub(crate) name: String,
    pub(crate) descriptor: String,
    pub(crate) code: Option<Code>,
    pub(crate) visible_annotations: Option<Vec<Annotation>>,
    pub(crate) invisible_annotations: Option<Vec<Annotation>>,
    /// Attribute order as read, so untouched methods are written back identically.
    pub(crate) attribute_order: Vec<AttributeSlot>,
}

impl Method {
    pub(crate) fn new(access: u16, name: &str, descriptor: &str) -> Self {
        Self {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code: None,
            visible_annotations: None,
            invisible_annotations: None,
            attribute_order: Vec::new(),
        }
    }

    pub(crate) fn is_static(&self) -> bool {
        self.access & opcodes::ACC_STATIC != 0
    }

    pub(crate) fn has_visible_annotation(&self, descriptor: &str) -> bool {
        contains_annotation(self.visible_annotations.as_deref(), descriptor)
    }

    pub(crate) fn has_invisible_annotation(&self, descriptor: &str) -> bool {
        contains_annotation(self.invisible_annotations.as_deref(), descriptor)
    }

    /// Instruction list of the body, creating an empty `Code` attribute if absent.
    pub(crate) fn code_mut(&mut self) -> &mut Code {
        self.code.get_or_insert_with(Code::default)
    }
}

fn contains_annotation(annotations: Option<&[Annotation]>, descriptor: &str) -> bool {
    annotations
        .unwrap_or_default()
        .iter()
        .any(|annotation| annotation.descriptor == descriptor)
}

/// Position marker for a method attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum AttributeSlot {
    Code,
    VisibleAnnotations,
    InvisibleAnnotations,
    Raw(RawAttribute),
}

/// Body of a `Code` attribute.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Code {
    /// `None` once invalidated; the writer recomputes it.
    pub(crate) max_stack: Option<u16>,
    pub(crate) max_locals: Option<u16>,
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) exception_table: Vec<ExceptionHandler>,
    pub(crate) attributes: Vec<RawAttribute>,
}

impl Code {
    /// Drop the body along with everything that refers to its bytecode offsets.
    pub(crate) fn clear(&mut self) {
        self.instructions.clear();
        self.exception_table.clear();
        self.attributes.clear();
        self.max_stack = None;
        self.max_locals = None;
    }
}

/// Exception handler entry from the Code attribute, kept as raw indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ExceptionHandler {
    pub(crate) start_pc: u16,
    pub(crate) end_pc: u16,
    pub(crate) handler_pc: u16,
    pub(crate) catch_type: u16,
}

/// Bytecode instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Instruction {
    /// Local variable load such as `iload`.
    Var { opcode: u8, index: u16 },
    /// Method invocation.
    Method {
        opcode: u8,
        owner: String,
        name: String,
        descriptor: String,
        interface: bool,
    },
    /// String constant push.
    Ldc(String),
    /// Operand-less instruction.
    Insn(u8),
    /// Instruction bytes read from an existing class, emitted verbatim.
    Raw(Vec<u8>),
}

impl Instruction {
    pub(crate) fn opcode(&self) -> u8 {
        match self {
            Instruction::Var { opcode, .. }
            | Instruction::Method { opcode, .. }
            | Instruction::Insn(opcode) => *opcode,
            Instruction::Ldc(_) => opcodes::LDC,
            Instruction::Raw(bytes) => bytes.first().copied().unwrap_or_default(),
        }
    }
}

/// Annotation on a method. Element-value pairs are kept as raw bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Annotation {
    pub(crate) descriptor: String,
    /// `num_element_value_pairs` followed by the pairs.
    pub(crate) elements: Vec<u8>,
}

impl Annotation {
    /// Annotation with no elements.
    pub(crate) fn marker(descriptor: &str) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            elements: vec![0, 0],
        }
    }
}
