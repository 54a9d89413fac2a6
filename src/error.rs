use thiserror::Error;

/// Errors raised while decoding, rewriting, or encoding class files.
#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("class file truncated at offset {0:#x}")]
    Truncated(usize),

    #[error("invalid magic {0:#010x}: expected 0xcafebabe")]
    BadMagic(u32),

    #[error("invalid constant pool entry #{index}: {reason}")]
    InvalidConstant { index: u16, reason: &'static str },

    #[error("invalid modified UTF-8 in constant pool")]
    InvalidUtf8,

    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("{0} is not present!")]
    MissingProperty(&'static str),

    #[error("constant pool exceeds 65535 entries")]
    ConstantPoolOverflow,

    #[error("cannot compute max stack for {method}: opaque instruction {opcode:#04x}")]
    UncomputableMaxs { method: String, opcode: u8 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
