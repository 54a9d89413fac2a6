use std::io;

use serde_json::Value;

use crate::config::TransformerContext;
use crate::error::Result;
use crate::ir::ClassUnit;

pub(crate) mod expect_platform;

/// Metadata describing a transformer.
#[derive(Clone, Debug)]
pub(crate) struct TransformerMetadata {
    pub(crate) id: &'static str,
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
}

/// User error found while transforming; the pass continues after reporting it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Diagnostic {
    pub(crate) rule_id: &'static str,
    pub(crate) class_name: String,
    pub(crate) method_name: String,
    pub(crate) descriptor: String,
    pub(crate) message: String,
}

/// Destination for emitted classes and copied resources.
pub(crate) trait OutputSink {
    fn add_entry(&mut self, path: &str, bytes: Vec<u8>) -> io::Result<()>;

    /// Store a class under its internal name.
    fn add_class(&mut self, internal_name: &str, bytes: Vec<u8>) -> io::Result<()> {
        self.add_entry(&format!("{internal_name}.class"), bytes)
    }
}

/// Transformer interface with a per-class entry point and a once-per-run asset entry point.
pub(crate) trait Transformer: Send + Sync {
    fn metadata(&self) -> TransformerMetadata;

    /// Receive transformer-scoped properties before any pass runs.
    fn supply_properties(&mut self, _properties: &Value) {}

    /// Edit `class` in place. Returns whether anything changed.
    fn edit_class(
        &self,
        _context: &TransformerContext,
        _name: &str,
        _class: &mut ClassUnit,
    ) -> Result<bool> {
        Ok(false)
    }

    fn edit_assets(
        &self,
        _context: &TransformerContext,
        _output: &mut dyn OutputSink,
    ) -> Result<()> {
        Ok(())
    }
}
