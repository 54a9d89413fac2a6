use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::transform::Diagnostic;

/// Property keys shared between the host and the transformers.
pub(crate) mod builtin {
    pub(crate) const PLATFORM_NAME: &str = "architectury.platform.name";
    pub(crate) const PLATFORM_PACKAGE: &str = "architectury.platform.package";
    pub(crate) const UNIQUE_IDENTIFIER: &str = "architectury.unique.identifier";
    pub(crate) const INJECT_INJECTABLES: &str = "architectury.inject.injectables";
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PropertyValue {
    Text(String),
    Flag(bool),
    Number(serde_json::Number),
}

impl PropertyValue {
    fn into_string(self) -> String {
        match self {
            PropertyValue::Text(text) => text,
            PropertyValue::Flag(flag) => flag.to_string(),
            PropertyValue::Number(number) => number.to_string(),
        }
    }
}

/// String properties read from a JSON object; scalar values are stringified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Self::from_json(value).with_context(|| format!("invalid properties in {}", path.display()))
    }

    pub(crate) fn from_json(value: Value) -> anyhow::Result<Self> {
        let raw: BTreeMap<String, Option<PropertyValue>> = serde_json::from_value(value)
            .context("properties must be an object of strings, booleans, or numbers")?;
        let values = raw
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value.into_string())))
            .collect();
        Ok(Self { values })
    }

    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub(crate) fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }
}

/// Read-only view of the run configuration plus the diagnostics sink.
/// Shared across worker threads while classes are transformed.
#[derive(Debug)]
pub(crate) struct TransformerContext {
    properties: Properties,
    fallback_identifier: String,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl TransformerContext {
    pub(crate) fn new(properties: Properties, fallback_identifier: impl Into<String>) -> Self {
        Self {
            properties,
            fallback_identifier: fallback_identifier.into(),
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key)
    }

    pub(crate) fn platform_name(&self) -> Result<&str> {
        self.property(builtin::PLATFORM_NAME)
            .ok_or(Error::MissingProperty(builtin::PLATFORM_NAME))
    }

    /// Transforms are enabled unless the gate property is explicitly `false`.
    pub(crate) fn is_inject_injectables(&self) -> bool {
        self.property(builtin::INJECT_INJECTABLES) != Some("false")
    }

    pub(crate) fn unique_identifier(&self) -> &str {
        self.property(builtin::UNIQUE_IDENTIFIER)
            .unwrap_or(&self.fallback_identifier)
    }

    pub(crate) fn error(&self, diagnostic: Diagnostic) {
        log::error!("{}", diagnostic.message);
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(diagnostic);
    }

    pub(crate) fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Identifier used when none is configured, derived from the input's file name.
pub(crate) fn fallback_identifier(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("architectury_inject_{sanitized}")
}
