//! Preprocessor overrides passed through to `GCC_PREPROCESSOR_DEFINITIONS`.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::{BuildError, Result};

/// Ordered `KEY -> value` overrides. Iteration is always sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessorFlags(BTreeMap<String, String>);

impl PreprocessorFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an override after validating it.
    ///
    /// Keys must be C identifiers; values may not contain whitespace because
    /// the definitions list is whitespace separated.
    pub fn insert(&mut self, key: &str, value: &str) -> Result<()> {
        if !is_identifier(key) {
            return Err(BuildError::configuration(format!(
                "invalid preprocessor flag name '{key}': expected a C identifier"
            )));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(BuildError::configuration(format!(
                "invalid value for preprocessor flag '{key}': '{value}' contains whitespace"
            )));
        }
        self.0.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Parse and insert a `KEY=VALUE` assignment. A bare `KEY` means `KEY=1`.
    pub fn insert_assignment(&mut self, assignment: &str) -> Result<()> {
        match assignment.split_once('=') {
            Some((key, value)) => self.insert(key.trim(), value.trim()),
            None => self.insert(assignment.trim(), "1"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `KEY=VALUE` pairs joined by spaces, sorted by key.
    pub fn definitions(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Output directory suffix, `_KEY-VALUE_KEY-VALUE`, or empty.
    ///
    /// Values are percent-encoded for `_`, `-`, `%`, `/` and anything that is
    /// not printable ASCII. Keys never contain `-` and values never contain
    /// `_` or `-` after encoding, so distinct flag sets give distinct suffixes.
    pub fn dir_suffix(&self) -> String {
        let mut suffix = String::new();
        for (key, value) in self.iter() {
            let _ = write!(suffix, "_{key}-{}", encode_value(value));
        }
        suffix
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn encode_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        let plain = byte.is_ascii_graphic() && !matches!(byte, b'_' | b'-' | b'%' | b'/');
        if plain {
            encoded.push(byte as char);
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}
