//! Structured output: the full document tree as JSON.
//!
//! Unset optionals serialise as explicit `null`; no key is ever omitted.

use super::OutputGenerator;
use crate::error::FolioError;
use crate::model::DocumentReference;
use serde_json::Value;

/// JSON text layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Indented, one field per line.
    #[default]
    Pretty,
    /// Single line.
    Compact,
}

/// One `serde_json::Value` per document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonGenerator;

impl OutputGenerator for JsonGenerator {
    type Output = Value;

    fn convert(
        &self,
        documents: Vec<DocumentReference>,
    ) -> Result<Vec<(DocumentReference, Value)>, FolioError> {
        documents
            .into_iter()
            .map(|d| {
                let value = serde_json::to_value(&d)?;
                Ok((d, value))
            })
            .collect()
    }
}

/// Serialise a rendered value.
pub fn to_string(value: &Value, format: JsonFormat) -> Result<String, FolioError> {
    Ok(match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(value)?,
        JsonFormat::Compact => serde_json::to_string(value)?,
    })
}
