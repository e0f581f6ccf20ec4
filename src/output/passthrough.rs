//! Raw extracted text, as joined by the executor.

use super::OutputGenerator;
use crate::error::FolioError;
use crate::model::DocumentReference;

/// Emits each document's `converted` text, or an empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughGenerator;

impl OutputGenerator for PassthroughGenerator {
    type Output = String;

    fn convert(
        &self,
        documents: Vec<DocumentReference>,
    ) -> Result<Vec<(DocumentReference, String)>, FolioError> {
        Ok(documents
            .into_iter()
            .map(|d| {
                let text = d.converted.clone().unwrap_or_default();
                (d, text)
            })
            .collect())
    }
}
