//! Output generators: render the final document collection.
//!
//! Every generator consumes the collection once, read-only, and returns
//! `(reference, rendered)` pairs in input order. Rendering is an exhaustive
//! `match` on [`crate::model::AreaKind`]; adding a variant fails to compile
//! until every generator handles it.

pub mod html;
pub mod json;
pub mod markdown;
pub mod passthrough;
pub mod table;

pub use html::HtmlGenerator;
pub use json::{JsonFormat, JsonGenerator};
pub use markdown::MarkdownGenerator;
pub use passthrough::PassthroughGenerator;

use crate::error::FolioError;
use crate::model::DocumentReference;

/// Renders documents into a target format.
pub trait OutputGenerator {
    type Output;

    fn convert(
        &self,
        documents: Vec<DocumentReference>,
    ) -> Result<Vec<(DocumentReference, Self::Output)>, FolioError>;
}

/// Text formats selectable at runtime (CLI, [`crate::convert_to_dir`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
    Json,
    /// Raw extracted text.
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
            OutputFormat::Text => "txt",
        }
    }

    /// Render with this format's default generator, as strings.
    pub fn render(
        self,
        documents: Vec<DocumentReference>,
    ) -> Result<Vec<(DocumentReference, String)>, FolioError> {
        match self {
            OutputFormat::Markdown => MarkdownGenerator.convert(documents),
            OutputFormat::Html => HtmlGenerator::default().convert(documents),
            OutputFormat::Text => PassthroughGenerator.convert(documents),
            OutputFormat::Json => JsonGenerator
                .convert(documents)?
                .into_iter()
                .map(|(doc, value)| Ok((doc, json::to_string(&value, JsonFormat::Pretty)?)))
                .collect(),
        }
    }
}
