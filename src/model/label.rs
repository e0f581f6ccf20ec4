//! The canonical label set every extractor vocabulary is mapped onto.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical layout label.
///
/// Labels carry identity only; they have no ordering semantics. Filters and
/// debug overlays key off them, renderers key off [`crate::model::AreaKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Caption,
    Footnote,
    ListItem,
    PageFooter,
    PageHeader,
    Image,
    SectionHeader,
    Table,
    Text,
    Title,
    Other,
}

impl Label {
    /// Every label, in declaration order.
    pub const ALL: [Label; 11] = [
        Label::Caption,
        Label::Footnote,
        Label::ListItem,
        Label::PageFooter,
        Label::PageHeader,
        Label::Image,
        Label::SectionHeader,
        Label::Table,
        Label::Text,
        Label::Title,
        Label::Other,
    ];

    /// The upper-case wire name, e.g. `PAGE_HEADER`.
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Caption => "CAPTION",
            Label::Footnote => "FOOTNOTE",
            Label::ListItem => "LIST_ITEM",
            Label::PageFooter => "PAGE_FOOTER",
            Label::PageHeader => "PAGE_HEADER",
            Label::Image => "IMAGE",
            Label::SectionHeader => "SECTION_HEADER",
            Label::Table => "TABLE",
            Label::Text => "TEXT",
            Label::Title => "TITLE",
            Label::Other => "OTHER",
        }
    }

    /// Parse a wire name, ignoring case and accepting `-` for `_`.
    ///
    /// Returns `None` for unknown names; callers that need a total mapping
    /// go through [`crate::canonical::Vocabulary`] instead.
    pub fn parse(name: &str) -> Option<Label> {
        let normalised = name.trim().to_ascii_uppercase().replace('-', "_");
        Label::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == normalised)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
