//! Label canonicalisation: source vocabulary → [`Label`] → [`AreaKind`].
//!
//! Every layout backend speaks its own label dialect (`"Picture"`,
//! `"Figure"`, `"IsolateFormula"`, …). Each dialect is a static table here,
//! indexed once into a hash map on first use. Both steps are total: an
//! unknown string maps to [`Label::Other`], and every label has an area
//! variant, so nothing in this module can fail.

use crate::model::{Area, AreaKind, BoundingBox, Label};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// A label vocabulary emitted by some layout producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vocabulary {
    /// DocLayNet classes, as emitted by DocLayout-YOLO trained on DocLayNet.
    DocLayNet,
    /// D4LA classes (letters, forms, reports).
    D4La,
    /// DocStructBench classes.
    DocStructBench,
    /// Docling `DocItemLabel` values.
    Docling,
    /// Marker block types.
    Marker,
    /// The canonical upper-case names themselves (`PAGE_HEADER`, …).
    Generic,
}

const DOCLAYNET: &[(&str, Label)] = &[
    ("Caption", Label::Caption),
    ("Footnote", Label::Footnote),
    ("Formula", Label::Other),
    ("List-item", Label::ListItem),
    ("Page-footer", Label::PageFooter),
    ("Page-header", Label::PageHeader),
    ("Picture", Label::Image),
    ("Section-header", Label::SectionHeader),
    ("Table", Label::Table),
    ("Text", Label::Text),
    ("Title", Label::Title),
];

const D4LA: &[(&str, Label)] = &[
    ("FigureName", Label::Caption),
    ("ListText", Label::ListItem),
    ("RegionList", Label::ListItem),
    ("Catalog", Label::ListItem),
    ("PageFooter", Label::PageFooter),
    ("PageHeader", Label::PageHeader),
    ("Figure", Label::Image),
    ("RegionTitle", Label::SectionHeader),
    ("ParaTitle", Label::SectionHeader),
    ("RegionKV", Label::SectionHeader),
    ("Table", Label::Table),
    ("OtherText", Label::Text),
    ("ParaText", Label::Text),
    ("Number", Label::Text),
    ("Question", Label::Text),
    ("Date", Label::Text),
    ("LetterHead", Label::Text),
    ("LetterDear", Label::Text),
    ("LetterSign", Label::Text),
    ("DocTitle", Label::Title),
    ("Reference", Label::Footnote),
];

const DOCSTRUCTBENCH: &[(&str, Label)] = &[
    ("FigureCaption", Label::Caption),
    ("TableCaption", Label::Caption),
    ("FormulaCaption", Label::Caption),
    ("Figure", Label::Image),
    ("IsolateFormula", Label::Image),
    ("Table", Label::Table),
    ("PlainText", Label::Text),
    ("Title", Label::Title),
    ("TableFootnote", Label::Footnote),
    ("Abandon", Label::Other),
];

const DOCLING: &[(&str, Label)] = &[
    ("caption", Label::Caption),
    ("footnote", Label::Footnote),
    ("list_item", Label::ListItem),
    ("page_footer", Label::PageFooter),
    ("page_header", Label::PageHeader),
    ("picture", Label::Image),
    ("section_header", Label::SectionHeader),
    ("table", Label::Table),
    ("text", Label::Text),
    ("paragraph", Label::Text),
    ("title", Label::Title),
];

const MARKER: &[(&str, Label)] = &[
    ("Caption", Label::Caption),
    ("Footnote", Label::Footnote),
    ("ListGroup", Label::ListItem),
    ("ListItem", Label::ListItem),
    ("PageFooter", Label::PageFooter),
    ("PageHeader", Label::PageHeader),
    ("Picture", Label::Image),
    ("PictureGroup", Label::Image),
    ("Figure", Label::Image),
    ("FigureGroup", Label::Image),
    ("SectionHeader", Label::SectionHeader),
    ("Table", Label::Table),
    ("TableOfContents", Label::Table),
    ("Span", Label::Text),
    ("Line", Label::Text),
    ("Char", Label::Text),
    ("Code", Label::Text),
    ("Form", Label::Text),
    ("TextInlineMath", Label::Text),
    ("Text", Label::Text),
    ("Reference", Label::Text),
];

const GENERIC: &[(&str, Label)] = &[
    ("CAPTION", Label::Caption),
    ("FOOTNOTE", Label::Footnote),
    ("LIST_ITEM", Label::ListItem),
    ("PAGE_FOOTER", Label::PageFooter),
    ("PAGE_HEADER", Label::PageHeader),
    ("IMAGE", Label::Image),
    ("SECTION_HEADER", Label::SectionHeader),
    ("TABLE", Label::Table),
    ("TEXT", Label::Text),
    ("TITLE", Label::Title),
    ("OTHER", Label::Other),
];

fn index(table: &'static [(&'static str, Label)]) -> HashMap<&'static str, Label> {
    table.iter().copied().collect()
}

static DOCLAYNET_INDEX: Lazy<HashMap<&str, Label>> = Lazy::new(|| index(DOCLAYNET));
static D4LA_INDEX: Lazy<HashMap<&str, Label>> = Lazy::new(|| index(D4LA));
static DOCSTRUCTBENCH_INDEX: Lazy<HashMap<&str, Label>> = Lazy::new(|| index(DOCSTRUCTBENCH));
static DOCLING_INDEX: Lazy<HashMap<&str, Label>> = Lazy::new(|| index(DOCLING));
static MARKER_INDEX: Lazy<HashMap<&str, Label>> = Lazy::new(|| index(MARKER));
static GENERIC_INDEX: Lazy<HashMap<&str, Label>> = Lazy::new(|| index(GENERIC));

impl Vocabulary {
    pub const ALL: [Vocabulary; 6] = [
        Vocabulary::DocLayNet,
        Vocabulary::D4La,
        Vocabulary::DocStructBench,
        Vocabulary::Docling,
        Vocabulary::Marker,
        Vocabulary::Generic,
    ];

    /// The raw mapping table for this vocabulary.
    pub fn table(self) -> &'static [(&'static str, Label)] {
        match self {
            Vocabulary::DocLayNet => DOCLAYNET,
            Vocabulary::D4La => D4LA,
            Vocabulary::DocStructBench => DOCSTRUCTBENCH,
            Vocabulary::Docling => DOCLING,
            Vocabulary::Marker => MARKER,
            Vocabulary::Generic => GENERIC,
        }
    }

    fn index(self) -> &'static HashMap<&'static str, Label> {
        match self {
            Vocabulary::DocLayNet => &DOCLAYNET_INDEX,
            Vocabulary::D4La => &D4LA_INDEX,
            Vocabulary::DocStructBench => &DOCSTRUCTBENCH_INDEX,
            Vocabulary::Docling => &DOCLING_INDEX,
            Vocabulary::Marker => &MARKER_INDEX,
            Vocabulary::Generic => &GENERIC_INDEX,
        }
    }

    /// Map a source label to its canonical [`Label`].
    ///
    /// Matching is exact (source vocabularies are case-sensitive), except
    /// for surrounding whitespace. Unknown strings map to [`Label::Other`].
    pub fn canonicalize(self, raw: &str) -> Label {
        self.index()
            .get(raw.trim())
            .copied()
            .unwrap_or(Label::Other)
    }

    /// Look up a vocabulary by its CLI name.
    pub fn from_name(name: &str) -> Option<Vocabulary> {
        match name.trim().to_ascii_lowercase().as_str() {
            "doclaynet" => Some(Vocabulary::DocLayNet),
            "d4la" => Some(Vocabulary::D4La),
            "docstructbench" => Some(Vocabulary::DocStructBench),
            "docling" => Some(Vocabulary::Docling),
            "marker" => Some(Vocabulary::Marker),
            "generic" => Some(Vocabulary::Generic),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Vocabulary::DocLayNet => "doclaynet",
            Vocabulary::D4La => "d4la",
            Vocabulary::DocStructBench => "docstructbench",
            Vocabulary::Docling => "docling",
            Vocabulary::Marker => "marker",
            Vocabulary::Generic => "generic",
        }
    }
}

impl fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Select the concrete area variant for a canonical label.
///
/// Tables and images get dedicated variants, titles and section headers
/// become headings of level 1 and 2, and everything else is text.
pub fn kind_for(label: Label) -> AreaKind {
    match label {
        Label::Table => AreaKind::Table {
            headers: Vec::new(),
            cells: Vec::new(),
        },
        Label::Image => AreaKind::Image { path: None },
        Label::Title => AreaKind::Heading { level: 1 },
        Label::SectionHeader => AreaKind::Heading { level: 2 },
        Label::Caption
        | Label::Footnote
        | Label::ListItem
        | Label::PageFooter
        | Label::PageHeader
        | Label::Text
        | Label::Other => AreaKind::Text,
    }
}

/// Canonicalise `raw` and build an empty area of the matching variant.
pub fn build_area(vocabulary: Vocabulary, raw: &str, bbox: BoundingBox, confidence: f64) -> Area {
    let label = vocabulary.canonicalize(raw);
    Area::new(kind_for(label), bbox, label, confidence.clamp(0.0, 1.0))
}
