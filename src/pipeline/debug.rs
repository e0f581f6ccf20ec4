//! Layout overlays for eyeballing extractor output.
//!
//! For each page, draws every area's box in its label colour with a
//! `LABEL(0.93)` caption, and saves the result to
//! `<artifact dir>/debug/<page file name>`.
//!
//! Captions need a TrueType font. It comes from `FOLIOFORGE_DEBUG_FONT`, an
//! explicit [`DebugPostprocessor::with_font`], or the first common system
//! font found; without one, only the outlines are drawn.

use crate::error::StageError;
use crate::model::{Area, DocumentReference, Label};
use crate::pipeline::postprocess::Postprocessor;
use crate::pipeline::vision::pixel_rect;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outline thickness in pixels.
const STROKE: u32 = 2;

/// Caption height in pixels.
const CAPTION_PX: f32 = 12.0;

/// Environment variable naming a font file for captions.
pub const FONT_ENV: &str = "FOLIOFORGE_DEBUG_FONT";

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Overlay colour per label.
pub fn label_colour(label: Label) -> Rgb<u8> {
    let rgb = match label {
        Label::Title => [173, 35, 35],
        Label::PageHeader => [42, 75, 215],
        Label::SectionHeader => [29, 105, 20],
        Label::ListItem => [129, 74, 25],
        Label::PageFooter => [129, 38, 192],
        Label::Image => [41, 208, 208],
        Label::Table => [255, 146, 51],
        Label::Text => [255, 238, 51],
        Label::Caption => [233, 222, 187],
        Label::Footnote => [255, 205, 243],
        Label::Other => [0, 0, 0],
    };
    Rgb(rgb)
}

/// Caption text for an area, e.g. `TITLE(0.93)`.
pub fn caption(area: &Area) -> String {
    format!("{}({:.2})", area.label, area.confidence)
}

/// Writes one overlay image per page.
///
/// A document whose page cannot be read or whose overlay cannot be written
/// is dropped from the batch with a warning.
#[derive(Clone)]
pub struct DebugPostprocessor {
    font: Option<Arc<FontVec>>,
}

impl DebugPostprocessor {
    /// Outlines plus captions when a font can be found.
    pub fn new() -> Self {
        let from_env = std::env::var_os(FONT_ENV).map(PathBuf::from);
        let font = from_env
            .iter()
            .map(PathBuf::as_path)
            .chain(SYSTEM_FONTS.iter().map(|p| Path::new(*p)))
            .find_map(|path| {
                let font = load_font(path).ok()?;
                debug!("debug overlay captions use {}", path.display());
                Some(Arc::new(font))
            });
        if font.is_none() {
            debug!("no caption font found, overlays will have outlines only");
        }
        Self { font }
    }

    /// Captions drawn with the font at `path`.
    pub fn with_font(path: impl AsRef<Path>) -> Result<Self, StageError> {
        let font = load_font(path.as_ref())?;
        Ok(Self {
            font: Some(Arc::new(font)),
        })
    }

    /// Outlines only, no captions.
    pub fn outlines_only() -> Self {
        Self { font: None }
    }

    pub fn has_captions(&self) -> bool {
        self.font.is_some()
    }

    fn render(&self, document: &DocumentReference, output_dir: &Path) -> Result<(), StageError> {
        let dir = document.artifact_dir(output_dir).join("debug");
        fs::create_dir_all(&dir).map_err(|e| StageError::artifact(&dir, e))?;

        for page in &document.items {
            let mut canvas = image::open(&page.path)
                .map_err(|e| StageError::artifact(&page.path, e))?
                .to_rgb8();
            for area in &page.layout {
                self.draw_area(&mut canvas, area);
            }
            let name = page.path.file_name().unwrap_or_default();
            let dest = dir.join(name);
            canvas.save(&dest).map_err(|e| StageError::artifact(&dest, e))?;
        }
        debug!("{}: overlays written to {}", document.path.display(), dir.display());
        Ok(())
    }

    fn draw_area(&self, canvas: &mut RgbImage, area: &Area) {
        let Some((x, y, w, h)) = pixel_rect(&area.bbox, canvas.width(), canvas.height()) else {
            return;
        };
        let colour = label_colour(area.label);
        for t in 0..STROKE {
            let (inner_w, inner_h) = (w.saturating_sub(2 * t), h.saturating_sub(2 * t));
            if inner_w > 0 && inner_h > 0 {
                let rect = Rect::at((x + t) as i32, (y + t) as i32).of_size(inner_w, inner_h);
                draw_hollow_rect_mut(canvas, rect, colour);
            }
        }

        let Some(font) = &self.font else {
            return;
        };
        let text = caption(area);
        let scale = PxScale::from(CAPTION_PX);
        let (text_w, text_h) = text_size(scale, &**font, &text);
        let bg_h = text_h.max(1) + 2;
        // above the box, or below it when there is no room
        let text_y = if y < bg_h { y + h + 1 } else { y - bg_h };
        let bg = Rect::at(x as i32, text_y as i32).of_size(text_w + 4, bg_h);
        draw_filled_rect_mut(canvas, bg, colour);
        draw_text_mut(
            canvas,
            ink_for(colour),
            x as i32 + 2,
            text_y as i32 + 1,
            scale,
            &**font,
            &text,
        );
    }
}

impl Default for DebugPostprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DebugPostprocessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugPostprocessor")
            .field("captions", &self.has_captions())
            .finish()
    }
}

fn load_font(path: &Path) -> Result<FontVec, StageError> {
    let bytes = fs::read(path).map_err(|e| StageError::artifact(path, e))?;
    FontVec::try_from_vec(bytes).map_err(|e| StageError::artifact(path, e))
}

/// Black on light label colours, white on dark ones.
fn ink_for(background: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = background.0;
    let luma = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
    if luma > 140_000 {
        Rgb([0, 0, 0])
    } else {
        Rgb([255, 255, 255])
    }
}

impl Postprocessor for DebugPostprocessor {
    fn name(&self) -> &str {
        "debug"
    }

    fn process(&self, documents: Vec<DocumentReference>, output_dir: &Path) -> Vec<DocumentReference> {
        documents
            .into_iter()
            .filter(|doc| match self.render(doc, output_dir) {
                Ok(()) => true,
                Err(e) => {
                    warn!("{}: dropped, debug overlay failed: {e}", doc.path.display());
                    false
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AreaKind, BoundingBox, DocumentEntry};

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn page_doc(dir: &Path, name: &str, size: (u32, u32), bbox: BoundingBox) -> DocumentReference {
        let page_path = dir.join(format!("{name}.png"));
        RgbImage::from_pixel(size.0, size.1, WHITE)
            .save(&page_path)
            .unwrap();
        let mut page = DocumentEntry::new(&page_path);
        page.layout.push(Area::new(AreaKind::Text, bbox, Label::Title, 0.93));
        let mut doc = DocumentReference::new(dir.join(format!("{name}.pdf")));
        doc.items.push(page);
        doc
    }

    fn overlay(out: &Path, name: &str) -> RgbImage {
        image::open(out.join(name).join("debug").join(format!("{name}.png")))
            .unwrap()
            .to_rgb8()
    }

    #[test]
    fn overlay_is_written_under_document_debug_dir() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        // inverted corners and overflow are tolerated
        let doc = page_doc(input.path(), "report", (40, 30), BoundingBox::new(30.0, 20.0, 5.0, -4.0));

        let kept = DebugPostprocessor::outlines_only().process(vec![doc], out.path());
        assert_eq!(kept.len(), 1);

        let overlay = overlay(out.path(), "report");
        assert_eq!(*overlay.get_pixel(5, 0), label_colour(Label::Title));
        assert_eq!(*overlay.get_pixel(15, 10), WHITE);
        assert_eq!(*overlay.get_pixel(39, 29), WHITE);
    }

    #[test]
    fn outline_is_two_pixels_thick() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let doc = page_doc(input.path(), "thick", (40, 30), BoundingBox::new(5.0, 5.0, 25.0, 20.0));

        DebugPostprocessor::outlines_only().process(vec![doc], out.path());

        let overlay = overlay(out.path(), "thick");
        let title = label_colour(Label::Title);
        assert_eq!(*overlay.get_pixel(5, 5), title);
        assert_eq!(*overlay.get_pixel(6, 6), title);
        assert_eq!(*overlay.get_pixel(24, 19), title);
        assert_eq!(*overlay.get_pixel(7, 7), WHITE);
        assert_eq!(*overlay.get_pixel(4, 4), WHITE);
    }

    #[test]
    fn caption_sits_above_the_box_when_a_font_is_available() {
        let captioned = DebugPostprocessor::new();
        if !captioned.has_captions() {
            eprintln!("no system font; caption drawing not exercised");
            return;
        }
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let doc = page_doc(input.path(), "cap", (160, 80), BoundingBox::new(10.0, 40.0, 60.0, 70.0));

        captioned.process(vec![doc], out.path());

        let overlay = overlay(out.path(), "cap");
        // caption background starts at the box's left edge, just above it
        assert_eq!(*overlay.get_pixel(10, 38), label_colour(Label::Title));
        assert_eq!(*overlay.get_pixel(10, 10), WHITE);
    }

    #[test]
    fn captions_read_label_and_confidence() {
        let area = Area::new(AreaKind::Text, BoundingBox::new(0.0, 0.0, 1.0, 1.0), Label::SectionHeader, 0.931);
        assert_eq!(caption(&area), "SECTION_HEADER(0.93)");
    }

    #[test]
    fn unreadable_font_is_an_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = DebugPostprocessor::with_font(dir.path().join("none.ttf")).unwrap_err();
        assert!(matches!(missing, StageError::ArtifactIo { .. }));

        let junk = dir.path().join("junk.ttf");
        fs::write(&junk, b"not a font").unwrap();
        assert!(DebugPostprocessor::with_font(&junk).is_err());
    }

    #[test]
    fn unreadable_page_drops_only_that_document() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let good = page_doc(input.path(), "good", (40, 30), BoundingBox::new(1.0, 1.0, 10.0, 10.0));
        let mut bad = DocumentReference::new("missing.pdf");
        bad.items.push(DocumentEntry::new(input.path().join("nope.png")));

        let kept = DebugPostprocessor::outlines_only().process(vec![bad, good.clone()], out.path());
        assert_eq!(kept, vec![good]);
    }

    #[test]
    fn light_labels_get_dark_ink() {
        assert_eq!(ink_for(label_colour(Label::Text)), Rgb([0, 0, 0]));
        assert_eq!(ink_for(label_colour(Label::PageHeader)), WHITE);
    }

    #[test]
    fn every_label_has_a_colour() {
        let other = label_colour(Label::Other);
        assert!(Label::ALL
            .iter()
            .filter(|l| **l != Label::Other)
            .all(|l| label_colour(*l) != other));
    }
}
