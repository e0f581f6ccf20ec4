//! Page image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! Vision APIs take images as base64 data embedded in the JSON request.
//! PNG keeps text edges lossless, which matters more than payload size when
//! the model also has to place tight bounding boxes.

use crate::error::StageError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Encode a page as a base64 PNG ready for the vision request.
///
/// `detail: "high"` lets tile-based providers see fine print; at `"low"` the
/// whole page is squeezed into one tile and small blocks disappear.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, StageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| StageError::failed(format!("PNG encoding failed: {e}")))?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Load a page image from disk. Unreadable pages are artifact failures.
pub fn load_page(path: &Path) -> Result<DynamicImage, StageError> {
    image::open(path).map_err(|e| StageError::artifact(path, e))
}
