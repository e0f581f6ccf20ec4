//! Prompts for the vision extractor.
//!
//! Kept in one place so unit tests can inspect them without a provider and so
//! the label list cannot drift from [`crate::model::Label`].

use crate::model::Label;

/// System prompt asking the model for block-level layout as JSON.
///
/// The `{labels}` placeholder is filled by [`block_detection_prompt`].
const BLOCK_DETECTION_TEMPLATE: &str = r#"You are a document layout analyser. Examine the page image and find every content block on it.

For each block report its text, its label and its bounding box.

Valid labels:
{labels}

Answer with a JSON array only. Each element describes one block:
{
  "text": "The text inside the block, or an empty string for pictures.",
  "label": "TEXT",
  "boundingBox": {
    "x": 0.123,
    "y": 0.456,
    "width": 0.5,
    "height": 0.04
  }
}

Coordinate rules:
- All four numbers are normalised to 0.0–1.0 relative to this image.
- The origin (0, 0) is the top-left corner; x grows right, y grows down.
- x and y are the block's top-left corner.

Ordering rules:
- List blocks in natural reading order.
- Report each list item as its own LIST_ITEM block.

If the page has no content, answer with an empty array: []
Do NOT add commentary. Do NOT wrap the answer in code fences."#;

/// Build the block-detection prompt with the canonical label names.
pub fn block_detection_prompt() -> String {
    let labels = Label::ALL
        .iter()
        .map(|l| format!(" - {}", l.as_str()))
        .collect::<Vec<_>>()
        .join("\n");
    BLOCK_DETECTION_TEMPLATE.replace("{labels}", &labels)
}
