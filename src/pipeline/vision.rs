//! Vision extractor: layout and text for one page from a multimodal LLM.
//!
//! One request per page: the block-detection prompt as the system message and
//! the page PNG as the user turn. The answer is a JSON array of blocks with
//! normalised boxes; they are scaled to pixels, canonicalised through the
//! generic vocabulary, and picture blocks are cropped next to the page.
//!
//! The extractor makes a single attempt. Provider errors surface as
//! [`StageError::ExtractionFailed`] and unparseable answers as
//! [`StageError::MalformedResponse`], both of which the executor retries.

use crate::canonical::{build_area, Vocabulary};
use crate::error::{FolioError, StageError};
use crate::model::{Area, AreaKind, BoundingBox, DocumentEntry, Label};
use crate::pipeline::cleanup::{clean_text, strip_code_fences};
use crate::pipeline::encode::{encode_page, load_page};
use crate::pipeline::extract::Extractor;
use crate::pipeline::page_text;
use crate::prompts::block_detection_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::DynamicImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Layout extraction through an `edgequake-llm` vision provider.
pub struct VisionExtractor {
    provider: Arc<dyn LLMProvider>,
    prompt: String,
    /// Sampling temperature. Default: 0.1 (near-deterministic boxes).
    pub temperature: f32,
    /// Token cap for one page's answer. Default: 4096.
    pub max_tokens: usize,
}

impl VisionExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            prompt: block_detection_prompt(),
            temperature: 0.1,
            max_tokens: 4096,
        }
    }

    /// Resolve a provider by name, or from the environment, and wrap it.
    pub fn from_env(provider: Option<&str>, model: Option<&str>) -> Result<Self, FolioError> {
        Ok(Self::new(resolve_provider(provider, model)?))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Extractor for VisionExtractor {
    fn name(&self) -> &str {
        "vision"
    }

    async fn extract(&self, mut entry: DocumentEntry) -> Result<DocumentEntry, StageError> {
        let start = Instant::now();
        let path = entry.path.clone();
        let (img, image_data) = tokio::task::spawn_blocking(move || {
            let img = load_page(&path)?;
            let data = encode_page(&img)?;
            Ok::<_, StageError>((img, data))
        })
        .await
        .map_err(|e| StageError::failed(format!("page encoding task failed: {e}")))??;

        let messages = vec![
            ChatMessage::system(self.prompt.as_str()),
            ChatMessage::user_with_images("", vec![image_data]),
        ];
        let response = self
            .provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| StageError::failed(e.to_string()))?;
        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            entry.path.display(),
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        let blocks = parse_blocks(&response.content)?;
        let layout = blocks_to_areas(&blocks, img.width() as f64, img.height() as f64);

        let page = entry.path.clone();
        entry.layout = tokio::task::spawn_blocking(move || crop_images(&img, layout, &page))
            .await
            .map_err(|e| StageError::failed(format!("crop task failed: {e}")))??;
        entry.converted = Some(page_text(&entry.layout));
        Ok(entry)
    }
}

// ── Response parsing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NormalisedBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One block as the model reports it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VisionBlock {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "boundingBox")]
    pub bounding_box: NormalisedBox,
}

/// Parse the model's answer, tolerating an outer code fence.
pub fn parse_blocks(content: &str) -> Result<Vec<VisionBlock>, StageError> {
    let body = strip_code_fences(content);
    serde_json::from_str(&body).map_err(|e| StageError::malformed(format!("{e}: {}", preview(&body))))
}

fn preview(s: &str) -> String {
    const MAX: usize = 80;
    match s.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}…", &s[..i]),
        None => s.to_string(),
    }
}

/// Scale normalised blocks to pixel boxes and canonicalise their labels.
///
/// `LIST_ITEM` blocks become list items so renderers can group them.
pub fn blocks_to_areas(blocks: &[VisionBlock], width: f64, height: f64) -> Vec<Area> {
    blocks
        .iter()
        .map(|b| {
            let nb = &b.bounding_box;
            let x0 = nb.x * width;
            let y0 = nb.y * height;
            let bbox = BoundingBox::new(x0, y0, x0 + nb.width * width, y0 + nb.height * height);
            let mut area = build_area(Vocabulary::Generic, &b.label, bbox, 1.0);
            if area.label == Label::ListItem {
                area.kind = AreaKind::ListItem;
            }
            let text = clean_text(&b.text);
            if text.is_empty() {
                area
            } else {
                area.with_text(text)
            }
        })
        .collect()
}

// ── Picture crops ────────────────────────────────────────────────────────────

/// Crop every image area out of the page and point the area at the crop.
///
/// Crops land next to the page as `image_<page stem>_<n>.png`, `n` being the
/// block index. Boxes that clamp to nothing keep `path = None`.
fn crop_images(img: &DynamicImage, mut layout: Vec<Area>, page: &Path) -> Result<Vec<Area>, StageError> {
    let dir = page.parent().unwrap_or_else(|| Path::new("."));
    let stem = page
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());

    for (n, area) in layout.iter_mut().enumerate() {
        let bbox = area.bbox;
        if let AreaKind::Image { path } = &mut area.kind {
            let Some((x, y, w, h)) = pixel_rect(&bbox, img.width(), img.height()) else {
                continue;
            };
            let dest: PathBuf = dir.join(format!("image_{stem}_{n}.png"));
            img.crop_imm(x, y, w, h)
                .save(&dest)
                .map_err(|e| StageError::artifact(&dest, e))?;
            *path = Some(dest);
        }
    }
    Ok(layout)
}

/// Clamp a box to the image and return `(x, y, width, height)`, or `None`
/// when nothing is left.
pub(crate) fn pixel_rect(bbox: &BoundingBox, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let b = bbox.normalised();
    let clamp = |v: f64, max: u32| v.max(0.0).min(max as f64) as u32;
    let (x0, y0) = (clamp(b.x0.floor(), width), clamp(b.y0.floor(), height));
    let (x1, y1) = (clamp(b.x1.ceil(), width), clamp(b.y1.ceil(), height));
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0, y0, x1 - x0, y1 - y0))
}

// ── Provider resolution ──────────────────────────────────────────────────────

fn create_vision_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, FolioError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| FolioError::ProviderNotConfigured {
        provider: name.to_string(),
        hint: format!("{e}"),
    })
}

/// Resolve the vision provider, from most to least specific:
///
/// 1. an explicit provider name (and model, else [`DEFAULT_MODEL`])
/// 2. `FOLIOFORGE_LLM_PROVIDER` + `FOLIOFORGE_MODEL`, when both are set
/// 3. OpenAI when `OPENAI_API_KEY` is present
/// 4. whatever `ProviderFactory::from_env` detects
pub fn resolve_provider(
    provider: Option<&str>,
    model: Option<&str>,
) -> Result<Arc<dyn LLMProvider>, FolioError> {
    if let Some(name) = provider {
        return create_vision_provider(name, model.unwrap_or(DEFAULT_MODEL));
    }

    if let (Ok(prov), Ok(m)) = (
        std::env::var("FOLIOFORGE_LLM_PROVIDER"),
        std::env::var("FOLIOFORGE_MODEL"),
    ) {
        if !prov.is_empty() && !m.is_empty() {
            return create_vision_provider(&prov, &m);
        }
    }

    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            return create_vision_provider("openai", model.unwrap_or(DEFAULT_MODEL));
        }
    }

    let (llm, _embedding) = ProviderFactory::from_env().map_err(|e| FolioError::ProviderNotConfigured {
        provider: "auto".to_string(),
        hint: format!(
            "No vision provider could be auto-detected from the environment.\n\
             Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
             Error: {e}"
        ),
    })?;
    Ok(llm)
}
