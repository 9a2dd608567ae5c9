//! Modular OCR provider abstraction.
//!
//! Defines the [`OcrProvider`] trait so different OCR backends (local
//! Tesseract, Mistral OCR) can be swapped via configuration, and the
//! [`extract_text`] boundary that turns raw provider output into an
//! [`ExtractedText`].

pub mod mistral;
pub mod tesseract;

use crate::config::{OcrConfig, OcrProviderKind};
use crate::error::OcrError;
use anyhow::Context;
use image::ImageFormat;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use tracing::{debug, info};

/// Sentinel rendered when recognition yields nothing.
pub const NO_TEXT_DETECTED: &str = "No text detected";

/// Largest image accepted, uploaded or fetched.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Raw output of a provider.
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub text: String,
    pub provider_name: String,
}

/// Input to an OCR provider: raw bytes or a remote URL.
pub enum OcrInput {
    Bytes {
        filename: String,
        content_type: Option<String>,
        data: Vec<u8>,
    },
    Url { filename: String, url: String },
}

impl OcrInput {
    pub fn filename(&self) -> &str {
        match self {
            OcrInput::Bytes { filename, .. } | OcrInput::Url { filename, .. } => filename,
        }
    }
}

/// Async trait implemented by each OCR backend.
#[async_trait::async_trait]
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn process(&self, input: &OcrInput) -> anyhow::Result<OcrResult>;
}

/// Recognized text, trimmed, or nothing at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedText {
    Text(String),
    NoText,
}

impl ExtractedText {
    /// Whitespace-only output is treated exactly like empty output.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::NoText
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::NoText => NO_TEXT_DETECTED,
        }
    }
}

/// Run one recognition attempt. No retries; failures carry no partial text.
pub async fn extract_text(
    provider: &dyn OcrProvider,
    input: &OcrInput,
) -> Result<ExtractedText, OcrError> {
    info!(
        "Starting OCR for {} with {}",
        input.filename(),
        provider.name()
    );

    let result = provider
        .process(input)
        .await
        .with_context(|| format!("{} failed on {}", provider.name(), input.filename()))
        .map_err(|e| match input {
            OcrInput::Bytes { .. } => OcrError::Recognition(e),
            OcrInput::Url { .. } => OcrError::RecognitionFromUrl(e),
        })?;

    let extracted = ExtractedText::from_raw(&result.text);
    info!(
        "OCR completed ({}): {} chars",
        result.provider_name,
        extracted.as_str().len()
    );
    debug!("Extracted text: {}", extracted.as_str());

    Ok(extracted)
}

/// Build the configured provider.
pub fn provider_from_config(
    config: &OcrConfig,
    client: reqwest::Client,
) -> anyhow::Result<Arc<dyn OcrProvider>> {
    let provider: Arc<dyn OcrProvider> = match config.provider {
        OcrProviderKind::Tesseract => Arc::new(tesseract::TesseractProvider::new(config, client)),
        OcrProviderKind::MistralOcr => {
            let api_key = config
                .mistral_api_key
                .clone()
                .context("MISTRAL_API_KEY not set")?;
            Arc::new(mistral::MistralOcrProvider::new(api_key, client))
        }
    };
    Ok(provider)
}

/// Download a remote image, holding it to the same limits as an upload.
pub async fn fetch_image(client: &reqwest::Client, url: &str) -> anyhow::Result<Vec<u8>> {
    info!("Downloading image {}", url);
    let mut resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("Failed to download image ({}): {}", status, text);
    }

    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("image/") {
        anyhow::bail!("Remote file is not an image (content type {:?})", content_type);
    }

    if let Some(len) = resp.content_length() {
        if len > MAX_IMAGE_BYTES as u64 {
            anyhow::bail!("Remote image is too large ({} bytes)", len);
        }
    }

    let mut data = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        if data.len() + chunk.len() > MAX_IMAGE_BYTES {
            anyhow::bail!("Remote image exceeds {} bytes", MAX_IMAGE_BYTES);
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// MIME type for a data URL: sniffed from the bytes, else the declared type,
/// else PNG.
pub fn image_mime(data: &[u8], declared: Option<&str>) -> String {
    let sniffed = image::guess_format(data).ok().and_then(|format| match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        _ => None,
    });

    sniffed
        .or(declared.filter(|d| d.starts_with("image/")))
        .unwrap_or("image/png")
        .to_string()
}
