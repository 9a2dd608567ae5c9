//! Process configuration.
//!
//! Read once at startup from the environment (after `.env`, if any, has been
//! applied). Every adapter is built from this struct up front, so a missing
//! credential stops the process before the listener binds.

use anyhow::{bail, Context, Result};
use std::env;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OCR_LANG: &str = "eng";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub openai: OpenAiConfig,
    pub ocr: OcrConfig,
}

/// A credential. Its `Debug` output never contains the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Secret,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub provider: OcrProviderKind,
    /// Language code handed to the engine (Tesseract `-l`).
    pub lang: String,
    /// OCR engine mode, e.g. 1 = LSTM only.
    pub oem: Option<u8>,
    /// Page segmentation mode, e.g. 6 = single uniform block of text.
    pub psm: Option<u8>,
    pub tesseract_cmd: String,
    pub mistral_api_key: Option<Secret>,
}

/// Known OCR backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcrProviderKind {
    Tesseract,
    MistralOcr,
}

impl OcrProviderKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tesseract" => Some(Self::Tesseract),
            "mistral_ocr" => Some(Self::MistralOcr),
            _ => None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("PORT") {
            Some(p) => p
                .parse::<u16>()
                .with_context(|| format!("PORT is not a valid port number: {p}"))?,
            None => DEFAULT_PORT,
        };

        let api_key = get("OPENAI_API_KEY")
            .map(Secret::new)
            .context("OPENAI_API_KEY environment variable is required")?;

        let openai = OpenAiConfig {
            api_key,
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        let provider = match get("OCR_PROVIDER") {
            Some(name) => match OcrProviderKind::parse(&name) {
                Some(kind) => kind,
                None => bail!("Unknown OCR_PROVIDER: {name}. Available: tesseract, mistral_ocr"),
            },
            None => OcrProviderKind::Tesseract,
        };

        let mistral_api_key = get("MISTRAL_API_KEY").map(Secret::new);
        if provider == OcrProviderKind::MistralOcr && mistral_api_key.is_none() {
            bail!("MISTRAL_API_KEY is required when OCR_PROVIDER=mistral_ocr");
        }

        let ocr = OcrConfig {
            provider,
            lang: get("OCR_LANG").unwrap_or_else(|| DEFAULT_OCR_LANG.to_string()),
            oem: parse_optional(get("OCR_OEM"), "OCR_OEM")?,
            psm: parse_optional(get("OCR_PSM"), "OCR_PSM")?,
            tesseract_cmd: get("TESSERACT_CMD").unwrap_or_else(|| "tesseract".to_string()),
            mistral_api_key,
        };

        Ok(Self { port, openai, ocr })
    }
}

fn parse_optional(value: Option<String>, name: &str) -> Result<Option<u8>> {
    value
        .map(|v| {
            v.parse::<u8>()
                .with_context(|| format!("{name} must be a small integer, got {v}"))
        })
        .transpose()
}
