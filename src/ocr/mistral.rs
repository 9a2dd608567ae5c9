//! Mistral OCR provider (uses Mistral's OCR API).

use super::{image_mime, OcrInput, OcrProvider, OcrResult};
use crate::config::Secret;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const MISTRAL_OCR_URL: &str = "https://api.mistral.ai/v1/ocr";

pub struct MistralOcrProvider {
    api_key: Secret,
    client: reqwest::Client,
    url: String,
}

impl MistralOcrProvider {
    pub fn new(api_key: Secret, client: reqwest::Client) -> Self {
        Self {
            api_key,
            client,
            url: MISTRAL_OCR_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

// ── Mistral API request/response types ──────────────────────────────────────

#[derive(Serialize)]
struct OcrRequest {
    model: String,
    document: DocumentSource,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum DocumentSource {
    #[serde(rename = "image_url")]
    Image { image_url: String },
}

#[derive(Deserialize)]
struct OcrResponse {
    pages: Vec<MistralPage>,
}

#[derive(Deserialize)]
struct MistralPage {
    markdown: String,
}

fn document_for(input: &OcrInput) -> DocumentSource {
    let image_url = match input {
        OcrInput::Url { url, .. } => url.clone(),
        OcrInput::Bytes {
            data, content_type, ..
        } => format!(
            "data:{};base64,{}",
            image_mime(data, content_type.as_deref()),
            BASE64.encode(data)
        ),
    };
    DocumentSource::Image { image_url }
}

// ── Provider implementation ─────────────────────────────────────────────────

#[async_trait::async_trait]
impl OcrProvider for MistralOcrProvider {
    fn name(&self) -> &str {
        "mistral_ocr"
    }

    async fn process(&self, input: &OcrInput) -> anyhow::Result<OcrResult> {
        let body = OcrRequest {
            model: "mistral-ocr-latest".to_string(),
            document: document_for(input),
        };

        info!("MistralOcrProvider: calling OCR API for {}", input.filename());

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Mistral OCR API error ({}): {}", status, text);
        }

        let raw_text = resp.text().await?;
        debug!(
            "MistralOcrProvider: raw response ({} bytes): {}",
            raw_text.len(),
            raw_text.chars().take(500).collect::<String>()
        );
        let ocr: OcrResponse = serde_json::from_str(&raw_text)?;

        let text = ocr
            .pages
            .iter()
            .map(|p| p.markdown.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(OcrResult {
            text,
            provider_name: "mistral_ocr".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_bytes_become_data_url() {
        let input = OcrInput::Bytes {
            filename: "p.png".to_string(),
            content_type: Some("image/png".to_string()),
            data: PNG_HEADER.to_vec(),
        };
        let json = serde_json::to_value(OcrRequest {
            model: "mistral-ocr-latest".to_string(),
            document: document_for(&input),
        })
        .unwrap();

        assert_eq!(json["document"]["type"], "image_url");
        let url = json["document"]["image_url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_urls_pass_through() {
        let input = OcrInput::Url {
            filename: "p.jpg".to_string(),
            url: "https://example.com/p.jpg".to_string(),
        };
        let DocumentSource::Image { image_url } = document_for(&input);
        assert_eq!(image_url, "https://example.com/p.jpg");
    }

    #[tokio::test]
    async fn test_pages_are_joined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ocr"))
            .and(bearer_token("mistral-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pages": [
                    {"index": 0, "markdown": "Solve for x:"},
                    {"index": 1, "markdown": "2x + 3 = 7"}
                ]
            })))
            .mount(&server)
            .await;

        let provider = MistralOcrProvider::new(Secret::new("mistral-key"), reqwest::Client::new())
            .with_url(format!("{}/v1/ocr", server.uri()));
        let input = OcrInput::Bytes {
            filename: "p.png".to_string(),
            content_type: Some("image/png".to_string()),
            data: PNG_HEADER.to_vec(),
        };

        let result = provider.process(&input).await.unwrap();
        assert_eq!(result.text, "Solve for x:\n\n2x + 3 = 7");
        assert_eq!(result.provider_name, "mistral_ocr");
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let provider = MistralOcrProvider::new(Secret::new("wrong"), reqwest::Client::new())
            .with_url(server.uri());
        let input = OcrInput::Url {
            filename: "p.png".to_string(),
            url: "https://example.com/p.png".to_string(),
        };

        let err = provider.process(&input).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("bad key"));
    }
}
