use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use tracing::warn;
use tryon_contracts::image::{self as codec, EncodedImage};

use super::{ContentPart, GenerationRequest, GenerationResponse, GenerationTransport};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// `models/<model>:generateContent` over HTTPS with the key as a query param.
pub struct GeminiTransport {
    api_base: String,
    api_key: String,
    http: HttpClient,
}

impl GeminiTransport {
    pub fn new(api_base: &str, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            bail!("API_KEY environment variable not set");
        }
        let api_base = api_base.trim().trim_end_matches('/');
        let api_base = if api_base.is_empty() {
            DEFAULT_GEMINI_API_BASE.to_string()
        } else {
            api_base.to_string()
        };
        // No request timeout; a call waits for the model to answer.
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base,
            api_key: api_key.trim().to_string(),
            http,
        })
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    pub(crate) fn build_payload(request: &GenerationRequest) -> Result<Value> {
        let mut parts = Vec::with_capacity(request.parts.len());
        for part in &request.parts {
            match part {
                ContentPart::InlineImage(encoded) => {
                    let (mime_type, bytes) = codec::decode(encoded.as_str())?;
                    parts.push(json!({
                        "inlineData": {
                            "mimeType": mime_type,
                            "data": BASE64.encode(bytes),
                        }
                    }));
                }
                ContentPart::Text(text) => parts.push(json!({ "text": text })),
            }
        }

        let modalities = request
            .response_modalities
            .iter()
            .map(|modality| Value::String(modality.as_str().to_string()))
            .collect::<Vec<_>>();

        let mut payload = Map::new();
        payload.insert(
            "contents".to_string(),
            Value::Array(vec![json!({
                "role": "user",
                "parts": parts,
            })]),
        );
        payload.insert(
            "generationConfig".to_string(),
            json!({ "responseModalities": modalities }),
        );
        Ok(Value::Object(payload))
    }

    /// Reads the first candidate's parts in order.
    pub(crate) fn parse_response(response_payload: &Value) -> GenerationResponse {
        let parts = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut out = Vec::with_capacity(parts.len());
        for part in parts {
            if let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            {
                let data = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if data.is_empty() {
                    continue;
                }
                let mime_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .unwrap_or("image/png");
                if BASE64.decode(data).is_err() {
                    warn!(mime_type, bytes = data.len(), "skipping inline part with corrupt base64");
                    continue;
                }
                // Non-image inline data (audio, pdf) is not an image part.
                if let Ok(encoded) = EncodedImage::from_base64_parts(mime_type, data) {
                    out.push(ContentPart::InlineImage(encoded));
                }
                continue;
            }
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                out.push(ContentPart::Text(text.to_string()));
            }
        }
        GenerationResponse { parts: out }
    }
}

impl GenerationTransport for GeminiTransport {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_content(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let endpoint = self.endpoint_for_model(&request.model);
        let payload = Self::build_payload(request)?;
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let response_payload = response_json_or_error("Gemini", response)?;
        Ok(Self::parse_response(&response_payload))
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
