//! Image synthesis: the model call behind a trait so runs can be tested
//! against a stub.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::codec::{decode_image, encode_png};
use super::templates::TemplateSet;
use crate::config::ModelConfig;
use crate::constants::{GEMINI_API_BASE, GENERATION_TEMPERATURE, MODEL_TIMEOUT};
use crate::error::GenerationError;

/// Turns a prompt plus reference images into a new image.
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    /// Submits `[prompt, avatar, templates...]` and returns the produced image.
    async fn synthesize(
        &self,
        prompt: &str,
        avatar: &DynamicImage,
        templates: &TemplateSet,
    ) -> Result<DynamicImage, GenerationError>;
}

// -----------------------------
// generateContent wire types
// -----------------------------

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default, alias = "mime_type")]
    mime_type: String,
    #[serde(default)]
    data: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_modalities: [&'static str; 2],
}

#[derive(Deserialize, Debug, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    inline_data: Option<InlineData>,
}

fn inline_png(image: &DynamicImage) -> Result<RequestPart, GenerationError> {
    let png = encode_png(image).map_err(GenerationError::Encode)?;
    Ok(RequestPart::Inline {
        inline_data: InlineData {
            mime_type: "image/png".to_string(),
            data: general_purpose::STANDARD.encode(png),
        },
    })
}

fn build_request(
    prompt: &str,
    avatar: &DynamicImage,
    templates: &TemplateSet,
) -> Result<GenerateContentRequest, GenerationError> {
    let mut parts = Vec::with_capacity(templates.len() + 2);
    parts.push(RequestPart::Text {
        text: prompt.to_string(),
    });
    parts.push(inline_png(avatar)?);
    for template in templates.iter() {
        parts.push(inline_png(template)?);
    }
    Ok(GenerateContentRequest {
        contents: vec![RequestContent {
            role: "user",
            parts,
        }],
        generation_config: GenerationConfig {
            temperature: GENERATION_TEMPERATURE,
            response_modalities: ["TEXT", "IMAGE"],
        },
    })
}

/// Picks the first decodable inline image out of a response.
fn extract_image(response: GenerateContentResponse) -> Result<DynamicImage, GenerationError> {
    let mut last_error = None;
    let payloads = response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| part.inline_data)
        .filter(|inline| !inline.data.is_empty());

    for inline in payloads {
        let bytes = match general_purpose::STANDARD.decode(inline.data.trim()) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!("Skipping inline part with bad base64: {}", err);
                last_error = Some(err.to_string());
                continue;
            }
        };
        match decode_image(&bytes, "model output") {
            Ok(image) => return Ok(image),
            Err(err) => {
                debug!("Skipping inline part: {}", err);
                last_error = Some(err.to_string());
            }
        }
    }

    Err(match last_error {
        Some(err) => GenerationError::Payload(err),
        None => GenerationError::NoImage,
    })
}

/// Calls Gemini's `generateContent` REST endpoint.
#[derive(Clone, Debug)]
pub struct GeminiSynthesizer {
    client: reqwest::Client,
    config: ModelConfig,
    base_url: String,
}

impl GeminiSynthesizer {
    /// Builds a synthesizer for the public Gemini API.
    pub fn new(config: ModelConfig) -> Result<Self, reqwest::Error> {
        Self::with_base_url(config, GEMINI_API_BASE)
    }

    /// Builds a synthesizer that talks to `base_url` instead of the public API.
    pub fn with_base_url(config: ModelConfig, base_url: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(MODEL_TIMEOUT).build()?;
        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.config.model
        )
    }
}

#[async_trait]
impl ImageSynthesizer for GeminiSynthesizer {
    #[instrument(level = "debug", skip_all)]
    async fn synthesize(
        &self,
        prompt: &str,
        avatar: &DynamicImage,
        templates: &TemplateSet,
    ) -> Result<DynamicImage, GenerationError> {
        let body = build_request(prompt, avatar, templates)?;
        info!(
            "Submitting generation with {} templates to {}",
            templates.len(),
            self.config.model
        );

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes)?;
        extract_image(parsed)
    }
}
