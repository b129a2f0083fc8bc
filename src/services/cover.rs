use crate::config::ImageServiceConfig;
use crate::error::GenerationError;
use crate::models::GenerationRequest;
use crate::services::llm::TextGenerator;
use crate::services::storage::Storage;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

const MAX_PROMPT_CHARS: usize = 1000;
const DISALLOWED_MARKERS: &[&str] = &["example_disallowed_content"];

/// Fixed sampling parameters for cover images.
const CFG_SCALE: u32 = 7;
const CLIP_GUIDANCE_PRESET: &str = "FAST_BLUE";
const HEIGHT: u32 = 768;
const WIDTH: u32 = 512;
const STEPS: u32 = 30;

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns the raw bytes of the first generated image.
    async fn text_to_image(&self, prompt: &str) -> Result<Vec<u8>, GenerationError>;
}

#[derive(Deserialize)]
struct TextToImageResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Deserialize)]
struct Artifact {
    base64: String,
}

/// Client for the Stability text-to-image endpoint.
pub struct StabilityClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl StabilityClient {
    pub fn new(config: &ImageServiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: format!(
                "{}/v1/generation/{}/text-to-image",
                config.base_url.trim_end_matches('/'),
                config.engine
            ),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl ImageGenerator for StabilityClient {
    async fn text_to_image(&self, prompt: &str) -> Result<Vec<u8>, GenerationError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Accept", "application/json")
            .bearer_auth(&self.api_key)
            .json(&json!({
                "text_prompts": [{ "text": prompt }],
                "cfg_scale": CFG_SCALE,
                "clip_guidance_preset": CLIP_GUIDANCE_PRESET,
                "height": HEIGHT,
                "width": WIDTH,
                "samples": 1,
                "steps": STEPS,
            }))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                attempt: 1,
            });
        }

        let body: TextToImageResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
        let artifact = body
            .artifacts
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::MalformedResponse("no image artifacts".to_string()))?;
        STANDARD
            .decode(artifact.base64)
            .map_err(|e| GenerationError::Decode(e.to_string()))
    }
}

/// Turns a plot into a cover image stored next to the book.
pub struct CoverGenerator {
    text: Arc<dyn TextGenerator>,
    images: Arc<dyn ImageGenerator>,
    storage: Arc<dyn Storage>,
}

impl CoverGenerator {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        images: Arc<dyn ImageGenerator>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            text,
            images,
            storage,
        }
    }

    pub async fn build_cover_prompt(&self, plot: &str) -> Result<String, GenerationError> {
        let prompt = format!(
            "Plot: {plot}\n\n--\n\nDescribe the cover we should create, based on the plot. This should be visually rich and detailed, ideally two sentences long."
        );
        let generated = self
            .text
            .generate(&GenerationRequest::new(prompt, self.text.model()))
            .await?;
        check_cover_prompt(&generated)?;
        Ok(generated)
    }

    /// Writes the cover to `<book_id>/cover.png`, replacing any earlier one.
    pub async fn generate_cover_image(
        &self,
        plot: &str,
        book_id: Uuid,
    ) -> Result<PathBuf, GenerationError> {
        let prompt = self.build_cover_prompt(plot).await?;
        let bytes = self.images.text_to_image(&prompt).await?;
        let path = self
            .storage
            .write(&format!("{book_id}/cover.png"), &bytes)
            .await?;
        tracing::info!(%book_id, path = %path.display(), "cover image saved");
        Ok(path)
    }
}

fn check_cover_prompt(prompt: &str) -> Result<(), GenerationError> {
    if prompt.trim().is_empty() {
        return Err(GenerationError::EmptyResult);
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(GenerationError::ContentPolicy(
            "generated prompt is too long".to_string(),
        ));
    }
    let lowered = prompt.to_lowercase();
    if DISALLOWED_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return Err(GenerationError::ContentPolicy(
            "generated prompt contains disallowed content".to_string(),
        ));
    }
    Ok(())
}
