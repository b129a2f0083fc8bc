//! In-process stand-ins for the generation services.

use crate::error::GenerationError;
use crate::models::GenerationRequest;
use crate::services::cover::ImageGenerator;
use crate::services::llm::TextGenerator;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned replies in order, then keeps answering with the fallback.
/// A `None` reply fails the call with an upstream error.
pub struct ScriptedText {
    replies: Mutex<VecDeque<Option<String>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedText {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_failures(replies.into_iter().map(|r| Some(r.into())))
    }

    pub fn with_failures<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(reply: impl Into<String>) -> Self {
        Self {
            fallback: Some(reply.into()),
            ..Self::with_failures([])
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Some(text)) => Ok(text),
            Some(None) => Err(GenerationError::Upstream {
                status: 500,
                attempt: 1,
            }),
            None => self.fallback.clone().ok_or(GenerationError::EmptyResult),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Answers by prompt kind: title, cover description or chapter section.
pub struct StubBackend {
    pub title: String,
    pub cover_prompt: Option<String>,
    pub section: String,
}

impl StubBackend {
    pub fn new(title: &str, section_words: usize) -> Self {
        Self {
            title: title.to_string(),
            cover_prompt: Some("A quiet harbour at dawn. The title glows in brass.".to_string()),
            section: lorem(section_words),
        }
    }
}

#[async_trait]
impl TextGenerator for StubBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let prompt = &request.prompt;
        if prompt.contains("Respond with a great title") {
            Ok(self.title.clone())
        } else if prompt.contains("Describe the cover") {
            self.cover_prompt
                .clone()
                .ok_or_else(|| GenerationError::ContentPolicy("blocked".to_string()))
        } else {
            Ok(self.section.clone())
        }
    }

    fn model(&self) -> &str {
        "stub"
    }
}

pub struct RecordingImages {
    image: Vec<u8>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingImages {
    pub fn returning(image: &[u8]) -> Self {
        Self {
            image: image.to_vec(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for RecordingImages {
    async fn text_to_image(&self, prompt: &str) -> Result<Vec<u8>, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.image.clone())
    }
}

/// `words` whitespace-separated words.
pub fn lorem(words: usize) -> String {
    (0..words)
        .map(|i| format!("word{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}
