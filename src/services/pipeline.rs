use crate::config::PipelineSettings;
use crate::models::{Chapter, ChapterOutline, GenerationRequest, join_sections};
use crate::services::llm::TextGenerator;
use crate::utils::{strip_preamble, word_count};
use std::sync::Arc;

const SECTION_MAX_TOKENS: u32 = 3000;

/// Output of the chapter loop.
#[derive(Debug, Clone)]
pub struct AssembledBook {
    pub chapters: Vec<Chapter>,
    /// Every chapter joined by blank lines; informational only.
    pub full_text: String,
}

/// Writes chapters one at a time, one section after another.
pub struct BookPipeline {
    text: Arc<dyn TextGenerator>,
    settings: PipelineSettings,
}

impl BookPipeline {
    pub fn new(text: Arc<dyn TextGenerator>, settings: PipelineSettings) -> Self {
        Self { text, settings }
    }

    pub async fn assemble(&self, writing_style: &str, outlines: &[ChapterOutline]) -> AssembledBook {
        let mut chapters = Vec::with_capacity(outlines.len());

        for (idx, outline) in outlines.iter().enumerate() {
            if idx > 0 && !self.settings.chapter_pause.is_zero() {
                tokio::time::sleep(self.settings.chapter_pause).await;
            }
            tracing::info!(chapter = %outline.title, "generating chapter content");

            let mut sections = Vec::with_capacity(self.settings.sections_per_chapter);
            for section in 1..=self.settings.sections_per_chapter {
                if let Some(text) = self.write_section(writing_style, outline, section).await {
                    sections.push(text);
                }
            }

            chapters.push(Chapter {
                title: outline.title.clone(),
                content: join_sections(sections.iter().map(String::as_str)),
            });
        }

        let full_text = join_sections(chapters.iter().map(|c| c.content.as_str()));
        tracing::info!(chapters = chapters.len(), "book content generation completed");
        AssembledBook {
            chapters,
            full_text,
        }
    }

    /// Retries until a section passes the word gate. If none does, the last
    /// text produced is kept; `None` only when every attempt failed outright.
    async fn write_section(
        &self,
        writing_style: &str,
        outline: &ChapterOutline,
        section: usize,
    ) -> Option<String> {
        let prompt = section_prompt(
            writing_style,
            outline,
            section,
            self.settings.target_words,
        );
        let request =
            GenerationRequest::new(prompt, self.text.model()).max_tokens(SECTION_MAX_TOKENS);

        let mut last = None;
        for attempt in 1..=self.settings.max_attempts {
            match self.text.generate(&request).await {
                Ok(raw) => {
                    let text = strip_preamble(&raw).trim().to_string();
                    let words = word_count(&text);
                    if words >= self.settings.min_words {
                        return Some(text);
                    }
                    tracing::warn!(
                        chapter = %outline.title,
                        section,
                        attempt,
                        words,
                        "insufficient content, regenerating"
                    );
                    last = Some(text);
                }
                Err(e) => {
                    tracing::warn!(
                        chapter = %outline.title,
                        section,
                        attempt,
                        error = %e,
                        "section generation failed"
                    );
                }
            }
        }
        last.filter(|text| !text.is_empty())
    }
}

fn section_prompt(
    writing_style: &str,
    outline: &ChapterOutline,
    section: usize,
    target_words: usize,
) -> String {
    let mut prompt = format!(
        "Subtitle {section}: Provide a detailed analysis and insights for '{}', as part of a book in the style of '{writing_style}'. Ensure this section contains at least {target_words} words.",
        outline.title
    );
    if let Some(elaboration) = &outline.elaboration {
        prompt.push_str(&format!(
            " Follow the instructions provided and include the following additional information after thinking it through intelligently. Add them in a way that is balanced and not excessive or abnormal: {elaboration}"
        ));
    }
    prompt
}
