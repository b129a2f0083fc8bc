use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One call to the text-generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub retries: u32,
    pub max_wait_seconds: u64,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            max_tokens: 3000,
            temperature: 0.7,
            retries: 5,
            max_wait_seconds: 60,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub content: String,
}

/// A chapter as the user described it, before any text exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterOutline {
    pub title: String,
    pub elaboration: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    pub chapters: Vec<Chapter>,
    pub cover_image_path: Option<PathBuf>,
}

pub(crate) fn join_sections<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<Vec<_>>().join("\n\n")
}

/// Chapter titles arrive either comma-joined or as an array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChapterTitles {
    Joined(String),
    List(Vec<String>),
}

impl ChapterTitles {
    pub fn to_vec(&self) -> Vec<String> {
        let titles: Vec<&str> = match self {
            ChapterTitles::Joined(joined) => joined.split(',').collect(),
            ChapterTitles::List(list) => list.iter().map(String::as_str).collect(),
        };
        titles
            .into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Raw form submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookRequest {
    pub writing_style: Option<String>,
    pub book_description: Option<String>,
    pub chapter_titles: Option<ChapterTitles>,
    #[serde(default)]
    pub chapter_elaborations: Vec<Option<String>>,
    pub author: Option<String>,
}

/// A validated submission ready for the pipeline.
#[derive(Debug, Clone)]
pub struct BookSubmission {
    pub writing_style: String,
    pub book_description: String,
    pub chapters: Vec<ChapterOutline>,
    pub author: Option<String>,
}

impl BookRequest {
    /// Returns `None` when the style, description or chapter titles are missing.
    pub fn into_submission(self) -> Option<BookSubmission> {
        let writing_style = non_blank(self.writing_style)?;
        let book_description = non_blank(self.book_description)?;
        let titles = self.chapter_titles?.to_vec();
        if titles.is_empty() {
            return None;
        }

        let mut elaborations = self.chapter_elaborations.into_iter();
        let chapters = titles
            .into_iter()
            .map(|title| ChapterOutline {
                title,
                elaboration: elaborations.next().flatten().and_then(|e| non_blank(Some(e))),
            })
            .collect();

        Some(BookSubmission {
            writing_style,
            book_description,
            chapters,
            author: non_blank(self.author),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A generated book known to the catalog.
#[derive(Debug, Clone)]
pub struct BookRecord {
    pub id: Uuid,
    pub title: String,
    pub file_name: String,
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
}

impl From<&BookRecord> for BookSummary {
    fn from(record: &BookRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub id: Uuid,
    pub title: String,
    pub download_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_titles_keep_order_and_spelling() {
        let titles = ChapterTitles::Joined("Intro, Middle, End".to_string());
        assert_eq!(titles.to_vec(), vec!["Intro", "Middle", "End"]);
    }

    #[test]
    fn titles_accept_arrays() {
        let request: BookRequest = serde_json::from_str(
            r#"{"writing_style":"S","book_description":"D","chapter_titles":["A, B"," C "]}"#,
        )
        .unwrap();
        let submission = request.into_submission().unwrap();
        let titles: Vec<_> = submission.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["A, B", "C"]);
    }

    #[test]
    fn elaborations_pair_up_with_titles() {
        let request: BookRequest = serde_json::from_str(
            r#"{"writing_style":"S","book_description":"D","chapter_titles":"One, Two, Three",
                "chapter_elaborations":["more on one", null]}"#,
        )
        .unwrap();
        let submission = request.into_submission().unwrap();
        assert_eq!(submission.chapters[0].elaboration.as_deref(), Some("more on one"));
        assert_eq!(submission.chapters[1].elaboration, None);
        assert_eq!(submission.chapters[2].elaboration, None);
    }

    #[test]
    fn incomplete_requests_are_rejected() {
        let missing_style: BookRequest = serde_json::from_str(
            r#"{"writing_style":"  ","book_description":"D","chapter_titles":"A"}"#,
        )
        .unwrap();
        assert!(missing_style.into_submission().is_none());

        let no_titles: BookRequest = serde_json::from_str(
            r#"{"writing_style":"S","book_description":"D","chapter_titles":" , "}"#,
        )
        .unwrap();
        assert!(no_titles.into_submission().is_none());
    }
}
