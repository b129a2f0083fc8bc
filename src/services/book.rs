use crate::models::{BookDraft, BookRecord, BookSubmission};
use crate::services::catalog::BookCatalog;
use crate::services::cover::CoverGenerator;
use crate::services::document::build_document;
use crate::services::llm::{TextGenerator, generate_title};
use crate::services::pipeline::BookPipeline;
use crate::services::storage::Storage;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub struct GeneratedBook {
    pub record: BookRecord,
    pub bytes: Vec<u8>,
}

/// Runs a submission end to end: chapters, title, cover, document, catalog.
pub struct BookService {
    text: Arc<dyn TextGenerator>,
    pipeline: BookPipeline,
    covers: CoverGenerator,
    storage: Arc<dyn Storage>,
    catalog: Arc<BookCatalog>,
    default_author: String,
}

impl BookService {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        pipeline: BookPipeline,
        covers: CoverGenerator,
        storage: Arc<dyn Storage>,
        catalog: Arc<BookCatalog>,
        default_author: impl Into<String>,
    ) -> Self {
        Self {
            text,
            pipeline,
            covers,
            storage,
            catalog,
            default_author: default_author.into(),
        }
    }

    pub fn catalog(&self) -> &BookCatalog {
        &self.catalog
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub async fn generate(&self, submission: BookSubmission) -> Result<GeneratedBook> {
        let id = Uuid::new_v4();
        tracing::info!(%id, chapters = submission.chapters.len(), "book generation started");

        // Step 1: write the chapters
        let assembled = self
            .pipeline
            .assemble(&submission.writing_style, &submission.chapters)
            .await;
        tracing::debug!(%id, words = crate::utils::word_count(&assembled.full_text), "chapters assembled");

        // Step 2: title and cover; a missing cover never fails the book
        let title = generate_title(self.text.as_ref(), &submission.book_description)
            .await
            .context("failed to generate a title")?;
        let cover_image_path = match self
            .covers
            .generate_cover_image(&submission.book_description, id)
            .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(%id, error = %e, "failed to create cover image, continuing without it");
                None
            }
        };

        let draft = BookDraft {
            title,
            author: submission
                .author
                .unwrap_or_else(|| self.default_author.clone()),
            chapters: assembled.chapters,
            cover_image_path,
        };

        // Step 3: lay out and store the document
        let cover = match &draft.cover_image_path {
            Some(path) => self.read_cover(path).await,
            None => None,
        };
        let document = build_document(&draft, cover.as_deref())?;
        let path = self
            .storage
            .write(&format!("{id}/{}", document.file_name), &document.bytes)
            .await
            .context("failed to store the generated book")?;

        let record = BookRecord {
            id,
            title: draft.title,
            file_name: document.file_name,
            path,
        };
        self.catalog.insert(record.clone()).await;
        tracing::info!(%id, file = %record.file_name, bytes = document.bytes.len(), "book saved");

        Ok(GeneratedBook {
            record,
            bytes: document.bytes,
        })
    }

    async fn read_cover(&self, path: &Path) -> Option<Vec<u8>> {
        match self.storage.read(path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to add cover image, continuing without it");
                None
            }
        }
    }
}
