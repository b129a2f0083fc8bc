use crate::error::ApiError;
use crate::models::{BookRequest, BookSubmission, BookSummary, ChapterTitles, GenerateResponse};
use crate::services::book::{BookService, GeneratedBook};
use crate::services::document;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use async_trait::async_trait;
use axum::Router;
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

const MISSING_FIELDS: &str =
    "Missing data for writing style, book description, or chapter titles";

/// Characters left as is in an RFC 5987 `filename*` value.
const FILENAME_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_');

#[derive(Clone)]
pub struct AppState {
    pub books: Arc<BookService>,
    pub public_base_url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/generate-book", post(generate_book_file))
        .route("/api/books", post(generate_book_link).get(list_books))
        .route("/download/:id", get(download_book))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::AllowMethods::any())
                .allow_headers(tower_http::cors::AllowHeaders::any())
                .expose_headers([CONTENT_DISPOSITION]),
        )
}

/// A book submission sent either as JSON or as a multipart form.
pub struct BookForm(pub BookSubmission);

#[async_trait]
impl<S> FromRequest<S> for BookForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let request = if content_type.starts_with("application/json") {
            let Json(request) = Json::<BookRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            request
        } else if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            read_multipart(multipart).await?
        } else {
            return Err(ApiError::BadRequest("Request must be JSON".to_string()));
        };

        request
            .into_submission()
            .map(BookForm)
            .ok_or_else(|| ApiError::BadRequest(MISSING_FIELDS.to_string()))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<BookRequest, ApiError> {
    let mut request = BookRequest::default();
    let mut titles = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or("unknown").to_string();
        let value = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        match name.as_str() {
            "writing_style" => request.writing_style = Some(value),
            "book_description" => request.book_description = Some(value),
            "chapter_titles" => titles.push(value),
            "chapter_elaborations" => request.chapter_elaborations.push(Some(value)),
            "author" => request.author = Some(value),
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }

    request.chapter_titles = match titles.len() {
        0 => None,
        1 => titles.pop().map(ChapterTitles::Joined),
        _ => Some(ChapterTitles::List(titles)),
    };
    Ok(request)
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Book Generator</title>
    <meta charset="utf-8">
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; }
        .endpoint { background-color: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 4px; font-family: monospace; }
    </style>
</head>
<body>
    <h1>Book Generator</h1>
    <p>Submit a writing style, a book description and chapter titles; get back an EPUB with generated chapters and a cover.</p>
    <h2>Available Endpoints:</h2>
    <div class="endpoint">GET /health - Health check</div>
    <div class="endpoint">POST /api/generate-book - Generate a book and download it</div>
    <div class="endpoint">POST /api/books - Generate a book and get a download link</div>
    <div class="endpoint">GET /api/books - List generated books</div>
    <div class="endpoint">GET /download/{id} - Download a generated book</div>
    <h2>Request fields:</h2>
    <p>writing_style, book_description, chapter_titles (comma separated or an array), chapter_elaborations (optional, one per chapter), author (optional)</p>
</body>
</html>
"#,
    )
}

async fn health_check() -> &'static str {
    "OK"
}

async fn generate_book_file(
    State(state): State<AppState>,
    BookForm(submission): BookForm,
) -> Result<Response, ApiError> {
    let GeneratedBook { record, bytes } = state.books.generate(submission).await?;
    Ok(document_response(&record.file_name, bytes))
}

async fn generate_book_link(
    State(state): State<AppState>,
    BookForm(submission): BookForm,
) -> Result<Json<GenerateResponse>, ApiError> {
    let GeneratedBook { record, .. } = state.books.generate(submission).await?;
    Ok(Json(GenerateResponse {
        download_url: format!(
            "{}/download/{}",
            state.public_base_url.trim_end_matches('/'),
            record.id
        ),
        id: record.id,
        title: record.title,
    }))
}

async fn list_books(State(state): State<AppState>) -> Json<Vec<BookSummary>> {
    Json(state.books.catalog().list().await)
}

async fn download_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let record = state
        .books
        .catalog()
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no book with id {id}")))?;
    let bytes = state
        .books
        .storage()
        .read(&record.path)
        .await
        .map_err(ApiError::Download)?;
    Ok(document_response(&record.file_name, bytes))
}

/// `filename=` only carries ASCII; fall back to `book.<ext>` when nothing is left.
fn ascii_file_name(file_name: &str) -> String {
    let (stem, ext) = file_name.rsplit_once('.').unwrap_or((file_name, "epub"));
    let stem: String = stem.chars().filter(char::is_ascii).collect();
    let stem = stem.trim_matches(|c: char| c == '_' || c == '.');
    let stem = if stem.is_empty() { "book" } else { stem };
    format!("{stem}.{ext}")
}

fn content_disposition(file_name: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_file_name(file_name),
        utf8_percent_encode(file_name, FILENAME_SAFE)
    )
}

fn document_response(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (CONTENT_TYPE, document::CONTENT_TYPE.to_string()),
            (CONTENT_DISPOSITION, content_disposition(file_name)),
        ],
        bytes,
    )
        .into_response()
}
