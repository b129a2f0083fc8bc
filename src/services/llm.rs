use crate::config::TextServiceConfig;
use crate::error::GenerationError;
use crate::models::GenerationRequest;
use crate::services::retry::RetryPolicy;
use crate::utils::strip_preamble;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are a world-class author. Write the requested content with great skill and attention to detail.";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns trimmed, non-empty text for the request.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Model used when a caller builds its own [`GenerationRequest`].
    fn model(&self) -> &str;
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Client for the Anthropic messages endpoint.
pub struct LLMClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    backoff_unit: Duration,
}

impl LLMClient {
    pub fn new(config: &TextServiceConfig) -> Self {
        LLMClient {
            client: reqwest::Client::new(),
            api_url: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            backoff_unit: Duration::from_secs(1),
        }
    }

    /// Scales every backoff wait; one second in production.
    #[cfg(test)]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    fn retry_policy(&self, request: &GenerationRequest) -> RetryPolicy {
        let max_wait = u32::try_from(request.max_wait_seconds).unwrap_or(u32::MAX);
        RetryPolicy::new(
            request.retries,
            self.backoff_unit,
            self.backoff_unit.saturating_mul(max_wait),
        )
    }

    async fn attempt(
        &self,
        request: &GenerationRequest,
        attempt: u32,
    ) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": request.model,
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
                "system": SYSTEM_PROMPT,
                "messages": [{ "role": "user", "content": request.prompt }],
            }))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: MessagesResponse = response
                    .json()
                    .await
                    .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
                let text = body
                    .content
                    .into_iter()
                    .next()
                    .and_then(|block| block.text)
                    .ok_or_else(|| {
                        GenerationError::MalformedResponse("missing content[0].text".to_string())
                    })?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(GenerationError::EmptyResult);
                }
                Ok(text.to_string())
            }
            StatusCode::TOO_MANY_REQUESTS => Err(GenerationError::RateLimited { attempt }),
            status => Err(GenerationError::Upstream {
                status: status.as_u16(),
                attempt,
            }),
        }
    }
}

#[async_trait]
impl TextGenerator for LLMClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.retry_policy(request)
            .run(|attempt| self.attempt(request, attempt))
            .await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Asks for a book title matching the plot.
pub async fn generate_title(
    text: &dyn TextGenerator,
    plot: &str,
) -> Result<String, GenerationError> {
    let prompt = format!(
        "Here is the plot for the book: {plot}\n\n--\n\nRespond with a great title for this book. Only respond with the title, nothing else is allowed."
    );
    let raw = text
        .generate(&GenerationRequest::new(prompt, text.model()))
        .await?;
    let title = strip_preamble(&raw)
        .trim()
        .trim_matches(|c: char| c == '"' || c == '*')
        .trim();
    if title.is_empty() {
        return Err(GenerationError::EmptyResult);
    }
    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::ScriptedText;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;
    use tokio::net::TcpListener;

    #[derive(Clone)]
    struct Upstream {
        hits: Arc<AtomicU32>,
        seen_at: Arc<Mutex<Vec<Instant>>>,
        status: AxumStatus,
        body: serde_json::Value,
    }

    async fn messages(
        State(upstream): State<Upstream>,
        headers: HeaderMap,
        Json(payload): Json<serde_json::Value>,
    ) -> (AxumStatus, Json<serde_json::Value>) {
        upstream.hits.fetch_add(1, Ordering::SeqCst);
        upstream.seen_at.lock().unwrap().push(Instant::now());
        assert_eq!(headers["x-api-key"], "test-key");
        assert_eq!(headers["anthropic-version"], ANTHROPIC_VERSION);
        assert_eq!(payload["messages"][0]["content"], "write something");
        (upstream.status, Json(upstream.body.clone()))
    }

    async fn spawn_upstream(status: AxumStatus, body: serde_json::Value) -> (String, Arc<AtomicU32>) {
        let (url, hits, _) = spawn_recording_upstream(status, body).await;
        (url, hits)
    }

    async fn spawn_recording_upstream(
        status: AxumStatus,
        body: serde_json::Value,
    ) -> (String, Arc<AtomicU32>, Arc<Mutex<Vec<Instant>>>) {
        let hits = Arc::new(AtomicU32::new(0));
        let seen_at = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/v1/messages", post(messages))
            .with_state(Upstream {
                hits: hits.clone(),
                seen_at: seen_at.clone(),
                status,
                body,
            });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}"), hits, seen_at)
    }

    fn client(base_url: String) -> LLMClient {
        LLMClient::new(&TextServiceConfig {
            api_key: "test-key".to_string(),
            base_url,
            model: "test-model".to_string(),
        })
        .with_backoff_unit(Duration::from_millis(1))
    }

    fn request() -> GenerationRequest {
        let mut request = GenerationRequest::new("write something", "test-model");
        request.retries = 3;
        request.max_wait_seconds = 2;
        request
    }

    #[tokio::test]
    async fn returns_trimmed_text() {
        let body = json!({ "content": [{ "type": "text", "text": "  Once upon a time.\n" }] });
        let (url, hits) = spawn_upstream(AxumStatus::OK, body).await;

        let text = client(url).generate(&request()).await.unwrap();
        assert_eq!(text, "Once upon a time.");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limits_exhaust_after_exactly_the_retry_budget() {
        let (url, hits, seen_at) =
            spawn_recording_upstream(AxumStatus::TOO_MANY_REQUESTS, json!({})).await;
        let unit = Duration::from_millis(100);

        let started = Instant::now();
        let err = client(url)
            .with_backoff_unit(unit)
            .generate(&request())
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, GenerationError::RetriesExhausted { attempts: 3 }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        // gaps between calls follow min(2^k, max_wait) units: 1, then 2
        let seen_at = seen_at.lock().unwrap().clone();
        let gaps: Vec<Duration> = seen_at.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps[0] >= unit && gaps[0] < unit * 2, "first wait was {:?}", gaps[0]);
        assert!(gaps[1] >= unit * 2 && gaps[1] < unit * 3, "second wait was {:?}", gaps[1]);

        // never more than sum(min(2^k, 2)) for k in 0..3, i.e. 1 + 2 + 2 units
        assert!(elapsed < unit * 5, "total wait was {elapsed:?}");
    }

    #[tokio::test]
    async fn other_statuses_fail_without_retry() {
        let (url, hits) = spawn_upstream(AxumStatus::BAD_GATEWAY, json!({})).await;

        let err = client(url).generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Upstream { status: 502, attempt: 1 }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_text_is_an_empty_result() {
        let body = json!({ "content": [{ "type": "text", "text": "   " }] });
        let (url, _) = spawn_upstream(AxumStatus::OK, body).await;

        let err = client(url).generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResult));
    }

    #[tokio::test]
    async fn missing_content_is_malformed() {
        let (url, _) = spawn_upstream(AxumStatus::OK, json!({ "content": [] })).await;

        let err = client(url).generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn title_drops_preamble_and_quotes() {
        let text = ScriptedText::new(["Here is a title for your book:\n\"The Price of Everything\""]);
        let title = generate_title(&text, "economics of daily life").await.unwrap();
        assert_eq!(title, "The Price of Everything");
        assert!(text.prompts()[0].contains("economics of daily life"));
    }
}
