//! AI-written recommendation explanations.
//!
//! An optional, clearly bounded collaborator: given a resolved catalog entry
//! (or just a free-text name), ask a language model for a few prose
//! recommendations. The similarity engine never calls this module — only the
//! CLI presentation layer does — so the engine stays deterministic and
//! testable.
//!
//! # Retry Strategy
//!
//! - HTTP 429 and 5xx → wait 2 s and retry, up to `explain.max_retries`
//!   times. Exhausting the budget on 429 surfaces as
//!   [`ExplainError::RateLimited`]; on 5xx as [`ExplainError::Provider`].
//! - Other HTTP errors and network failures → [`ExplainError::Provider`],
//!   no retry.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::ExplainConfig;
use crate::models::Anime;

/// Errors from the explanation collaborator.
#[derive(Debug, Error)]
pub enum ExplainError {
    /// The provider kept rate-limiting us past the retry budget.
    #[error("provider rate limit not cleared after {0} retries")]
    RateLimited(u32),

    /// Any other provider failure: configuration, transport, bad payload.
    #[error("explanation provider error: {0}")]
    Provider(String),
}

/// Trait for explanation providers.
///
/// Carries provider metadata; the actual generation call is the free
/// function [`generate_explanation`], dispatched on configuration.
pub trait ExplanationProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-2.0-flash"`).
    fn model_name(&self) -> &str;
}

/// A no-op provider used when `explain.provider = "disabled"`.
pub struct DisabledProvider;

impl ExplanationProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
}

/// Provider backed by the Gemini `generateContent` API.
///
/// Requires the `GEMINI_API_KEY` environment variable.
pub struct GeminiProvider {
    model: String,
}

impl GeminiProvider {
    pub fn new(config: &ExplainConfig) -> Result<Self, ExplainError> {
        if std::env::var("GEMINI_API_KEY").is_err() {
            return Err(ExplainError::Provider(
                "GEMINI_API_KEY environment variable not set".to_string(),
            ));
        }
        Ok(Self {
            model: config.model.clone(),
        })
    }
}

impl ExplanationProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Create the appropriate provider based on configuration.
pub fn create_provider(config: &ExplainConfig) -> Result<Box<dyn ExplanationProvider>, ExplainError> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "gemini" => Ok(Box::new(GeminiProvider::new(config)?)),
        other => Err(ExplainError::Provider(format!(
            "unknown explain provider: {}",
            other
        ))),
    }
}

/// Generate prose recommendations for an anime the user likes.
///
/// `item` is the catalog entry matching `name`, when resolution succeeded;
/// its genres and format anchor the prompt. With `item` absent the prompt
/// falls back to the raw name alone.
pub async fn generate_explanation(
    config: &ExplainConfig,
    item: Option<&Anime>,
    name: &str,
) -> Result<String, ExplainError> {
    match config.provider.as_str() {
        "gemini" => generate_gemini(config, &build_prompt(item, name)).await,
        "disabled" => Err(ExplainError::Provider(
            "explain provider is disabled; set [explain] provider = \"gemini\"".to_string(),
        )),
        other => Err(ExplainError::Provider(format!(
            "unknown explain provider: {}",
            other
        ))),
    }
}

/// Build the recommendation prompt from the resolved item, if any.
fn build_prompt(item: Option<&Anime>, name: &str) -> String {
    let context = match item {
        Some(anime) => {
            let kind = anime.kind.as_deref().unwrap_or("anime");
            format!(
                "The user likes '{}', which is a {} with genres: {}.",
                anime.name,
                kind,
                anime.genres_joined()
            )
        }
        None => format!("The user is interested in the anime '{}'.", name),
    };

    format!(
        "{context}\n\n\
         Recommend 5 similar anime the user would enjoy. For each one, give its \
         name in bold, its main genres, an approximate rating out of 10, its \
         episode count, and two or three sentences on why it is similar and what \
         makes it worth watching. Make the recommendations diverse but \
         thematically similar, and favor well-rated shows."
    )
}

async fn generate_gemini(config: &ExplainConfig, prompt: &str) -> Result<String, ExplainError> {
    let api_key = std::env::var("GEMINI_API_KEY")
        .map_err(|_| ExplainError::Provider("GEMINI_API_KEY not set".to_string()))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| ExplainError::Provider(e.to_string()))?;

    let url = format!(
        "{}/models/{}:generateContent?key={}",
        config.base_url.trim_end_matches('/'),
        config.model,
        api_key
    );
    let body = serde_json::json!({
        "contents": [{ "parts": [{ "text": prompt }] }]
    });

    let mut last_status = None;
    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            debug!(attempt, "retrying transient Gemini failure");
            tokio::time::sleep(Duration::from_secs(2)).await;
        }

        let response = client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ExplainError::Provider(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| ExplainError::Provider(e.to_string()))?;
            return parse_gemini_response(&json);
        }

        if status.as_u16() == 429 || status.is_server_error() {
            last_status = Some(status);
            continue;
        }

        let body_text = response.text().await.unwrap_or_default();
        return Err(ExplainError::Provider(format!(
            "Gemini API error {}: {}",
            status, body_text
        )));
    }

    match last_status {
        Some(status) if status.is_server_error() => Err(ExplainError::Provider(format!(
            "Gemini API still returning {} after {} retries",
            status, config.max_retries
        ))),
        _ => Err(ExplainError::RateLimited(config.max_retries)),
    }
}

/// Pull the generated text out of a `generateContent` response.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String, ExplainError> {
    json.get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.pointer("/content/parts/0/text"))
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| ExplainError::Provider("empty Gemini response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> Anime {
        Anime {
            id: 1,
            name: "Cowboy Bebop".to_string(),
            genres: vec!["Action".to_string(), "Sci-Fi".to_string()],
            kind: Some("TV".to_string()),
            score: 8.75,
            episodes: Some(26),
            members: 0,
            synopsis: None,
            image_url: None,
        }
    }

    #[test]
    fn test_prompt_uses_catalog_context() {
        let item = sample_item();
        let prompt = build_prompt(Some(&item), "cowboy");
        assert!(prompt.contains("'Cowboy Bebop'"));
        assert!(prompt.contains("Action, Sci-Fi"));
        assert!(prompt.contains("is a TV"));
    }

    #[test]
    fn test_prompt_falls_back_to_raw_name() {
        let prompt = build_prompt(None, "Some Unknown Show");
        assert!(prompt.contains("'Some Unknown Show'"));
    }

    #[test]
    fn test_parse_gemini_response() {
        let json = serde_json::json!({
            "candidates": [
                { "content": { "parts": [ { "text": "Try Trigun." } ] } }
            ]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "Try Trigun.");
    }

    #[test]
    fn test_parse_gemini_response_empty() {
        let json = serde_json::json!({ "candidates": [] });
        assert!(parse_gemini_response(&json).is_err());
    }

    #[tokio::test]
    async fn test_disabled_provider_errors() {
        let config = ExplainConfig::default();
        let result = generate_explanation(&config, None, "anything").await;
        assert!(matches!(result, Err(ExplainError::Provider(_))));
    }

    #[test]
    fn test_create_provider_dispatch() {
        std::env::set_var("GEMINI_API_KEY", "test-key");

        let disabled = create_provider(&ExplainConfig::default()).unwrap();
        assert_eq!(disabled.model_name(), "disabled");

        let config = ExplainConfig {
            provider: "gemini".to_string(),
            ..ExplainConfig::default()
        };
        let gemini = create_provider(&config).unwrap();
        assert_eq!(gemini.model_name(), "gemini-2.0-flash");

        let config = ExplainConfig {
            provider: "openai".to_string(),
            ..ExplainConfig::default()
        };
        assert!(create_provider(&config).is_err());
    }

    /// Serves the given canned HTTP responses, one per connection, then exits.
    fn spawn_canned_server(responses: Vec<String>) -> String {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = stream.read(&mut chunk).unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                        let body_len = headers
                            .lines()
                            .find_map(|l| l.strip_prefix("content-length:"))
                            .and_then(|v| v.trim().parse::<usize>().ok())
                            .unwrap_or(0);
                        if buf.len() >= pos + 4 + body_len {
                            break;
                        }
                    }
                }
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        format!("http://{}", addr)
    }

    fn status_response(status: &str) -> String {
        format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
    }

    fn success_response(text: &str) -> String {
        let body = serde_json::json!({
            "candidates": [
                { "content": { "parts": [ { "text": text } ] } }
            ]
        })
        .to_string();
        format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn local_gemini_config(base_url: String) -> ExplainConfig {
        ExplainConfig {
            provider: "gemini".to_string(),
            base_url,
            max_retries: 1,
            timeout_secs: 5,
            ..ExplainConfig::default()
        }
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        std::env::set_var("GEMINI_API_KEY", "test-key");
        let base_url = spawn_canned_server(vec![
            status_response("503 Service Unavailable"),
            success_response("Watch Trigun."),
        ]);
        let config = local_gemini_config(base_url);

        let text = generate_explanation(&config, None, "cowboy").await.unwrap();
        assert_eq!(text, "Watch Trigun.");
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_retry_budget() {
        std::env::set_var("GEMINI_API_KEY", "test-key");
        let base_url = spawn_canned_server(vec![
            status_response("429 Too Many Requests"),
            status_response("429 Too Many Requests"),
        ]);
        let config = local_gemini_config(base_url);

        let result = generate_explanation(&config, None, "cowboy").await;
        assert!(matches!(result, Err(ExplainError::RateLimited(1))));
    }

    #[tokio::test]
    async fn test_client_error_fails_without_retry() {
        std::env::set_var("GEMINI_API_KEY", "test-key");
        let base_url = spawn_canned_server(vec![status_response("404 Not Found")]);
        let config = local_gemini_config(base_url);

        let result = generate_explanation(&config, None, "cowboy").await;
        match result {
            Err(ExplainError::Provider(msg)) => assert!(msg.contains("404")),
            other => panic!("expected provider error, got {:?}", other),
        }
    }
}
