// Vision Provider Service
// OpenAI-compatible chat completions with image content parts

use super::config_store::{ConfigStore, ModelConfig};
use super::evaluation::prompts::ContentPart;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

pub const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const REQUEST_TIMEOUT_SECS: u64 = 80;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub model: String,
}

/// `name[:model]`, e.g. `openai:gpt-4.1-2025-04-14`.
pub fn parse_provider(spec: &str) -> ProviderSpec {
    let parts: Vec<&str> = spec.splitn(2, ':').collect();
    if parts.len() == 2 {
        ProviderSpec {
            name: parts[0].to_string(),
            model: parts[1].to_string(),
        }
    } else {
        ProviderSpec {
            name: spec.to_string(),
            model: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: i32,
    temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

/// A model that answers one multimodal user message with free text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(
        &self,
        parts: Vec<ContentPart>,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError>;
}

pub struct ProviderClient {
    client: Client,
    url: String,
    model: String,
    api_key: String,
    temperature: f64,
}

impl ProviderClient {
    /// Build a client for `settings`. The URL comes from `OPENAI_API_URL`, then
    /// `settings.base_url`, then the public endpoint.
    pub fn new(
        settings: &ModelConfig,
        api_key: String,
        proxy_url: Option<&str>,
    ) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }

        let mut builder = Client::builder().timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));
        if let Some(proxy_url) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        let client = builder.build()?;

        let url = env::var("OPENAI_API_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| settings.base_url.clone())
            .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string());

        Ok(Self {
            client,
            url,
            model: settings.model.clone(),
            api_key,
            temperature: settings.temperature,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_request(&self, parts: Vec<ContentPart>, max_tokens: i32) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: parts,
            }],
            max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl VisionModel for ProviderClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        parts: Vec<ContentPart>,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        let request = self.build_request(parts, max_tokens);
        let start = Instant::now();

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = extract_content(data).ok_or(ProviderError::MissingContent)?;
        debug!(model = %self.model, latency_ms, "provider.complete");

        Ok(ChatResult {
            content,
            latency_ms,
        })
    }
}

fn extract_content(data: ChatResponse) -> Option<String> {
    data.choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|s| s.trim().to_string())
}

/// Get API key from environment or config file
pub fn get_api_key(provider: &str, store: Option<&ConfigStore>) -> Option<String> {
    let env_keys = match provider {
        "openai" => vec!["OPENAI_API_KEY", "SPLICE_EVAL_OPENAI_API_KEY"],
        _ => vec![],
    };

    for key in env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    if let Some(store) = store {
        if let Ok(Some(key)) = store.get_api_key(provider) {
            return Some(key);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        let spec = parse_provider("openai:gpt-4.1-2025-04-14");
        assert_eq!(spec.name, "openai");
        assert_eq!(spec.model, "gpt-4.1-2025-04-14");

        let spec2 = parse_provider("openai");
        assert_eq!(spec2.name, "openai");
        assert_eq!(spec2.model, "");
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let result = ProviderClient::new(&ModelConfig::default(), "  ".to_string(), None);
        assert!(matches!(result, Err(ProviderError::MissingApiKey)));
    }

    #[test]
    fn test_request_shape() {
        let client = ProviderClient::new(&ModelConfig::default(), "sk-test".to_string(), None).unwrap();
        let request = client.build_request(vec![ContentPart::text("look")], 100);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["max_tokens"], 100);
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["model"], ModelConfig::default().model);
    }

    #[test]
    fn test_extract_content() {
        let data: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"  Spliced\n"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_content(data).as_deref(), Some("Spliced"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(extract_content(empty).is_none());
    }

    #[test]
    fn test_api_key_from_config_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        store.set_api_key("custom", "sk-stored").unwrap();
        assert_eq!(get_api_key("custom", Some(&store)).as_deref(), Some("sk-stored"));
        assert!(get_api_key("custom", None).is_none());
    }
}
