use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument};

use super::prompts::GenerationRequest;
use super::receive::extract_line;
use super::{GenerationError, RemoteGenerator};
use crate::config::GeneratorConfig;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// HTTP-backed [`RemoteGenerator`] for OpenAI-compatible chat endpoints.
pub struct ChatCompletionClient {
    client: Client,
    config: GeneratorConfig,
    request: GenerationRequest,
}

impl ChatCompletionClient {
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GenerationError::Client(e.to_string()))?;

        let request = GenerationRequest::new(config.system_prompt.clone(), config.user_prompt.clone());

        Ok(Self {
            client,
            config,
            request,
        })
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    /// Body sent on every call; the prompt pair never changes.
    pub fn request_body(&self) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: self.request.messages(),
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
        }
    }
}

#[async_trait]
impl RemoteGenerator for ChatCompletionClient {
    fn name(&self) -> &str {
        "chat-completion"
    }

    #[instrument(skip(self), fields(model = %self.config.model))]
    async fn generate(&self) -> Result<String, GenerationError> {
        let body = self.request_body();

        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else if e.is_connect() {
                    GenerationError::Network("Connection error - unable to reach the API".to_string())
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status {
                StatusCode::UNAUTHORIZED => GenerationError::Unauthorized,
                StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited,
                _ => GenerationError::Status {
                    code: status.as_u16(),
                    body: error_text,
                },
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let line = extract_line(&raw)?;
        debug!(chars = line.chars().count(), "generation succeeded");
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn config_for(server_url: &str) -> GeneratorConfig {
        GeneratorConfig {
            api_url: format!("{}/v1/chat/completions", server_url),
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn request_body_carries_fixed_prompts() {
        let client = ChatCompletionClient::new(GeneratorConfig::default()).unwrap();
        let body = serde_json::to_value(client.request_body()).unwrap();
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 125);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(client.request().user_prompt, GeneratorConfig::default().user_prompt);
    }

    #[tokio::test]
    async fn posts_with_bearer_token_and_returns_trimmed_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "model": "test-model",
                "max_tokens": 125
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"  Get lost!  "}}]}"#)
            .create_async()
            .await;

        let client = ChatCompletionClient::new(config_for(&server.url())).unwrap();
        let line = client.generate().await.unwrap();

        assert_eq!(line, "Get lost!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn maps_status_codes() {
        let mut server = mockito::Server::new_async().await;
        let _unauthorized = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body("bad key")
            .expect(1)
            .create_async()
            .await;

        let client = ChatCompletionClient::new(config_for(&server.url())).unwrap();
        assert!(matches!(client.generate().await, Err(GenerationError::Unauthorized)));

        let mut server = mockito::Server::new_async().await;
        let _overloaded = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let client = ChatCompletionClient::new(config_for(&server.url())).unwrap();
        match client.generate().await {
            Err(GenerationError::Status { code, body }) => {
                assert_eq!(code, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rate_limit_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let client = ChatCompletionClient::new(config_for(&server.url())).unwrap();
        assert!(matches!(client.generate().await, Err(GenerationError::RateLimited)));
    }

    #[tokio::test]
    async fn shape_mismatch_is_a_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"result":"not a chat completion"}"#)
            .create_async()
            .await;

        let client = ChatCompletionClient::new(config_for(&server.url())).unwrap();
        let err = client.generate().await.unwrap_err();
        assert!(err.is_parse_error());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let config = GeneratorConfig {
            api_url: "http://127.0.0.1:1/v1/chat/completions".to_string(),
            ..GeneratorConfig::default()
        };
        let client = ChatCompletionClient::new(config).unwrap();
        let err = client.generate().await.unwrap_err();
        assert!(matches!(err, GenerationError::Network(_) | GenerationError::Timeout));
    }
}
