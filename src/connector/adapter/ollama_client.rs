use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tracing::warn;

use crate::application::ChatClient;
use crate::domain::{Attachment, ChatMessage, ChatOptions, DomainError};

/// Hosted Ollama endpoint; local servers are reached via [`OllamaClient::connect_local`].
pub const CLOUD_BASE_URL: &str = "https://ollama.com";
const CHAT_PATH: &str = "/api/chat";
/// Default model for the cloud endpoint.
pub const DEFAULT_MODEL: &str = "gpt-oss:20b-cloud";
const API_KEY_VAR: &str = "OLLAMA_API_KEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Ollama chat API request payload.
#[derive(serde::Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<serde_json::Value>,
}

#[derive(serde::Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

/// Minimal subset of the chat response we care about.
#[derive(Deserialize)]
struct ApiResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// HTTP client for the Ollama chat API (hosted or local).
///
/// Implements [`ChatClient`] so the session stays decoupled from transport
/// and serialization details. Image attachments are read (for paths) and
/// base64-encoded into the user message's `images` array at request time.
#[derive(Debug)]
pub struct OllamaClient {
    client: reqwest::Client,
    api_key: Option<String>,
    url: String,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>, api_key: Option<String>) -> Self {
        let host: String = host.into();
        let url = format!("{}{CHAT_PATH}", host.trim_end_matches('/'));
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key,
            url,
        }
    }

    /// Connect to the hosted endpoint. The bearer key is resolved from the
    /// explicit argument or the `OLLAMA_API_KEY` environment variable;
    /// absence of both is a configuration error raised before any request.
    pub fn connect_cloud(api_key: Option<String>) -> Result<Self, DomainError> {
        let key = match api_key {
            Some(key) => key,
            None => std::env::var(API_KEY_VAR).map_err(|_| {
                DomainError::configuration(format!(
                    "'{API_KEY_VAR}' environment variable not found"
                ))
            })?,
        };
        Ok(Self::new(CLOUD_BASE_URL, Some(key)))
    }

    /// Connect to a local server (e.g. `http://localhost:11434`); no key.
    pub fn connect_local(host: impl Into<String>) -> Self {
        Self::new(host, None)
    }

    fn encode_attachment(attachment: &Attachment) -> Result<String, DomainError> {
        match attachment {
            Attachment::Bytes(bytes) => Ok(BASE64.encode(bytes)),
            Attachment::Path(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    DomainError::transport(format!(
                        "OllamaClient: failed to read attachment {}: {e}",
                        path.display()
                    ))
                })?;
                Ok(BASE64.encode(bytes))
            }
        }
    }

    fn options_payload(options: &ChatOptions) -> Option<serde_json::Value> {
        if options.is_empty() {
            None
        } else {
            serde_json::to_value(options).ok()
        }
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, DomainError> {
        let mut api_messages = Vec::with_capacity(messages.len());
        for message in messages {
            let images = match message.attachment() {
                Some(attachment) => Some(vec![Self::encode_attachment(attachment)?]),
                None => None,
            };
            api_messages.push(ApiMessage {
                role: message.role().as_str(),
                content: message.content(),
                images,
            });
        }

        let request = ApiRequest {
            model,
            messages: api_messages,
            stream: false,
            options: Self::options_payload(options),
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DomainError::transport(format!("OllamaClient: request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("OllamaClient: API returned {status}: {body}");
            return Err(DomainError::transport(format!(
                "OllamaClient: API returned {status}"
            )));
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            DomainError::transport(format!(
                "OllamaClient: failed to parse response envelope: {e}"
            ))
        })?;

        Ok(api_response.message.content)
    }
}
