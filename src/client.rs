use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::settings::Settings;
use crate::sse::process_sse;
use crate::types::{ChatMessage, ChatRequest, StreamEvent};

/// Time allowed to establish a connection.  Streaming replies have no overall deadline.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const COMPLETIONS_PATH: &str = "chat/completions";

/// A stream of completion events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Something that can stream a chat completion.
///
/// The settings are passed on every call so changes made in the settings menu apply to the next
/// request without rebuilding the backend.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Submit `messages` and stream the reply.
    async fn stream_chat(&self, settings: &Settings, messages: Vec<ChatMessage>)
    -> Result<EventStream>;
}

/// Client for OpenAI-compatible chat completion endpoints.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: ReqwestClient,
}

impl CompletionClient {
    /// Create a new client.
    pub fn new() -> Result<Self> {
        let client = ReqwestClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;
        Ok(Self { client })
    }

    /// The completions endpoint under `base_url`.
    pub fn completions_url(base_url: &str) -> Result<url::Url> {
        let base = format!("{}/", base_url.trim().trim_end_matches('/'));
        let base = url::Url::parse(&base)
            .map_err(|e| Error::url(format!("Invalid base URL '{base_url}': {e}"), Some(e)))?;
        base.join(COMPLETIONS_PATH)
            .map_err(|e| Error::url(format!("Invalid base URL '{base_url}': {e}"), Some(e)))
    }

    /// Create the headers for a streaming request.
    fn headers(api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let api_key = api_key.trim();
        if !api_key.is_empty() {
            let mut value = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                Error::validation(
                    format!("API key contains invalid characters: {e}"),
                    Some("api_key".to_string()),
                )
            })?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
            param: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error);
        let error_type = detail.as_ref().and_then(|e| e.error_type.clone());
        let error_param = detail.as_ref().and_then(|e| e.param.clone());
        let error_message = detail
            .and_then(|e| e.message)
            .unwrap_or_else(|| error_body.clone());

        match status_code {
            400 => Error::bad_request(error_message, error_param),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message, retry_after),
            _ => Error::api(status_code, error_type, error_message),
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for CompletionClient {
    async fn stream_chat(
        &self,
        settings: &Settings,
        messages: Vec<ChatMessage>,
    ) -> Result<EventStream> {
        let url = Self::completions_url(&settings.base_url)?;
        let request = ChatRequest::streaming(
            settings.model.clone(),
            messages,
            settings.temperature,
            settings.max_tokens,
        );
        debug!(%url, model = %request.model, messages = request.messages.len(), "sending completion request");
        CLIENT_REQUESTS.click();

        let response = self
            .client
            .post(url)
            .headers(Self::headers(&settings.api_key)?)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(e.to_string())
                } else if e.is_connect() {
                    Error::connection(e.to_string(), Some(Box::new(e)))
                } else {
                    Error::http_client(e.to_string(), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            warn!(error = %err, "completion request rejected");
            return Err(err);
        }

        Ok(Box::pin(process_sse(response.bytes_stream())))
    }
}
