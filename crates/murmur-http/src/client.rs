// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST client for message history and message mutations.
//!
//! Every endpoint answers with the same `ApiResponse` envelope; the client
//! unwraps it and maps failures onto [`MurmurError`]. History failures
//! become `HistoryFetchFailure`, everything else `Http`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use murmur_core::types::{ConversationId, HistoryPage, HistoryRequest, Message, MessageId};
use murmur_core::{CredentialProvider, HistoryApi, MurmurError, MutationApi};

/// The chat server's response envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse<T> {
    #[serde(default = "default_success")]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn default_success() -> bool {
    true
}

impl<T> ApiResponse<T> {
    fn failure_text(&self) -> Option<String> {
        self.error.clone().or_else(|| self.message.clone())
    }
}

/// History payloads come either as a page object or as a bare list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryBody {
    Page(HistoryPage),
    List(Vec<Message>),
}

impl From<HistoryBody> for HistoryPage {
    fn from(body: HistoryBody) -> Self {
        match body {
            HistoryBody::Page(page) => page,
            HistoryBody::List(messages) => HistoryPage::with_messages(messages),
        }
    }
}

#[derive(Serialize)]
struct EditBody<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct ReactionBody<'a> {
    emoji: &'a str,
}

/// Failure from one REST call before it is mapped onto [`MurmurError`].
struct CallError {
    status: Option<u16>,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CallError {
    fn into_http(self) -> MurmurError {
        MurmurError::Http {
            status: self.status,
            message: self.message,
            source: self.source,
        }
    }

    fn into_history(self, conversation_id: ConversationId) -> MurmurError {
        let message = match self.status {
            Some(status) => format!("HTTP {status}: {}", self.message),
            None => self.message,
        };
        MurmurError::HistoryFetchFailure {
            conversation_id,
            message,
            source: self.source,
        }
    }
}

/// HTTP client for the chat server's REST API.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Create a client rooted at `base_url` (for example
    /// `http://localhost:8080/api`).
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialProvider>) -> Result<Self, MurmurError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| MurmurError::Config(format!("invalid api_base_url {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(MurmurError::Config(format!(
                "api_base_url {base_url} cannot carry a path"
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("murmur/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MurmurError::Http {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL extended by path segments. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match self.credentials.access_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>, CallError> {
        let response = request.send().await.map_err(|e| CallError {
            status: e.status().map(|s| s.as_u16()),
            message: format!("request failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| CallError {
            status: Some(status.as_u16()),
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(status = %status, bytes = body.len(), "api response received");

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .ok()
                .and_then(|r| r.failure_text())
                .unwrap_or_else(|| status_text(status, &body));
            return Err(CallError {
                status: Some(status.as_u16()),
                message: detail,
                source: None,
            });
        }

        if body.trim().is_empty() {
            return Ok(None);
        }
        let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| CallError {
            status: Some(status.as_u16()),
            message: format!("failed to parse response: {e}"),
            source: Some(Box::new(e)),
        })?;
        if !envelope.success {
            return Err(CallError {
                status: Some(status.as_u16()),
                message: envelope
                    .failure_text()
                    .unwrap_or_else(|| "request was not successful".to_string()),
                source: None,
            });
        }
        Ok(envelope.data)
    }
}

fn status_text(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    }
}

#[async_trait]
impl HistoryApi for RestClient {
    async fn fetch_page(
        &self,
        conversation_id: ConversationId,
        request: HistoryRequest,
    ) -> Result<HistoryPage, MurmurError> {
        let id = conversation_id.to_string();
        let mut url = self.endpoint(&["messages", "conversation", &id]);
        {
            let mut query = url.query_pairs_mut();
            match request {
                HistoryRequest::Page { page, size } => {
                    query
                        .append_pair("page", &page.to_string())
                        .append_pair("size", &size.to_string());
                }
                HistoryRequest::Before { before_id, limit } => {
                    if let Some(before_id) = before_id {
                        query.append_pair("beforeMessageId", &before_id.to_string());
                    }
                    query.append_pair("limit", &limit.to_string());
                }
            }
        }
        debug!(conversation_id = %conversation_id, url = %url, "fetching history page");

        let body: Option<HistoryBody> = self
            .call(self.request(Method::GET, url))
            .await
            .map_err(|e| e.into_history(conversation_id))?;
        Ok(body.map(HistoryPage::from).unwrap_or_default())
    }
}

#[async_trait]
impl MutationApi for RestClient {
    async fn edit_message(&self, message_id: MessageId, content: &str) -> Result<Message, MurmurError> {
        let id = message_id.to_string();
        let request = self
            .request(Method::PUT, self.endpoint(&["messages", &id]))
            .json(&EditBody { content });
        self.call::<Message>(request)
            .await
            .map_err(CallError::into_http)?
            .ok_or_else(|| MurmurError::Http {
                status: None,
                message: format!("edit of message {message_id} returned no message"),
                source: None,
            })
    }

    async fn delete_message(&self, message_id: MessageId) -> Result<(), MurmurError> {
        let id = message_id.to_string();
        let request = self.request(Method::DELETE, self.endpoint(&["messages", &id]));
        self.call::<serde_json::Value>(request)
            .await
            .map_err(CallError::into_http)?;
        Ok(())
    }

    async fn add_reaction(&self, message_id: MessageId, emoji: &str) -> Result<(), MurmurError> {
        let id = message_id.to_string();
        let request = self
            .request(Method::POST, self.endpoint(&["messages", &id, "reactions"]))
            .json(&ReactionBody { emoji });
        self.call::<serde_json::Value>(request)
            .await
            .map_err(CallError::into_http)?;
        Ok(())
    }

    async fn remove_reaction(&self, message_id: MessageId, emoji: &str) -> Result<(), MurmurError> {
        let id = message_id.to_string();
        let request = self.request(
            Method::DELETE,
            self.endpoint(&["messages", &id, "reactions", emoji]),
        );
        self.call::<serde_json::Value>(request)
            .await
            .map_err(CallError::into_http)?;
        Ok(())
    }
}
