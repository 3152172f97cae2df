//! HTTP client for the Gmail REST API.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::types::{
    HistoryList, MessageList, MessageMetadata, ModifyRequest, Profile, WatchRequest, WatchResponse,
};
use crate::{Error, Result};

/// Default API endpoint.
const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Upper bound Gmail accepts for `maxResults`.
const MAX_PAGE_SIZE: u32 = 50;

/// Timeout for list, history, and watch calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for a single message metadata fetch.
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the authenticated user's mailbox (`users/me`).
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct GmailClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GmailClient {
    /// Creates a client against the production Gmail endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(access_token, DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: access_token.into(),
        })
    }

    /// Lists message references matching a query.
    ///
    /// `max_results` is clamped to the API maximum of 50.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token has expired.
    pub async fn list_messages(
        &self,
        query: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<MessageList> {
        let url = format!("{}/users/me/messages", self.base_url);
        let max = max_results.min(MAX_PAGE_SIZE).to_string();
        let mut params = vec![("maxResults", max.as_str()), ("q", query)];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        debug!(query, page_token, "listing messages");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&params)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Fetches a message's metadata (Subject/From/Date headers, labels,
    /// snippet, internal date).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token has expired.
    pub async fn get_message_metadata(&self, message_id: &str) -> Result<MessageMetadata> {
        let url = format!("{}/users/me/messages/{message_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .timeout(METADATA_TIMEOUT)
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "Subject"),
                ("metadataHeaders", "From"),
                ("metadataHeaders", "Date"),
            ])
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Adds and removes labels on a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token has expired.
    pub async fn modify_labels(
        &self,
        message_id: &str,
        add: &[&str],
        remove: &[&str],
    ) -> Result<()> {
        let url = format!("{}/users/me/messages/{message_id}/modify", self.base_url);
        let body = ModifyRequest {
            add_label_ids: add.iter().map(ToString::to_string).collect(),
            remove_label_ids: remove.iter().map(ToString::to_string).collect(),
        };
        debug!(message_id, ?add, ?remove, "modifying labels");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await.map(drop)
    }

    /// Moves a message to the trash.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token has expired.
    pub async fn trash_message(&self, message_id: &str) -> Result<()> {
        self.post_action(message_id, "trash").await
    }

    /// Restores a message from the trash.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token has expired.
    pub async fn untrash_message(&self, message_id: &str) -> Result<()> {
        self.post_action(message_id, "untrash").await
    }

    async fn post_action(&self, message_id: &str, action: &str) -> Result<()> {
        let url = format!(
            "{}/users/me/messages/{message_id}/{action}",
            self.base_url
        );
        let response = self.http.post(&url).bearer_auth(&self.token).send().await?;
        Self::check(response).await.map(drop)
    }

    /// Fetches mailbox changes since a previously observed cursor,
    /// restricted to one label.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the cursor is too old, or
    /// the token has expired.
    pub async fn history_since(&self, start_cursor: &str, label_id: &str) -> Result<HistoryList> {
        let url = format!("{}/users/me/history", self.base_url);
        debug!(start_cursor, label_id, "fetching history delta");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("startHistoryId", start_cursor), ("labelId", label_id)])
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Fetches the mailbox profile, which carries the current
    /// change-stream cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token has expired.
    pub async fn profile(&self) -> Result<Profile> {
        let url = format!("{}/users/me/profile", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .timeout(METADATA_TIMEOUT)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Registers a push watch on the mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token has expired.
    pub async fn watch(&self, request: &WatchRequest) -> Result<WatchResponse> {
        let url = format!("{}/users/me/watch", self.base_url);
        debug!(topic = %request.topic_name, "registering watch");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Stops push notifications for the mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token has expired.
    pub async fn stop_watch(&self) -> Result<()> {
        let url = format!("{}/users/me/stop", self.base_url);
        let response = self.http.post(&url).bearer_auth(&self.token).send().await?;
        Self::check(response).await.map(drop)
    }

    /// Maps a 401 onto [`Error::AuthExpired`] and any other non-success
    /// status onto [`Error::Status`].
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::AuthExpired);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
