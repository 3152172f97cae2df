//! Wire types for the Gmail REST API.
//!
//! These map one-to-one onto the JSON bodies Gmail returns. Conversion
//! into domain types happens in the consumer; this crate only decodes.

use serde::{Deserialize, Serialize};

/// A bare message reference returned by `messages.list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// Opaque message id.
    pub id: String,
    /// Thread the message belongs to.
    pub thread_id: String,
}

/// Response of `messages.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    /// Message references for this page. Absent when the result is empty.
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    /// Cursor for the next page, if any.
    pub next_page_token: Option<String>,
    /// Server-side estimate of the total result size.
    #[serde(default)]
    pub result_size_estimate: u32,
}

/// A single `name: value` header from a metadata fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    /// Header name, e.g. `Subject`.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// Payload section of a metadata-format message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Payload {
    /// Requested metadata headers.
    #[serde(default)]
    pub headers: Vec<Header>,
}

/// Response of `messages.get` with `format=metadata`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// Opaque message id.
    pub id: String,
    /// Thread the message belongs to.
    pub thread_id: String,
    /// Preview text.
    #[serde(default)]
    pub snippet: String,
    /// Labels currently applied to the message.
    #[serde(default)]
    pub label_ids: Vec<String>,
    /// Server-assigned ordering key (epoch millis as a string).
    #[serde(default)]
    pub internal_date: String,
    /// Header container.
    #[serde(default)]
    pub payload: Payload,
}

impl MessageMetadata {
    /// Looks up a metadata header by name (case-sensitive, as served).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }
}

/// A message added to the mailbox, as reported by the history endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedMessage {
    /// Opaque message id.
    pub id: String,
    /// Thread the message belongs to.
    pub thread_id: String,
    /// Labels on the message at the time of the change.
    #[serde(default)]
    pub label_ids: Vec<String>,
}

/// Wrapper around an added message in a history item.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageAdded {
    /// The added message.
    pub message: AddedMessage,
}

/// One entry in the mailbox change stream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    /// Messages added by this change, if any.
    #[serde(default)]
    pub messages_added: Vec<MessageAdded>,
}

/// Response of `history.list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryList {
    /// Change entries since the requested start cursor.
    #[serde(default)]
    pub history: Vec<HistoryItem>,
    /// The cursor as of this response.
    pub history_id: String,
}

/// Response of `getProfile`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Address of the authenticated mailbox.
    #[serde(default)]
    pub email_address: String,
    /// Current change-stream cursor for the mailbox.
    pub history_id: String,
}

/// Request body of `users.watch`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchRequest {
    /// Pub/Sub topic that receives the notifications.
    pub topic_name: String,
    /// Labels the watch is restricted to.
    pub label_ids: Vec<String>,
    /// Whether `label_ids` is an include or exclude filter.
    pub label_filter_behavior: String,
}

impl WatchRequest {
    /// Builds the standard inbox-only watch request for a topic.
    #[must_use]
    pub fn inbox(topic_name: impl Into<String>) -> Self {
        Self {
            topic_name: topic_name.into(),
            label_ids: vec!["INBOX".to_string()],
            label_filter_behavior: "INCLUDE".to_string(),
        }
    }
}

/// Response of `users.watch`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    /// Change-stream cursor at the moment the watch was registered.
    pub history_id: String,
    /// Expiration of the watch, epoch millis as a string.
    pub expiration: String,
}

/// Request body of `messages.modify`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModifyRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_label_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_label_ids: Vec<String>,
}
