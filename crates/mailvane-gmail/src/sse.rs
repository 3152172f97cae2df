//! Server-sent-events client for the live update channel.
//!
//! The update endpoint pushes one-way frames: a `connected` greeting on
//! open, then `email_update` frames carrying the mailbox change-stream
//! cursor and, when known, the id of the message that changed.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

/// A decoded frame from the update stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The channel is open.
    Connected,
    /// Something changed in the mailbox.
    Update {
        /// Change-stream cursor observed by the notifier, if it had one.
        cursor: Option<String>,
        /// Id of the message that triggered the notification, if known.
        message_id: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    history_id: Option<String>,
    message_id: Option<String>,
}

/// Reader for the one-way SSE update channel.
#[derive(Debug)]
pub struct UpdateStreamClient {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
    response: Option<reqwest::Response>,
    buffer: String,
}

impl UpdateStreamClient {
    /// Creates a reader for the given endpoint.
    ///
    /// No overall request timeout is set; the stream is expected to stay
    /// open indefinitely. Connection establishment is still bounded.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            token: None,
            response: None,
            buffer: String::new(),
        })
    }

    /// Attaches a bearer token sent when opening the channel.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Opens the channel. Any previously open response is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable or answers with a
    /// non-success status.
    pub async fn connect(&mut self) -> Result<()> {
        self.response = None;
        self.buffer.clear();

        let mut request = self
            .http
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::AuthExpired);
        }
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                message: "update stream rejected".to_string(),
            });
        }

        self.response = Some(response);
        Ok(())
    }

    /// Waits for the next decoded frame.
    ///
    /// Frames that are not valid JSON or have an unknown type are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamClosed`] when the server ends the stream and
    /// a transport error if the connection drops.
    pub async fn next_event(&mut self) -> Result<StreamEvent> {
        loop {
            while let Some(data) = take_frame(&mut self.buffer) {
                match parse_frame(&data) {
                    Some(event) => return Ok(event),
                    None => debug!(%data, "skipping unrecognized stream frame"),
                }
            }

            let response = self.response.as_mut().ok_or(Error::StreamNotConnected)?;
            match response.chunk().await? {
                Some(bytes) => self.buffer.push_str(&String::from_utf8_lossy(&bytes)),
                None => {
                    self.response = None;
                    return Err(Error::StreamClosed);
                }
            }
        }
    }
}

/// Pops one complete SSE frame (terminated by a blank line) off the
/// buffer and returns its joined `data:` payload.
fn take_frame(buffer: &mut String) -> Option<String> {
    let (end, separator_len) = match (buffer.find("\r\n\r\n"), buffer.find("\n\n")) {
        (Some(crlf), Some(lf)) if crlf < lf => (crlf, 4),
        (Some(crlf), None) => (crlf, 4),
        (_, Some(lf)) => (lf, 2),
        (None, None) => return None,
    };
    let frame: String = buffer.drain(..end + separator_len).collect();

    let mut data = String::new();
    for line in frame.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(payload) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(payload.trim_start());
        }
    }

    if data.is_empty() { None } else { Some(data) }
}

/// Decodes one frame payload, or `None` when it should be skipped.
fn parse_frame(data: &str) -> Option<StreamEvent> {
    let wire: WireEvent = serde_json::from_str(data).ok()?;
    match wire.kind.as_str() {
        "connected" => Some(StreamEvent::Connected),
        "email_update" => Some(StreamEvent::Update {
            cursor: wire.history_id,
            message_id: wire.message_id,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_frames_off_the_buffer_in_order() {
        let mut buffer = String::from(
            "data: {\"type\":\"connected\"}\n\ndata: {\"type\":\"email_update\",\"historyId\":\"42\"}\n\npartial",
        );
        assert_eq!(
            take_frame(&mut buffer).as_deref(),
            Some(r#"{"type":"connected"}"#)
        );
        assert_eq!(
            take_frame(&mut buffer).as_deref(),
            Some(r#"{"type":"email_update","historyId":"42"}"#)
        );
        assert_eq!(take_frame(&mut buffer), None);
        assert_eq!(buffer, "partial");
    }

    #[test]
    fn handles_crlf_delimited_frames() {
        let mut buffer = String::from("data: {\"type\":\"connected\"}\r\n\r\nrest");
        let frame = take_frame(&mut buffer);
        assert_eq!(frame.as_deref(), Some(r#"{"type":"connected"}"#));
        assert_eq!(buffer, "rest");
    }

    #[test]
    fn parses_connected_and_update_frames() {
        assert_eq!(
            parse_frame(r#"{"type":"connected","timestamp":1}"#),
            Some(StreamEvent::Connected)
        );
        assert_eq!(
            parse_frame(r#"{"type":"email_update","historyId":"7","messageId":"m1"}"#),
            Some(StreamEvent::Update {
                cursor: Some("7".to_string()),
                message_id: Some("m1".to_string()),
            })
        );
    }

    #[test]
    fn skips_unknown_and_malformed_frames() {
        assert_eq!(parse_frame(r#"{"type":"heartbeat"}"#), None);
        assert_eq!(parse_frame("not json"), None);
    }
}
