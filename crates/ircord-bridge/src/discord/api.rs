//! Discord REST API client.
//!
//! [`DiscordApi`] is the seam the relay sends through; [`DiscordApiClient`]
//! implements it over HTTPS for the three calls the bridge needs:
//! creating messages (optionally as replies), deleting messages and
//! triggering the typing indicator.

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, warn};

use ircord_types::ChannelError;

use super::events::RateLimitInfo;

/// Base URL for the Discord REST API v10.
const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Outbound Discord operations used by the relay.
#[async_trait]
pub trait DiscordApi: Send + Sync {
    /// Post `content` to `channel_id`, threaded under `reply_to` when given.
    /// Returns the new message id.
    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<String, ChannelError>;

    async fn delete_message(&self, channel_id: &str, message_id: &str)
    -> Result<(), ChannelError>;

    async fn trigger_typing(&self, channel_id: &str) -> Result<(), ChannelError>;
}

/// Response from creating a message.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct DiscordMessage {
    /// Unique message ID.
    pub id: String,
}

/// Body of `POST /channels/{id}/messages`.
#[derive(Debug, serde::Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_reference: Option<ReplyReference<'a>>,
    allowed_mentions: AllowedMentions,
}

#[derive(Debug, serde::Serialize)]
struct ReplyReference<'a> {
    message_id: &'a str,
    fail_if_not_exists: bool,
}

/// Mentions resolved from IRC ping users and roles; `@everyone` stays inert.
#[derive(Debug, serde::Serialize)]
struct AllowedMentions {
    parse: [&'static str; 2],
    replied_user: bool,
}

impl Default for AllowedMentions {
    fn default() -> Self {
        Self {
            parse: ["users", "roles"],
            replied_user: true,
        }
    }
}

/// HTTP client for the Discord REST API.
///
/// Wraps a [`reqwest::Client`] with Bot token authentication. Rate limit
/// headers are logged, not enforced.
pub struct DiscordApiClient {
    /// Shared HTTP client.
    http: Client,
    /// Bot token for API authorization.
    token: String,
    /// Base URL for API calls.
    base_url: String,
}

impl DiscordApiClient {
    /// Create a new client with the given bot token.
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, DISCORD_API_BASE.to_owned())
    }

    /// Create a client pointing at a custom base URL.
    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            http: Client::new(),
            token,
            base_url,
        }
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Turn a non-success status into [`ChannelError::SendFailed`].
    async fn check(resp: Response) -> Result<Response, ChannelError> {
        let rate_limit = RateLimitInfo::from_headers(resp.headers());
        if rate_limit.is_limited() {
            warn!(
                wait_ms = rate_limit.retry_after_ms().unwrap_or_default(),
                bucket = rate_limit.bucket.as_deref().unwrap_or_default(),
                "Discord rate limit reached"
            );
        }

        let status = resp.status();
        if !status.is_success() {
            let err_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".into());
            return Err(ChannelError::SendFailed(format!(
                "Discord API returned {status}: {err_body}"
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl DiscordApi for DiscordApiClient {
    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<String, ChannelError> {
        let url = format!("{}/channels/{channel_id}/messages", self.base_url);
        let body = CreateMessage {
            content,
            message_reference: reply_to.map(|message_id| ReplyReference {
                message_id,
                fail_if_not_exists: false,
            }),
            allowed_mentions: AllowedMentions::default(),
        };

        debug!(channel_id = %channel_id, reply = reply_to.is_some(), "creating message");

        let resp = self
            .http
            .post(&url)
            .header("Authorization", self.auth())
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        let msg: DiscordMessage = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        Ok(msg.id)
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), ChannelError> {
        let url = format!(
            "{}/channels/{channel_id}/messages/{message_id}",
            self.base_url
        );

        debug!(
            channel_id = %channel_id,
            message_id = %message_id,
            "deleting message"
        );

        let resp = self
            .http
            .delete(&url)
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        Self::check(resp).await.map(drop)
    }

    async fn trigger_typing(&self, channel_id: &str) -> Result<(), ChannelError> {
        let url = format!("{}/channels/{channel_id}/typing", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header("Authorization", self.auth())
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        Self::check(resp).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url() {
        let client = DiscordApiClient::new("test-token".into());
        assert_eq!(client.base_url, "https://discord.com/api/v10");
    }

    #[test]
    fn custom_base_url() {
        let client =
            DiscordApiClient::with_base_url("test-token".into(), "http://localhost:9999".into());
        assert_eq!(client.base_url, "http://localhost:9999");
    }

    #[test]
    fn reply_body_carries_reference() {
        let body = CreateMessage {
            content: "hi",
            message_reference: Some(ReplyReference {
                message_id: "42",
                fail_if_not_exists: false,
            }),
            allowed_mentions: AllowedMentions::default(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["message_reference"]["message_id"], "42");
        assert_eq!(json["message_reference"]["fail_if_not_exists"], false);
        assert_eq!(json["allowed_mentions"]["parse"], serde_json::json!(["users", "roles"]));
    }

    #[test]
    fn plain_body_omits_reference() {
        let body = CreateMessage {
            content: "hi",
            message_reference: None,
            allowed_mentions: AllowedMentions::default(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("message_reference").is_none());
    }

    #[tokio::test]
    async fn unreachable_server_is_send_failure() {
        let client =
            DiscordApiClient::with_base_url("test-token".into(), "http://127.0.0.1:1".into());
        let err = client.trigger_typing("1").await.unwrap_err();
        assert!(matches!(err, ChannelError::SendFailed(_)));
    }
}
