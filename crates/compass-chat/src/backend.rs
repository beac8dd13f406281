//! Chat backend contract and clients.
//!
//! Requests always use the canonical field names. Replies are decoded
//! leniently: `reply` and `text` are accepted for `replyText`, and images
//! may be bare URL strings.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use compass_core::config::ChatConfig;
use compass_core::types::{Media, MediaImage, MediaVideo};

use crate::error::ChatError;

/// Outgoing chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_hint: Option<String>,
}

/// Decoded chat reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub reply_text: String,
    pub media: Media,
    pub suggestions: Vec<String>,
}

impl ChatReply {
    pub fn text(reply_text: impl Into<String>) -> Self {
        Self {
            reply_text: reply_text.into(),
            ..Self::default()
        }
    }

    pub fn with_suggestions<S: Into<String>>(
        mut self,
        suggestions: impl IntoIterator<Item = S>,
    ) -> Self {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_image(mut self, url: &str, caption: &str) -> Self {
        self.media.images.push(MediaImage {
            url: url.to_string(),
            caption: caption.to_string(),
        });
        self
    }

    pub fn with_video(mut self, url: &str, title: &str) -> Self {
        self.media.videos.push(MediaVideo {
            url: url.to_string(),
            title: title.to_string(),
        });
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireImage {
    Url(String),
    Full {
        url: String,
        #[serde(default)]
        caption: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireVideo {
    Url(String),
    Full {
        url: String,
        #[serde(default)]
        title: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReply {
    #[serde(default, alias = "reply", alias = "text")]
    reply_text: Option<String>,
    #[serde(default)]
    images: Option<Vec<WireImage>>,
    #[serde(default)]
    videos: Option<Vec<WireVideo>>,
    #[serde(default)]
    suggestions: Option<Vec<String>>,
}

/// Decode a reply body. A missing reply text is a malformed payload.
pub fn decode_reply(body: &str) -> Result<ChatReply, ChatError> {
    let wire: WireReply = serde_json::from_str(body)
        .map_err(|e| ChatError::Transport(format!("malformed reply: {}", e)))?;

    let reply_text = wire
        .reply_text
        .ok_or_else(|| ChatError::Transport("reply text missing".to_string()))?;

    let images = wire
        .images
        .unwrap_or_default()
        .into_iter()
        .map(|image| match image {
            WireImage::Url(url) => MediaImage {
                url,
                caption: String::new(),
            },
            WireImage::Full { url, caption } => MediaImage {
                url,
                caption: caption.unwrap_or_default(),
            },
        })
        .collect();

    let videos = wire
        .videos
        .unwrap_or_default()
        .into_iter()
        .map(|video| match video {
            WireVideo::Url(url) => MediaVideo {
                url,
                title: String::new(),
            },
            WireVideo::Full { url, title } => MediaVideo {
                url,
                title: title.unwrap_or_default(),
            },
        })
        .collect();

    let suggestions = wire
        .suggestions
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(ChatReply {
        reply_text,
        media: Media { images, videos },
        suggestions,
    })
}

/// A chat backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, ChatError>;
}

/// Chat backend reached over HTTP.
pub struct HttpChatBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChatBackend {
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Transport(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
        debug!(endpoint = %self.endpoint, session_id = %request.session_id, "Sending chat request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Chat backend returned an error status");
            return Err(ChatError::Transport(format!("backend returned {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        decode_reply(&body)
    }
}

// =============================================================================
// MockChatBackend
// =============================================================================

/// Scripted chat backend for tests.
///
/// Queued replies are consumed in order; with an empty queue the backend
/// echoes the prompt.
#[derive(Default)]
pub struct MockChatBackend {
    script: Mutex<VecDeque<Result<ChatReply, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl MockChatBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_reply(&self, reply: ChatReply) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(reply));
        }
    }

    pub fn push_failure(&self, reason: &str) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(reason.to_string()));
        }
    }

    /// Fail every request until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChatError::Transport("connection refused".to_string()));
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match scripted {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(reason)) => Err(ChatError::Transport(reason)),
            None => Ok(ChatReply::text(format!("Reply to: {}", request.message))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Request encoding ----

    #[test]
    fn test_request_uses_canonical_names() {
        let request = ChatRequest {
            message: "Hội An".to_string(),
            session_id: Uuid::nil(),
            context_hint: Some("Đà Nẵng".to_string()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["message"], "Hội An");
        assert_eq!(json["sessionId"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["contextHint"], "Đà Nẵng");
    }

    #[test]
    fn test_request_omits_missing_hint() {
        let request = ChatRequest {
            message: "x".to_string(),
            session_id: Uuid::new_v4(),
            context_hint: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("contextHint").is_none());
    }

    // ---- Reply decoding ----

    #[test]
    fn test_decode_full_reply() {
        let body = r#"{
            "replyText": "Hội An is a UNESCO town.",
            "images": [{"url": "https://img/1.jpg", "caption": "Lanterns"}],
            "videos": [{"url": "https://video/1", "title": "Walking tour"}],
            "suggestions": ["Food", "Hotels"]
        }"#;
        let reply = decode_reply(body).unwrap();
        assert_eq!(reply.reply_text, "Hội An is a UNESCO town.");
        assert_eq!(reply.media.images[0].caption, "Lanterns");
        assert_eq!(reply.media.videos[0].title, "Walking tour");
        assert_eq!(reply.suggestions, vec!["Food", "Hotels"]);
    }

    #[test]
    fn test_decode_text_only() {
        let reply = decode_reply(r#"{"replyText": "ok"}"#).unwrap();
        assert!(reply.media.is_empty());
        assert!(reply.suggestions.is_empty());
    }

    #[test]
    fn test_decode_legacy_aliases() {
        let reply = decode_reply(r#"{"reply": "legacy"}"#).unwrap();
        assert_eq!(reply.reply_text, "legacy");

        let reply = decode_reply(r#"{"text": "older"}"#).unwrap();
        assert_eq!(reply.reply_text, "older");
    }

    #[test]
    fn test_decode_bare_image_urls() {
        let body = r#"{"reply": "x", "images": ["https://a.jpg", {"url": "https://b.jpg"}]}"#;
        let reply = decode_reply(body).unwrap();
        assert_eq!(reply.media.images.len(), 2);
        assert_eq!(reply.media.images[0].url, "https://a.jpg");
        assert_eq!(reply.media.images[0].caption, "");
        assert_eq!(reply.media.images[1].url, "https://b.jpg");
    }

    #[test]
    fn test_decode_null_optionals() {
        let body = r#"{"replyText": "x", "images": null, "suggestions": null}"#;
        let reply = decode_reply(body).unwrap();
        assert!(reply.media.images.is_empty());
        assert!(reply.suggestions.is_empty());
    }

    #[test]
    fn test_decode_blank_suggestions_dropped() {
        let body = r#"{"replyText": "x", "suggestions": ["A", "  ", "B"]}"#;
        assert_eq!(decode_reply(body).unwrap().suggestions, vec!["A", "B"]);
    }

    #[test]
    fn test_decode_empty_text_is_valid() {
        assert_eq!(decode_reply(r#"{"replyText": ""}"#).unwrap().reply_text, "");
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            decode_reply("<html>502</html>"),
            Err(ChatError::Transport(_))
        ));
        assert!(matches!(
            decode_reply(r#"{"images": []}"#),
            Err(ChatError::Transport(_))
        ));
    }

    // ---- Mock ----

    #[tokio::test]
    async fn test_mock_script_then_echo() {
        let backend = MockChatBackend::new();
        backend.push_reply(ChatReply::text("first"));
        backend.push_failure("timeout");

        let request = ChatRequest {
            message: "hello".to_string(),
            session_id: Uuid::new_v4(),
            context_hint: None,
        };
        assert_eq!(backend.send(&request).await.unwrap().reply_text, "first");
        assert!(backend.send(&request).await.is_err());
        assert_eq!(
            backend.send(&request).await.unwrap().reply_text,
            "Reply to: hello"
        );
        assert_eq!(backend.calls(), 3);
    }

    #[test]
    fn test_http_backend_from_config() {
        let backend = HttpChatBackend::new(&ChatConfig::default()).unwrap();
        assert_eq!(backend.endpoint, "http://127.0.0.1:10000/chat");
    }
}
