//! Conversation export.
//!
//! A `DocumentExporter` turns the delivered part of a conversation into a
//! downloadable document. Failures are recoverable and may be retried.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use compass_core::config::ExportConfig;
use compass_core::error::CompassError;
use compass_core::types::{ChatMessage, Role};

/// Errors raised while exporting a conversation.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export failed: {0}")]
    ExportFailure(String),
}

impl From<ExportError> for CompassError {
    fn from(err: ExportError) -> Self {
        CompassError::Export(err.to_string())
    }
}

/// A rendered document ready for download.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

#[async_trait]
pub trait DocumentExporter: Send + Sync {
    async fn export(&self, messages: &[ChatMessage]) -> Result<ExportedDocument, ExportError>;
}

/// Messages that belong in an export, in order. Placeholders are dropped.
fn exportable(messages: &[ChatMessage]) -> Vec<&ChatMessage> {
    messages.iter().filter(|m| !m.is_pending()).collect()
}

// =============================================================================
// HTTP exporter
// =============================================================================

#[derive(Serialize)]
struct ExportRequest<'a> {
    messages: Vec<ExportLine<'a>>,
}

#[derive(Serialize)]
struct ExportLine<'a> {
    role: &'a str,
    text: &'a str,
}

/// Extract the filename from a `Content-Disposition` header value.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').trim().to_string())
        .filter(|name| !name.is_empty())
}

/// The HTTP renderer when an endpoint is configured, local transcripts
/// otherwise.
pub fn exporter_from_config(
    config: &ExportConfig,
) -> Result<Arc<dyn DocumentExporter>, ExportError> {
    if config.endpoint.trim().is_empty() {
        info!("No export endpoint configured, using local transcripts");
        return Ok(Arc::new(TranscriptExporter::default()));
    }
    info!(endpoint = %config.endpoint, "Using export renderer");
    Ok(Arc::new(HttpDocumentExporter::new(config)?))
}

/// Exporter backed by an external document renderer.
pub struct HttpDocumentExporter {
    client: reqwest::Client,
    endpoint: String,
    default_filename: String,
}

impl HttpDocumentExporter {
    pub fn new(config: &ExportConfig) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExportError::ExportFailure(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            default_filename: config.default_filename.clone(),
        })
    }
}

#[async_trait]
impl DocumentExporter for HttpDocumentExporter {
    async fn export(&self, messages: &[ChatMessage]) -> Result<ExportedDocument, ExportError> {
        let body = ExportRequest {
            messages: exportable(messages)
                .into_iter()
                .map(|m| ExportLine {
                    role: m.role.as_str(),
                    text: &m.text,
                })
                .collect(),
        };
        debug!(endpoint = %self.endpoint, count = body.messages.len(), "Requesting export");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Export renderer unreachable");
                ExportError::ExportFailure(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Export renderer rejected request");
            return Err(ExportError::ExportFailure(format!(
                "renderer returned {}",
                status
            )));
        }

        let headers = response.headers();
        let filename = headers
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| self.default_filename.clone());
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/pdf")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExportError::ExportFailure(e.to_string()))?
            .to_vec();

        info!(filename = %filename, size = bytes.len(), "Conversation exported");
        Ok(ExportedDocument {
            bytes,
            filename,
            content_type,
        })
    }
}

// =============================================================================
// Local transcript exporter
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct Transcript {
    exported_at: DateTime<Utc>,
    messages: Vec<ChatMessage>,
}

/// Exporter that renders a JSON transcript locally.
///
/// The transcript can be read back with [`parse_transcript`].
#[derive(Debug, Clone)]
pub struct TranscriptExporter {
    filename: String,
}

impl Default for TranscriptExporter {
    fn default() -> Self {
        Self::new("travel_chat.json")
    }
}

impl TranscriptExporter {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }
}

#[async_trait]
impl DocumentExporter for TranscriptExporter {
    async fn export(&self, messages: &[ChatMessage]) -> Result<ExportedDocument, ExportError> {
        let transcript = Transcript {
            exported_at: Utc::now(),
            messages: exportable(messages).into_iter().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&transcript)
            .map_err(|e| ExportError::ExportFailure(e.to_string()))?;

        info!(count = transcript.messages.len(), "Transcript exported");
        Ok(ExportedDocument {
            bytes,
            filename: self.filename.clone(),
            content_type: "application/json".to_string(),
        })
    }
}

/// Read the messages back out of a transcript produced by
/// [`TranscriptExporter`].
pub fn parse_transcript(bytes: &[u8]) -> Result<Vec<ChatMessage>, ExportError> {
    let transcript: Transcript = serde_json::from_slice(bytes)
        .map_err(|e| ExportError::ExportFailure(format!("invalid transcript: {}", e)))?;
    Ok(transcript.messages)
}

// =============================================================================
// MockDocumentExporter
// =============================================================================

/// Exporter for tests. Produces a plain-text document, one line per
/// message, or fails on demand.
#[derive(Default)]
pub struct MockDocumentExporter {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockDocumentExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentExporter for MockDocumentExporter {
    async fn export(&self, messages: &[ChatMessage]) -> Result<ExportedDocument, ExportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ExportError::ExportFailure("renderer unavailable".to_string()));
        }

        let text = exportable(messages)
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                format!("{}: {}", speaker, m.text)
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ExportedDocument {
            bytes: text.into_bytes(),
            filename: "travel_chat.txt".to_string(),
            content_type: "text/plain".to_string(),
        })
    }
}
