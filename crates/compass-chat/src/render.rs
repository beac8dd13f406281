//! Conversation rendering.
//!
//! Pure transformation from a `ChatMessage` to a `DisplayUnit`. Every
//! clickable affordance carries a typed `UiAction` instead of a callback.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use compass_core::types::{ChatMessage, MessageStatus, Role};

/// Default cap on gallery images per message.
pub const DEFAULT_MAX_GALLERY_IMAGES: usize = 6;

/// Action triggered by a rendered affordance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UiAction {
    SuggestionClicked { text: String },
    EnlargeImage { url: String, caption: String },
    OpenVideo { url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub url: String,
    pub caption: String,
    pub loading: String,
    pub action: UiAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoLink {
    pub url: String,
    pub title: String,
    pub action: UiAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionButton {
    pub label: String,
    pub action: UiAction,
}

/// UI-ready form of one conversation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayUnit {
    pub message_id: Uuid,
    pub role: Role,
    pub css_class: String,
    /// Escaped bubble text with `<br>` line breaks.
    pub text_html: String,
    pub gallery: Vec<GalleryImage>,
    pub videos: Vec<VideoLink>,
    pub suggestions: Vec<SuggestionButton>,
    pub pending: bool,
}

impl DisplayUnit {
    /// Full markup for the bubble and its attachments.
    pub fn to_html(&self) -> String {
        let mut html = format!(
            "<div class=\"{}\" data-id=\"{}\"><div class=\"text\">{}</div>",
            self.css_class, self.message_id, self.text_html
        );

        if !self.gallery.is_empty() {
            html.push_str("<div class=\"gallery\">");
            for image in &self.gallery {
                html.push_str(&format!(
                    "<img src=\"{}\" alt=\"{}\" loading=\"{}\" data-action=\"enlarge\">",
                    escape_html(&image.url),
                    escape_html(&image.caption),
                    image.loading
                ));
            }
            html.push_str("</div>");
        }

        if !self.videos.is_empty() {
            html.push_str("<ul class=\"videos\">");
            for video in &self.videos {
                html.push_str(&format!(
                    "<li><a href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a></li>",
                    escape_html(&video.url),
                    escape_html(&video.title)
                ));
            }
            html.push_str("</ul>");
        }

        if !self.suggestions.is_empty() {
            html.push_str("<div class=\"suggestions\">");
            for button in &self.suggestions {
                html.push_str(&format!(
                    "<button class=\"suggestion\" data-text=\"{0}\">{0}</button>",
                    escape_html(&button.label)
                ));
            }
            html.push_str("</div>");
        }

        html.push_str("</div>");
        html
    }
}

/// Escape text for safe inclusion in HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Only http(s) media is rendered.
pub fn is_http_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn text_to_html(text: &str) -> String {
    escape_html(text)
        .replace("\r\n", "\n")
        .replace('\n', "<br>")
}

/// Renders messages into display units.
#[derive(Debug, Clone)]
pub struct ConversationRenderer {
    max_gallery_images: usize,
}

impl Default for ConversationRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_GALLERY_IMAGES)
    }
}

impl ConversationRenderer {
    pub fn new(max_gallery_images: usize) -> Self {
        Self { max_gallery_images }
    }

    pub fn render(&self, message: &ChatMessage) -> DisplayUnit {
        let css_class = match (message.role, message.status) {
            (Role::User, _) => "bubble user",
            (Role::Assistant, MessageStatus::Pending) => "bubble assistant typing",
            (Role::Assistant, MessageStatus::Fallback) => "bubble assistant fallback",
            (Role::Assistant, MessageStatus::Delivered) => "bubble assistant",
        };

        let gallery = message
            .media
            .images
            .iter()
            .filter(|image| is_http_url(&image.url))
            .take(self.max_gallery_images)
            .map(|image| GalleryImage {
                url: image.url.clone(),
                caption: image.caption.clone(),
                loading: "lazy".to_string(),
                action: UiAction::EnlargeImage {
                    url: image.url.clone(),
                    caption: image.caption.clone(),
                },
            })
            .collect();

        let videos = message
            .media
            .videos
            .iter()
            .filter(|video| is_http_url(&video.url))
            .map(|video| VideoLink {
                url: video.url.clone(),
                title: if video.title.trim().is_empty() {
                    video.url.clone()
                } else {
                    video.title.clone()
                },
                action: UiAction::OpenVideo {
                    url: video.url.clone(),
                },
            })
            .collect();

        let suggestions = message
            .suggestions
            .iter()
            .map(|text| SuggestionButton {
                label: text.clone(),
                action: UiAction::SuggestionClicked { text: text.clone() },
            })
            .collect();

        DisplayUnit {
            message_id: message.id,
            role: message.role,
            css_class: css_class.to_string(),
            text_html: text_to_html(&message.text),
            gallery,
            videos,
            suggestions,
            pending: message.is_pending(),
        }
    }

    pub fn render_all(&self, messages: &[ChatMessage]) -> Vec<DisplayUnit> {
        messages.iter().map(|m| self.render(m)).collect()
    }
}

// =============================================================================
// Image modal
// =============================================================================

/// Element of the modal that received a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalTarget {
    CloseControl,
    Backdrop,
    Image,
    Caption,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalInput {
    Click(ModalTarget),
    Key(String),
}

/// The single shared enlarged-image view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageModal {
    url: Option<String>,
    caption: String,
}

impl ImageModal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show an image, replacing any image already shown.
    pub fn open(&mut self, url: &str, caption: &str) {
        self.url = Some(url.to_string());
        self.caption = caption.to_string();
    }

    pub fn is_open(&self) -> bool {
        self.url.is_some()
    }

    pub fn current(&self) -> Option<(&str, &str)> {
        self.url.as_deref().map(|url| (url, self.caption.as_str()))
    }

    /// Apply an input. Returns `true` if the modal closed.
    pub fn handle(&mut self, input: &ModalInput) -> bool {
        if !self.is_open() {
            return false;
        }
        let closes = match input {
            ModalInput::Click(target) => {
                matches!(target, ModalTarget::CloseControl | ModalTarget::Backdrop)
            }
            ModalInput::Key(key) => key == "Escape",
        };
        if closes {
            self.url = None;
            self.caption.clear();
        }
        closes
    }
}
