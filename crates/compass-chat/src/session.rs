//! Chat session: conversation history and the pending-reply lifecycle.
//!
//! A turn appends the user message, shows a pending placeholder, and
//! replaces that placeholder with exactly one real or fallback reply.
//! Only one turn may be outstanding at a time.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use compass_core::config::{fill_template, CompassConfig, PromptConfig};
use compass_core::types::{ChatMessage, MessageStatus, Role};
use compass_geo::PlaceContextMemory;
use compass_storage::HistoryRepository;

use crate::backend::{ChatBackend, ChatReply, ChatRequest};
use crate::error::ChatError;

/// Capacity of the session event channel.
const EVENT_CAPACITY: usize = 256;

/// History mutation published to observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    MessageAppended {
        message: ChatMessage,
    },
    PlaceholderShown {
        message: ChatMessage,
    },
    PlaceholderResolved {
        placeholder_id: Uuid,
        message: ChatMessage,
    },
    HistoryCleared,
    Notice {
        text: String,
    },
    /// A fresh session replaced the previous one.
    SessionStarted {
        session_id: Uuid,
    },
}

/// A turn whose reply is outstanding.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTurn {
    pub placeholder_id: Uuid,
    pub request: ChatRequest,
}

impl PendingTurn {
    /// What the reply texts refer to: the hint when present, else the prompt.
    fn subject(&self) -> &str {
        self.request
            .context_hint
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(&self.request.message)
    }
}

pub struct ChatSession {
    session_id: Uuid,
    backend: Arc<dyn ChatBackend>,
    history: Vec<ChatMessage>,
    memory: PlaceContextMemory,
    store: Option<HistoryRepository>,
    prompts: PromptConfig,
    max_message_length: usize,
    events: broadcast::Sender<SessionEvent>,
    lookups: usize,
}

impl ChatSession {
    /// Create a session with a fresh id and default settings.
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let defaults = CompassConfig::default();
        Self {
            session_id: Uuid::new_v4(),
            backend,
            history: Vec::new(),
            memory: PlaceContextMemory::new(defaults.map.context_places),
            store: None,
            prompts: defaults.prompts,
            max_message_length: defaults.chat.max_message_length,
            events,
            lookups: 0,
        }
    }

    /// Apply chat limits, reply texts, and the context window size.
    pub fn with_config(mut self, config: &CompassConfig) -> Self {
        self.prompts = config.prompts.clone();
        self.max_message_length = config.chat.max_message_length;
        self.memory = PlaceContextMemory::new(config.map.context_places);
        self
    }

    /// Persist delivered messages through `store`. History already in the
    /// session replaces whatever the store holds for it.
    pub fn with_store(mut self, store: HistoryRepository) -> Self {
        let registered = if self.history.is_empty() {
            store.open_session(self.session_id)
        } else {
            store.save(self.session_id, &self.history)
        };
        if let Err(e) = registered {
            warn!(session_id = %self.session_id, error = %e, "Failed to register session");
        }
        self.store = Some(store);
        self
    }

    /// Publish events on an existing channel.
    pub fn with_events(mut self, events: broadcast::Sender<SessionEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The backend this session talks to.
    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        self.backend.clone()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn memory(&self) -> &PlaceContextMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut PlaceContextMemory {
        &mut self.memory
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Number of user turns since the session started or was cleared.
    pub fn lookup_count(&self) -> usize {
        self.lookups
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.history.iter().any(ChatMessage::is_pending)
    }

    /// Suggestions of the latest reply, if it is the last entry.
    pub fn active_suggestions(&self) -> &[String] {
        match self.history.last() {
            Some(m) if m.role == Role::Assistant && !m.is_pending() => &m.suggestions,
            _ => &[],
        }
    }

    /// Publish a non-blocking notice. History is not touched.
    pub fn notice(&self, text: impl Into<String>) {
        let text = text.into();
        info!(notice = %text, "Session notice");
        self.publish(SessionEvent::Notice { text });
    }

    /// Validate a prompt, append it, and show the pending placeholder.
    pub fn begin_turn(
        &mut self,
        prompt: &str,
        context_hint: Option<&str>,
    ) -> Result<PendingTurn, ChatError> {
        if self.is_awaiting_reply() {
            return Err(ChatError::TurnInProgress);
        }
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if prompt.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong(self.max_message_length));
        }

        let user = ChatMessage::user(prompt);
        self.persist(&user);
        self.history.push(user.clone());
        self.lookups += 1;
        self.publish(SessionEvent::MessageAppended { message: user });

        let placeholder = ChatMessage::pending(self.prompts.pending.clone());
        let placeholder_id = placeholder.id;
        self.history.push(placeholder.clone());
        self.publish(SessionEvent::PlaceholderShown {
            message: placeholder,
        });

        debug!(session_id = %self.session_id, placeholder_id = %placeholder_id, "Turn started");
        Ok(PendingTurn {
            placeholder_id,
            request: ChatRequest {
                message: prompt.to_string(),
                session_id: self.session_id,
                context_hint: context_hint
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_string),
            },
        })
    }

    /// Replace the turn's placeholder with the reply or a fallback.
    pub fn resolve_turn(
        &mut self,
        turn: PendingTurn,
        outcome: Result<ChatReply, ChatError>,
    ) -> Result<ChatMessage, ChatError> {
        let index = self
            .history
            .iter()
            .position(|m| m.id == turn.placeholder_id && m.is_pending())
            .ok_or(ChatError::NoPendingTurn)?;

        let message = match outcome {
            Ok(reply) => self.reply_message(&turn, reply),
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Chat backend failed, using fallback reply");
                self.fallback_message(&turn)
            }
        };

        self.history[index] = message.clone();
        self.persist(&message);
        self.publish(SessionEvent::PlaceholderResolved {
            placeholder_id: turn.placeholder_id,
            message: message.clone(),
        });
        debug!(
            session_id = %self.session_id,
            status = ?message.status,
            "Turn resolved"
        );
        Ok(message)
    }

    /// Send a prompt and wait for the reply.
    ///
    /// Transport failures produce a fallback reply, never an error.
    pub async fn send(
        &mut self,
        prompt: &str,
        context_hint: Option<&str>,
    ) -> Result<ChatMessage, ChatError> {
        let turn = self.begin_turn(prompt, context_hint)?;
        let outcome = self.backend.send(&turn.request).await;
        self.resolve_turn(turn, outcome)
    }

    /// A suggestion click is an ordinary send of the suggestion text.
    pub async fn suggestion_clicked(&mut self, text: &str) -> Result<ChatMessage, ChatError> {
        self.send(text, None).await
    }

    /// Empty the conversation, the place memory, and the persisted copy.
    pub fn clear(&mut self) {
        self.history.clear();
        self.memory.clear();
        self.lookups = 0;
        if let Some(store) = &self.store {
            if let Err(e) = store.clear(self.session_id) {
                warn!(session_id = %self.session_id, error = %e, "Failed to clear stored history");
            }
        }
        info!(session_id = %self.session_id, "Conversation cleared");
        self.publish(SessionEvent::HistoryCleared);
    }

    fn reply_message(&self, turn: &PendingTurn, reply: ChatReply) -> ChatMessage {
        let text = if reply.reply_text.trim().is_empty() {
            fill_template(&self.prompts.empty_reply, &[("text", turn.subject())])
        } else {
            reply.reply_text
        };
        ChatMessage::assistant(text)
            .with_media(reply.media)
            .with_suggestions(reply.suggestions)
    }

    fn fallback_message(&self, turn: &PendingTurn) -> ChatMessage {
        let subject = turn.subject();
        ChatMessage::fallback(fill_template(&self.prompts.fallback, &[("text", subject)]))
            .with_suggestions(vec![fill_template(
                &self.prompts.fallback_suggestion,
                &[("text", subject)],
            )])
    }

    fn persist(&self, message: &ChatMessage) {
        if message.status == MessageStatus::Pending {
            return;
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.append(self.session_id, message) {
                warn!(session_id = %self.session_id, error = %e, "Failed to persist message");
            }
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("session_id", &self.session_id)
            .field("messages", &self.history.len())
            .field("lookups", &self.lookups)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use compass_core::types::Coordinate;
    use compass_core::types::Place;
    use compass_storage::Database;

    use crate::backend::MockChatBackend;
    use crate::render::{ConversationRenderer, UiAction};

    fn session() -> (ChatSession, Arc<MockChatBackend>) {
        let backend = Arc::new(MockChatBackend::new());
        (ChatSession::new(backend.clone()), backend)
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    // ---- Turn lifecycle ----

    #[tokio::test]
    async fn test_send_appends_user_then_reply() {
        let (mut session, backend) = session();
        backend.push_reply(ChatReply::text("Huế is lovely.").with_suggestions(["Food"]));

        let reply = session.send("Tell me about Huế", Some("Huế")).await.unwrap();

        assert_eq!(reply.text, "Huế is lovely.");
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[0].role, Role::User);
        assert_eq!(session.history()[0].text, "Tell me about Huế");
        assert_eq!(session.history()[1].status, MessageStatus::Delivered);
        assert!(!session.is_awaiting_reply());
        assert_eq!(session.active_suggestions(), ["Food".to_string()]);

        let request = &backend.requests()[0];
        assert_eq!(request.session_id, session.session_id());
        assert_eq!(request.context_hint.as_deref(), Some("Huế"));
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let (mut session, _backend) = session();
        let mut rx = session.subscribe();

        session.send("hello", None).await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], SessionEvent::MessageAppended { .. }));
        let SessionEvent::PlaceholderShown { message: placeholder } = &events[1] else {
            panic!("expected placeholder event");
        };
        assert!(placeholder.is_pending());
        let SessionEvent::PlaceholderResolved { placeholder_id, .. } = &events[2] else {
            panic!("expected resolution event");
        };
        assert_eq!(*placeholder_id, placeholder.id);
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_fallback() {
        let (mut session, backend) = session();
        backend.set_failing(true);

        let reply = session
            .send("What is special about the area?", Some("Hội An"))
            .await
            .unwrap();

        assert_eq!(reply.status, MessageStatus::Fallback);
        assert!(reply.text.contains("Hội An"));
        assert!(!reply.text.contains("connection refused"));
        assert_eq!(reply.suggestions, vec!["Show Hội An on the map"]);
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_reply_gets_courtesy_text() {
        let (mut session, backend) = session();
        backend.push_reply(ChatReply::text("   "));

        let reply = session.send("Đà Lạt", None).await.unwrap();
        assert_eq!(reply.status, MessageStatus::Delivered);
        assert!(reply.text.starts_with("Thanks for asking about Đà Lạt"));
    }

    #[test]
    fn test_turn_in_progress_refused() {
        let (mut session, _backend) = session();
        let turn = session.begin_turn("first", None).unwrap();
        assert!(session.is_awaiting_reply());

        let err = session.begin_turn("second", None).unwrap_err();
        assert!(matches!(err, ChatError::TurnInProgress));
        assert_eq!(session.history().len(), 2);

        session
            .resolve_turn(turn, Ok(ChatReply::text("done")))
            .unwrap();
        assert_eq!(
            session.history().iter().filter(|m| m.is_pending()).count(),
            0
        );
        assert!(session.begin_turn("second", None).is_ok());
    }

    #[test]
    fn test_resolve_unknown_turn() {
        let (mut session, _backend) = session();
        let turn = session.begin_turn("q", None).unwrap();
        session.clear();
        let err = session
            .resolve_turn(turn, Ok(ChatReply::text("late")))
            .unwrap_err();
        assert!(matches!(err, ChatError::NoPendingTurn));
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_active_suggestions_cleared_by_new_turn() {
        let (mut session, _backend) = session();
        let turn = session.begin_turn("q", None).unwrap();
        session
            .resolve_turn(turn, Ok(ChatReply::text("a").with_suggestions(["A", "B"])))
            .unwrap();
        assert_eq!(session.active_suggestions().len(), 2);

        session.begin_turn("next", None).unwrap();
        assert!(session.active_suggestions().is_empty());
    }

    // ---- Validation ----

    #[tokio::test]
    async fn test_blank_prompt_rejected() {
        let (mut session, backend) = session();
        let err = session.send("   ", None).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert!(session.history().is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_long_prompt_rejected() {
        let (mut session, _backend) = session();
        let prompt = "á".repeat(2001);
        let err = session.send(&prompt, None).await.unwrap_err();
        assert!(matches!(err, ChatError::MessageTooLong(2000)));
        assert!(session.history().is_empty());

        // Exactly at the limit is accepted; length counts characters.
        let prompt = "á".repeat(2000);
        assert!(session.send(&prompt, None).await.is_ok());
    }

    // ---- Suggestions ----

    #[tokio::test]
    async fn test_suggestion_click_sends_text() {
        let (mut session, backend) = session();
        backend.push_reply(ChatReply::text("Choose").with_suggestions(["A", "B"]));
        let reply = session.send("start", None).await.unwrap();

        let unit = ConversationRenderer::default().render(&reply);
        assert_eq!(unit.suggestions.len(), 2);

        let UiAction::SuggestionClicked { text } = &unit.suggestions[0].action else {
            panic!("expected suggestion action");
        };
        session.suggestion_clicked(text).await.unwrap();

        assert_eq!(session.history().len(), 4);
        assert_eq!(session.history()[2].role, Role::User);
        assert_eq!(session.history()[2].text, "A");
        assert_eq!(backend.requests()[1].message, "A");
        assert_eq!(session.lookup_count(), 2);
    }

    // ---- Clear and persistence ----

    #[tokio::test]
    async fn test_clear_empties_history_memory_and_store() {
        let db = Arc::new(Database::in_memory().unwrap());
        let backend = Arc::new(MockChatBackend::new());
        let mut session =
            ChatSession::new(backend).with_store(HistoryRepository::new(db.clone()));
        let mut rx = session.subscribe();

        session.memory_mut().remember(Place::new(
            "Huế",
            Coordinate::new(16.46, 107.59).unwrap(),
        ));
        session.send("Huế", None).await.unwrap();

        let repo = HistoryRepository::new(db);
        assert_eq!(repo.count(session.session_id()).unwrap(), 2);

        session.clear();
        assert!(session.history().is_empty());
        assert!(session.memory().is_empty());
        assert_eq!(session.lookup_count(), 0);
        assert_eq!(repo.count(session.session_id()).unwrap(), 0);
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, SessionEvent::HistoryCleared)));
    }

    #[tokio::test]
    async fn test_pending_never_persisted() {
        let db = Arc::new(Database::in_memory().unwrap());
        let backend = Arc::new(MockChatBackend::new());
        let mut session =
            ChatSession::new(backend).with_store(HistoryRepository::new(db.clone()));

        session.begin_turn("q", None).unwrap();
        let repo = HistoryRepository::new(db);
        let stored = repo.load(session.session_id()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_store_attached_late_receives_history() {
        let db = Arc::new(Database::in_memory().unwrap());
        let (mut session, _backend) = session();
        session.send("Tell me about Hội An", None).await.unwrap();
        session.begin_turn("And Huế?", None).unwrap();

        let session = session.with_store(HistoryRepository::new(db.clone()));
        let stored = HistoryRepository::new(db).load(session.session_id()).unwrap();
        let texts: Vec<&str> = stored.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Tell me about Hội An", "Reply to: Tell me about Hội An", "And Huế?"]
        );
    }

    #[test]
    fn test_new_sessions_have_distinct_ids() {
        let (a, _) = session();
        let (b, _) = session();
        assert_ne!(a.session_id(), b.session_id());
    }

    #[test]
    fn test_notice_leaves_history() {
        let (session, _backend) = session();
        let mut rx = session.subscribe();
        session.notice("Could not find \"Hoi An\" on the map.");
        assert!(session.history().is_empty());
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [SessionEvent::Notice { .. }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_keeps_single_placeholder() {
        let backend = Arc::new(MockChatBackend::new().with_delay(Duration::from_secs(5)));
        let mut session = ChatSession::new(backend);
        let reply = session.send("slow", None).await.unwrap();
        assert_eq!(reply.text, "Reply to: slow");
        assert!(session.history().iter().all(|m| !m.is_pending()));
    }
}
