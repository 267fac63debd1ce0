//! Per-session conversation store
//!
//! [`ConversationStore`] owns the message list of one session. It appends
//! the user message optimistically, streams the reply through a
//! [`CompletionEngine`], and finalizes exactly one terminal message after
//! the stream ends: the reply, an error, or nothing when aborted.
//!
//! Every mutation is written through to the key-value store and published
//! on the store's [`StateContainer`].

use std::sync::Arc;

use super::state::{ChatPhase, ChatState, StateContainer, SubscriptionId};
use super::title::{derive_title, DEFAULT_TITLE};
use super::{now_millis, Message, Role};
use crate::engine::{ApiMessage, CompletionEngine, CompletionResult};
use crate::error::{PolychatError, Result};
use crate::sessions::SessionRegistry;
use crate::settings::Settings;

/// Id of the transient message shown while a reply streams
pub const STREAMING_MESSAGE_ID: &str = "streaming-msg";

/// Text stored when a completed stream carried no content
pub const EMPTY_REPLY_PLACEHOLDER: &str = "No content received.";

/// How a send, regenerate or edit finished
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// An assistant message was appended
    Completed(Message),
    /// The request failed; an error message was appended
    Failed(Message),
    /// The stream was cancelled; nothing was appended
    Aborted {
        /// Text received before cancellation
        partial: String,
    },
    /// There was no user message to respond to
    NoUserMessage,
}

/// Message history and completion flow for one session
pub struct ConversationStore {
    registry: SessionRegistry,
    settings: Settings,
    engine: Arc<dyn CompletionEngine>,
    session_id: String,
    state: Arc<StateContainer<ChatState>>,
}

impl ConversationStore {
    /// Open the store for an existing session
    ///
    /// # Errors
    ///
    /// Returns `PolychatError::SessionNotFound` for an unknown session, or a
    /// storage error if its history cannot be read.
    pub fn open(
        registry: SessionRegistry,
        settings: Settings,
        engine: Arc<dyn CompletionEngine>,
        session_id: &str,
    ) -> Result<Self> {
        registry.require(session_id)?;
        let messages = registry.messages(session_id)?;
        tracing::debug!(
            "Opened session {} with {} messages",
            session_id,
            messages.len()
        );

        Ok(Self {
            registry,
            settings,
            engine,
            session_id: session_id.to_string(),
            state: Arc::new(StateContainer::new(ChatState {
                messages,
                ..Default::default()
            })),
        })
    }

    /// Session this store belongs to
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Observable state
    pub fn state(&self) -> Arc<StateContainer<ChatState>> {
        Arc::clone(&self.state)
    }

    /// Register a state listener
    pub fn subscribe(
        &self,
        listener: impl Fn(&ChatState) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.state.subscribe(listener)
    }

    /// Persisted history
    pub fn messages(&self) -> Vec<Message> {
        self.state.with(|s| s.messages.clone())
    }

    /// Whether a reply is streaming
    pub fn is_streaming(&self) -> bool {
        self.state.with(|s| s.phase == ChatPhase::Streaming)
    }

    /// History plus the in-flight reply as a transient assistant message
    pub fn displayed_messages(&self) -> Vec<Message> {
        self.state.with(|s| {
            let mut messages = s.messages.clone();
            if !s.streaming_content.is_empty() {
                messages.push(Message {
                    id: STREAMING_MESSAGE_ID.to_string(),
                    role: Role::Assistant,
                    content: s.streaming_content.clone(),
                    timestamp: now_millis(),
                    model: None,
                    usage: None,
                    cost_usd: None,
                });
            }
            messages
        })
    }

    /// System prompt of this session; empty when unset
    pub fn system_prompt(&self) -> Result<String> {
        self.registry.system_prompt(&self.session_id)
    }

    /// Set the system prompt of this session
    pub fn set_system_prompt(&self, prompt: &str) -> Result<()> {
        self.registry.set_system_prompt(&self.session_id, prompt)
    }

    /// Append a user message and stream the reply
    ///
    /// `on_delta` receives reply text as it arrives.
    ///
    /// # Errors
    ///
    /// Rejects blank text and a missing API key before anything is
    /// appended. Request failures are not errors: they end as
    /// [`TurnOutcome::Failed`] with an error message in the history.
    pub async fn send(
        &self,
        text: &str,
        on_delta: &mut (dyn for<'s> FnMut(&'s str) + Send),
    ) -> Result<TurnOutcome> {
        let text = require_text(text)?;
        let request = self.prepare()?;

        if self.state.with(|s| s.messages.is_empty()) {
            self.registry
                .update_title(&self.session_id, &derive_title(text, DEFAULT_TITLE))?;
        }

        let user = Message::user(text);
        let mut history = self.messages();
        history.push(user);
        self.commit(history.clone())?;

        self.complete(history, request, on_delta).await
    }

    /// Drop everything after the last user message and ask again
    pub async fn regenerate(
        &self,
        on_delta: &mut (dyn for<'s> FnMut(&'s str) + Send),
    ) -> Result<TurnOutcome> {
        let request = self.prepare()?;

        let mut history = self.messages();
        let Some(index) = last_user_index(&history) else {
            return Ok(TurnOutcome::NoUserMessage);
        };
        history.truncate(index + 1);
        self.commit(history.clone())?;

        self.complete(history, request, on_delta).await
    }

    /// Rewrite the last user message, drop what follows, and ask again
    ///
    /// Retitles the session when the edited message is its first user
    /// message.
    pub async fn edit_last(
        &self,
        text: &str,
        on_delta: &mut (dyn for<'s> FnMut(&'s str) + Send),
    ) -> Result<TurnOutcome> {
        let text = require_text(text)?;
        let request = self.prepare()?;

        let mut history = self.messages();
        let Some(index) = last_user_index(&history) else {
            return Ok(TurnOutcome::NoUserMessage);
        };

        let is_first_user = history.iter().position(|m| m.role == Role::User) == Some(index);
        history[index].content = text.to_string();
        history[index].timestamp = now_millis();
        history.truncate(index + 1);

        if is_first_user {
            self.registry
                .update_title(&self.session_id, &derive_title(text, DEFAULT_TITLE))?;
        }
        self.commit(history.clone())?;

        self.complete(history, request, on_delta).await
    }

    /// Empty the history and cancel any in-flight reply
    pub fn clear(&self) -> Result<()> {
        self.engine.cancel();
        self.registry.save_messages(&self.session_id, &[])?;
        self.state.update(|s| {
            s.messages.clear();
            s.streaming_content.clear();
        });
        tracing::info!("Cleared session {}", self.session_id);
        Ok(())
    }

    /// Cancel the in-flight reply, if any
    pub fn cancel(&self) {
        self.engine.cancel();
    }

    /// Everything a turn reads from settings, resolved before any mutation
    fn prepare(&self) -> Result<TurnRequest> {
        Ok(TurnRequest {
            credential: self.settings.require_api_key()?,
            model: self.settings.selected_model()?,
            system_prompt: self.system_prompt()?,
        })
    }

    async fn complete(
        &self,
        history: Vec<Message>,
        request: TurnRequest,
        on_delta: &mut (dyn for<'s> FnMut(&'s str) + Send),
    ) -> Result<TurnOutcome> {
        let api_messages = api_messages(&request.system_prompt, &history);

        // A newer turn owns the phase once it starts; a preempted turn must
        // not reset it on the way out.
        let mut turn = 0;
        self.state.update(|s| {
            s.turn += 1;
            turn = s.turn;
            s.phase = ChatPhase::Streaming;
            s.streaming_content.clear();
        });

        let state = &self.state;
        let mut forward = |delta: &str| {
            state.update(|s| {
                if s.turn == turn {
                    s.streaming_content.push_str(delta);
                }
            });
            on_delta(delta);
        };
        let result = self
            .engine
            .stream_completion(&api_messages, &request.model, &request.credential, &mut forward)
            .await;

        let outcome = self.finalize(history, &request.model, result);

        self.state.update(|s| {
            if s.turn == turn {
                s.phase = ChatPhase::Idle;
                s.streaming_content.clear();
            }
        });

        outcome
    }

    fn finalize(
        &self,
        mut history: Vec<Message>,
        model: &str,
        result: Result<CompletionResult>,
    ) -> Result<TurnOutcome> {
        let outcome = match result {
            Ok(result) if result.aborted => {
                tracing::info!("Reply aborted after {} chars", result.content.len());
                return Ok(TurnOutcome::Aborted {
                    partial: result.content,
                });
            }
            Ok(result) => {
                let content = if result.content.is_empty() {
                    EMPTY_REPLY_PLACEHOLDER.to_string()
                } else {
                    result.content
                };
                let mut reply = Message::assistant(content);
                reply.model = Some(model.to_string());
                reply.usage = Some(result.usage);
                reply.cost_usd = result.cost_usd;
                TurnOutcome::Completed(reply)
            }
            Err(e) => {
                tracing::warn!("Completion failed: {}", e);
                TurnOutcome::Failed(Message::error(e.to_string()))
            }
        };

        if let TurnOutcome::Completed(message) | TurnOutcome::Failed(message) = &outcome {
            history.push(message.clone());
            self.commit(history)?;
        }
        Ok(outcome)
    }

    fn commit(&self, messages: Vec<Message>) -> Result<()> {
        self.registry.save_messages(&self.session_id, &messages)?;
        self.state.update(|s| s.messages = messages);
        Ok(())
    }
}

struct TurnRequest {
    credential: String,
    model: String,
    system_prompt: String,
}

fn api_messages(system_prompt: &str, history: &[Message]) -> Vec<ApiMessage> {
    let mut api = Vec::with_capacity(history.len() + 1);
    if !system_prompt.trim().is_empty() {
        api.push(ApiMessage::system(system_prompt));
    }
    api.extend(history.iter().map(Message::to_api));
    api
}

fn require_text(text: &str) -> Result<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PolychatError::Validation("Message cannot be empty".to_string()).into());
    }
    Ok(text)
}

fn last_user_index(messages: &[Message]) -> Option<usize> {
    messages.iter().rposition(|m| m.role == Role::User)
}
