//! Test utilities for PolyChat
//!
//! In-memory storage wiring, a scripted completion engine, message builders
//! and assertion helpers shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::chat::{ConversationStore, Message, Role};
use crate::engine::sse::DecodedStream;
use crate::engine::{ApiMessage, CompletionEngine, CompletionResult, Usage};
use crate::error::{PolychatError, Result};
use crate::sessions::SessionRegistry;
use crate::settings::{Settings, MODELS};
use crate::storage::{KeyValueStore, MemoryStore};

/// Build a history from `(role, content)` pairs
///
/// # Panics
///
/// Panics on an unknown role name
pub fn history(entries: &[(&str, &str)]) -> Vec<Message> {
    entries
        .iter()
        .map(|(role, content)| {
            let role = Role::parse(role).unwrap_or_else(|| panic!("unknown role {}", role));
            Message::new(role, *content)
        })
        .collect()
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

#[derive(Debug, Clone)]
enum Ending {
    Finish,
    Abort,
    Hold,
    Fail { status: u16, message: String },
}

#[derive(Default)]
struct EngineLog {
    requests: Mutex<Vec<Vec<ApiMessage>>>,
    cancels: AtomicUsize,
    active: Mutex<Option<CancellationToken>>,
}

/// [`CompletionEngine`] that replays a fixed script
///
/// Clones share the request log, so a test can keep one clone and hand
/// another to the store.
#[derive(Clone)]
pub struct ScriptedEngine {
    deltas: Vec<String>,
    ending: Ending,
    usage: Option<Usage>,
    cost: Option<f64>,
    log: Arc<EngineLog>,
}

impl ScriptedEngine {
    fn new(deltas: &[&str], ending: Ending) -> Self {
        Self {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            ending,
            usage: None,
            cost: None,
            log: Arc::new(EngineLog::default()),
        }
    }

    /// Emit `deltas` then finish normally
    pub fn replying(deltas: &[&str]) -> Self {
        Self::new(deltas, Ending::Finish)
    }

    /// Emit `deltas` then report an abort
    pub fn aborting(deltas: &[&str]) -> Self {
        Self::new(deltas, Ending::Abort)
    }

    /// Emit `deltas` then stay in flight until cancelled or preempted
    pub fn holding(deltas: &[&str]) -> Self {
        Self::new(deltas, Ending::Hold)
    }

    /// Fail every request with an API error
    pub fn failing(status: u16, message: &str) -> Self {
        Self::new(
            &[],
            Ending::Fail {
                status,
                message: message.to_string(),
            },
        )
    }

    /// Report server usage and cost instead of an estimate
    pub fn with_usage(mut self, usage: Usage, cost: Option<f64>) -> Self {
        self.usage = Some(usage);
        self.cost = cost;
        self
    }

    /// Messages of the most recent request
    pub fn last_request(&self) -> Option<Vec<ApiMessage>> {
        self.log.requests.lock().ok()?.last().cloned()
    }

    /// Number of requests seen
    pub fn request_count(&self) -> usize {
        self.log.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Number of `cancel` calls
    pub fn cancel_count(&self) -> usize {
        self.log.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionEngine for ScriptedEngine {
    async fn stream_completion(
        &self,
        messages: &[ApiMessage],
        _model: &str,
        _credential: &str,
        on_delta: &mut (dyn for<'s> FnMut(&'s str) + Send),
    ) -> Result<CompletionResult> {
        if let Ok(mut requests) = self.log.requests.lock() {
            requests.push(messages.to_vec());
        }
        let token = CancellationToken::new();
        if let Ok(mut active) = self.log.active.lock() {
            if let Some(previous) = active.replace(token.clone()) {
                previous.cancel();
            }
        }

        if let Ending::Fail { status, message } = &self.ending {
            return Err(PolychatError::Api {
                status: *status,
                message: message.clone(),
            }
            .into());
        }

        let mut content = String::new();
        for delta in &self.deltas {
            on_delta(delta);
            content.push_str(delta);
        }
        if matches!(self.ending, Ending::Hold) {
            token.cancelled().await;
        }

        let decoded = DecodedStream {
            content,
            usage: self.usage,
            cost: self.cost,
            malformed_lines: 0,
        };
        Ok(CompletionResult::from_decoded(
            messages,
            decoded,
            matches!(self.ending, Ending::Abort | Ending::Hold),
        ))
    }

    fn cancel(&self) {
        self.log.cancels.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut active) = self.log.active.lock() {
            if let Some(token) = active.take() {
                token.cancel();
            }
        }
    }
}

/// In-memory wiring of registry, settings and one session
pub struct TestContext {
    /// Backing store
    pub store: Arc<MemoryStore>,
    /// Registry over `store`
    pub registry: SessionRegistry,
    /// Settings over `store`, with an API key set
    pub settings: Settings,
    /// Session created for the test
    pub session_id: String,
    engine: ScriptedEngine,
}

impl TestContext {
    /// Fresh context with one active session and a configured API key
    pub fn new(engine: ScriptedEngine) -> Self {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn KeyValueStore> = store.clone();
        let registry = SessionRegistry::new(shared.clone());
        let settings = Settings::new(shared, MODELS[0]);
        settings
            .set_api_key("sk-test")
            .expect("failed to set test api key");
        let session_id = registry.create().expect("failed to create session").id;

        Self {
            store,
            registry,
            settings,
            session_id,
            engine,
        }
    }

    /// Engine as the store sees it
    pub fn engine(&self) -> Arc<dyn CompletionEngine> {
        Arc::new(self.engine.clone())
    }

    /// Model requests are sent with
    pub fn model(&self) -> &'static str {
        MODELS[0]
    }

    /// Open a store on the test session
    pub fn open_store(&self) -> ConversationStore {
        ConversationStore::open(
            self.registry.clone(),
            self.settings.clone(),
            self.engine(),
            &self.session_id,
        )
        .expect("failed to open store")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_builder() {
        let messages = history(&[("user", "a"), ("assistant", "b"), ("error", "c")]);
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Error]);
    }

    #[test]
    #[should_panic(expected = "unknown role")]
    fn test_history_builder_rejects_unknown_role() {
        history(&[("system", "x")]);
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: Result<()> = Err(PolychatError::Config("test error message".to_string()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        assert_error_contains(Ok(()), "error");
    }

    #[tokio::test]
    async fn test_scripted_engine_records_requests() {
        let engine = ScriptedEngine::replying(&["a", "b"]);
        let shared = engine.clone();
        let mut seen = String::new();
        let result = shared
            .stream_completion(&[ApiMessage::user("q")], "m", "k", &mut |d| seen.push_str(d))
            .await
            .unwrap();
        assert_eq!(result.content, "ab");
        assert!(result.usage.estimated);
        assert_eq!(seen, "ab");
        assert_eq!(engine.request_count(), 1);
        assert_eq!(engine.last_request().unwrap()[0].content, "q");
    }

    #[test]
    fn test_context_has_active_session_and_key() {
        let ctx = TestContext::new(ScriptedEngine::replying(&[]));
        assert_eq!(ctx.registry.active_id().unwrap(), Some(ctx.session_id.clone()));
        assert_eq!(ctx.settings.require_api_key().unwrap(), "sk-test");
        assert!(!ctx.store.is_empty());
    }
}
