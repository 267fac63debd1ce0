//! Observable state container
//!
//! [`StateContainer`] holds a value and notifies subscribers synchronously
//! after every update. Listeners run after the internal lock is released, so
//! a listener may read the container again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use super::Message;

/// Handle returned by [`StateContainer::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Value with subscribe/notify semantics
pub struct StateContainer<T> {
    value: RwLock<T>,
    listeners: Mutex<Vec<(SubscriptionId, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T: Clone + Default> Default for StateContainer<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone> StateContainer<T> {
    /// Create a container holding `value`
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Snapshot of the current value
    pub fn get(&self) -> T {
        self.value
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Read the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self
            .value
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    /// Replace the value and notify
    pub fn set(&self, value: T) {
        self.update(|current| *current = value);
    }

    /// Mutate the value in place and notify
    ///
    /// # Examples
    ///
    /// ```
    /// use polychat::chat::StateContainer;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let state = StateContainer::new(0u32);
    /// let seen = Arc::new(AtomicUsize::new(0));
    /// let counter = seen.clone();
    /// state.subscribe(move |v| counter.store(*v as usize, Ordering::SeqCst));
    /// state.update(|v| *v += 5);
    /// assert_eq!(seen.load(Ordering::SeqCst), 5);
    /// ```
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let snapshot = {
            let mut guard = self
                .value
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&mut guard);
            guard.clone()
        };
        self.notify(&snapshot);
    }

    /// Register a listener called after every update
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn notify(&self, value: &T) {
        let listeners: Vec<Listener<T>> = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(value);
        }
    }
}

/// Whether a completion is running for the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatPhase {
    /// Nothing in flight
    #[default]
    Idle,
    /// A completion is streaming
    Streaming,
}

/// Observable state of one conversation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    /// Persisted history
    pub messages: Vec<Message>,
    /// Text received so far for the in-flight reply
    pub streaming_content: String,
    /// Current phase
    pub phase: ChatPhase,
    /// Counter bumped each time a completion starts
    pub turn: u64,
}
