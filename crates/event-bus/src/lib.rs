//! Model of the preview's addons channel.
//!
//! The channel is a synchronous emitter: `emit` runs every matching handler
//! before it returns, handlers may emit further events, and single-shot
//! handlers are removed before they run. The last payload of each event is
//! recorded the same way the preview runtime keeps `channel.data`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

/// Handler invoked with the event payload.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    event: String,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
struct ChannelState {
    next_id: u64,
    listeners: Vec<Listener>,
    data: HashMap<String, Value>,
}

/// Cheaply cloneable handle to one page's channel.
#[derive(Clone, Default)]
pub struct Channel {
    inner: Arc<Mutex<ChannelState>>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Channel")
            .field("listeners", &state.listeners.len())
            .field("recorded", &state.data.len())
            .finish()
    }
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.register(event, false, Arc::new(handler))
    }

    pub fn once<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.register(event, true, Arc::new(handler))
    }

    /// Remove a listener. Returns false when it already fired (single-shot) or
    /// was removed before.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut state = self.inner.lock();
        let before = state.listeners.len();
        state.listeners.retain(|listener| listener.id != id);
        before != state.listeners.len()
    }

    pub fn emit(&self, event: &str, payload: Value) {
        let handlers: Vec<Handler> = {
            let mut state = self.inner.lock();
            state.data.insert(event.to_string(), payload.clone());

            let mut fired = Vec::new();
            state.listeners.retain(|listener| {
                if listener.event != event {
                    return true;
                }
                fired.push(listener.handler.clone());
                !listener.once
            });
            fired
        };

        trace!(target: "preview-channel", event, handlers = handlers.len(), "emit");
        for handler in handlers {
            handler(&payload);
        }
    }

    /// Last payload emitted for `event`, if any.
    pub fn last_payload(&self, event: &str) -> Option<Value> {
        self.inner.lock().data.get(event).cloned()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .lock()
            .listeners
            .iter()
            .filter(|listener| listener.event == event)
            .count()
    }

    pub fn total_listeners(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    fn register(&self, event: &str, once: bool, handler: Handler) -> ListenerId {
        let mut state = self.inner.lock();
        state.next_id += 1;
        let id = ListenerId(state.next_id);
        state.listeners.push(Listener {
            id,
            event: event.to_string(),
            once,
            handler,
        });
        id
    }
}

/// A bundle of registrations released together.
///
/// Dropping the bundle (or calling [`Subscriptions::dispose`]) removes every
/// listener it still owns. Disposal is idempotent.
pub struct Subscriptions {
    channel: Channel,
    ids: Vec<ListenerId>,
}

impl Subscriptions {
    pub fn new(channel: &Channel) -> Self {
        Self {
            channel: channel.clone(),
            ids: Vec::new(),
        }
    }

    pub fn once<F>(&mut self, event: &str, handler: F) -> &mut Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.channel.once(event, handler);
        self.ids.push(id);
        self
    }

    /// Persistent registration; still released with the bundle.
    pub fn on<F>(&mut self, event: &str, handler: F) -> &mut Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.channel.on(event, handler);
        self.ids.push(id);
        self
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dispose(&mut self) {
        for id in self.ids.drain(..) {
            self.channel.off(id);
        }
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.dispose();
    }
}
