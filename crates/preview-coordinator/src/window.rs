use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use harness_core_types::{bindings, Args};
use harness_event_bus::Channel;
use parking_lot::Mutex;

type Callback = Box<dyn FnOnce() + Send>;

/// Value registered under a well-known page key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    /// A coordinator entry point.
    Coordinator,
    Flag(bool),
}

#[derive(Clone, Debug)]
struct InstrumentedCall {
    exception: Option<String>,
}

#[derive(Default)]
struct Document {
    loaded: bool,
    on_load: Vec<Callback>,
    elements: HashMap<String, String>,
}

#[derive(Default)]
struct PreviewStore {
    present: bool,
    initialized: bool,
    pending: Vec<Callback>,
}

#[derive(Default)]
struct WindowState {
    document: Document,
    channel: Option<Channel>,
    store: PreviewStore,
    initial_globals: Option<Args>,
    instrumenter: HashMap<String, Vec<InstrumentedCall>>,
    bindings: HashMap<String, Binding>,
}

/// One preview page as injected scripts see it.
///
/// Clones share the page. Navigation replaces the page in place through
/// [`PreviewWindow::reset`], dropping every binding, queued callback and
/// cached value of the previous document.
#[derive(Clone, Default)]
pub struct PreviewWindow {
    state: Arc<Mutex<WindowState>>,
}

impl fmt::Debug for PreviewWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PreviewWindow")
            .field("loaded", &state.document.loaded)
            .field("channel", &state.channel.is_some())
            .field("bindings", &state.bindings.len())
            .finish()
    }
}

impl PreviewWindow {
    /// A page that is still loading.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        let previous = std::mem::take(&mut *self.state.lock());
        drop(previous);
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().document.loaded
    }

    /// Run `callback` once the document is complete; immediately if it
    /// already is.
    pub fn on_load<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.state.lock();
            if !state.document.loaded {
                state.document.on_load.push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    pub fn complete_load(&self) {
        let queued = {
            let mut state = self.state.lock();
            state.document.loaded = true;
            std::mem::take(&mut state.document.on_load)
        };
        for callback in queued {
            callback();
        }
    }

    pub fn set_element(&self, selector: &str, text: impl Into<String>) {
        self.state
            .lock()
            .document
            .elements
            .insert(selector.to_string(), text.into());
    }

    pub fn remove_element(&self, selector: &str) {
        self.state.lock().document.elements.remove(selector);
    }

    /// Inner text of the element matching `selector`.
    pub fn query_selector(&self, selector: &str) -> Option<String> {
        self.state.lock().document.elements.get(selector).cloned()
    }

    pub fn attach_channel(&self, channel: Channel) {
        self.state.lock().channel = Some(channel);
    }

    pub fn channel(&self) -> Option<Channel> {
        self.state.lock().channel.clone()
    }

    pub fn install_preview_store(&self) {
        self.state.lock().store.present = true;
    }

    pub fn has_preview_store(&self) -> bool {
        self.state.lock().store.present
    }

    /// Run `callback` once the preview store finished initializing.
    pub fn when_store_initialized<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.state.lock();
            if !state.store.initialized {
                state.store.pending.push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    pub fn initialize_store(&self) {
        let pending = {
            let mut state = self.state.lock();
            state.store.initialized = true;
            std::mem::take(&mut state.store.pending)
        };
        for callback in pending {
            callback();
        }
    }

    /// Cached global defaults, captured with `capture` on first use.
    pub fn initial_globals_or_capture<F>(&self, capture: F) -> Args
    where
        F: FnOnce() -> Args,
    {
        if let Some(cached) = self.state.lock().initial_globals.clone() {
            return cached;
        }
        let captured = capture();
        self.state
            .lock()
            .initial_globals
            .get_or_insert(captured)
            .clone()
    }

    pub fn initial_globals(&self) -> Option<Args> {
        self.state.lock().initial_globals.clone()
    }

    /// Append an interaction call to the instrumenter state of `story_id`.
    pub fn record_interaction(&self, story_id: &str, exception: Option<String>) {
        self.state
            .lock()
            .instrumenter
            .entry(story_id.to_string())
            .or_default()
            .push(InstrumentedCall { exception });
    }

    /// Exception message of the last instrumented call for `story_id`.
    pub fn last_interaction_exception(&self, story_id: &str) -> Option<String> {
        self.state
            .lock()
            .instrumenter
            .get(story_id)
            .and_then(|calls| calls.last())
            .and_then(|call| call.exception.clone())
    }

    pub fn bind(&self, key: &str, binding: Binding) {
        self.state.lock().bindings.insert(key.to_string(), binding);
    }

    pub fn binding(&self, key: &str) -> Option<Binding> {
        self.state.lock().bindings.get(key).cloned()
    }

    /// Presence check for either coordinator entry point.
    pub fn has_coordinator(&self) -> bool {
        let state = self.state.lock();
        [bindings::OPEN_STORY, bindings::SELECT_STORY]
            .iter()
            .any(|key| state.bindings.get(*key) == Some(&Binding::Coordinator))
    }

    pub fn set_flag(&self, key: &str, value: bool) {
        self.bind(key, Binding::Flag(value));
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.binding(key), Some(Binding::Flag(true)))
    }
}
