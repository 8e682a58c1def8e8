//! In-page story coordinator.
//!
//! One [`open_story`] call is one invocation: it subscribes a bundle of
//! channel handlers, drives the preview to the requested story and hands a
//! single [`StoryLoadResult`] to its callback. The first resolving handler
//! releases the whole bundle before the callback runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use harness_core_types::protocol::{
    ERROR_STACK_SELECTOR, IGNORED_EXCEPTION_PREFIX, MISSING_CHANNEL_ERROR,
    REMOUNT_SENTINEL_STORY_ID, ROOT_SELECTOR_CANDIDATES, UNKNOWN_PLAY_FUNCTION_ERROR,
};
use harness_core_types::{bindings, events, Args, SelectionRequest, StoryLoadResult};
use harness_event_bus::{Channel, Subscriptions};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::window::{Binding, PreviewWindow};

/// Completion callback of one invocation.
pub type DoneCallback = Box<dyn FnOnce(StoryLoadResult) + Send>;

static ERROR_STACK_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+:\s+x\s+").expect("error stack prefix pattern"));

/// Register the coordinator under both entry point bindings.
pub fn install(window: &PreviewWindow) {
    window.bind(bindings::OPEN_STORY, Binding::Coordinator);
    window.bind(bindings::SELECT_STORY, Binding::Coordinator);
    debug!(target: "preview-coordinator", "coordinator installed");
}

/// Select `request.story_id` on the page behind `window` and call `done` once
/// with the outcome. Nothing happens before the document finished loading.
pub fn open_story(window: &PreviewWindow, request: SelectionRequest, done: DoneCallback) {
    let page = window.clone();
    window.on_load(move || Invocation::start(page, request, done));
}

/// Strip a leading `Kind: x ` marker from the error overlay text.
pub fn error_stack_message(raw: &str) -> String {
    match ERROR_STACK_PREFIX.find(raw) {
        Some(prefix) => raw[prefix.end()..].to_string(),
        None => raw.to_string(),
    }
}

struct Invocation {
    window: PreviewWindow,
    channel: Channel,
    request: SelectionRequest,
    result: Mutex<StoryLoadResult>,
    subscriptions: Mutex<Option<Subscriptions>>,
    done: Mutex<Option<DoneCallback>>,
    selected: AtomicBool,
}

impl Invocation {
    fn start(window: PreviewWindow, request: SelectionRequest, done: DoneCallback) {
        let Some(channel) = window.channel() else {
            debug!(target: "preview-coordinator", story = %request.story_id, "no preview channel");
            done(StoryLoadResult {
                load_error: Some(MISSING_CHANNEL_ERROR.to_string()),
                ..StoryLoadResult::default()
            });
            return;
        };

        let use_globals = !request.storybook_globals.is_empty() && window.has_preview_store();
        let invocation = Arc::new(Invocation {
            subscriptions: Mutex::new(Some(Subscriptions::new(&channel))),
            window,
            channel,
            request,
            result: Mutex::new(StoryLoadResult::default()),
            done: Mutex::new(Some(done)),
            selected: AtomicBool::new(false),
        });

        if use_globals {
            let pending = invocation.clone();
            invocation
                .window
                .when_store_initialized(move || pending.update_globals());
        } else {
            invocation.select_story();
        }
    }

    fn update_globals(self: &Arc<Self>) {
        let channel = self.channel.clone();
        let mut globals = self.window.initial_globals_or_capture(move || {
            channel
                .last_payload(events::SET_GLOBALS)
                .and_then(|payload| payload.get("globals").and_then(Value::as_object).cloned())
                .unwrap_or_default()
        });
        globals.extend(self.request.storybook_globals.clone());

        let this = self.clone();
        self.subscribe(events::GLOBALS_UPDATED, true, move |_| this.select_story());
        trace!(target: "preview-coordinator", story = %self.request.story_id, "updating globals");
        self.channel
            .emit(events::UPDATE_GLOBALS, json!({ "globals": globals }));
    }

    fn select_story(self: &Arc<Self>) {
        if self.selected.swap(true, Ordering::SeqCst) {
            return;
        }

        let this = self.clone();
        self.subscribe(events::PLAY_FUNCTION_THREW_EXCEPTION, true, move |_| {
            this.on_play_function_threw_exception()
        });
        let this = self.clone();
        self.subscribe(events::STORY_RENDERED, true, move |_| this.on_story_rendered());
        let this = self.clone();
        self.subscribe(events::STORY_MISSING, false, move |payload| {
            this.on_story_missing(payload)
        });
        let this = self.clone();
        self.subscribe(events::STORY_THREW_EXCEPTION, false, move |payload| {
            this.on_story_threw_exception(payload)
        });
        let this = self.clone();
        self.subscribe(events::STORY_ERRORED, true, move |payload| {
            this.on_story_errored(payload)
        });

        if self.request.should_remount {
            self.channel.emit(
                events::SET_CURRENT_STORY,
                json!({ "storyId": REMOUNT_SENTINEL_STORY_ID }),
            );
        }
        self.channel.emit(
            events::SET_CURRENT_STORY,
            json!({ "storyId": self.request.story_id }),
        );
    }

    fn on_play_function_threw_exception(&self) {
        let mut result = self.result.lock();
        if result.play_function_error.is_none() {
            result.play_function_error = Some(UNKNOWN_PLAY_FUNCTION_ERROR.to_string());
        }
    }

    fn on_story_rendered(self: &Arc<Self>) {
        let root = ROOT_SELECTOR_CANDIDATES
            .iter()
            .find(|selector| self.window.query_selector(selector).is_some());
        {
            let mut result = self.result.lock();
            result.root_selector = root.map(|selector| selector.to_string()).unwrap_or_default();
            if result.play_function_error.is_some() {
                if let Some(message) = self
                    .window
                    .last_interaction_exception(&self.request.story_id)
                {
                    result.play_function_error = Some(message);
                }
            }
        }

        if self.request.args.is_empty() {
            self.finish();
            return;
        }
        self.apply_args(self.request.args.clone());
    }

    fn apply_args(self: &Arc<Self>, args: Args) {
        let this = self.clone();
        self.subscribe(events::STORY_ARGS_UPDATED, true, move |_| this.finish());
        self.channel.emit(
            events::UPDATE_STORY_ARGS,
            json!({ "storyId": self.request.story_id, "updatedArgs": args }),
        );
    }

    fn on_story_missing(&self, payload: &Value) {
        if payload.as_str() == Some(REMOUNT_SENTINEL_STORY_ID) {
            trace!(target: "preview-coordinator", "remount teardown observed");
            return;
        }
        let raw = self
            .window
            .query_selector(ERROR_STACK_SELECTOR)
            .unwrap_or_default();
        self.fail(error_stack_message(&raw));
    }

    fn on_story_threw_exception(&self, payload: &Value) {
        let message = payload.get("message").and_then(Value::as_str).unwrap_or_default();
        if message.is_empty() || message.starts_with(IGNORED_EXCEPTION_PREFIX) {
            return;
        }
        self.fail(message.to_string());
    }

    fn on_story_errored(&self, payload: &Value) {
        let title = payload.get("title").and_then(Value::as_str).unwrap_or_default();
        self.fail(title.to_string());
    }

    fn fail(&self, message: String) {
        self.result.lock().load_error = Some(message);
        self.finish();
    }

    fn subscribe<F>(&self, event: &str, once: bool, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut guard = self.subscriptions.lock();
        let Some(bundle) = guard.as_mut() else {
            return;
        };
        if once {
            bundle.once(event, handler);
        } else {
            bundle.on(event, handler);
        }
    }

    fn finish(&self) {
        let released = self.subscriptions.lock().take();
        drop(released);

        let Some(done) = self.done.lock().take() else {
            return;
        };
        let result = self.result.lock().clone();
        debug!(
            target: "preview-coordinator",
            story = %self.request.story_id,
            outcome = %result.outcome(),
            "story selection resolved"
        );
        done(result);
    }
}
