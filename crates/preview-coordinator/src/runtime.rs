//! Emulated storybook preview.
//!
//! Reacts to the channel requests a real preview handles (`setCurrentStory`,
//! `updateGlobals`, `updateStoryArgs`) with the events a real preview emits.
//! Selecting the story that is already shown is a no-op, the same as in
//! storybook, so callers must go through the remount sentinel to re-render.

use std::collections::HashMap;
use std::sync::Arc;

use harness_core_types::protocol::{ERROR_STACK_SELECTOR, REMOUNT_SENTINEL_STORY_ID};
use harness_core_types::{events, Args};
use harness_event_bus::Channel;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::trace;

use crate::window::PreviewWindow;

/// How a story reacts to being selected.
#[derive(Clone, Debug, PartialEq)]
pub enum StoryBehavior {
    Renders,
    /// Reports a render but mounts into none of the known roots.
    RendersDetached,
    /// Render throws; `storyThrewException` with this message.
    Throws(String),
    /// Emits an ignored exception first, then renders.
    ThrowsIgnored(String),
    /// `storyErrored` with this title.
    Errors(String),
    /// Mounts, then the play function fails. The instrumenter records the
    /// exception message when one is given.
    PlayFails(Option<String>),
    /// Never reports a terminal event.
    Hang,
}

#[derive(Clone, Debug)]
pub struct PreviewConfig {
    pub stories: HashMap<String, StoryBehavior>,
    /// Default globals announced through `setGlobals` when the preview boots.
    pub globals: Args,
    /// Expose a preview store so global updates are honoured.
    pub preview_store: bool,
    /// Mount stories into `#root` instead of `#storybook-root`.
    pub legacy_root: bool,
    /// The addon preset installs the coordinator with the preview.
    pub addon_installed: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            stories: HashMap::new(),
            globals: Args::new(),
            preview_store: true,
            legacy_root: false,
            addon_installed: false,
        }
    }
}

impl PreviewConfig {
    pub fn with_story(mut self, id: impl Into<String>, behavior: StoryBehavior) -> Self {
        self.stories.insert(id.into(), behavior);
        self
    }

    pub fn with_global(mut self, key: impl Into<String>, value: Value) -> Self {
        self.globals.insert(key.into(), value);
        self
    }

    fn root_selector(&self) -> &'static str {
        if self.legacy_root {
            "#root"
        } else {
            "#storybook-root"
        }
    }
}

#[derive(Default)]
struct RuntimeState {
    current: Option<String>,
    selections: Vec<String>,
    globals: Args,
    args: HashMap<String, Args>,
}

/// Handle on a booted preview. Clones share state.
#[derive(Clone)]
pub struct PreviewRuntime {
    window: PreviewWindow,
    channel: Channel,
    config: Arc<PreviewConfig>,
    state: Arc<Mutex<RuntimeState>>,
}

impl PreviewRuntime {
    /// Boot a preview into `window`: attach a channel, announce globals and
    /// register the request handlers. Loading the document stays with the
    /// caller.
    pub fn boot(window: &PreviewWindow, config: PreviewConfig) -> Self {
        let channel = Channel::new();
        window.attach_channel(channel.clone());
        if config.preview_store {
            window.install_preview_store();
        }

        let runtime = Self {
            window: window.clone(),
            channel: channel.clone(),
            state: Arc::new(Mutex::new(RuntimeState {
                globals: config.globals.clone(),
                ..RuntimeState::default()
            })),
            config: Arc::new(config),
        };

        let handler = runtime.clone();
        channel.on(events::SET_CURRENT_STORY, move |payload| {
            let story_id = payload.get("storyId").and_then(Value::as_str).unwrap_or_default();
            handler.select(story_id);
        });
        let handler = runtime.clone();
        channel.on(events::UPDATE_GLOBALS, move |payload| {
            handler.update_globals(payload);
        });
        let handler = runtime.clone();
        channel.on(events::UPDATE_STORY_ARGS, move |payload| {
            handler.update_story_args(payload);
        });

        channel.emit(
            events::SET_GLOBALS,
            json!({ "globals": runtime.config.globals, "globalTypes": {} }),
        );
        runtime
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn current_story(&self) -> Option<String> {
        self.state.lock().current.clone()
    }

    /// Every story id the preview switched to, sentinel included.
    pub fn selections(&self) -> Vec<String> {
        self.state.lock().selections.clone()
    }

    pub fn globals(&self) -> Args {
        self.state.lock().globals.clone()
    }

    pub fn story_args(&self, story_id: &str) -> Args {
        self.state
            .lock()
            .args
            .get(story_id)
            .cloned()
            .unwrap_or_default()
    }

    fn select(&self, story_id: &str) {
        {
            let mut state = self.state.lock();
            if state.current.as_deref() == Some(story_id) {
                trace!(target: "preview-runtime", story = story_id, "already selected");
                return;
            }
            state.current = Some(story_id.to_string());
            state.selections.push(story_id.to_string());
        }

        let root = self.config.root_selector();
        self.window.remove_element(root);
        self.window.remove_element(ERROR_STACK_SELECTOR);

        let behavior = match self.config.stories.get(story_id) {
            Some(behavior) if story_id != REMOUNT_SENTINEL_STORY_ID => behavior.clone(),
            _ => {
                self.window.set_element(
                    ERROR_STACK_SELECTOR,
                    format!("MissingStoryError: x Couldn't find story matching '{story_id}'."),
                );
                self.channel.emit(events::STORY_MISSING, json!(story_id));
                return;
            }
        };

        match behavior {
            StoryBehavior::Renders => self.mount(story_id),
            StoryBehavior::RendersDetached => {
                self.channel.emit(events::STORY_RENDERED, json!(story_id));
            }
            StoryBehavior::Throws(message) => {
                self.channel
                    .emit(events::STORY_THREW_EXCEPTION, json!({ "message": message }));
            }
            StoryBehavior::ThrowsIgnored(message) => {
                self.channel
                    .emit(events::STORY_THREW_EXCEPTION, json!({ "message": message }));
                self.mount(story_id);
            }
            StoryBehavior::Errors(title) => {
                self.channel.emit(
                    events::STORY_ERRORED,
                    json!({ "title": title, "description": "" }),
                );
            }
            StoryBehavior::PlayFails(exception) => {
                self.window.set_element(root, "");
                self.window.record_interaction(story_id, exception.clone());
                self.channel.emit(
                    events::PLAY_FUNCTION_THREW_EXCEPTION,
                    json!({ "message": exception.unwrap_or_default() }),
                );
                self.channel.emit(events::STORY_RENDERED, json!(story_id));
            }
            StoryBehavior::Hang => {}
        }
    }

    fn mount(&self, story_id: &str) {
        self.window.set_element(self.config.root_selector(), "");
        self.channel.emit(events::STORY_RENDERED, json!(story_id));
    }

    fn update_globals(&self, payload: &Value) {
        let globals = payload
            .get("globals")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        {
            let mut state = self.state.lock();
            state.globals.extend(globals);
        }
        let current = self.globals();
        self.channel
            .emit(events::GLOBALS_UPDATED, json!({ "globals": current }));
    }

    fn update_story_args(&self, payload: &Value) {
        let story_id = payload
            .get("storyId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let updated = payload
            .get("updatedArgs")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let args = {
            let mut state = self.state.lock();
            let entry = state.args.entry(story_id.clone()).or_default();
            entry.extend(updated);
            entry.clone()
        };

        self.channel.emit(
            events::STORY_ARGS_UPDATED,
            json!({ "storyId": story_id, "args": args }),
        );
        self.channel.emit(events::STORY_RENDERED, json!(story_id));
    }
}
