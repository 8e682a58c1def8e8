//! The coordinator script shipped to browsers and the in-process coordinator
//! are driven through the same channel traffic and must agree on every
//! resolution and on the listeners left behind.

use std::sync::Arc;

use boa_engine::{Context, Source};
use harness_core_types::protocol::{MISSING_CHANNEL_ERROR, UNKNOWN_PLAY_FUNCTION_ERROR};
use harness_core_types::{bindings, events, Args, SelectionRequest, StoryLoadResult};
use harness_event_bus::Channel;
use parking_lot::Mutex;
use preview_coordinator::{open_story, PreviewWindow};
use serde_json::{json, Value};
use wd_bridge::script::OPEN_STORY_SCRIPT;

/// Minimal page globals: a synchronous channel that records `data` like the
/// preview runtime, a selector lookup and a result sink.
const PAGE_STUB: &str = r#"
var listeners = {};
var channel = {
    data: {},
    on: function (event, handler) {
        (listeners[event] = listeners[event] || []).push(handler);
    },
    off: function (event, handler) {
        var registered = listeners[event] || [];
        var index = registered.indexOf(handler);
        if (index >= 0) {
            registered.splice(index, 1);
        }
    },
    emit: function (event, payload) {
        channel.data[event] = [payload];
        var registered = (listeners[event] || []).slice();
        for (var i = 0; i < registered.length; i++) {
            registered[i](payload);
        }
    }
};
var elements = {};
var document = {
    readyState: "complete",
    addEventListener: function () {},
    removeEventListener: function () {},
    querySelector: function (selector) {
        return Object.prototype.hasOwnProperty.call(elements, selector) ? elements[selector] : null;
    }
};
var window = { __STORYBOOK_ADDONS_CHANNEL__: channel };
var results = [];
function listenerCount() {
    var total = 0;
    for (var event in listeners) {
        total += listeners[event].length;
    }
    return total;
}
function lastData(event) {
    return channel.data[event] ? channel.data[event][0] : null;
}
"#;

#[derive(Clone, Copy, Default)]
struct Page {
    no_channel: bool,
    preview_store: bool,
}

enum Step {
    Open,
    Element(&'static str, &'static str),
    Interaction(&'static str, Option<&'static str>),
    Emit(&'static str, Value),
}

#[derive(Debug, PartialEq)]
struct Observed {
    results: Vec<StoryLoadResult>,
    listeners: usize,
    current_story: Option<Value>,
    globals_update: Option<Value>,
}

fn run_script(page: Page, request: &SelectionRequest, steps: &[Step]) -> Observed {
    let mut source = String::from(PAGE_STUB);
    source.push_str(OPEN_STORY_SCRIPT);
    source.push('\n');
    if page.no_channel {
        source.push_str("delete window.__STORYBOOK_ADDONS_CHANNEL__;\n");
    }
    if page.preview_store {
        source.push_str(
            "window.__STORYBOOK_PREVIEW__ = \
             { storeInitializationPromise: { then: function (callback) { callback(); } } };\n",
        );
    }

    for step in steps {
        let line = match step {
            Step::Open => format!(
                "openStory({}, {}, {}, {}, function (raw) {{ results.push(JSON.parse(raw)); }});",
                json!(request.story_id),
                Value::Object(request.args.clone()),
                Value::Object(request.storybook_globals.clone()),
                request.should_remount
            ),
            Step::Element(selector, text) => {
                format!("elements[{}] = {{ innerText: {} }};", json!(selector), json!(text))
            }
            Step::Interaction(story_id, exception) => {
                let call = match exception {
                    Some(message) => json!({ "exception": { "message": message } }),
                    None => json!({}),
                };
                format!(
                    "var state = window.{key} || {{}};\n\
                     window.{key} = state;\n\
                     (state[{id}] = state[{id}] || {{ calls: [] }}).calls.push({call});",
                    key = bindings::INSTRUMENTER_STATE,
                    id = json!(story_id),
                )
            }
            Step::Emit(event, payload) => format!("channel.emit({}, {payload});", json!(event)),
        };
        source.push_str(&line);
        source.push('\n');
    }
    source.push_str(
        "JSON.stringify({ results: results, listeners: listenerCount(), \
         currentStory: lastData(\"setCurrentStory\"), \
         globalsUpdate: lastData(\"updateGlobals\") });",
    );

    let mut context = Context::default();
    let value = context
        .eval(Source::from_bytes(source.as_bytes()))
        .expect("page script runs");
    let raw = value
        .to_string(&mut context)
        .expect("string result")
        .to_std_string_escaped();
    let observed: Value = serde_json::from_str(&raw).expect("json result");

    Observed {
        results: serde_json::from_value(observed["results"].clone()).expect("load results"),
        listeners: observed["listeners"].as_u64().expect("listener count") as usize,
        current_story: non_null(&observed["currentStory"]),
        globals_update: non_null(&observed["globalsUpdate"]),
    }
}

fn run_model(page: Page, request: &SelectionRequest, steps: &[Step]) -> Observed {
    let window = PreviewWindow::new();
    let channel = Channel::new();
    if !page.no_channel {
        window.attach_channel(channel.clone());
    }
    if page.preview_store {
        window.install_preview_store();
        window.initialize_store();
    }
    window.complete_load();

    let results = Arc::new(Mutex::new(Vec::new()));
    for step in steps {
        match step {
            Step::Open => {
                let sink = results.clone();
                open_story(
                    &window,
                    request.clone(),
                    Box::new(move |result| sink.lock().push(result)),
                );
            }
            Step::Element(selector, text) => window.set_element(selector, *text),
            Step::Interaction(story_id, exception) => {
                window.record_interaction(story_id, exception.map(str::to_string))
            }
            Step::Emit(event, payload) => channel.emit(event, payload.clone()),
        }
    }

    let results = results.lock().clone();
    Observed {
        results,
        listeners: channel.total_listeners(),
        current_story: channel.last_payload(events::SET_CURRENT_STORY),
        globals_update: channel.last_payload(events::UPDATE_GLOBALS),
    }
}

fn non_null(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        other => Some(other.clone()),
    }
}

/// Run both implementations and return their shared observation.
fn agree(page: Page, request: SelectionRequest, steps: &[Step]) -> Observed {
    let script = run_script(page, &request, steps);
    let model = run_model(page, &request, steps);
    assert_eq!(script, model, "page script and coordinator disagree");
    script
}

fn args(value: Value) -> Args {
    value.as_object().cloned().unwrap_or_default()
}

fn load_error(message: &str) -> StoryLoadResult {
    StoryLoadResult {
        load_error: Some(message.to_string()),
        ..StoryLoadResult::default()
    }
}

#[test]
fn errored_story_without_title_is_a_load_error() {
    let observed = agree(
        Page::default(),
        SelectionRequest::new("form--errored"),
        &[Step::Open, Step::Emit(events::STORY_ERRORED, json!({}))],
    );

    assert_eq!(observed.results, vec![load_error("")]);
    assert_eq!(observed.listeners, 0);
}

#[test]
fn errored_story_reports_its_title() {
    let observed = agree(
        Page::default(),
        SelectionRequest::new("form--errored"),
        &[
            Step::Open,
            Step::Emit(
                events::STORY_ERRORED,
                json!({ "title": "Expected a story export", "description": "" }),
            ),
        ],
    );

    assert_eq!(observed.results, vec![load_error("Expected a story export")]);
}

#[test]
fn ignored_render_exceptions_keep_waiting() {
    let observed = agree(
        Page::default(),
        SelectionRequest::new("form--noisy"),
        &[
            Step::Open,
            Step::Emit(
                events::STORY_THREW_EXCEPTION,
                json!({ "message": "ignoredException: resize observer" }),
            ),
            Step::Emit(events::STORY_THREW_EXCEPTION, json!({ "message": 42 })),
        ],
    );

    assert!(observed.results.is_empty());
    assert_eq!(observed.listeners, 5);
    assert_eq!(observed.current_story, Some(json!({ "storyId": "form--noisy" })));
}

#[test]
fn render_exception_resolves_after_ignored_one() {
    let observed = agree(
        Page::default(),
        SelectionRequest::new("form--broken"),
        &[
            Step::Open,
            Step::Emit(
                events::STORY_THREW_EXCEPTION,
                json!({ "message": "ignoredException: resize observer" }),
            ),
            Step::Emit(
                events::STORY_THREW_EXCEPTION,
                json!({ "message": "Cannot read properties of undefined" }),
            ),
            Step::Emit(events::STORY_RENDERED, json!("form--broken")),
        ],
    );

    assert_eq!(
        observed.results,
        vec![load_error("Cannot read properties of undefined")]
    );
    assert_eq!(observed.listeners, 0);
}

#[test]
fn play_function_failure_takes_instrumented_message() {
    let observed = agree(
        Page::default(),
        SelectionRequest::new("form--play"),
        &[
            Step::Element("#storybook-root", "<form>"),
            Step::Open,
            Step::Interaction("form--play", None),
            Step::Interaction("form--play", Some("expected \"OK\" to be visible")),
            Step::Emit(events::PLAY_FUNCTION_THREW_EXCEPTION, json!({})),
            Step::Emit(events::STORY_RENDERED, json!("form--play")),
        ],
    );

    assert_eq!(
        observed.results,
        vec![StoryLoadResult {
            root_selector: "#storybook-root".into(),
            play_function_error: Some("expected \"OK\" to be visible".into()),
            ..StoryLoadResult::default()
        }]
    );
    assert_eq!(observed.listeners, 0);
}

#[test]
fn play_function_failure_without_details_and_root() {
    let observed = agree(
        Page::default(),
        SelectionRequest::new("form--play-opaque"),
        &[
            Step::Open,
            Step::Emit(events::PLAY_FUNCTION_THREW_EXCEPTION, json!({})),
            Step::Emit(events::PLAY_FUNCTION_THREW_EXCEPTION, json!({})),
            Step::Emit(events::STORY_RENDERED, json!("form--play-opaque")),
        ],
    );

    assert_eq!(
        observed.results,
        vec![StoryLoadResult {
            play_function_error: Some(UNKNOWN_PLAY_FUNCTION_ERROR.into()),
            ..StoryLoadResult::default()
        }]
    );
}

#[test]
fn remount_teardown_is_skipped_before_missing_story() {
    let observed = agree(
        Page::default(),
        SelectionRequest::new("button--gone").remount(true),
        &[
            Step::Open,
            Step::Emit(events::STORY_MISSING, json!("")),
            Step::Element(
                "#error-stack",
                "MissingStoryError: x Couldn't find story matching 'button--gone'",
            ),
            Step::Emit(events::STORY_MISSING, json!("button--gone")),
        ],
    );

    assert_eq!(
        observed.results,
        vec![load_error("Couldn't find story matching 'button--gone'")]
    );
    assert_eq!(observed.current_story, Some(json!({ "storyId": "button--gone" })));
    assert_eq!(observed.listeners, 0);
}

#[test]
fn args_resolve_after_update_and_once() {
    let observed = agree(
        Page::default(),
        SelectionRequest::new("button--primary").with_args(args(json!({ "label": "OK" }))),
        &[
            Step::Element("#root", "<button>"),
            Step::Open,
            Step::Emit(events::STORY_RENDERED, json!("button--primary")),
            Step::Emit(events::STORY_RENDERED, json!("button--primary")),
            Step::Emit(events::STORY_ARGS_UPDATED, json!({})),
            Step::Emit(events::STORY_ERRORED, json!({ "title": "late" })),
            Step::Emit(events::STORY_ARGS_UPDATED, json!({})),
        ],
    );

    assert_eq!(
        observed.results,
        vec![StoryLoadResult {
            root_selector: "#root".into(),
            ..StoryLoadResult::default()
        }]
    );
    assert_eq!(observed.listeners, 0);
}

#[test]
fn globals_merge_over_recorded_defaults_before_selection() {
    let page = Page {
        preview_store: true,
        ..Page::default()
    };
    let request = SelectionRequest::new("button--primary")
        .with_globals(args(json!({ "theme": "dark" })));
    let setup = [
        Step::Emit(
            events::SET_GLOBALS,
            json!({ "globals": { "theme": "light", "locale": "en" } }),
        ),
        Step::Open,
    ];

    let pending = agree(page, request.clone(), &setup);
    assert_eq!(pending.current_story, None);
    assert_eq!(
        pending.globals_update,
        Some(json!({ "globals": { "theme": "dark", "locale": "en" } }))
    );
    assert_eq!(pending.listeners, 1);

    let [defaults, open] = setup;
    let observed = agree(
        page,
        request,
        &[
            defaults,
            Step::Element("#storybook-root", "<button>"),
            open,
            Step::Emit(events::GLOBALS_UPDATED, json!({})),
            Step::Emit(events::GLOBALS_UPDATED, json!({})),
            Step::Emit(events::STORY_RENDERED, json!("button--primary")),
        ],
    );
    assert_eq!(observed.current_story, Some(json!({ "storyId": "button--primary" })));
    assert_eq!(
        observed.results,
        vec![StoryLoadResult {
            root_selector: "#storybook-root".into(),
            ..StoryLoadResult::default()
        }]
    );
    assert_eq!(observed.listeners, 0);
}

#[test]
fn page_without_channel_resolves_immediately() {
    let observed = agree(
        Page {
            no_channel: true,
            ..Page::default()
        },
        SelectionRequest::new("button--primary"),
        &[Step::Open],
    );

    assert_eq!(observed.results, vec![load_error(MISSING_CHANNEL_ERROR)]);
    assert_eq!(observed.current_story, None);
}
