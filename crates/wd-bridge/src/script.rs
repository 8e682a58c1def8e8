//! Registry of the scripts the host runs inside the preview page.
//!
//! Each variant is one well-known page operation. Real drivers receive the
//! JavaScript produced by [`PageScript::source`]; emulated sessions match on
//! the variant directly, so both sides share one vocabulary.

use harness_core_types::bindings;
use harness_core_types::SelectionRequest;
use serde_json::Value;

/// Embedded page-side coordinator.
pub const OPEN_STORY_SCRIPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/open_story.js"
));

#[derive(Clone, Debug, PartialEq)]
pub enum PageScript {
    /// Is a coordinator entry point bound on the page?
    ProbeCoordinator,
    /// Install the coordinator under both entry point names.
    InjectCoordinator,
    /// Run the coordinator and hand its JSON result to the async callback.
    OpenStory(SelectionRequest),
    /// Fallback start: reset the completion flag and run the coordinator with
    /// a callback that only flips the flag.
    StartOpenStory(SelectionRequest),
    /// Read the fallback completion flag.
    IsStoryRendered,
}

impl PageScript {
    pub fn name(&self) -> &'static str {
        match self {
            PageScript::ProbeCoordinator => "probe-coordinator",
            PageScript::InjectCoordinator => "inject-coordinator",
            PageScript::OpenStory(_) => "open-story",
            PageScript::StartOpenStory(_) => "start-open-story",
            PageScript::IsStoryRendered => "is-story-rendered",
        }
    }

    pub fn request(&self) -> Option<&SelectionRequest> {
        match self {
            PageScript::OpenStory(request) | PageScript::StartOpenStory(request) => Some(request),
            _ => None,
        }
    }

    /// Function body in the W3C execute form: parameters arrive through
    /// `arguments`, async scripts receive their callback last.
    pub fn source(&self) -> String {
        match self {
            PageScript::ProbeCoordinator => format!(
                "return Boolean(window.{} || window.{});",
                bindings::OPEN_STORY,
                bindings::SELECT_STORY
            ),
            PageScript::InjectCoordinator => coordinator_install_source(),
            PageScript::OpenStory(_) => format!(
                "var done = arguments[arguments.length - 1];\n\
                 var coordinator = window.{open} || window.{select};\n\
                 if (!coordinator) {{ done(JSON.stringify({{ notInjected: true }})); return; }}\n\
                 coordinator(arguments[0], arguments[1], arguments[2], arguments[3], done);",
                open = bindings::OPEN_STORY,
                select = bindings::SELECT_STORY
            ),
            PageScript::StartOpenStory(_) => format!(
                "window.{flag} = false;\n\
                 var coordinator = window.{open} || window.{select};\n\
                 if (coordinator) {{\n\
                 coordinator(arguments[0], arguments[1], arguments[2], arguments[3], function () {{ window.{flag} = true; }});\n\
                 }}",
                flag = bindings::IS_STORY_RENDERED,
                open = bindings::OPEN_STORY,
                select = bindings::SELECT_STORY
            ),
            PageScript::IsStoryRendered => {
                format!("return window.{} === true;", bindings::IS_STORY_RENDERED)
            }
        }
    }

    pub fn arguments(&self) -> Vec<Value> {
        match self.request() {
            Some(request) => vec![
                Value::String(request.story_id.clone()),
                Value::Object(request.args.clone()),
                Value::Object(request.storybook_globals.clone()),
                Value::Bool(request.should_remount),
            ],
            None => Vec::new(),
        }
    }
}

/// Script that defines the coordinator and binds it on `window`. Also usable
/// from a storybook preview config to pre-install the entry point.
pub fn coordinator_install_source() -> String {
    format!(
        "{script}\nwindow.{open} = openStory;\nwindow.{select} = openStory;\nreturn true;",
        script = OPEN_STORY_SCRIPT,
        open = bindings::OPEN_STORY,
        select = bindings::SELECT_STORY
    )
}
