use std::collections::HashMap;
use std::time::Duration;

use harness_core_types::{bindings, Args};
use preview_coordinator::{
    install, BrowserCall, BrowserOptions, EmulatedBrowser, PreviewConfig, StoryBehavior,
};
use serde_json::json;
use story_command::{SelectStoryCommand, StoryCommandError, META_STORY_FILE, META_URL};
use wd_bridge::{AutomationSession, DriverError};

const STORYBOOK_URL: &str = "http://localhost:6006";
const IFRAME_URL: &str = "http://localhost:6006/iframe.html";

fn preview() -> PreviewConfig {
    PreviewConfig::default()
        .with_story("btn--primary", StoryBehavior::Renders)
        .with_story("btn--secondary", StoryBehavior::Renders)
        .with_story(
            "form--play",
            StoryBehavior::PlayFails(Some("expected \"OK\" to be visible".into())),
        )
        .with_story("form--hang", StoryBehavior::Hang)
}

fn command() -> SelectStoryCommand {
    SelectStoryCommand::new(STORYBOOK_URL).with_render_timeout(Duration::from_millis(300))
}

fn label(value: &str) -> Args {
    let mut args = Args::new();
    args.insert("label".into(), json!(value));
    args
}

#[tokio::test]
async fn fresh_page_navigates_injects_and_renders() {
    let browser = EmulatedBrowser::new(preview());
    let command = command();

    command
        .select_story(&browser, "btn--primary", label("OK"))
        .await
        .unwrap();

    assert_eq!(
        browser.calls(),
        vec![
            BrowserCall::Execute("probe-coordinator"),
            BrowserCall::CurrentUrl,
            BrowserCall::Navigate(IFRAME_URL.to_string()),
            BrowserCall::ExecuteAsync("open-story"),
            BrowserCall::Execute("inject-coordinator"),
            BrowserCall::ExecuteAsync("open-story"),
            BrowserCall::CurrentUrl,
        ]
    );
    let runtime = browser.runtime().expect("preview booted");
    assert_eq!(runtime.current_story().as_deref(), Some("btn--primary"));
    assert_eq!(runtime.story_args("btn--primary")["label"], json!("OK"));
    assert_eq!(
        browser.meta().get_str(META_URL).as_deref(),
        Some("http://localhost:6006/iframe.html?id=btn--primary")
    );
}

#[tokio::test]
async fn injected_coordinator_is_reused() {
    let browser = EmulatedBrowser::new(preview());
    let command = command();
    command
        .select_story(&browser, "btn--primary", Args::new())
        .await
        .unwrap();
    browser.clear_calls();

    command
        .select_story(&browser, "btn--secondary", Args::new())
        .await
        .unwrap();

    assert_eq!(
        browser.calls(),
        vec![
            BrowserCall::Execute("probe-coordinator"),
            BrowserCall::ExecuteAsync("open-story"),
            BrowserCall::CurrentUrl,
        ]
    );
}

#[tokio::test]
async fn missing_story_fails_with_overlay_text() {
    let browser = EmulatedBrowser::new(preview());

    let err = command()
        .select_story(&browser, "missing-id", Args::new())
        .await
        .unwrap_err();

    assert!(matches!(err, StoryCommandError::LoadError(_)));
    assert_eq!(err.to_string(), "Couldn't find story matching 'missing-id'.");
    assert_eq!(browser.meta().get(META_URL), None);
}

#[tokio::test]
async fn play_function_failure_has_distinct_error_type() {
    let browser = EmulatedBrowser::new(preview());

    let err = command()
        .select_story(&browser, "form--play", Args::new())
        .await
        .unwrap_err();

    let play = err.play_function_error().expect("play function error");
    assert_eq!(play.message, "expected \"OK\" to be visible");
}

#[tokio::test]
async fn reselecting_same_story_remounts() {
    let browser = EmulatedBrowser::new(preview());
    let command = command();

    command
        .select_story(&browser, "btn--primary", Args::new())
        .await
        .unwrap();
    command
        .select_story(&browser, "btn--primary", Args::new())
        .await
        .unwrap();

    let runtime = browser.runtime().unwrap();
    assert_eq!(
        runtime.selections(),
        vec![
            "btn--primary".to_string(),
            String::new(),
            "btn--primary".to_string()
        ]
    );
}

#[tokio::test]
async fn missing_async_execute_falls_back_to_polling() {
    let browser = EmulatedBrowser::with_options(
        preview(),
        BrowserOptions {
            async_execute: false,
            ..BrowserOptions::default()
        },
    );

    command()
        .select_story(&browser, "btn--primary", Args::new())
        .await
        .unwrap();

    let calls = browser.calls();
    assert!(calls.contains(&BrowserCall::Execute("start-open-story")));
    assert!(calls.contains(&BrowserCall::Execute("is-story-rendered")));
    assert_eq!(
        browser.runtime().unwrap().current_story().as_deref(),
        Some("btn--primary")
    );
    assert_eq!(
        browser.meta().get_str(META_URL).as_deref(),
        Some("http://localhost:6006/iframe.html?id=btn--primary")
    );
}

#[tokio::test]
async fn polling_cannot_observe_load_errors() {
    let browser = EmulatedBrowser::with_options(
        preview(),
        BrowserOptions {
            async_execute: false,
            ..BrowserOptions::default()
        },
    );

    command()
        .select_story(&browser, "missing-id", Args::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn polling_times_out_naming_the_story() {
    let browser = EmulatedBrowser::with_options(
        preview(),
        BrowserOptions {
            async_execute: false,
            ..BrowserOptions::default()
        },
    );

    let err = command()
        .select_story(&browser, "form--hang", Args::new())
        .await
        .unwrap_err();

    assert!(matches!(err, StoryCommandError::Driver(DriverError::Timeout(_))));
    assert_eq!(err.to_string(), "Story: \"form--hang\" is not rendered");
}

#[tokio::test]
async fn other_driver_errors_propagate() {
    let browser = EmulatedBrowser::with_options(
        preview(),
        BrowserOptions {
            script_timeout: Duration::from_millis(50),
            ..BrowserOptions::default()
        },
    );

    let err = command()
        .select_story(&browser, "form--hang", Args::new())
        .await
        .unwrap_err();

    assert!(matches!(err, StoryCommandError::Driver(DriverError::Timeout(_))));
    assert!(!browser.calls().contains(&BrowserCall::Execute("start-open-story")));
}

#[tokio::test]
async fn navigation_failure_marks_session_for_reinit() {
    let browser = EmulatedBrowser::new(preview());
    let command = command();
    browser.fail_next_navigations(1);

    let err = command
        .select_story(&browser, "btn--primary", Args::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoryCommandError::Driver(DriverError::Transport(_))));
    assert!(command.invalidation().is_set());

    install(browser.window());
    browser.clear_calls();

    command
        .select_story(&browser, "btn--primary", Args::new())
        .await
        .unwrap();

    assert!(browser
        .calls()
        .contains(&BrowserCall::Navigate(IFRAME_URL.to_string())));
    assert!(!command.invalidation().is_set());
}

#[tokio::test]
async fn preview_without_addon_is_misconfiguration() {
    let browser = EmulatedBrowser::new(preview());
    browser.navigate(IFRAME_URL).await.unwrap();
    browser.clear_calls();

    let err = command()
        .select_story(&browser, "btn--primary", Args::new())
        .await
        .unwrap_err();

    assert!(matches!(err, StoryCommandError::AddonNotConnected));
    assert_eq!(
        err.to_string(),
        "Hermione addon is not connected to storybook config"
    );
    assert!(!browser
        .calls()
        .iter()
        .any(|call| matches!(call, BrowserCall::Navigate(_))));
}

#[tokio::test]
async fn preinstalled_addon_needs_no_injection() {
    let browser = EmulatedBrowser::new(PreviewConfig {
        addon_installed: true,
        ..preview()
    });
    browser.navigate(IFRAME_URL).await.unwrap();
    browser.clear_calls();

    command()
        .select_story(&browser, "btn--primary", Args::new())
        .await
        .unwrap();

    assert!(!browser
        .calls()
        .contains(&BrowserCall::Execute("inject-coordinator")));
}

#[tokio::test]
async fn blocked_injection_is_reported() {
    let browser = EmulatedBrowser::with_options(
        preview(),
        BrowserOptions {
            block_injection: true,
            ..BrowserOptions::default()
        },
    );

    let err = command()
        .select_story(&browser, "btn--primary", Args::new())
        .await
        .unwrap_err();

    assert!(matches!(err, StoryCommandError::InjectionFailed));
    assert_eq!(err.to_string(), "Can't inject client script");
}

#[tokio::test]
async fn unsupported_get_url_reads_as_empty() {
    let browser = EmulatedBrowser::with_options(
        preview(),
        BrowserOptions {
            current_url: false,
            ..BrowserOptions::default()
        },
    );

    command()
        .select_story(&browser, "btn--primary", Args::new())
        .await
        .unwrap();

    assert!(browser
        .calls()
        .contains(&BrowserCall::Navigate(IFRAME_URL.to_string())));
    assert_eq!(browser.meta().get_str(META_URL).as_deref(), Some(""));
}

#[tokio::test]
async fn known_story_file_is_recorded() {
    let browser = EmulatedBrowser::new(preview());
    let files = HashMap::from([(
        "btn--primary".to_string(),
        "./src/Button.stories.tsx".to_string(),
    )]);

    command()
        .with_story_files(files)
        .select_story(&browser, "btn--primary", Args::new())
        .await
        .unwrap();

    assert_eq!(
        browser.meta().get_str(META_STORY_FILE).as_deref(),
        Some("./src/Button.stories.tsx")
    );
}

#[tokio::test]
async fn unsupported_presence_check_reads_as_absent_coordinator() {
    let browser = EmulatedBrowser::with_options(
        PreviewConfig {
            addon_installed: true,
            ..preview()
        },
        BrowserOptions {
            sync_execute: false,
            ..BrowserOptions::default()
        },
    );
    let command = command();

    command
        .select_story(&browser, "btn--primary", Args::new())
        .await
        .unwrap();
    assert_eq!(
        browser.calls(),
        vec![
            BrowserCall::Execute("probe-coordinator"),
            BrowserCall::CurrentUrl,
            BrowserCall::Navigate(IFRAME_URL.to_string()),
            BrowserCall::ExecuteAsync("open-story"),
            BrowserCall::CurrentUrl,
        ]
    );

    // The presence check never sees the coordinator, so an open preview looks unhooked.
    let err = command
        .select_story(&browser, "btn--secondary", Args::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoryCommandError::AddonNotConnected));
}

#[tokio::test]
async fn driver_without_script_support_reports_not_implemented() {
    let browser = EmulatedBrowser::with_options(
        preview(),
        BrowserOptions {
            sync_execute: false,
            async_execute: false,
            ..BrowserOptions::default()
        },
    );

    let err = command()
        .select_story(&browser, "btn--primary", Args::new())
        .await
        .unwrap_err();

    assert!(err.is_not_implemented());
    assert!(browser
        .calls()
        .contains(&BrowserCall::Execute("inject-coordinator")));
}

#[tokio::test]
async fn selection_waits_for_document_load() {
    let browser = EmulatedBrowser::with_options(
        preview(),
        BrowserOptions {
            hold_page_load: true,
            ..BrowserOptions::default()
        },
    );
    let command = command();

    let select = command.select_story(&browser, "btn--primary", Args::new());
    let release = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!browser.window().is_loaded());
        assert_eq!(browser.runtime().expect("preview booted").current_story(), None);
        browser.finish_loading();
    };
    let (selected, ()) = tokio::join!(select, release);

    selected.unwrap();
    assert_eq!(
        browser.runtime().unwrap().current_story().as_deref(),
        Some("btn--primary")
    );
}

#[tokio::test]
async fn polling_waits_for_document_load() {
    let browser = EmulatedBrowser::with_options(
        preview(),
        BrowserOptions {
            async_execute: false,
            hold_page_load: true,
            ..BrowserOptions::default()
        },
    );
    let command = command();

    let select = command.select_story(&browser, "btn--primary", Args::new());
    let release = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!browser.window().flag(bindings::IS_STORY_RENDERED));
        browser.finish_loading();
    };
    let (selected, ()) = tokio::join!(select, release);

    selected.unwrap();
    assert!(browser.window().flag(bindings::IS_STORY_RENDERED));
    assert_eq!(
        browser.runtime().unwrap().current_story().as_deref(),
        Some("btn--primary")
    );
}
