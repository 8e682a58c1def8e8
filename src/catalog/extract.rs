use harness_core_types::StoryDescriptor;
use serde_json::Value;
use tracing::warn;

use super::CatalogResult;

pub const SUPPORTED_VERSIONS: [u64; 2] = [3, 4];

const STORIES_JSON_VERSION: u64 = 3;
const DOCS_TAG: &str = "docs";
const STORY_KIND: &str = "story";

/// Stories listed by a `stories.json` or `index.json` document.
///
/// Unknown versions are read as `index.json`.
pub fn extract_stories(data: &Value) -> CatalogResult<Vec<StoryDescriptor>> {
    let version = data.get("v").and_then(Value::as_u64);
    if !version.map_or(false, |v| SUPPORTED_VERSIONS.contains(&v)) {
        let found = data
            .get("v")
            .map(Value::to_string)
            .unwrap_or_else(|| "undefined".to_string());
        let expected = SUPPORTED_VERSIONS.map(|v| v.to_string()).join(", ");
        warn!(target: "catalog", "Unsupported version of stories json");
        warn!(target: "catalog", "'{expected}' expected, but {found} found");
        warn!(target: "catalog", "I'll try to do my best with it! (acting like it's v4)");
    }

    if version == Some(STORIES_JSON_VERSION) {
        extract_v3(data)
    } else {
        extract_v4(data)
    }
}

fn entries<'a>(data: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    data.get(key)
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|map| map.values())
}

fn extract_v3(data: &Value) -> CatalogResult<Vec<StoryDescriptor>> {
    let mut stories = Vec::new();
    for entry in entries(data, "stories") {
        let mut story: StoryDescriptor = serde_json::from_value(entry.clone())?;
        if story.has_tag(DOCS_TAG) {
            continue;
        }
        story.kind = STORY_KIND.to_string();
        stories.push(story);
    }
    Ok(stories)
}

fn extract_v4(data: &Value) -> CatalogResult<Vec<StoryDescriptor>> {
    entries(data, "entries")
        .filter(|entry| entry.get("type").and_then(Value::as_str) == Some(STORY_KIND))
        .map(|entry| Ok(serde_json::from_value(entry.clone())?))
        .collect()
}
