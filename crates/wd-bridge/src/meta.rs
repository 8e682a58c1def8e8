use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Session-scoped metadata consumed by reporting (`url`, `storyFile`, ...).
#[derive(Debug, Clone, Default)]
pub struct SessionMeta {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl SessionMeta {
    pub fn set(&self, key: &str, value: Value) {
        self.values.write().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|value| value.as_str().map(str::to_string))
    }

    pub fn clear(&self) {
        self.values.write().clear();
    }
}
