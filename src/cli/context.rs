use std::path::{Path, PathBuf};
use std::sync::Arc;

use storybook_harness::HarnessConfig;

pub struct CliContext {
    config: Arc<HarnessConfig>,
    config_path: Option<PathBuf>,
}

impl CliContext {
    pub fn new(config: HarnessConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
