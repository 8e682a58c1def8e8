//! Storybook harness
//!
//! Host-side tooling around the story selection protocol: configuration,
//! the story catalog of a running storybook, generated test plans and the
//! runner that opens every planned story in a WebDriver session.

pub mod browsers;
pub mod catalog;
pub mod config;
pub mod plan;
pub mod runner;

pub use config::{ConfigError, HarnessConfig};
pub use plan::{PlanOptions, TestPlan};
pub use runner::{RunReport, RunStatus, StoryRun};
