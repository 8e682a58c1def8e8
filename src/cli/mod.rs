pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod generate;
pub mod info;
pub mod output;
pub mod run;
pub mod runtime;
pub mod select;
pub mod stories;
