//! Quick documentation for source code: resolves the element at the caret,
//! produces example-driven documentation for it on background workers, and
//! keeps a popup or docked tool window in sync with the user's focus.

pub mod action;
pub mod collector;
pub mod config;
pub mod error;
pub mod examples;
pub mod grammar;
pub mod link;
pub mod manager;
pub mod providers;
pub mod resolver;
pub mod scheduler;
pub mod settings;
pub mod source;
pub mod surface;
pub mod task;
pub mod types;
