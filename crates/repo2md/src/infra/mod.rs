//! Adapters for the analysis service, configuration, liveness, and the clipboard.

pub mod backend;
pub mod clipboard;
pub mod config;
pub mod liveness;
