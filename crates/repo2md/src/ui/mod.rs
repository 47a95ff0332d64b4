//! Terminal interface.

pub mod app;
pub mod components;
