//! Plain data shared by every layer.

pub mod errors;
pub mod model;
