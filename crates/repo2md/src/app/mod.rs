//! Selection state and the workflows that drive it.

pub mod analysis;
pub mod export;
pub mod extensions;
pub mod session;
pub mod sync;
pub mod tree;
