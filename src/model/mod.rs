//! Data model shared by the codec and the manager.

pub mod types;

pub use types::SearchState;
