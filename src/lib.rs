//! Translation search and fuzzy matching over translation memory.
//!
//! Finders build queries against a [`SearchIndex`](services::index::SearchIndex)
//! port; the embedded [`MemoryIndex`](services::index::MemoryIndex) and the
//! Elasticsearch [`HttpIndex`](services::index::HttpIndex) both implement it.

pub mod config;
pub mod error;
pub mod model;
pub mod protocol;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;

pub use error::{CoreError, Result};
