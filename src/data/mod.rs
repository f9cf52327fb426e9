//! Data buffering and caching modules.
pub mod aggregating_buffer;
pub mod cache;
