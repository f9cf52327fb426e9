//! # Live Telemetry Cache
//!
//! This crate is the live-telemetry tier of a web dashboard for a continuous
//! data-logging instrument. It ingests the high-rate, multi-channel
//! measurement stream published by the acquisition process and keeps a
//! bounded, multi-resolution history of it, so web clients that join or
//! reconnect at arbitrary times can catch up with one query.
//!
//! ## Crate Structure
//!
//! - **`config`**: figment-based settings (cache geometry, decoder rates,
//!   logging) loaded from TOML and environment variables.
//! - **`data`**: the buffering tier, holding the multi-level
//!   [`AggregatingBuffer`](data::aggregating_buffer::AggregatingBuffer) and
//!   the [`DataCache`](data::cache::DataCache) answering catch-up reads.
//! - **`decoder`**: parses published multipart measurement frames into typed
//!   per-channel arrays with rate-appropriate decimation.
//! - **`merge`**: folds split dual-range channels into one logical channel
//!   driven by the per-sample validity bitmask.
//! - **`metadata`**: channel metadata records and the name-keyed channel map.
//! - **`service`**: the single-consumer command loop wiring
//!   decode → merge → write and answering read queries over channels.
//! - **`error`**: the crate-wide `TelemetryError` type.
//! - **`logging`**: tracing subscriber initialization.
//! - **`testing`**: synthetic frame construction for tests and benchmarks.
//!
//! The surrounding transport (the socket carrying frames in and replies out)
//! and the HTTP/asset tier are external collaborators; this crate begins at
//! the raw multipart frame and ends at the serialized cache reply.

pub mod config;
pub mod data;
pub mod decoder;
pub mod error;
pub mod logging;
pub mod merge;
pub mod metadata;
pub mod service;
pub mod testing;
