//! Streaming data cache answering catch-up queries over buffered history.
//!
//! The cache owns one [`AggregatingBuffer`] per analog channel plus one for
//! time and one for the digital bitmap, all built from the same
//! `(size, levels, aggregation_factor)` geometry. Decoded frames are written
//! in by the single consuming loop; late-joining clients ask for "everything
//! newer than the last thing I saw" via [`DataCache::read`].
//!
//! Two states drive the lifecycle: reset-pending (initial, or after
//! [`DataCache::request_reset`] on a new measurement start) and active. The
//! first write after a reset rebuilds all buffers from the incoming channel
//! set; an active-state write whose channel set differs in shape is dropped
//! with a diagnostic, never fatal.

use crate::data::aggregating_buffer::AggregatingBuffer;
use crate::decoder::DecodedMessage;
use crate::metadata::{self, ChannelMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Ring buffer geometry shared by all cache buffers. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Samples of history per resolution level.
    pub size: usize,
    /// Number of resolution levels.
    pub levels: usize,
    /// Ratio between adjacent resolution levels.
    pub aggregation_factor: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size: 10_000,
            levels: 3,
            aggregation_factor: 10,
        }
    }
}

/// Reply to a catch-up read.
///
/// A cache miss is a first-class empty reply, not an error: `time` and
/// `digital` are `None` and the maps are empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheReply {
    /// Channel metadata installed at the time of the read.
    pub metadata: ChannelMap,
    /// Timestamps of the returned slice, milliseconds since the epoch.
    pub time: Option<Vec<f64>>,
    /// Physical-unit values per analog channel, aligned with `time`.
    pub data: BTreeMap<String, Vec<f32>>,
    /// Digital bitmasks, aligned with `time`.
    pub digital: Option<Vec<u8>>,
}

impl CacheReply {
    /// The empty-but-valid reply returned on a cache miss.
    pub fn miss() -> Self {
        Self::default()
    }

    /// Whether this reply is a cache miss.
    pub fn is_miss(&self) -> bool {
        self.time.is_none()
    }
}

/// Multi-resolution cache over one decoded measurement stream.
#[derive(Debug)]
pub struct DataCache {
    config: CacheConfig,
    metadata: ChannelMap,
    time: AggregatingBuffer<f64>,
    digital: AggregatingBuffer<u8>,
    data: BTreeMap<String, AggregatingBuffer<f32>>,
    reset_pending: bool,
}

impl DataCache {
    /// Create an empty cache. The first write installs the channel set and
    /// allocates the per-channel buffers.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            metadata: ChannelMap::new(),
            time: Self::time_buffer(&config),
            digital: Self::digital_buffer(&config),
            data: BTreeMap::new(),
            reset_pending: true,
        }
    }

    fn time_buffer(config: &CacheConfig) -> AggregatingBuffer<f64> {
        AggregatingBuffer::new(
            config.size,
            config.levels,
            config.aggregation_factor,
            Some(f64::NAN),
        )
    }

    fn digital_buffer(config: &CacheConfig) -> AggregatingBuffer<u8> {
        AggregatingBuffer::new(config.size, config.levels, config.aggregation_factor, None)
    }

    /// Geometry the cache was built with.
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Channel metadata currently installed.
    pub fn metadata(&self) -> &ChannelMap {
        &self.metadata
    }

    /// Mark the cache for an atomic rebuild on the next write, e.g. when a
    /// new measurement is started.
    pub fn request_reset(&mut self) {
        self.reset_pending = true;
    }

    /// Whether the next write will rebuild the buffers.
    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// Re-initialize all buffers for the given channel set.
    fn rebuild(&mut self, channels: &ChannelMap) {
        self.time = Self::time_buffer(&self.config);
        self.digital = Self::digital_buffer(&self.config);
        self.data = channels
            .values()
            .filter(|meta| !meta.is_digital())
            .map(|meta| {
                let buffer = AggregatingBuffer::new(
                    self.config.size,
                    self.config.levels,
                    self.config.aggregation_factor,
                    Some(f32::NAN),
                );
                (meta.name.clone(), buffer)
            })
            .collect();
        self.metadata = channels.clone();
        self.reset_pending = false;
        info!(
            channels = self.metadata.len(),
            size = self.config.size,
            levels = self.config.levels,
            "cache buffers rebuilt"
        );
    }

    /// Append a decoded message to the cache.
    ///
    /// On a pending reset the buffers are rebuilt for the message's channel
    /// set first. An active-state message whose channel set differs in shape
    /// from the installed one is dropped with a warning; subsequent writes
    /// are unaffected.
    pub fn write(&mut self, message: &DecodedMessage) {
        if self.reset_pending {
            self.rebuild(&message.metadata);
        } else if !metadata::same_shape(&self.metadata, &message.metadata) {
            warn!(
                cached = self.metadata.len(),
                incoming = message.metadata.len(),
                "metadata mismatch of data cache and incoming data, dropping write"
            );
            return;
        }

        if message.time.len() > self.config.size {
            warn!(
                samples = message.time.len(),
                size = self.config.size,
                "message exceeds one buffer level, dropping write"
            );
            return;
        }

        self.time.add(&message.time);
        self.digital.add(&message.digital);

        for (name, values) in &message.data {
            let Some(buffer) = self.data.get_mut(name) else {
                warn!(channel = %name, "no cache buffer for channel, skipping");
                continue;
            };

            if values.len() == message.time.len() {
                buffer.add(values);
            } else {
                // interleave sub-rate channel data with NaN up to batch length
                match expand_subsampled(values, message.time.len()) {
                    Some(expanded) => buffer.add(&expanded),
                    None => {
                        warn!(
                            channel = %name,
                            samples = values.len(),
                            batch = message.time.len(),
                            "channel data longer than batch, skipping"
                        );
                    }
                }
            }
        }
    }

    /// Catch-up read: everything cached at or after `time_reference`
    /// (milliseconds since the epoch), bounded to the most recent `limit`
    /// samples when `limit > 0`.
    ///
    /// The scan covers the whole multi-level view, coarsest level first, so
    /// a long catch-up spans resolutions: old history arrives aggregated,
    /// recent history at full rate. Returns [`CacheReply::miss`] when no
    /// cached timestamp reaches the reference.
    pub fn read(&self, time_reference: f64, limit: usize) -> CacheReply {
        debug!(time_reference, limit, "cache read");

        let time_view = self.time.view();
        let Some(first_valid) = time_view.iter().position(|v| !v.is_nan()) else {
            debug!("cache miss: no data yet");
            return CacheReply::miss();
        };
        let Some(offset) = time_view[first_valid..]
            .iter()
            .position(|&t| t >= time_reference)
        else {
            debug!("cache miss: no data at or after reference");
            return CacheReply::miss();
        };

        let found = first_valid + offset;
        let start = if limit > 0 {
            found.max(time_view.len().saturating_sub(limit))
        } else {
            found
        };
        debug!(start, end = time_view.len(), "cache hit");

        let mut reply = CacheReply {
            metadata: self.metadata.clone(),
            time: Some(time_view[start..].to_vec()),
            data: BTreeMap::new(),
            digital: Some(self.digital.view()[start..].to_vec()),
        };
        for (name, buffer) in &self.data {
            reply
                .data
                .insert(name.clone(), buffer.view()[start..].to_vec());
        }

        reply
    }
}

/// Spread sub-rate samples across a full-length batch, keeping each value at
/// the decimation-inverse position and `NaN` everywhere else. Returns `None`
/// when the data is longer than the batch.
fn expand_subsampled(values: &[f32], batch_len: usize) -> Option<Vec<f32>> {
    if values.is_empty() || values.len() > batch_len {
        return None;
    }

    let ratio = batch_len / values.len();
    let expanded = (0..batch_len)
        .map(|i| {
            if i % ratio == 0 {
                values.get(i / ratio).copied().unwrap_or(f32::NAN)
            } else {
                f32::NAN
            }
        })
        .collect();
    Some(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ChannelMetadata, ChannelUnit};
    use tracing_test::traced_test;

    fn analog(name: &str) -> ChannelMetadata {
        ChannelMetadata {
            name: name.to_string(),
            unit: Some(ChannelUnit::Volt),
            scale: Some(1e-8),
            bit: None,
            validity_link: None,
            hidden: false,
        }
    }

    fn message(time: Vec<f64>, values: Vec<f32>) -> DecodedMessage {
        let mut metadata = ChannelMap::new();
        metadata.insert("V1".into(), analog("V1"));
        let mut data = BTreeMap::new();
        data.insert("V1".into(), values);
        DecodedMessage {
            metadata,
            digital: vec![0; time.len()],
            time,
            data,
        }
    }

    fn small_cache() -> DataCache {
        DataCache::new(CacheConfig {
            size: 16,
            levels: 2,
            aggregation_factor: 4,
        })
    }

    #[test]
    fn fresh_cache_misses() {
        let cache = small_cache();
        let reply = cache.read(0.0, 0);
        assert!(reply.is_miss());
        assert!(reply.metadata.is_empty());
        assert!(reply.data.is_empty());
        assert!(reply.digital.is_none());
    }

    #[test]
    fn catch_up_read_returns_samples_since_reference() {
        let mut cache = small_cache();
        cache.write(&message(vec![100.0], vec![1.0]));
        cache.write(&message(vec![200.0], vec![2.0]));
        cache.write(&message(vec![300.0], vec![3.0]));

        let reply = cache.read(150.0, 0);
        assert_eq!(reply.time.as_deref(), Some(&[200.0, 300.0][..]));
        assert_eq!(reply.data["V1"], vec![2.0, 3.0]);
        assert_eq!(reply.digital.as_deref(), Some(&[0, 0][..]));

        let reply = cache.read(50.0, 0);
        assert_eq!(reply.time.as_deref(), Some(&[100.0, 200.0, 300.0][..]));

        assert!(cache.read(1000.0, 0).is_miss());
    }

    #[test]
    fn limit_bounds_reply_to_most_recent_samples() {
        let mut cache = small_cache();
        for i in 0..4 {
            let t = 100.0 * f64::from(i + 1);
            cache.write(&message(vec![t], vec![t as f32]));
        }

        let reply = cache.read(0.0, 2);
        assert_eq!(reply.time.as_deref(), Some(&[300.0, 400.0][..]));

        // a limit larger than the available window changes nothing
        let reply = cache.read(0.0, 1000);
        assert_eq!(reply.time.as_deref(), Some(&[100.0, 200.0, 300.0, 400.0][..]));
    }

    #[test]
    #[traced_test]
    fn mismatched_shape_write_is_dropped() {
        let mut cache = small_cache();
        cache.write(&message(vec![100.0], vec![1.0]));

        let mut other = message(vec![200.0], vec![2.0]);
        other.metadata.insert("V2".into(), analog("V2"));
        other.data.insert("V2".into(), vec![2.0]);
        cache.write(&other);

        assert!(logs_contain("metadata mismatch"));
        let reply = cache.read(0.0, 0);
        assert_eq!(reply.time.as_deref(), Some(&[100.0][..]));
        assert!(!reply.metadata.contains_key("V2"));
    }

    #[test]
    fn reset_rebuilds_for_new_channel_set() {
        let mut cache = small_cache();
        cache.write(&message(vec![100.0], vec![1.0]));

        let mut other = message(vec![200.0], vec![2.0]);
        other.metadata.insert("V2".into(), analog("V2"));
        other.data.insert("V2".into(), vec![20.0]);

        cache.request_reset();
        cache.write(&other);

        let reply = cache.read(0.0, 0);
        assert_eq!(reply.time.as_deref(), Some(&[200.0][..]));
        assert!(reply.metadata.contains_key("V2"));
        assert_eq!(reply.data["V2"], vec![20.0]);
    }

    #[test]
    fn sub_rate_channel_is_nan_interleaved() {
        let mut cache = small_cache();
        let time: Vec<f64> = (0..8).map(|i| 100.0 + f64::from(i)).collect();
        let mut msg = message(time, vec![1.0, 2.0]);
        // second full-rate channel to pin the batch length
        msg.metadata.insert("V2".into(), analog("V2"));
        msg.data.insert("V2".into(), (0..8).map(|i| i as f32).collect());

        cache.write(&msg);
        let reply = cache.read(0.0, 0);

        let v1 = &reply.data["V1"];
        assert_eq!(v1.len(), 8);
        assert_eq!(v1[0], 1.0);
        assert_eq!(v1[4], 2.0);
        for i in [1usize, 2, 3, 5, 6, 7] {
            assert!(v1[i].is_nan());
        }
    }

    #[test]
    fn oversized_message_is_dropped_not_fatal() {
        let mut cache = small_cache();
        cache.write(&message(vec![100.0], vec![1.0]));

        let time: Vec<f64> = (0..17).map(f64::from).collect();
        let values: Vec<f32> = (0..17).map(|i| i as f32).collect();
        cache.write(&message(time, values));

        let reply = cache.read(0.0, 0);
        assert_eq!(reply.time.as_deref(), Some(&[100.0][..]));
    }

    #[test]
    fn expand_subsampled_positions() {
        let expanded = expand_subsampled(&[1.0, 2.0], 6).unwrap();
        assert_eq!(expanded.len(), 6);
        assert_eq!(expanded[0], 1.0);
        assert_eq!(expanded[3], 2.0);
        assert!(expanded[1].is_nan());
        assert!(expanded[2].is_nan());
        assert!(expanded[4].is_nan());
        assert!(expanded[5].is_nan());

        assert!(expand_subsampled(&[1.0; 7], 6).is_none());
    }
}
