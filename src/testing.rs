//! Synthetic measurement frame construction for tests and benchmarks.
//!
//! Builds multipart frames byte-identical to what the acquisition side
//! publishes: JSON header, timestamp block (realtime plus monotonic pair,
//! the latter unused by the decoder), one `i32` block per analog channel,
//! and the trailing `u32` digital bitmask block.

use crate::decoder::RawFrame;
use bytes::Bytes;
use serde_json::{json, Value};

/// Start building a synthetic frame.
pub fn frame_builder() -> FrameBuilder {
    FrameBuilder::default()
}

/// Builder for one multipart measurement frame.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    data_rate: u32,
    epoch_seconds: i64,
    epoch_nanoseconds: i64,
    channels: Vec<Value>,
    analog_parts: Vec<Bytes>,
    masks: Vec<u32>,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self {
            data_rate: 1000,
            epoch_seconds: 0,
            epoch_nanoseconds: 0,
            channels: Vec::new(),
            analog_parts: Vec::new(),
            masks: Vec::new(),
        }
    }
}

impl FrameBuilder {
    /// Advertised source sample rate.
    pub fn data_rate(mut self, data_rate: u32) -> Self {
        self.data_rate = data_rate;
        self
    }

    /// Batch epoch carried in the timestamp block.
    pub fn epoch(mut self, seconds: i64, nanoseconds: i64) -> Self {
        self.epoch_seconds = seconds;
        self.epoch_nanoseconds = nanoseconds;
        self
    }

    /// Add an analog channel with explicit unit and scale.
    pub fn channel(mut self, name: &str, unit: &str, scale: f64, samples: &[i32]) -> Self {
        self.channels.push(json!({
            "name": name,
            "unit": unit,
            "scale": scale,
        }));
        self.analog_parts.push(encode_i32(samples));
        self
    }

    /// Add a voltage channel at the standard acquisition scale.
    pub fn voltage(self, name: &str, samples: &[i32]) -> Self {
        self.channel(name, "V", 1e-8, samples)
    }

    /// Add a current channel at the standard high-range scale.
    pub fn current(self, name: &str, samples: &[i32]) -> Self {
        self.channel(name, "A", 1e-9, samples)
    }

    /// Add a digital channel occupying `bit` in the shared bitmask.
    pub fn digital_bit(mut self, name: &str, bit: u8) -> Self {
        self.channels.push(json!({
            "name": name,
            "unit": "binary",
            "bit": bit,
        }));
        self
    }

    /// Add a hidden range-validity channel occupying `bit`.
    pub fn validity(mut self, name: &str, bit: u8) -> Self {
        self.channels.push(json!({
            "name": name,
            "unit": "binary",
            "bit": bit,
            "hidden": true,
        }));
        self
    }

    /// Set the raw digital bitmask block; its length defines the frame's raw
    /// sample count.
    pub fn digital_masks(mut self, masks: &[u32]) -> Self {
        self.masks = masks.to_vec();
        self
    }

    /// Assemble the multipart frame.
    pub fn build(self) -> RawFrame {
        let header = json!({
            "data_rate": self.data_rate,
            "channels": self.channels,
        });

        let mut time_part = Vec::with_capacity(32);
        time_part.extend_from_slice(&self.epoch_seconds.to_le_bytes());
        time_part.extend_from_slice(&self.epoch_nanoseconds.to_le_bytes());
        // monotonic clock pair, present on the wire but ignored by the decoder
        time_part.extend_from_slice(&0i64.to_le_bytes());
        time_part.extend_from_slice(&0i64.to_le_bytes());

        let mut frame: RawFrame = Vec::with_capacity(3 + self.analog_parts.len());
        frame.push(Bytes::from(header.to_string()));
        frame.push(Bytes::from(time_part));
        frame.extend(self.analog_parts);

        let mut digital_part = Vec::with_capacity(self.masks.len() * 4);
        for mask in &self.masks {
            digital_part.extend_from_slice(&mask.to_le_bytes());
        }
        frame.push(Bytes::from(digital_part));

        frame
    }
}

fn encode_i32(samples: &[i32]) -> Bytes {
    let mut part = Vec::with_capacity(samples.len() * 4);
    for sample in samples {
        part.extend_from_slice(&sample.to_le_bytes());
    }
    Bytes::from(part)
}
