//! Frame decoder turning published measurement frames into typed arrays.
//!
//! A measurement frame is a multipart byte message from the acquisition side:
//!
//! - part 0: JSON header `{ "data_rate": N, "channels": [...] }`
//! - part 1: batch timestamp, at least two little-endian `i64` values
//!   (epoch seconds, nanoseconds remainder); additional timestamp pairs,
//!   e.g. a monotonic clock, are ignored
//! - parts 2..N-1: one block of little-endian `i32` raw samples per analog
//!   channel, in header declaration order
//! - part N-1: one little-endian `u32` digital bitmask per raw sample
//!
//! Decoding applies a rate limit: `downsample_factor` is derived from the
//! advertised source rate and the fixed maximum web output rate, and every
//! array is decimated at that stride. Decimation keeps every Nth raw sample
//! verbatim; nothing in this pipeline averages.
//!
//! Timestamps are not transmitted per sample: the batch carries one epoch
//! and output timestamps are reconstructed at the nominal output spacing.

use crate::error::{TelemetryError, TelemetryResult};
use crate::merge;
use crate::metadata::{ChannelMap, ChannelMetadata};
use bytes::{Buf, Bytes};
use serde::Deserialize;
use std::collections::BTreeMap;

/// One multipart frame as received from the publish/subscribe transport.
pub type RawFrame = Vec<Bytes>;

/// Decoder settings, fixed at construction of the telemetry service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Maximum downstream data rate towards web clients, in samples per second.
    pub web_data_rate: u32,
    /// Logical names of the declared dual-range channel groups.
    pub merge_groups: Vec<String>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            web_data_rate: 1000,
            merge_groups: vec!["I1".to_string(), "I2".to_string()],
        }
    }
}

/// Wire shape of the frame header JSON.
#[derive(Debug, Clone, Deserialize)]
struct WireHeader {
    data_rate: u32,
    channels: Vec<ChannelMetadata>,
}

/// Parsed frame header with derived decode parameters.
#[derive(Debug, Clone)]
pub struct FrameHeader {
    /// Channel metadata in declaration order.
    pub channels: Vec<ChannelMetadata>,
    /// Nominal source sample rate advertised by the acquisition side.
    pub data_rate: u32,
    /// Stride applied to every raw array during decoding.
    pub downsample_factor: usize,
    /// Raw sample count of this frame, derived from the digital block length.
    pub sample_count: usize,
}

/// Fully decoded and merged content of one measurement frame.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// Channel metadata after dual-range merging.
    pub metadata: ChannelMap,
    /// Reconstructed timestamps, milliseconds since the epoch.
    pub time: Vec<f64>,
    /// One digital bitmask per output sample.
    pub digital: Vec<u8>,
    /// Physical-unit values per analog channel; `NaN` marks instants a
    /// sub-rate channel did not sample.
    pub data: BTreeMap<String, Vec<f32>>,
}

/// Decode the frame header and derive the decode parameters.
pub fn parse_header(frame: &RawFrame, web_data_rate: u32) -> TelemetryResult<FrameHeader> {
    let (Some(header_part), Some(digital_part)) = (frame.first(), frame.last()) else {
        return Err(TelemetryError::MalformedFrame("empty frame".into()));
    };

    let header: WireHeader = serde_json::from_slice(header_part)?;

    let analog_count = header.channels.iter().filter(|ch| !ch.is_digital()).count();
    let expected_parts = 3 + analog_count;
    if frame.len() != expected_parts {
        return Err(TelemetryError::MalformedFrame(format!(
            "expected {expected_parts} parts for {analog_count} analog channels, got {}",
            frame.len()
        )));
    }

    if digital_part.len() % 4 != 0 {
        return Err(TelemetryError::MalformedFrame(format!(
            "digital block of {} bytes is not u32-aligned",
            digital_part.len()
        )));
    }

    let downsample_factor = (header.data_rate / web_data_rate).max(1) as usize;

    Ok(FrameHeader {
        channels: header.channels,
        data_rate: header.data_rate,
        downsample_factor,
        sample_count: digital_part.len() / 4,
    })
}

/// Reconstruct output timestamps from the frame epoch.
///
/// The payload carries one epoch shared by the whole batch; element `j` of
/// the output is `epoch_ms + j * 1000 / web_data_rate`.
pub fn parse_time(
    header: &FrameHeader,
    raw: &[u8],
    web_data_rate: u32,
) -> TelemetryResult<Vec<f64>> {
    if raw.len() < 16 {
        return Err(TelemetryError::MalformedFrame(format!(
            "timestamp block of {} bytes is too short",
            raw.len()
        )));
    }

    let mut buf = raw;
    let seconds = buf.get_i64_le();
    let nanoseconds = buf.get_i64_le();
    let epoch_ms = seconds as f64 * 1e3 + nanoseconds as f64 / 1e6;
    let spacing_ms = 1e3 / f64::from(web_data_rate);

    let out_len = header.sample_count.div_ceil(header.downsample_factor);
    Ok((0..out_len)
        .map(|j| epoch_ms + j as f64 * spacing_ms)
        .collect())
}

/// Decimate the packed digital bitmask block.
///
/// Every `downsample_factor`-th raw mask is kept verbatim; bits are never
/// OR-aggregated across the skipped samples.
pub fn parse_digital(header: &FrameHeader, raw: &[u8]) -> TelemetryResult<Vec<u8>> {
    if raw.len() % 4 != 0 {
        return Err(TelemetryError::MalformedFrame(format!(
            "digital block of {} bytes is not u32-aligned",
            raw.len()
        )));
    }

    let masks: Vec<u32> = raw
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let out_len = masks.len().div_ceil(header.downsample_factor);

    Ok((0..out_len)
        .map(|j| (masks[j * header.downsample_factor] & 0xff) as u8)
        .collect())
}

/// Decimate and scale one analog channel block.
pub fn parse_channel(
    header: &FrameHeader,
    channel: &ChannelMetadata,
    raw: &[u8],
) -> TelemetryResult<Vec<f32>> {
    if channel.is_digital() {
        return Err(TelemetryError::BinaryChannelDecode(channel.name.clone()));
    }
    if raw.len() % 4 != 0 {
        return Err(TelemetryError::MalformedFrame(format!(
            "channel '{}' block of {} bytes is not i32-aligned",
            channel.name,
            raw.len()
        )));
    }

    let scale = channel.scale.unwrap_or(1.0);
    let samples: Vec<i32> = raw
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let out_len = samples.len().div_ceil(header.downsample_factor);

    Ok((0..out_len)
        .map(|j| (f64::from(samples[j * header.downsample_factor]) * scale) as f32)
        .collect())
}

/// Decode one raw frame into a [`DecodedMessage`], including dual-range
/// channel merging.
///
/// Any error from this function is recoverable: the caller drops the frame
/// and resumes with the next one.
pub fn decode_frame(frame: &RawFrame, config: &DecoderConfig) -> TelemetryResult<DecodedMessage> {
    let header = parse_header(frame, config.web_data_rate)?;

    let mut metadata: ChannelMap = header
        .channels
        .iter()
        .map(|ch| (ch.name.clone(), ch.clone()))
        .collect();

    let time = parse_time(&header, &frame[1], config.web_data_rate)?;
    let digital = parse_digital(&header, frame[frame.len() - 1].as_ref())?;

    let mut data = BTreeMap::new();
    let mut part_index = 2;
    for channel in &header.channels {
        if channel.is_digital() {
            continue;
        }
        data.insert(
            channel.name.clone(),
            parse_channel(&header, channel, &frame[part_index])?,
        );
        part_index += 1;
    }

    merge::merge_channels(&mut metadata, &mut data, &digital, &config.merge_groups)?;

    Ok(DecodedMessage {
        metadata,
        time,
        digital,
        data,
    })
}
