//! Channel metadata structures and handling.
//!
//! Every measurement stream advertises its channel set in the frame header:
//! one [`ChannelMetadata`] record per channel, keyed by the unique channel
//! name. Analog channels carry a `scale` factor that converts raw integer
//! samples into physical units; digital channels carry the `bit` position of
//! their flag inside the per-sample digital bitmask. Dual-range channels
//! additionally name the digital channel whose bit marks low-range validity
//! via `validity_link`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Physical unit of a measurement channel.
///
/// The `Binary` variant is the sentinel for digital channels, which are packed
/// into the shared bitmask block instead of carrying their own sample block.
/// Units the acquisition side may advertise for ambient sensors are included;
/// anything unknown deserializes to `Unspecified` rather than failing the
/// whole frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelUnit {
    /// Voltage channel, scaled to volts.
    #[serde(rename = "V")]
    Volt,
    /// Current channel, scaled to amperes.
    #[serde(rename = "A")]
    Ampere,
    /// Digital channel, one bit inside the per-sample bitmask.
    #[serde(rename = "binary")]
    Binary,
    /// Ambient temperature sensor.
    #[serde(rename = "°C")]
    DegreeCelsius,
    /// Ambient illuminance sensor.
    #[serde(rename = "lux")]
    Lux,
    /// Ambient pressure sensor.
    #[serde(rename = "Pa")]
    Pascal,
    /// Ambient relative humidity sensor.
    #[serde(rename = "%RH")]
    RelativeHumidity,
    /// Any unit this tier does not know about.
    #[serde(other)]
    Unspecified,
}

/// Metadata record for one measurement channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    /// Unique channel name, the key of the channel map.
    pub name: String,
    /// Physical unit; `None` when the acquisition side advertises no unit.
    #[serde(default)]
    pub unit: Option<ChannelUnit>,
    /// Multiplicative factor turning a raw integer sample into the physical
    /// unit. Absent for digital channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    /// Bit position within the digital bitmask. Only for digital channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit: Option<u8>,
    /// For dual-range low channels: name of the digital channel whose bit
    /// marks low-range validity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_link: Option<String>,
    /// Bookkeeping channels (range validity flags) are hidden from clients.
    #[serde(default)]
    pub hidden: bool,
}

impl ChannelMetadata {
    /// Whether the channel is digital, i.e. lives in the shared bitmask block.
    pub fn is_digital(&self) -> bool {
        matches!(self.unit, Some(ChannelUnit::Binary))
    }
}

/// Ordered, name-keyed channel map with stable iteration.
pub type ChannelMap = BTreeMap<String, ChannelMetadata>;

/// Whether two channel maps declare the same channel set.
///
/// Shape equality is decided by the key set alone; changed scales or bits on
/// an unchanged channel set do not count as a shape change.
pub fn same_shape(a: &ChannelMap, b: &ChannelMap) -> bool {
    a.len() == b.len() && a.keys().eq(b.keys())
}
