//! Dual-range channel merging.
//!
//! Wide-dynamic-range quantities are acquired through two hardware ranges at
//! once: a high-range channel that is always valid and a low-range channel
//! that is only trustworthy while the analog front end flags it so, one flag
//! bit per sample inside the digital bitmask. This module folds each such
//! pair into one logical channel after decoding:
//!
//! 1. the high-range channel becomes the logical channel verbatim,
//! 2. wherever the per-sample validity bit is set, the low-range value
//!    overwrites the logical value (low range wins while valid, since it
//!    carries more resolution),
//! 3. the raw high/low channels and the validity bookkeeping entry are
//!    dropped from metadata and data.
//!
//! Values are substituted sample by sample, never averaged across ranges.
//!
//! Groups are declared by logical name; a group `"I1"` covers the raw
//! channels `I1H` and `I1L` plus the validity channel named by the low
//! channel's `validity_link` (falling back to `I1L_valid`).

use crate::error::{TelemetryError, TelemetryResult};
use crate::metadata::ChannelMap;
use std::collections::BTreeMap;

/// Fold the declared dual-range channel groups in place.
///
/// Applied independently per group; groups with neither raw channel present
/// are untouched. A low-range channel without a resolvable validity bit is a
/// [`TelemetryError::MergeInconsistency`].
pub fn merge_channels(
    metadata: &mut ChannelMap,
    data: &mut BTreeMap<String, Vec<f32>>,
    digital: &[u8],
    groups: &[String],
) -> TelemetryResult<()> {
    for group in groups {
        let high = format!("{group}H");
        let low = format!("{group}L");
        let mut validity = format!("{low}_valid");

        // reuse the high-range channel as the logical channel if available
        if let Some(values) = data.remove(&high) {
            data.insert(group.clone(), values);
            if let Some(mut meta) = metadata.remove(&high) {
                meta.name = group.clone();
                metadata.insert(group.clone(), meta);
            }
        }

        // substitute valid low-range values if available
        if let Some(low_values) = data.remove(&low) {
            let low_meta = metadata.remove(&low);
            if let Some(link) = low_meta.as_ref().and_then(|m| m.validity_link.clone()) {
                validity = link;
            }

            let bit = metadata
                .get(&validity)
                .and_then(|m| m.bit)
                .ok_or_else(|| {
                    TelemetryError::MergeInconsistency(format!(
                        "low-range channel '{low}' has no validity channel '{validity}'"
                    ))
                })?;
            if bit >= 8 {
                return Err(TelemetryError::MergeInconsistency(format!(
                    "validity bit {bit} of '{validity}' exceeds the bitmask width"
                )));
            }
            let mask = 1u8 << bit;

            if !data.contains_key(group) {
                data.insert(group.clone(), vec![f32::NAN; low_values.len()]);
                if let Some(mut meta) = low_meta {
                    meta.name = group.clone();
                    meta.validity_link = None;
                    metadata.insert(group.clone(), meta);
                }
            }

            if let Some(merged) = data.get_mut(group) {
                for (j, value) in merged.iter_mut().enumerate() {
                    if digital.get(j).is_some_and(|d| d & mask != 0) {
                        if let Some(&low_value) = low_values.get(j) {
                            *value = low_value;
                        }
                    }
                }
            }
        }

        // the bookkeeping entry never reaches clients
        metadata.remove(&validity);
    }

    Ok(())
}
