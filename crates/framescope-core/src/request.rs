//! Analysis request parameters: sample encoding, channel masks, and the
//! histogram range math used by both the dispatcher and the tests.

use glam::Vec4;

use crate::constants::{ALL_SAMPLES, BLOCK_PIXELS, HIST_BUCKETS};

/// Componentwise minimum and maximum over the sampled extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: Vec4,
    pub max: Vec4,
}

/// A single picked texel, typed by the texture's format class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PixelValue {
    Float([f32; 4]),
    Uint([u32; 4]),
    Sint([i32; 4]),
}

/// Value range for a histogram request, with the upper bound nudged so a
/// value exactly equal to `max` falls in the last bucket instead of being
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramRange {
    pub min: f32,
    /// Upper bound after the nudge; compare with `<`.
    pub max: f32,
}

impl HistogramRange {
    /// Builds the effective range for the compute pass. Requires
    /// `min < max` (validated by the caller).
    #[must_use]
    pub fn new(min: f32, max: f32) -> Self {
        Self {
            min,
            max: nudge_max(max),
        }
    }
}

/// Nudges the histogram upper bound by a small relative epsilon. The bucket
/// index is `floor((v - min) / (max - min) * buckets)`, so `v == max` would
/// otherwise land one past the final bucket.
#[must_use]
pub fn nudge_max(max: f32) -> f32 {
    max + max * 1e-6
}

/// Packs per-channel booleans into the shader-side bitmask (R = bit 0).
#[must_use]
pub fn channel_bits(channels: [bool; 4]) -> u32 {
    let mut bits = 0;
    for (i, enabled) in channels.iter().enumerate() {
        if *enabled {
            bits |= 1 << i;
        }
    }
    bits
}

/// Encodes a sample index for the uniform block: the all-samples sentinel
/// becomes the negated sample count, everything else clamps into range.
#[must_use]
pub fn encode_sample(sample: u32, sample_count: u32) -> i32 {
    if sample == ALL_SAMPLES {
        -(sample_count.max(1) as i32)
    } else {
        sample.min(sample_count.saturating_sub(1)) as i32
    }
}

/// Number of reduction blocks covering `extent` texels along one axis.
#[must_use]
pub fn blocks_for(extent: u32) -> u32 {
    extent.div_ceil(BLOCK_PIXELS)
}

/// CPU reference for the bucket a value lands in, or `None` when it is
/// outside `[min, max)`. Mirrors the compute pass exactly.
#[must_use]
pub fn bucket_for(value: f32, range: HistogramRange) -> Option<usize> {
    if value < range.min || value >= range.max {
        return None;
    }
    let t = (value - range.min) / (range.max - range.min);
    Some(((t * HIST_BUCKETS as f32) as usize).min(HIST_BUCKETS - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ALL_SAMPLES, MAX_TEXTURE_DIM};

    #[test]
    fn max_value_lands_in_last_bucket() {
        let range = HistogramRange::new(0.0, 1.0);
        assert_eq!(bucket_for(1.0, range), Some(HIST_BUCKETS - 1));
        assert_eq!(bucket_for(0.0, range), Some(0));
        assert_eq!(bucket_for(1.1, range), None);
        assert_eq!(bucket_for(-0.1, range), None);
    }

    #[test]
    fn proportional_bucket_placement() {
        // Four texels at 0.0, 0.33, 0.66, 1.0 over 16 logical buckets:
        // scale the 256 hardware buckets down by 16.
        let range = HistogramRange::new(0.0, 1.0);
        let logical = |v: f32| bucket_for(v, range).unwrap() * 16 / HIST_BUCKETS;
        assert_eq!(logical(0.0), 0);
        assert_eq!(logical(0.33), 5);
        assert_eq!(logical(0.66), 10);
        assert_eq!(logical(1.0), 15);
    }

    #[test]
    fn sample_sentinel_negates_count() {
        assert_eq!(encode_sample(ALL_SAMPLES, 4), -4);
        assert_eq!(encode_sample(ALL_SAMPLES, 1), -1);
        assert_eq!(encode_sample(0, 4), 0);
        assert_eq!(encode_sample(9, 4), 3);
    }

    #[test]
    fn block_counts() {
        assert_eq!(blocks_for(1), 1);
        assert_eq!(blocks_for(BLOCK_PIXELS), 1);
        assert_eq!(blocks_for(BLOCK_PIXELS + 1), 2);
        assert_eq!(blocks_for(MAX_TEXTURE_DIM), MAX_TEXTURE_DIM / BLOCK_PIXELS);
    }

    #[test]
    fn channel_bit_packing() {
        assert_eq!(channel_bits([true, true, true, true]), 0xf);
        assert_eq!(channel_bits([true, false, false, false]), 0x1);
        assert_eq!(channel_bits([false, false, false, true]), 0x8);
        assert_eq!(channel_bits([false; 4]), 0);
    }
}
