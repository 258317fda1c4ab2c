//! Vertex index normalization.
//!
//! Raw index buffers arrive with 1, 2 or 4-byte strides and a signed
//! base-vertex offset. The pick pass consumes a uniform `u32` stream, so
//! indices are promoted here and the base vertex folded in, tracking the
//! referenced range to bound the vertex staging upload.

use crate::mesh::IndexStride;

/// A promoted index stream plus the range of vertices it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedIndices {
    pub indices: Vec<u32>,
    pub min_index: u32,
    pub max_index: u32,
}

/// Promotes `count` raw indices to `u32` and applies the base vertex.
///
/// With a negative base vertex, indices below the clamp threshold floor to
/// 0 rather than wrapping; every output index is therefore >= 0. Missing
/// trailing bytes read as zero, matching a zero-filled staging buffer.
#[must_use]
pub fn normalize_indices(
    raw: &[u8],
    stride: IndexStride,
    base_vertex: i32,
    count: u32,
) -> NormalizedIndices {
    let clamp = if base_vertex < 0 {
        base_vertex.unsigned_abs()
    } else {
        0
    };

    let fetch = |i: usize| -> u32 {
        let at = i * stride.bytes();
        match stride {
            IndexStride::U8 => raw.get(at).copied().map_or(0, u32::from),
            IndexStride::U16 => {
                let lo = raw.get(at).copied().unwrap_or(0);
                let hi = raw.get(at + 1).copied().unwrap_or(0);
                u32::from(u16::from_le_bytes([lo, hi]))
            }
            IndexStride::U32 => {
                let mut bytes = [0u8; 4];
                for (j, b) in bytes.iter_mut().enumerate() {
                    *b = raw.get(at + j).copied().unwrap_or(0);
                }
                u32::from_le_bytes(bytes)
            }
        }
    };

    let mut out = NormalizedIndices {
        indices: Vec::with_capacity(count as usize),
        min_index: 0,
        max_index: 0,
    };

    for i in 0..count as usize {
        let mut idx = fetch(i);

        if idx < clamp {
            idx = 0;
        } else if base_vertex < 0 {
            idx -= clamp;
        } else if base_vertex > 0 {
            idx = idx.wrapping_add(base_vertex as u32);
        }

        if i == 0 {
            out.min_index = idx;
            out.max_index = idx;
        } else {
            out.min_index = out.min_index.min(idx);
            out.max_index = out.max_index.max(idx);
        }

        out.indices.push(idx);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pack(values: &[u32], stride: IndexStride) -> Vec<u8> {
        let mut bytes = Vec::new();
        for v in values {
            match stride {
                IndexStride::U8 => bytes.push(*v as u8),
                IndexStride::U16 => bytes.extend_from_slice(&(*v as u16).to_le_bytes()),
                IndexStride::U32 => bytes.extend_from_slice(&v.to_le_bytes()),
            }
        }
        bytes
    }

    #[test]
    fn positive_base_vertex_adds() {
        let raw = pack(&[0, 1, 2], IndexStride::U16);
        let n = normalize_indices(&raw, IndexStride::U16, 10, 3);
        assert_eq!(n.indices, vec![10, 11, 12]);
        assert_eq!(n.min_index, 10);
        assert_eq!(n.max_index, 12);
    }

    #[test]
    fn negative_base_vertex_clamps_below_threshold() {
        let raw = pack(&[1, 5, 9], IndexStride::U8);
        let n = normalize_indices(&raw, IndexStride::U8, -4, 3);
        // 1 < 4 clamps to 0; the rest subtract.
        assert_eq!(n.indices, vec![0, 1, 5]);
        assert_eq!(n.min_index, 0);
        assert_eq!(n.max_index, 5);
    }

    #[test]
    fn truncated_buffer_reads_zero() {
        let raw = pack(&[7], IndexStride::U32);
        let n = normalize_indices(&raw, IndexStride::U32, 0, 3);
        assert_eq!(n.indices, vec![7, 0, 0]);
        assert_eq!(n.min_index, 0);
        assert_eq!(n.max_index, 7);
    }

    #[test]
    fn empty_stream() {
        let n = normalize_indices(&[], IndexStride::U16, 5, 0);
        assert!(n.indices.is_empty());
        assert_eq!(n.min_index, 0);
        assert_eq!(n.max_index, 0);
    }

    fn reference(values: &[u32], base: i32) -> Vec<u32> {
        values
            .iter()
            .map(|&v| {
                let shifted = i64::from(v) + i64::from(base);
                if shifted < 0 {
                    0
                } else {
                    shifted as u32
                }
            })
            .collect()
    }

    proptest! {
        #[test]
        fn matches_reference_for_all_strides(
            values in proptest::collection::vec(0u32..=250, 0..64),
            base in -300i32..300,
        ) {
            for stride in [IndexStride::U8, IndexStride::U16, IndexStride::U32] {
                let raw = pack(&values, stride);
                let n = normalize_indices(&raw, stride, base, values.len() as u32);
                prop_assert_eq!(&n.indices, &reference(&values, base));
                if let (Some(lo), Some(hi)) =
                    (n.indices.iter().min(), n.indices.iter().max())
                {
                    prop_assert_eq!(n.min_index, *lo);
                    prop_assert_eq!(n.max_index, *hi);
                }
            }
        }
    }
}
