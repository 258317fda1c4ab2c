//! Mesh descriptors for vertex picking.

use crate::resource::ResourceId;

/// Byte width of a raw index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStride {
    U8,
    U16,
    U32,
}

impl IndexStride {
    /// Stride in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Primitive topology of the picked draw. `Other` covers points, lines and
/// patch lists, which pick by screen-space distance instead of ray
/// intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
    TriangleStrip,
    TriangleFan,
    TriangleListAdj,
    TriangleStripAdj,
    Other,
}

impl Topology {
    /// Whether picking runs the ray-intersection path.
    #[must_use]
    pub const fn is_triangles(self) -> bool {
        !matches!(self, Self::Other)
    }

    /// Mode value passed to the pick pass.
    #[must_use]
    pub const fn gpu_mode(self) -> u32 {
        match self {
            Self::TriangleList => 0,
            Self::TriangleStrip => 1,
            Self::TriangleFan => 2,
            Self::TriangleListAdj => 3,
            Self::TriangleStripAdj => 4,
            Self::Other => 5,
        }
    }

    /// Primitives described by `elements` indices (or vertices, for
    /// non-indexed draws). For `Other` every element is its own candidate.
    #[must_use]
    pub const fn primitive_count(self, elements: u32) -> u32 {
        match self {
            Self::TriangleList => elements / 3,
            Self::TriangleStrip | Self::TriangleFan => elements.saturating_sub(2),
            Self::TriangleListAdj => elements / 6,
            Self::TriangleStripAdj => elements.saturating_sub(4) / 2,
            Self::Other => elements,
        }
    }
}

/// Everything needed to locate the picked draw's geometry.
#[derive(Debug, Clone, Copy)]
pub struct MeshDescriptor {
    /// Buffer holding vertex positions.
    pub vertex_resource: ResourceId,
    pub vertex_byte_offset: u64,
    pub vertex_byte_stride: u32,
    /// Index buffer; `None` for non-indexed draws.
    pub index_resource: Option<ResourceId>,
    pub index_stride: IndexStride,
    pub index_byte_offset: u64,
    /// Signed per-draw offset added to every raw index.
    pub base_vertex: i32,
    pub topology: Topology,
    /// Index count for indexed draws, vertex count otherwise.
    pub element_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_counts_per_topology() {
        assert_eq!(Topology::TriangleList.primitive_count(9), 3);
        assert_eq!(Topology::TriangleStrip.primitive_count(9), 7);
        assert_eq!(Topology::TriangleFan.primitive_count(9), 7);
        assert_eq!(Topology::TriangleListAdj.primitive_count(12), 2);
        assert_eq!(Topology::TriangleStripAdj.primitive_count(10), 3);
        assert_eq!(Topology::Other.primitive_count(9), 9);
    }

    #[test]
    fn degenerate_element_counts() {
        assert_eq!(Topology::TriangleStrip.primitive_count(1), 0);
        assert_eq!(Topology::TriangleStripAdj.primitive_count(3), 0);
        assert_eq!(Topology::TriangleList.primitive_count(2), 0);
    }
}
