//! Resource descriptors and the texture-kind binding table.

use serde::{Deserialize, Serialize};

/// Opaque handle to a registered GPU resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Wraps a raw id value. Only the registry should mint new ids.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Component class of a texture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatClass {
    /// Float or normalized formats.
    Float,
    /// Unsigned integer formats.
    Uint,
    /// Signed integer formats.
    Sint,
    /// Depth (optionally with a stencil aspect).
    Depth,
}

/// Shape of a texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureKind {
    D1,
    D2,
    D2Array,
    Cube,
    CubeArray,
    D3,
    D2Multisample,
}

/// View dimension a kind binds as. Mirrors the wgpu view dimensions the
/// render crate maps these onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewDim {
    D1,
    D2,
    D2Array,
    D3,
}

/// Binding and sampling rules for one texture kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KindBinding {
    /// View dimension bound for compute access.
    pub view: ViewDim,
    /// Whether the slice index selects an array layer.
    pub arrayed: bool,
    /// Whether loads take a sample index instead of a mip level.
    pub multisampled: bool,
}

impl TextureKind {
    /// Looks up the binding rules for this kind. Cube faces bind as array
    /// layers; there is no cube addressing in the compute passes.
    #[must_use]
    pub const fn binding(self) -> KindBinding {
        match self {
            Self::D1 => KindBinding {
                view: ViewDim::D1,
                arrayed: false,
                multisampled: false,
            },
            Self::D2 => KindBinding {
                view: ViewDim::D2,
                arrayed: false,
                multisampled: false,
            },
            Self::D2Array | Self::Cube | Self::CubeArray => KindBinding {
                view: ViewDim::D2Array,
                arrayed: true,
                multisampled: false,
            },
            Self::D3 => KindBinding {
                view: ViewDim::D3,
                arrayed: false,
                multisampled: false,
            },
            Self::D2Multisample => KindBinding {
                view: ViewDim::D2,
                arrayed: false,
                multisampled: true,
            },
        }
    }
}

/// Descriptor for a registered texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    /// Depth for 3D textures, array layer count for arrays, 1 otherwise.
    pub depth: u32,
    pub mips: u32,
    pub samples: u32,
    pub kind: TextureKind,
    pub class: FormatClass,
    /// Non-sampleable surface; must be copied to a sampleable staging
    /// texture before compute access.
    pub renderbuffer: bool,
}

impl TextureDesc {
    /// Extent of the given mip level, each axis clamped to at least 1.
    #[must_use]
    pub fn mip_extent(&self, mip: u32) -> (u32, u32, u32) {
        (
            (self.width >> mip).max(1),
            (self.height >> mip).max(1),
            (self.depth >> mip).max(1),
        )
    }

    /// Slice index as addressed by the compute passes: volumetric slices
    /// shrink with the mip chain, array layers do not.
    #[must_use]
    pub fn slice_for_mip(&self, slice: u32, mip: u32) -> u32 {
        if self.kind == TextureKind::D3 {
            slice >> mip
        } else {
            slice
        }
    }

    /// Number of addressable array layers (faces count as layers).
    #[must_use]
    pub fn layer_count(&self) -> u32 {
        match self.kind {
            TextureKind::Cube => 6,
            TextureKind::CubeArray => self.depth * 6,
            TextureKind::D2Array => self.depth,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_extent_clamps_to_one() {
        let desc = TextureDesc {
            width: 16,
            height: 4,
            depth: 1,
            mips: 5,
            samples: 1,
            kind: TextureKind::D2,
            class: FormatClass::Float,
            renderbuffer: false,
        };
        assert_eq!(desc.mip_extent(0), (16, 4, 1));
        assert_eq!(desc.mip_extent(2), (4, 1, 1));
        assert_eq!(desc.mip_extent(4), (1, 1, 1));
    }

    #[test]
    fn volume_slice_shifts_with_mip() {
        let desc = TextureDesc {
            width: 32,
            height: 32,
            depth: 32,
            mips: 6,
            samples: 1,
            kind: TextureKind::D3,
            class: FormatClass::Float,
            renderbuffer: false,
        };
        assert_eq!(desc.slice_for_mip(8, 0), 8);
        assert_eq!(desc.slice_for_mip(8, 2), 2);
    }

    #[test]
    fn array_slice_is_stable_across_mips() {
        let desc = TextureDesc {
            width: 32,
            height: 32,
            depth: 8,
            mips: 6,
            samples: 1,
            kind: TextureKind::D2Array,
            class: FormatClass::Float,
            renderbuffer: false,
        };
        assert_eq!(desc.slice_for_mip(5, 3), 5);
    }

    #[test]
    fn cube_kinds_bind_as_arrays() {
        assert_eq!(TextureKind::Cube.binding().view, ViewDim::D2Array);
        assert_eq!(TextureKind::CubeArray.binding().view, ViewDim::D2Array);
        assert!(TextureKind::D2Multisample.binding().multisampled);
        assert!(!TextureKind::D2.binding().arrayed);
    }
}
