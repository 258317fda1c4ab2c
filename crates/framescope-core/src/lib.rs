//! Core abstractions for framescope.
//!
//! This crate holds the CPU side of the texture-statistics and picking
//! engine: resource descriptors, analysis request parameters, the vertex
//! index normalizer, and deterministic pick-candidate resolution. Nothing
//! here touches the GPU; the `framescope-render` crate drives the actual
//! compute passes.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Descriptor structs legitimately carry many plain fields
#![allow(clippy::module_name_repetitions)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod constants;
pub mod error;
pub mod index;
pub mod mesh;
pub mod options;
pub mod pick;
pub mod request;
pub mod resource;

pub use error::{AnalysisError, Result};
pub use index::{normalize_indices, NormalizedIndices};
pub use mesh::{IndexStride, MeshDescriptor, Topology};
pub use options::AnalysisOptions;
pub use pick::{closest_screen_hit, closest_triangle_hit, ScreenHit, TriangleHit, ViewInfo};
pub use request::{
    bucket_for, channel_bits, encode_sample, nudge_max, HistogramRange, MinMax, PixelValue,
};
pub use resource::{FormatClass, KindBinding, ResourceId, TextureDesc, TextureKind, ViewDim};

// Re-export glam types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};
