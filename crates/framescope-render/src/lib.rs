//! GPU analysis backend for framescope.
//!
//! Owns the wgpu device and every pass the subsystem dispatches: the
//! two-phase texture statistics reduction, the mesh vertex picker, and the
//! pixel picker. All state lives on an [`AnalysisEngine`] instance; there
//! are no globals.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
// Dispatch math mixes u32/f32/usize deliberately
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

pub mod buffer;
mod engine;
pub mod error;
pub mod ray;
pub mod registry;
pub mod shader;

pub use buffer::GrowOnlyBuffer;
pub use engine::AnalysisEngine;
pub use error::{EngineError, EngineResult};
pub use ray::{build_pick_ray, PickRay};
pub use registry::{format_class_of, ResourceRegistry, TextureRecord};
pub use shader::{ShaderCache, TexTemplate};
