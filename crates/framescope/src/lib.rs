//! framescope: texture statistics and mesh/pixel picking for
//! frame-capture debugging.
//!
//! Within a capture/replay debugger this subsystem answers four questions
//! about a captured frame:
//!
//! - [`Analyzer::min_max`] - per-channel minimum and maximum of a texture
//! - [`Analyzer::histogram`] - 256-bucket histogram over a value range
//! - [`Analyzer::pick_vertex`] - nearest mesh vertex under the cursor
//! - [`Analyzer::pick_pixel`] - exact value of one texel
//!
//! # Quick start
//!
//! ```no_run
//! use framescope::*;
//!
//! let mut analyzer = Analyzer::new().expect("GPU device");
//!
//! let desc = TextureDesc {
//!     width: 4,
//!     height: 4,
//!     depth: 1,
//!     mips: 1,
//!     samples: 1,
//!     kind: TextureKind::D2,
//!     class: FormatClass::Float,
//!     renderbuffer: false,
//! };
//! let data = vec![0u8; 4 * 4 * 4];
//! let id = analyzer.register_texture(desc, wgpu::TextureFormat::Rgba8Unorm, Some(&data));
//!
//! let stats = analyzer.min_max(id, 0, 0, 0, None).unwrap();
//! println!("min {:?} max {:?}", stats.min, stats.max);
//! ```
//!
//! # Model
//!
//! All state lives on the [`Analyzer`] (no globals). Operations submit GPU
//! work from the calling thread and block on readback; the analyzer is
//! single-threaded by contract. Failures come back as [`AnalysisError`]
//! values, never panics, so a frontend can degrade one feature at a time.

use pollster::FutureExt;

// Re-export core types
pub use framescope_core::{
    constants, normalize_indices, AnalysisError, AnalysisOptions, FormatClass, HistogramRange,
    IndexStride, Mat4, MeshDescriptor, MinMax, NormalizedIndices, PixelValue, ResourceId, Result,
    TextureDesc, TextureKind, Topology, Vec2, Vec3, Vec4, ViewInfo,
};

// Re-export render types
pub use framescope_render::{build_pick_ray, AnalysisEngine, EngineError, PickRay};

// Callers pass wgpu formats when registering resources.
pub use wgpu;

use framescope_core::constants::HIST_BUCKETS;

/// Initializes env_logger once; safe to call from every test or tool.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).try_init();
}

/// The analysis session: owns the GPU engine and the resource registry.
pub struct Analyzer {
    engine: AnalysisEngine,
}

impl Analyzer {
    /// Creates a headless analyzer with default options.
    pub fn new() -> std::result::Result<Self, EngineError> {
        Self::with_options(AnalysisOptions::default())
    }

    /// Creates a headless analyzer.
    pub fn with_options(options: AnalysisOptions) -> std::result::Result<Self, EngineError> {
        let engine = AnalysisEngine::new_with_progress(options, |p| {
            log::debug!("analyzer init {:.0}%", p * 100.0);
        })
        .block_on()?;
        Ok(Self { engine })
    }

    /// Registers a texture, optionally uploading level-0 contents.
    pub fn register_texture(
        &mut self,
        desc: TextureDesc,
        format: wgpu::TextureFormat,
        data: Option<&[u8]>,
    ) -> ResourceId {
        self.engine.register_texture(desc, format, data)
    }

    /// Registers a vertex or index buffer.
    pub fn register_buffer(&mut self, data: &[u8]) -> ResourceId {
        self.engine.register_buffer(data)
    }

    /// Componentwise min/max of one slice/mip/sample.
    pub fn min_max(
        &mut self,
        id: ResourceId,
        slice: u32,
        mip: u32,
        sample: u32,
        hint: Option<FormatClass>,
    ) -> Result<MinMax> {
        self.engine.min_max(id, slice, mip, sample, hint)
    }

    /// 256-bucket histogram of one slice/mip/sample over `[min, max)`.
    #[allow(clippy::too_many_arguments)]
    pub fn histogram(
        &mut self,
        id: ResourceId,
        slice: u32,
        mip: u32,
        sample: u32,
        hint: Option<FormatClass>,
        min: f32,
        max: f32,
        channels: [bool; 4],
    ) -> Result<[u32; HIST_BUCKETS]> {
        self.engine
            .histogram(id, slice, mip, sample, hint, min, max, channels)
    }

    /// Nearest mesh vertex under the cursor, or `None`.
    pub fn pick_vertex(
        &mut self,
        viewport: (u32, u32),
        view: &ViewInfo,
        mesh: &MeshDescriptor,
        cursor: (u32, u32),
    ) -> Result<Option<u32>> {
        self.engine.pick_vertex(viewport, view, mesh, cursor)
    }

    /// Exact value of one texel.
    pub fn pick_pixel(
        &mut self,
        id: ResourceId,
        x: u32,
        y: u32,
        slice: u32,
        mip: u32,
        sample: u32,
    ) -> Result<PixelValue> {
        self.engine.pick_pixel(id, x, y, slice, mip, sample)
    }

    /// Direct access to the underlying engine.
    pub fn engine(&mut self) -> &mut AnalysisEngine {
        &mut self.engine
    }
}
