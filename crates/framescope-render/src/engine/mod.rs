//! The analysis engine.

mod pixel;
mod stats;
mod vertex;

use bytemuck::Zeroable;

use framescope_core::constants::{HIST_BUCKETS, MAX_BLOCKS, MAX_PICK_CANDIDATES, MAX_TILES};
use framescope_core::options::AnalysisOptions;
use framescope_core::resource::{ResourceId, TextureDesc};

use crate::buffer::{self, GrowOnlyBuffer};
use crate::error::{EngineError, EngineResult};
use crate::registry::ResourceRegistry;
use crate::shader::{PipelineKey, ShaderCache};

/// Uniform block shared by the statistics passes.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct StatsUniforms {
    /// xyz = mip-level extent, w = slice.
    pub resolution: [f32; 4],
    /// x = mip, y = sample count, z = sample index (negative = all
    /// samples), w = phase-2 reduce count.
    pub mip_info: [i32; 4],
    /// x = range min, y = range max (pre-nudged for histograms).
    pub range: [f32; 4],
    /// x = channel bitmask.
    pub channels: [u32; 4],
}

/// Uniform block for the mesh pick pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub(crate) struct PickUniforms {
    pub ray_pos: [f32; 3],
    pub use_indices: u32,
    pub ray_dir: [f32; 3],
    pub element_count: u32,
    pub mvp: [[f32; 4]; 4],
    pub coords: [f32; 2],
    pub viewport: [f32; 2],
    pub mesh_mode: u32,
    pub pick_radius: f32,
    pub _pad: [u32; 2],
}

/// Uniform block for the texel fetch blit.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct FetchUniforms {
    pub offset: [i32; 2],
    pub slice: i32,
    pub sample: i32,
}

/// Capabilities probed once at startup.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EngineCaps {
    pub compute_shaders: bool,
}

/// The GPU analysis engine.
///
/// Owns the device and every persistent resource the passes use. All
/// operations submit from the calling thread and block on readback; the
/// engine provides no internal locking and must not be shared across
/// threads. Dropping the engine releases every GPU object together.
pub struct AnalysisEngine {
    /// The wgpu device.
    pub device: wgpu::Device,
    /// The wgpu queue.
    pub queue: wgpu::Queue,
    /// The wgpu adapter.
    pub adapter: wgpu::Adapter,

    pub(crate) options: AnalysisOptions,
    pub(crate) caps: EngineCaps,
    pub(crate) registry: ResourceRegistry,
    pub(crate) shaders: ShaderCache,

    // Statistics: parameter block, worst-case intermediate buffers, final
    // results and their readback staging.
    pub(crate) stats_uniforms: wgpu::Buffer,
    pub(crate) minmax_tiles: wgpu::Buffer,
    pub(crate) minmax_result: wgpu::Buffer,
    pub(crate) minmax_readback: wgpu::Buffer,
    pub(crate) hist_partials: wgpu::Buffer,
    pub(crate) hist_result: wgpu::Buffer,
    pub(crate) hist_readback: wgpu::Buffer,

    // Mesh picking: staging grows on demand and never shrinks.
    pub(crate) pick_uniforms: wgpu::Buffer,
    pub(crate) pick_vertices: GrowOnlyBuffer,
    pub(crate) pick_indices: GrowOnlyBuffer,
    pub(crate) pick_results: wgpu::Buffer,
    pub(crate) pick_readback: wgpu::Buffer,

    // Pixel picking: persistent 1x1 target, created on first use.
    pub(crate) fetch_uniforms: wgpu::Buffer,
    pub(crate) pixel_target: Option<(wgpu::Texture, wgpu::TextureView)>,
    pub(crate) pixel_readback: wgpu::Buffer,
}

impl AnalysisEngine {
    /// Creates a headless engine with default options.
    pub async fn new() -> EngineResult<Self> {
        Self::new_with_progress(AnalysisOptions::default(), |_| {}).await
    }

    /// Creates a headless engine, reporting one progress increment per
    /// initialization phase.
    pub async fn new_with_progress(
        options: AnalysisOptions,
        mut progress: impl FnMut(f32),
    ) -> EngineResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: options.force_fallback_adapter,
            })
            .await
            .map_err(|_| EngineError::AdapterCreationFailed)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("framescope device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        progress(0.2);

        let caps = EngineCaps {
            compute_shaders: adapter
                .get_downlevel_capabilities()
                .flags
                .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
        };
        if !caps.compute_shaders {
            log::warn!(
                "compute shaders not supported, disabling min/max, histogram and mesh picking"
            );
        }

        let stats_uniforms = buffer::create_uniform_buffer(
            &device,
            &StatsUniforms::zeroed(),
            Some("stats uniforms"),
        );
        let minmax_tiles = buffer::create_storage_buffer(
            &device,
            u64::from(MAX_TILES) * 2 * 16,
            Some("minmax tile partials"),
        );
        let minmax_result =
            buffer::create_storage_buffer(&device, 32, Some("minmax result"));
        let minmax_readback =
            buffer::create_readback_buffer(&device, 32, Some("minmax readback"));
        let hist_partials = buffer::create_storage_buffer(
            &device,
            u64::from(MAX_BLOCKS) * HIST_BUCKETS as u64 * 4,
            Some("histogram partials"),
        );
        let hist_result = buffer::create_storage_buffer(
            &device,
            HIST_BUCKETS as u64 * 4,
            Some("histogram result"),
        );
        let hist_readback = buffer::create_readback_buffer(
            &device,
            HIST_BUCKETS as u64 * 4,
            Some("histogram readback"),
        );

        progress(0.4);

        let pick_uniforms = buffer::create_uniform_buffer(
            &device,
            &PickUniforms::zeroed(),
            Some("pick uniforms"),
        );
        let pick_result_size = 16 + u64::from(MAX_PICK_CANDIDATES) * 16;
        let pick_results =
            buffer::create_storage_buffer(&device, pick_result_size, Some("pick results"));
        let pick_readback =
            buffer::create_readback_buffer(&device, pick_result_size, Some("pick readback"));

        let fetch_uniforms = buffer::create_uniform_buffer(
            &device,
            &FetchUniforms::zeroed(),
            Some("fetch uniforms"),
        );
        let pixel_readback =
            buffer::create_readback_buffer(&device, 256, Some("pixel readback"));

        progress(0.6);

        let mut engine = Self {
            device,
            queue,
            adapter,
            options,
            caps,
            registry: ResourceRegistry::new(),
            shaders: ShaderCache::new(),
            stats_uniforms,
            minmax_tiles,
            minmax_result,
            minmax_readback,
            hist_partials,
            hist_result,
            hist_readback,
            pick_uniforms,
            pick_vertices: GrowOnlyBuffer::new(
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                "pick vertex staging",
            ),
            pick_indices: GrowOnlyBuffer::new(
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                "pick index staging",
            ),
            pick_results,
            pick_readback,
            fetch_uniforms,
            pixel_target: None,
            pixel_readback,
        };

        // The fixed-variant pipelines build up front so a compile failure
        // is reported during init rather than mid-session. The per-shape
        // tile and fetch variants build on first use.
        if engine.caps.compute_shaders {
            use framescope_core::resource::FormatClass;
            engine.shaders.compute(&engine.device, PipelineKey::MeshPick);
            for class in [FormatClass::Float, FormatClass::Uint, FormatClass::Sint] {
                engine
                    .shaders
                    .compute(&engine.device, PipelineKey::MinMaxResult(class));
            }
            engine
                .shaders
                .compute(&engine.device, PipelineKey::HistogramResult);
        }

        progress(0.8);
        log::debug!("analysis engine ready");
        progress(1.0);

        Ok(engine)
    }

    /// Registers a texture and optionally uploads level-0 contents.
    pub fn register_texture(
        &mut self,
        desc: TextureDesc,
        format: wgpu::TextureFormat,
        data: Option<&[u8]>,
    ) -> ResourceId {
        self.registry
            .register_texture(&self.device, &self.queue, desc, format, data)
    }

    /// Registers a buffer resource.
    pub fn register_buffer(&mut self, data: &[u8]) -> ResourceId {
        self.registry.register_buffer(&self.device, &self.queue, data)
    }

    /// Engine configuration.
    #[must_use]
    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }
}
