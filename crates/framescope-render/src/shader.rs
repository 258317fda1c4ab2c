//! Shader compilation service.
//!
//! The compute passes are specialized per texture shape and component
//! class. One WGSL template per pass is expanded with the binding type,
//! scalar type and shared constants, then compiled on demand and cached by
//! key. A pipeline that fails validation is logged and cached as `None`;
//! callers treat that as the feature being disabled for the session.

use std::collections::HashMap;

use framescope_core::constants::{
    HIST_BUCKETS, MAX_PICK_CANDIDATES, PICK_GROUP_SIZE, PIXELS_PER_TILE, TILES_PER_BLOCK,
};
use framescope_core::resource::{FormatClass, TextureKind, ViewDim};

/// Texture binding shape a template is specialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TexTemplate {
    pub view: ViewDim,
    pub multisampled: bool,
    pub class: FormatClass,
}

impl TexTemplate {
    /// Template for a registered texture kind viewed as `class`.
    #[must_use]
    pub fn for_texture(kind: TextureKind, class: FormatClass) -> Self {
        let binding = kind.binding();
        Self {
            view: binding.view,
            multisampled: binding.multisampled,
            class,
        }
    }

    fn scalar(self) -> &'static str {
        match self.class {
            FormatClass::Uint => "u32",
            FormatClass::Sint => "i32",
            FormatClass::Float | FormatClass::Depth => "f32",
        }
    }

    fn wgsl_type(self) -> String {
        if self.class == FormatClass::Depth {
            return "texture_depth_2d".to_string();
        }
        let scalar = self.scalar();
        match (self.view, self.multisampled) {
            (ViewDim::D1, _) => format!("texture_1d<{scalar}>"),
            (ViewDim::D2, false) => format!("texture_2d<{scalar}>"),
            (ViewDim::D2, true) => format!("texture_multisampled_2d<{scalar}>"),
            (ViewDim::D2Array, _) => format!("texture_2d_array<{scalar}>"),
            (ViewDim::D3, _) => format!("texture_3d<{scalar}>"),
        }
    }

    /// Sentinel the running minimum starts from (the type's maximum).
    fn lo_sentinel(self) -> &'static str {
        match self.class {
            FormatClass::Uint => "4294967295u",
            FormatClass::Sint => "2147483647",
            FormatClass::Float | FormatClass::Depth => "3.402823466e+38",
        }
    }

    /// Sentinel the running maximum starts from (the type's minimum).
    fn hi_sentinel(self) -> &'static str {
        match self.class {
            FormatClass::Uint => "0u",
            FormatClass::Sint => "-2147483648",
            FormatClass::Float | FormatClass::Depth => "-3.402823466e+38",
        }
    }

    /// Body of `load_texel(x, y, s)` for the statistics passes.
    fn load_body(self) -> String {
        if self.class == FormatClass::Depth {
            return "return vec4<f32>(textureLoad(tex, vec2<i32>(i32(x), i32(y)), 0), 0.0, 0.0, 1.0);".to_string();
        }
        match (self.view, self.multisampled) {
            (ViewDim::D1, _) => "return textureLoad(tex, i32(x), 0);".to_string(),
            (ViewDim::D2, false) => {
                "return textureLoad(tex, vec2<i32>(i32(x), i32(y)), 0);".to_string()
            }
            (ViewDim::D2, true) => {
                "return textureLoad(tex, vec2<i32>(i32(x), i32(y)), s);".to_string()
            }
            (ViewDim::D2Array, _) => {
                "return textureLoad(tex, vec2<i32>(i32(x), i32(y)), i32(params.resolution.w), 0);"
                    .to_string()
            }
            (ViewDim::D3, _) => {
                "return textureLoad(tex, vec3<i32>(i32(x), i32(y), i32(params.resolution.w)), 0);"
                    .to_string()
            }
        }
    }

    /// Body of `fetch(p)` for the texel-fetch blit. Integer texels are
    /// bitcast into the float target and reinterpreted after readback, so
    /// all 32 bits survive.
    fn fetch_body(self) -> String {
        if self.class == FormatClass::Depth {
            return "return vec4<f32>(textureLoad(tex, p, 0), 0.0, 0.0, 1.0);".to_string();
        }
        let expr = match (self.view, self.multisampled) {
            (ViewDim::D1, _) => "textureLoad(tex, p.x, 0)",
            (ViewDim::D2, false) => "textureLoad(tex, p, 0)",
            (ViewDim::D2, true) => "textureLoad(tex, p, params.sample)",
            (ViewDim::D2Array, _) => "textureLoad(tex, p, params.slice, 0)",
            (ViewDim::D3, _) => "textureLoad(tex, vec3<i32>(p, params.slice), 0)",
        };
        match self.class {
            FormatClass::Float => format!("return {expr};"),
            _ => format!(
                "let t = {expr};\n    return vec4<f32>(bitcast<f32>(t.x), bitcast<f32>(t.y), bitcast<f32>(t.z), bitcast<f32>(t.w));"
            ),
        }
    }

    fn sample_type(self) -> wgpu::TextureSampleType {
        match self.class {
            FormatClass::Uint => wgpu::TextureSampleType::Uint,
            FormatClass::Sint => wgpu::TextureSampleType::Sint,
            FormatClass::Depth => wgpu::TextureSampleType::Depth,
            FormatClass::Float => wgpu::TextureSampleType::Float { filterable: false },
        }
    }

    /// wgpu view dimension this template binds.
    #[must_use]
    pub fn view_dimension(self) -> wgpu::TextureViewDimension {
        match self.view {
            ViewDim::D1 => wgpu::TextureViewDimension::D1,
            ViewDim::D2 => wgpu::TextureViewDimension::D2,
            ViewDim::D2Array => wgpu::TextureViewDimension::D2Array,
            ViewDim::D3 => wgpu::TextureViewDimension::D3,
        }
    }
}

/// Key identifying one specialized pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKey {
    MinMaxTile(TexTemplate),
    MinMaxResult(FormatClass),
    HistogramTile(TexTemplate),
    HistogramResult,
    MeshPick,
    TexelFetch(TexTemplate),
}

/// A compiled compute pipeline with its bind group layout.
pub struct ComputeKit {
    pub pipeline: wgpu::ComputePipeline,
    pub layout: wgpu::BindGroupLayout,
}

/// A compiled render pipeline with its bind group layout.
pub struct RenderKit {
    pub pipeline: wgpu::RenderPipeline,
    pub layout: wgpu::BindGroupLayout,
}

/// Pipeline cache keyed by specialization.
#[derive(Default)]
pub struct ShaderCache {
    compute: HashMap<PipelineKey, Option<ComputeKit>>,
    render: HashMap<PipelineKey, Option<RenderKit>>,
}

impl ShaderCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compute pipeline for `key`, compiling it on first use.
    /// `None` means the build failed earlier and the feature is disabled.
    pub fn compute(&mut self, device: &wgpu::Device, key: PipelineKey) -> Option<&ComputeKit> {
        self.compute
            .entry(key)
            .or_insert_with(|| build_compute(device, key))
            .as_ref()
    }

    /// Returns the texel-fetch render pipeline for `template`.
    pub fn fetch(&mut self, device: &wgpu::Device, template: TexTemplate) -> Option<&RenderKit> {
        self.render
            .entry(PipelineKey::TexelFetch(template))
            .or_insert_with(|| build_fetch(device, template))
            .as_ref()
    }
}

/// Expands the shared-constant and texture tokens in a template.
#[must_use]
pub fn expand_template(template: &str, tex: Option<TexTemplate>) -> String {
    let mut src = template
        .replace("PPT_LIT", &PIXELS_PER_TILE.to_string())
        .replace("TPB_LIT", &TILES_PER_BLOCK.to_string())
        .replace("BUCKETS_LIT", &HIST_BUCKETS.to_string())
        .replace(
            "RWIDTH_LIT",
            &(TILES_PER_BLOCK * TILES_PER_BLOCK).to_string(),
        )
        .replace("MAXPICK_LIT", &MAX_PICK_CANDIDATES.to_string())
        .replace("GROUP_LIT", &PICK_GROUP_SIZE.to_string());

    if let Some(t) = tex {
        src = src
            .replace("LOAD_BODY", &t.load_body())
            .replace("FETCH_BODY", &t.fetch_body())
            .replace("TEX_T", &t.wgsl_type())
            .replace("LO_SENTINEL", t.lo_sentinel())
            .replace("HI_SENTINEL", t.hi_sentinel())
            .replace("SCALAR_T", t.scalar());
    }
    src
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(
    binding: u32,
    template: TexTemplate,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: template.sample_type(),
            view_dimension: template.view_dimension(),
            multisampled: template.multisampled,
        },
        count: None,
    }
}

fn compute_source(key: PipelineKey) -> String {
    match key {
        PipelineKey::MinMaxTile(t) => {
            expand_template(include_str!("shaders/minmax_tile.wgsl"), Some(t))
        }
        PipelineKey::MinMaxResult(class) => expand_template(
            include_str!("shaders/minmax_result.wgsl"),
            Some(TexTemplate {
                view: ViewDim::D2,
                multisampled: false,
                class,
            }),
        ),
        PipelineKey::HistogramTile(t) => {
            expand_template(include_str!("shaders/histogram_tile.wgsl"), Some(t))
        }
        PipelineKey::HistogramResult => {
            expand_template(include_str!("shaders/histogram_result.wgsl"), None)
        }
        PipelineKey::MeshPick => expand_template(include_str!("shaders/mesh_pick.wgsl"), None),
        PipelineKey::TexelFetch(_) => unreachable!("texel fetch is a render pipeline"),
    }
}

fn compute_layout_entries(key: PipelineKey) -> Vec<wgpu::BindGroupLayoutEntry> {
    let compute = wgpu::ShaderStages::COMPUTE;
    match key {
        PipelineKey::MinMaxTile(t) | PipelineKey::HistogramTile(t) => vec![
            uniform_entry(0, compute),
            texture_entry(1, t, compute),
            storage_entry(2, false),
        ],
        PipelineKey::MinMaxResult(_) | PipelineKey::HistogramResult => vec![
            uniform_entry(0, compute),
            storage_entry(1, true),
            storage_entry(2, false),
        ],
        PipelineKey::MeshPick => vec![
            uniform_entry(0, compute),
            storage_entry(1, true),
            storage_entry(2, true),
            storage_entry(3, false),
        ],
        PipelineKey::TexelFetch(_) => unreachable!("texel fetch is a render pipeline"),
    }
}

fn build_compute(device: &wgpu::Device, key: PipelineKey) -> Option<ComputeKit> {
    let label = format!("{key:?}");
    let source = compute_source(key);

    let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&label),
        entries: &compute_layout_entries(key),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&label),
        bind_group_layouts: &[&layout],
        immediate_size: 0,
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&label),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some("cs_main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });

    if let Some(error) = pollster::block_on(error_scope.pop()) {
        log::error!("pipeline '{label}' failed to build, feature disabled: {error}");
        return None;
    }

    Some(ComputeKit { pipeline, layout })
}

fn build_fetch(device: &wgpu::Device, template: TexTemplate) -> Option<RenderKit> {
    let label = format!("TexelFetch({template:?})");
    let source = expand_template(include_str!("shaders/texel_fetch.wgsl"), Some(template));

    let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&label),
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
            texture_entry(1, template, wgpu::ShaderStages::FRAGMENT),
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&label),
        bind_group_layouts: &[&layout],
        immediate_size: 0,
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: wgpu::TextureFormat::Rgba32Float,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });

    if let Some(error) = pollster::block_on(error_scope.pop()) {
        log::error!("pipeline '{label}' failed to build, feature disabled: {error}");
        return None;
    }

    Some(RenderKit { pipeline, layout })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_templates() -> Vec<TexTemplate> {
        let mut out = Vec::new();
        for class in [FormatClass::Float, FormatClass::Uint, FormatClass::Sint] {
            for kind in [
                TextureKind::D1,
                TextureKind::D2,
                TextureKind::D2Array,
                TextureKind::Cube,
                TextureKind::CubeArray,
                TextureKind::D3,
                TextureKind::D2Multisample,
            ] {
                out.push(TexTemplate::for_texture(kind, class));
            }
        }
        out.push(TexTemplate::for_texture(TextureKind::D2, FormatClass::Depth));
        out
    }

    #[test]
    fn every_variant_expands_without_leftover_tokens() {
        for t in all_templates() {
            for source in [
                expand_template(include_str!("shaders/minmax_tile.wgsl"), Some(t)),
                expand_template(include_str!("shaders/histogram_tile.wgsl"), Some(t)),
                expand_template(include_str!("shaders/texel_fetch.wgsl"), Some(t)),
            ] {
                for token in [
                    "TEX_T", "SCALAR_T", "LOAD_BODY", "FETCH_BODY", "LO_SENTINEL",
                    "HI_SENTINEL", "PPT_LIT", "TPB_LIT", "BUCKETS_LIT", "RWIDTH_LIT",
                ] {
                    assert!(
                        !source.contains(token),
                        "token {token} left in expansion of {t:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn expansion_contains_expected_binding() {
        let t = TexTemplate::for_texture(TextureKind::Cube, FormatClass::Uint);
        let src = expand_template(include_str!("shaders/minmax_tile.wgsl"), Some(t));
        assert!(src.contains("texture_2d_array<u32>"));
        assert!(src.contains("vec4<u32>"));

        let ms = TexTemplate::for_texture(TextureKind::D2Multisample, FormatClass::Float);
        let src = expand_template(include_str!("shaders/minmax_tile.wgsl"), Some(ms));
        assert!(src.contains("texture_multisampled_2d<f32>"));
    }

    #[test]
    fn mesh_pick_template_bakes_constants() {
        let src = expand_template(include_str!("shaders/mesh_pick.wgsl"), None);
        assert!(src.contains("array<vec4<f32>, 500>"));
        assert!(src.contains("@workgroup_size(128, 1, 1)"));
    }

    #[test]
    fn integer_fetch_goes_through_bitcast() {
        let t = TexTemplate::for_texture(TextureKind::D2, FormatClass::Uint);
        let src = expand_template(include_str!("shaders/texel_fetch.wgsl"), Some(t));
        assert!(src.contains("bitcast<f32>"));

        let f = TexTemplate::for_texture(TextureKind::D2, FormatClass::Float);
        let src = expand_template(include_str!("shaders/texel_fetch.wgsl"), Some(f));
        assert!(!src.contains("bitcast<f32>"));
    }
}
