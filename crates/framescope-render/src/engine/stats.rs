//! Texture statistics: two-phase tiled min/max and histogram reduction.

use framescope_core::constants::{
    HIST_BUCKETS, MAX_TEXTURE_DIM, TILES_PER_BLOCK,
};
use framescope_core::error::{AnalysisError, Result};
use framescope_core::request::{
    blocks_for, channel_bits, encode_sample, HistogramRange, MinMax,
};
use framescope_core::resource::{FormatClass, ResourceId, TextureKind, ViewDim};
use glam::Vec4;

use crate::buffer::{f32s_from_bytes, submit_and_read, u32s_from_bytes};
use crate::registry::has_stencil;
use crate::shader::{PipelineKey, TexTemplate};

use super::{AnalysisEngine, StatsUniforms};

/// Everything a statistics dispatch needs, resolved from the request.
struct StatsDispatch {
    template: TexTemplate,
    view: wgpu::TextureView,
    blocks: (u32, u32),
    uniforms: StatsUniforms,
}

impl AnalysisEngine {
    /// Componentwise min/max over one slice/mip/sample of a texture.
    ///
    /// Phase 1 reduces fixed-size tiles into the worst-case-sized
    /// intermediate buffer; phase 2 folds the partials into two vectors
    /// which are read back synchronously.
    pub fn min_max(
        &mut self,
        id: ResourceId,
        slice: u32,
        mip: u32,
        sample: u32,
        hint: Option<FormatClass>,
    ) -> Result<MinMax> {
        let mut dispatch = self.stats_dispatch(id, slice, mip, sample, hint)?;

        let (bx, by) = dispatch.blocks;
        let tile_count = bx * by * TILES_PER_BLOCK * TILES_PER_BLOCK;
        dispatch.uniforms.range = [0.0, 1.0, 0.0, 0.0];
        dispatch.uniforms.channels = [0xf, 0, 0, 0];
        dispatch.uniforms.mip_info[3] = tile_count as i32;

        let tile_key = PipelineKey::MinMaxTile(dispatch.template);
        let result_class = match dispatch.template.class {
            FormatClass::Depth => FormatClass::Float,
            class => class,
        };
        let result_key = PipelineKey::MinMaxResult(result_class);
        if self.shaders.compute(&self.device, tile_key).is_none()
            || self.shaders.compute(&self.device, result_key).is_none()
        {
            return Err(AnalysisError::FeatureDisabled("texture min/max"));
        }

        self.queue.write_buffer(
            &self.stats_uniforms,
            0,
            bytemuck::bytes_of(&dispatch.uniforms),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("minmax encoder"),
            });

        {
            let kit = self
                .shaders
                .compute(&self.device, tile_key)
                .expect("primed above");
            let bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("minmax tile bind group"),
                layout: &kit.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.stats_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&dispatch.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.minmax_tiles.as_entire_binding(),
                    },
                ],
            });
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("minmax tile pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kit.pipeline);
            pass.set_bind_group(0, &bind, &[]);
            pass.dispatch_workgroups(bx, by, 1);
        }

        // Second pass consumes the tile partials; the pass boundary is the
        // barrier that makes the phase-1 writes visible.
        {
            let kit = self
                .shaders
                .compute(&self.device, result_key)
                .expect("primed above");
            let bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("minmax result bind group"),
                layout: &kit.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.stats_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: self.minmax_tiles.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.minmax_result.as_entire_binding(),
                    },
                ],
            });
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("minmax result pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kit.pipeline);
            pass.set_bind_group(0, &bind, &[]);
            pass.dispatch_workgroups(1, 1, 1);
        }

        encoder.copy_buffer_to_buffer(&self.minmax_result, 0, &self.minmax_readback, 0, 32);

        let bytes = submit_and_read(&self.device, &self.queue, encoder, &self.minmax_readback, 32)
            .map_err(AnalysisError::Readback)?;
        let values = f32s_from_bytes(&bytes);

        Ok(MinMax {
            min: Vec4::new(values[0], values[1], values[2], values[3]),
            max: Vec4::new(values[4], values[5], values[6], values[7]),
        })
    }

    /// 256-bucket histogram over `[min, max)` of one slice/mip/sample.
    ///
    /// A texel is counted once, at the first enabled channel whose value
    /// lies in range; `max` is nudged up so a value exactly equal to it
    /// lands in the last bucket.
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
        if min >= max {
            return Err(AnalysisError::DegenerateRange { min, max });
        }

        let mut dispatch = self.stats_dispatch(id, slice, mip, sample, hint)?;

        let (bx, by) = dispatch.blocks;
        let range = HistogramRange::new(min, max);
        dispatch.uniforms.range = [range.min, range.max, 0.0, 0.0];
        dispatch.uniforms.channels = [channel_bits(channels), 0, 0, 0];
        dispatch.uniforms.mip_info[3] = (bx * by) as i32;

        let tile_key = PipelineKey::HistogramTile(dispatch.template);
        if self.shaders.compute(&self.device, tile_key).is_none()
            || self
                .shaders
                .compute(&self.device, PipelineKey::HistogramResult)
                .is_none()
        {
            return Err(AnalysisError::FeatureDisabled("histogram"));
        }

        self.queue.write_buffer(
            &self.stats_uniforms,
            0,
            bytemuck::bytes_of(&dispatch.uniforms),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("histogram encoder"),
            });

        {
            let kit = self
                .shaders
                .compute(&self.device, tile_key)
                .expect("primed above");
            let bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("histogram tile bind group"),
                layout: &kit.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.stats_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&dispatch.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.hist_partials.as_entire_binding(),
                    },
                ],
            });
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("histogram tile pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kit.pipeline);
            pass.set_bind_group(0, &bind, &[]);
            pass.dispatch_workgroups(bx, by, 1);
        }

        {
            let kit = self
                .shaders
                .compute(&self.device, PipelineKey::HistogramResult)
                .expect("primed above");
            let bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("histogram result bind group"),
                layout: &kit.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.stats_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: self.hist_partials.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.hist_result.as_entire_binding(),
                    },
                ],
            });
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("histogram result pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kit.pipeline);
            pass.set_bind_group(0, &bind, &[]);
            pass.dispatch_workgroups(1, 1, 1);
        }

        let result_bytes = HIST_BUCKETS as u64 * 4;
        encoder.copy_buffer_to_buffer(&self.hist_result, 0, &self.hist_readback, 0, result_bytes);

        let bytes = submit_and_read(
            &self.device,
            &self.queue,
            encoder,
            &self.hist_readback,
            result_bytes,
        )
        .map_err(AnalysisError::Readback)?;

        let mut counts = [0u32; HIST_BUCKETS];
        counts.copy_from_slice(&u32s_from_bytes(&bytes));
        Ok(counts)
    }

    /// Resolves the request against the registry and builds the dispatch
    /// description: specialization template, single-level view, block grid
    /// and the shared parameter block.
    fn stats_dispatch(
        &mut self,
        id: ResourceId,
        slice: u32,
        mip: u32,
        sample: u32,
        hint: Option<FormatClass>,
    ) -> Result<StatsDispatch> {
        if !self.caps.compute_shaders {
            return Err(AnalysisError::ComputeUnavailable);
        }

        // Renderbuffers are copied into their sampleable staging texture
        // in a separate submission before the compute pass binds them.
        self.registry
            .resolve_sampleable(&self.device, &self.queue, id)?;

        let record = self.registry.texture(id)?;
        let desc = record.desc;

        if mip >= desc.mips {
            return Err(AnalysisError::InvalidRequest(format!(
                "mip {mip} out of range (texture has {})",
                desc.mips
            )));
        }
        if desc.width > MAX_TEXTURE_DIM || desc.height > MAX_TEXTURE_DIM {
            return Err(AnalysisError::InvalidRequest(format!(
                "texture exceeds the supported maximum dimension {MAX_TEXTURE_DIM}"
            )));
        }
        let layers = desc.layer_count();
        if desc.kind != TextureKind::D3 && slice >= layers.max(1) {
            return Err(AnalysisError::InvalidRequest(format!(
                "slice {slice} out of range (texture has {layers} layers)"
            )));
        }

        let class = match hint {
            Some(h) if h == desc.class => h,
            Some(h) => {
                log::debug!("type hint {h:?} ignored for {:?} texture", desc.class);
                desc.class
            }
            None => desc.class,
        };

        let template = TexTemplate::for_texture(desc.kind, class);
        if class == FormatClass::Depth
            && (template.view != ViewDim::D2
                || template.multisampled
                || record.format == wgpu::TextureFormat::Stencil8)
        {
            return Err(AnalysisError::InvalidRequest(
                "depth statistics are only supported for non-multisampled 2d textures".into(),
            ));
        }

        let aspect = if class == FormatClass::Depth && has_stencil(record.format) {
            wgpu::TextureAspect::DepthOnly
        } else {
            wgpu::TextureAspect::All
        };

        // A single-level view at the requested mip keeps the binding
        // mip-complete whatever the texture's full chain looks like.
        let view = record.sampleable().create_view(&wgpu::TextureViewDescriptor {
            label: Some("stats view"),
            dimension: Some(template.view_dimension()),
            aspect,
            base_mip_level: mip,
            mip_level_count: Some(1),
            ..Default::default()
        });

        let (width, height, _) = desc.mip_extent(mip);
        let blocks = (blocks_for(width), blocks_for(height));

        let uniforms = StatsUniforms {
            resolution: [
                width as f32,
                height as f32,
                desc.mip_extent(mip).2 as f32,
                desc.slice_for_mip(slice, mip) as f32,
            ],
            mip_info: [
                mip as i32,
                desc.samples.max(1) as i32,
                encode_sample(sample, desc.samples),
                0,
            ],
            range: [0.0; 4],
            channels: [0; 4],
        };

        Ok(StatsDispatch {
            template,
            view,
            blocks,
            uniforms,
        })
    }
}
