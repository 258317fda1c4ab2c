//! Pixel picking: renders one addressed texel into a persistent 1x1
//! target and reads it back.
//!
//! The target is always `Rgba32Float`; integer texels are bitcast in the
//! fetch shader and reinterpreted after readback, so the full 32-bit
//! pattern survives regardless of render-target support for the source
//! class. Combined depth/stencil formats need a second pass for the
//! stencil aspect, which merges into the green channel.

use framescope_core::error::{AnalysisError, Result};
use framescope_core::request::PixelValue;
use framescope_core::resource::{FormatClass, ResourceId, TextureKind, ViewDim};

use crate::buffer::{submit_and_read, u32s_from_bytes};
use crate::registry::has_stencil;
use crate::shader::TexTemplate;

use super::{AnalysisEngine, FetchUniforms};

impl AnalysisEngine {
    /// Reads back the value of one texel.
    pub fn pick_pixel(
        &mut self,
        id: ResourceId,
        x: u32,
        y: u32,
        slice: u32,
        mip: u32,
        sample: u32,
    ) -> Result<PixelValue> {
        self.registry
            .resolve_sampleable(&self.device, &self.queue, id)?;

        let record = self.registry.texture(id)?;
        let desc = record.desc;
        let format = record.format;

        if mip >= desc.mips {
            return Err(AnalysisError::InvalidRequest(format!(
                "mip {mip} out of range (texture has {})",
                desc.mips
            )));
        }
        let (mip_w, mip_h, _) = desc.mip_extent(mip);
        if x >= mip_w || y >= mip_h {
            return Err(AnalysisError::InvalidRequest(format!(
                "texel ({x}, {y}) out of range for {mip_w}x{mip_h} mip"
            )));
        }
        let layers = desc.layer_count();
        if desc.kind != TextureKind::D3 && slice >= layers.max(1) {
            return Err(AnalysisError::InvalidRequest(format!(
                "slice {slice} out of range (texture has {layers} layers)"
            )));
        }

        let class = desc.class;
        let template = TexTemplate::for_texture(desc.kind, class);
        if class == FormatClass::Depth
            && (template.view != ViewDim::D2 || template.multisampled)
        {
            return Err(AnalysisError::InvalidRequest(
                "depth picking is only supported for non-multisampled 2d textures".into(),
            ));
        }

        self.ensure_pixel_target();

        let params = FetchUniforms {
            offset: [x as i32, y as i32],
            slice: desc.slice_for_mip(slice, mip) as i32,
            sample: sample.min(desc.samples.saturating_sub(1)) as i32,
        };

        let aspect = if class == FormatClass::Depth && has_stencil(format) {
            wgpu::TextureAspect::DepthOnly
        } else {
            wgpu::TextureAspect::All
        };
        let stencil_only = format == wgpu::TextureFormat::Stencil8;

        let bits = if stencil_only {
            // Stencil-only surfaces skip straight to the stencil pass.
            [0; 4]
        } else {
            let view = self.registry.texture(id)?.sampleable().create_view(
                &wgpu::TextureViewDescriptor {
                    label: Some("pixel pick view"),
                    dimension: Some(template.view_dimension()),
                    aspect,
                    base_mip_level: mip,
                    mip_level_count: Some(1),
                    ..Default::default()
                },
            );
            self.fetch_texel_bits(template, &view, params)?
        };

        match class {
            FormatClass::Float => Ok(PixelValue::Float([
                f32::from_bits(bits[0]),
                f32::from_bits(bits[1]),
                f32::from_bits(bits[2]),
                f32::from_bits(bits[3]),
            ])),
            FormatClass::Uint => Ok(PixelValue::Uint(bits)),
            FormatClass::Sint => Ok(PixelValue::Sint([
                bits[0] as i32,
                bits[1] as i32,
                bits[2] as i32,
                bits[3] as i32,
            ])),
            FormatClass::Depth => {
                let depth = if stencil_only {
                    0.0
                } else {
                    f32::from_bits(bits[0])
                };
                let stencil = if has_stencil(format) {
                    // Depth and stencil cannot be fetched together; a
                    // second pass reads the stencil aspect alone.
                    let stencil_template = TexTemplate {
                        view: ViewDim::D2,
                        multisampled: false,
                        class: FormatClass::Uint,
                    };
                    let view = self.registry.texture(id)?.sampleable().create_view(
                        &wgpu::TextureViewDescriptor {
                            label: Some("pixel pick stencil view"),
                            dimension: Some(wgpu::TextureViewDimension::D2),
                            aspect: wgpu::TextureAspect::StencilOnly,
                            base_mip_level: mip,
                            mip_level_count: Some(1),
                            ..Default::default()
                        },
                    );
                    let stencil_bits = self.fetch_texel_bits(stencil_template, &view, params)?;
                    stencil_bits[0] as f32 / 255.0
                } else {
                    0.0
                };
                Ok(PixelValue::Float([depth, stencil, 0.0, 0.0]))
            }
        }
    }

    fn ensure_pixel_target(&mut self) {
        if self.pixel_target.is_some() {
            return;
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pixel pick target"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.pixel_target = Some((texture, view));
    }

    /// Runs one fetch pass and returns the four 32-bit patterns.
    fn fetch_texel_bits(
        &mut self,
        template: TexTemplate,
        view: &wgpu::TextureView,
        params: FetchUniforms,
    ) -> Result<[u32; 4]> {
        if self.shaders.fetch(&self.device, template).is_none() {
            return Err(AnalysisError::FeatureDisabled("pixel picking"));
        }

        self.queue
            .write_buffer(&self.fetch_uniforms, 0, bytemuck::bytes_of(&params));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pixel pick encoder"),
            });

        {
            let kit = self
                .shaders
                .fetch(&self.device, template)
                .expect("primed above");
            let bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("pixel pick bind group"),
                layout: &kit.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.fetch_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                ],
            });

            let (_, target_view) = self.pixel_target.as_ref().expect("created above");
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pixel pick pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&kit.pipeline);
            pass.set_bind_group(0, &bind, &[]);
            pass.draw(0..3, 0..1);
        }

        let (target, _) = self.pixel_target.as_ref().expect("created above");
        encoder.copy_texture_to_buffer(
            target.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &self.pixel_readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(256),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        let bytes = submit_and_read(
            &self.device,
            &self.queue,
            encoder,
            &self.pixel_readback,
            16,
        )
        .map_err(AnalysisError::Readback)?;

        let words = u32s_from_bytes(&bytes);
        Ok([words[0], words[1], words[2], words[3]])
    }
}
