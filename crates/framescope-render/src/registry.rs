//! The resource descriptor cache: opaque ids to live GPU handles.

use std::collections::HashMap;

use framescope_core::error::{AnalysisError, Result};
use framescope_core::resource::{FormatClass, ResourceId, TextureDesc, TextureKind};

use crate::buffer::read_buffer_sync;

/// Classifies a wgpu format the way the analysis passes care about it.
#[must_use]
pub fn format_class_of(format: wgpu::TextureFormat) -> FormatClass {
    use wgpu::TextureFormat as F;
    match format {
        F::R8Uint | F::Rg8Uint | F::Rgba8Uint | F::R16Uint | F::Rg16Uint | F::Rgba16Uint
        | F::R32Uint | F::Rg32Uint | F::Rgba32Uint => FormatClass::Uint,
        F::R8Sint | F::Rg8Sint | F::Rgba8Sint | F::R16Sint | F::Rg16Sint | F::Rgba16Sint
        | F::R32Sint | F::Rg32Sint | F::Rgba32Sint => FormatClass::Sint,
        F::Depth16Unorm
        | F::Depth24Plus
        | F::Depth24PlusStencil8
        | F::Depth32Float
        | F::Depth32FloatStencil8
        | F::Stencil8 => FormatClass::Depth,
        _ => FormatClass::Float,
    }
}

/// Whether the format carries a stencil aspect (read in a second pass).
#[must_use]
pub fn has_stencil(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Depth24PlusStencil8
            | wgpu::TextureFormat::Depth32FloatStencil8
            | wgpu::TextureFormat::Stencil8
    )
}

/// A registered texture: descriptor plus live handles.
pub struct TextureRecord {
    pub desc: TextureDesc,
    pub format: wgpu::TextureFormat,
    pub texture: wgpu::Texture,
    /// Sampleable copy for renderbuffer surfaces, created on first use.
    staging: Option<wgpu::Texture>,
}

impl TextureRecord {
    /// The texture compute passes may bind. For renderbuffers this is the
    /// staging copy, which must be refreshed first via
    /// [`ResourceRegistry::resolve_sampleable`].
    #[must_use]
    pub fn sampleable(&self) -> &wgpu::Texture {
        self.staging.as_ref().unwrap_or(&self.texture)
    }
}

struct BufferRecord {
    buffer: wgpu::Buffer,
    size: u64,
}

/// Maps opaque resource ids to live GPU handles and their descriptors.
pub struct ResourceRegistry {
    next_id: u64,
    textures: HashMap<ResourceId, TextureRecord>,
    buffers: HashMap<ResourceId, BufferRecord>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            textures: HashMap::new(),
            buffers: HashMap::new(),
        }
    }

    fn mint(&mut self) -> ResourceId {
        let id = ResourceId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    /// Registers a texture and optionally uploads level-0 contents.
    ///
    /// Renderbuffers are created without `TEXTURE_BINDING`, faithful to a
    /// non-sampleable surface; everything else is sampleable directly.
    pub fn register_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        desc: TextureDesc,
        format: wgpu::TextureFormat,
        data: Option<&[u8]>,
    ) -> ResourceId {
        // The descriptor's class always reflects the concrete format.
        let mut desc = desc;
        desc.class = format_class_of(format);

        let usage = if desc.renderbuffer {
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST
        } else {
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("registered texture"),
            size: texture_extent(&desc),
            mip_level_count: desc.mips,
            sample_count: desc.samples,
            dimension: texture_dimension(desc.kind),
            format,
            usage,
            view_formats: &[],
        });

        if let Some(bytes) = data {
            upload_level_zero(queue, &texture, &desc, format, bytes);
        }

        let id = self.mint();
        self.textures.insert(
            id,
            TextureRecord {
                desc,
                format,
                texture,
                staging: None,
            },
        );
        id
    }

    /// Registers a buffer with its contents.
    pub fn register_buffer(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[u8],
    ) -> ResourceId {
        // Storage binding sizes must be 4-byte aligned.
        let size = (data.len() as u64).div_ceil(4) * 4;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("registered buffer"),
            size: size.max(4),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::INDEX
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&buffer, 0, data);

        let id = self.mint();
        self.buffers.insert(
            id,
            BufferRecord {
                buffer,
                size: data.len() as u64,
            },
        );
        id
    }

    pub fn texture(&self, id: ResourceId) -> Result<&TextureRecord> {
        self.textures
            .get(&id)
            .ok_or(AnalysisError::UnknownResource(id))
    }

    pub fn buffer(&self, id: ResourceId) -> Result<&wgpu::Buffer> {
        self.buffers
            .get(&id)
            .map(|r| &r.buffer)
            .ok_or(AnalysisError::UnknownResource(id))
    }

    pub fn buffer_size(&self, id: ResourceId) -> Result<u64> {
        self.buffers
            .get(&id)
            .map(|r| r.size)
            .ok_or(AnalysisError::UnknownResource(id))
    }

    /// Reads `size` bytes of a registered buffer back to the CPU
    /// (blocking). `size` of `None` reads to the end of the buffer.
    pub fn read_buffer(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: ResourceId,
        offset: u64,
        size: Option<u64>,
    ) -> Result<Vec<u8>> {
        let record = self
            .buffers
            .get(&id)
            .ok_or(AnalysisError::UnknownResource(id))?;
        if offset >= record.size {
            return Ok(Vec::new());
        }
        let available = record.size - offset;
        let size = size.map_or(available, |s| s.min(available));

        // Buffer copies need 4-byte aligned offsets; over-read from the
        // previous boundary and trim the lead bytes.
        let aligned = offset & !3;
        let lead = (offset - aligned) as usize;
        let bytes = read_buffer_sync(device, queue, &record.buffer, aligned, lead as u64 + size)
            .map_err(AnalysisError::Readback)?;
        Ok(bytes[lead..].to_vec())
    }

    /// Makes a renderbuffer's contents available for sampling by copying
    /// into the staging texture. No-op for directly sampleable textures.
    pub fn resolve_sampleable(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: ResourceId,
    ) -> Result<()> {
        let record = self
            .textures
            .get_mut(&id)
            .ok_or(AnalysisError::UnknownResource(id))?;
        if !record.desc.renderbuffer {
            return Ok(());
        }

        if record.staging.is_none() {
            record.staging = Some(device.create_texture(&wgpu::TextureDescriptor {
                label: Some("renderbuffer staging"),
                size: texture_extent(&record.desc),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: record.format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            }));
        }

        // The copy runs in its own submission so the compute pass that
        // samples the staging texture sees the finished contents.
        let staging = record.staging.as_ref().expect("created above");
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("renderbuffer resolve"),
        });
        encoder.copy_texture_to_texture(
            record.texture.as_image_copy(),
            staging.as_image_copy(),
            texture_extent(&record.desc),
        );
        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

fn texture_dimension(kind: TextureKind) -> wgpu::TextureDimension {
    match kind {
        TextureKind::D1 => wgpu::TextureDimension::D1,
        TextureKind::D3 => wgpu::TextureDimension::D3,
        _ => wgpu::TextureDimension::D2,
    }
}

fn texture_extent(desc: &TextureDesc) -> wgpu::Extent3d {
    let layers = match desc.kind {
        TextureKind::Cube => 6,
        TextureKind::CubeArray => desc.depth * 6,
        TextureKind::D2Array => desc.depth,
        TextureKind::D3 => desc.depth,
        _ => 1,
    };
    wgpu::Extent3d {
        width: desc.width,
        height: desc.height,
        depth_or_array_layers: layers.max(1),
    }
}

fn upload_level_zero(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    desc: &TextureDesc,
    format: wgpu::TextureFormat,
    bytes: &[u8],
) {
    let Some(texel_size) = format.block_copy_size(None) else {
        log::warn!("cannot upload initial data for format {format:?}");
        return;
    };
    let extent = texture_extent(desc);
    queue.write_texture(
        texture.as_image_copy(),
        bytes,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(desc.width * texel_size),
            rows_per_image: Some(desc.height),
        },
        extent,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_classification() {
        assert_eq!(
            format_class_of(wgpu::TextureFormat::Rgba8Unorm),
            FormatClass::Float
        );
        assert_eq!(
            format_class_of(wgpu::TextureFormat::Rgba32Uint),
            FormatClass::Uint
        );
        assert_eq!(
            format_class_of(wgpu::TextureFormat::R32Sint),
            FormatClass::Sint
        );
        assert_eq!(
            format_class_of(wgpu::TextureFormat::Depth24PlusStencil8),
            FormatClass::Depth
        );
        assert!(has_stencil(wgpu::TextureFormat::Depth24PlusStencil8));
        assert!(!has_stencil(wgpu::TextureFormat::Depth32Float));
    }
}
