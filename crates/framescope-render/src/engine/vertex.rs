//! Mesh vertex picking.
//!
//! Raw mesh buffers are promoted on the CPU (uniform u32 indices, vec4
//! positions) into grow-only staging buffers, one compute pass gathers
//! candidate hits through an atomic counter, and the winner is resolved
//! deterministically on the CPU.

use framescope_core::constants::{MAX_PICK_CANDIDATES, PICK_GROUP_SIZE};
use framescope_core::error::{AnalysisError, Result};
use framescope_core::index::normalize_indices;
use framescope_core::mesh::MeshDescriptor;
use framescope_core::pick::{
    closest_screen_hit, closest_triangle_hit, ScreenHit, TriangleHit, ViewInfo,
};
use glam::Vec3;

use crate::buffer::{f32s_from_bytes, submit_and_read, u32s_from_bytes};
use crate::ray::build_pick_ray;
use crate::shader::PipelineKey;

use super::{AnalysisEngine, PickUniforms};

impl AnalysisEngine {
    /// Resolves the cursor to the nearest vertex of the described mesh, or
    /// `None` when nothing is under the cursor.
    pub fn pick_vertex(
        &mut self,
        viewport: (u32, u32),
        view: &ViewInfo,
        mesh: &MeshDescriptor,
        cursor: (u32, u32),
    ) -> Result<Option<u32>> {
        if !self.caps.compute_shaders {
            return Err(AnalysisError::ComputeUnavailable);
        }
        if self
            .shaders
            .compute(&self.device, PipelineKey::MeshPick)
            .is_none()
        {
            return Err(AnalysisError::FeatureDisabled("mesh picking"));
        }
        if mesh.element_count == 0 {
            return Ok(None);
        }
        if mesh.vertex_byte_stride == 0 {
            return Err(AnalysisError::InvalidRequest(
                "vertex stride must be non-zero".into(),
            ));
        }

        let ray = build_pick_ray(cursor, viewport, view);

        // Promote raw indices to u32 and fold in the base vertex; the
        // referenced range bounds the vertex upload below.
        let use_indices = mesh.index_resource.is_some();
        let (min_index, mut max_index, index_data) =
            if let Some(index_id) = mesh.index_resource {
                let raw = self.registry.read_buffer(
                    &self.device,
                    &self.queue,
                    index_id,
                    mesh.index_byte_offset,
                    Some(u64::from(mesh.element_count) * mesh.index_stride.bytes() as u64),
                )?;
                let normalized = normalize_indices(
                    &raw,
                    mesh.index_stride,
                    mesh.base_vertex,
                    mesh.element_count,
                );
                (
                    normalized.min_index,
                    normalized.max_index,
                    Some(normalized.indices),
                )
            } else {
                (0, mesh.element_count - 1, None)
            };

        let vertex_bytes = self.registry.read_buffer(
            &self.device,
            &self.queue,
            mesh.vertex_resource,
            mesh.vertex_byte_offset,
            None,
        )?;
        let stride = mesh.vertex_byte_stride as usize;
        let available = vertex_bytes.len() / stride;
        if available == 0 {
            return Ok(None);
        }
        // Stray or primitive-restart indices may point past the buffer;
        // clamp the unpacked range to what actually exists.
        max_index = max_index.min(available as u32 - 1);

        let mut positions = vec![[0.0f32; 4]; max_index as usize + 1];
        for index in min_index..=max_index {
            let at = index as usize * stride;
            let mut texel = [0.0f32, 0.0, 0.0, 1.0];
            for (c, value) in texel.iter_mut().take(3).enumerate() {
                let start = at + c * 4;
                if let Some(bytes) = vertex_bytes.get(start..start + 4) {
                    *value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                }
            }
            positions[index as usize] = texel;
        }

        self.pick_vertices
            .ensure(&self.device, (positions.len() * 16) as u64);
        self.queue.write_buffer(
            self.pick_vertices.get().expect("just ensured"),
            0,
            bytemuck::cast_slice(&positions),
        );

        let index_bytes = index_data
            .as_ref()
            .map_or(4, |indices| (indices.len() * 4).max(4)) as u64;
        self.pick_indices.ensure(&self.device, index_bytes);
        if let Some(indices) = &index_data {
            self.queue.write_buffer(
                self.pick_indices.get().expect("just ensured"),
                0,
                bytemuck::cast_slice(indices),
            );
        }

        // Reset the candidate counter.
        self.queue
            .write_buffer(&self.pick_results, 0, bytemuck::cast_slice(&[0u32; 4]));

        let uniforms = PickUniforms {
            ray_pos: ray.origin.to_array(),
            use_indices: u32::from(use_indices),
            ray_dir: ray.dir.to_array(),
            element_count: mesh.element_count,
            mvp: ray.mvp.to_cols_array_2d(),
            coords: [cursor.0 as f32, cursor.1 as f32],
            viewport: [viewport.0 as f32, viewport.1 as f32],
            mesh_mode: mesh.topology.gpu_mode(),
            pick_radius: self.options.pick_radius_px,
            _pad: [0; 2],
        };
        self.queue
            .write_buffer(&self.pick_uniforms, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("mesh pick encoder"),
            });

        {
            let kit = self
                .shaders
                .compute(&self.device, PipelineKey::MeshPick)
                .expect("primed above");
            let bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("mesh pick bind group"),
                layout: &kit.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.pick_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: self
                            .pick_vertices
                            .get()
                            .expect("ensured above")
                            .as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self
                            .pick_indices
                            .get()
                            .expect("ensured above")
                            .as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: self.pick_results.as_entire_binding(),
                    },
                ],
            });
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("mesh pick pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kit.pipeline);
            pass.set_bind_group(0, &bind, &[]);
            pass.dispatch_workgroups(mesh.element_count / PICK_GROUP_SIZE + 1, 1, 1);
        }

        let result_size = 16 + u64::from(MAX_PICK_CANDIDATES) * 16;
        encoder.copy_buffer_to_buffer(&self.pick_results, 0, &self.pick_readback, 0, result_size);

        let bytes = submit_and_read(
            &self.device,
            &self.queue,
            encoder,
            &self.pick_readback,
            result_size,
        )
        .map_err(AnalysisError::Readback)?;

        let hit_count = u32s_from_bytes(&bytes[0..4])[0].min(MAX_PICK_CANDIDATES) as usize;
        if hit_count == 0 {
            return Ok(None);
        }

        let candidates = &bytes[16..16 + hit_count * 16];
        if mesh.topology.is_triangles() {
            let hits: Vec<TriangleHit> = candidates
                .chunks_exact(16)
                .map(|chunk| {
                    let vertex = u32s_from_bytes(&chunk[0..4])[0];
                    let f = f32s_from_bytes(&chunk[4..16]);
                    TriangleHit {
                        vertex,
                        hit: Vec3::new(f[0], f[1], f[2]),
                    }
                })
                .collect();
            Ok(closest_triangle_hit(&hits, ray.origin))
        } else {
            let hits: Vec<ScreenHit> = candidates
                .chunks_exact(16)
                .map(|chunk| {
                    let vertex = u32s_from_bytes(&chunk[0..4])[0];
                    let f = f32s_from_bytes(&chunk[4..12]);
                    ScreenHit {
                        vertex,
                        distance: f[0],
                        depth: f[1],
                    }
                })
                .collect();
            Ok(closest_screen_hit(&hits))
        }
    }
}
