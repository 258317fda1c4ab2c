//! GPU buffer management.

use wgpu::util::DeviceExt;

/// Creates a uniform buffer from data.
pub fn create_uniform_buffer<T: bytemuck::Pod>(
    device: &wgpu::Device,
    data: &T,
    label: Option<&str>,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: bytemuck::bytes_of(data),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Creates an uninitialized storage buffer of the given byte size.
pub fn create_storage_buffer(
    device: &wgpu::Device,
    size: u64,
    label: Option<&str>,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label,
        size,
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    })
}

/// Creates a readback staging buffer (COPY_DST | MAP_READ).
pub fn create_readback_buffer(
    device: &wgpu::Device,
    size: u64,
    label: Option<&str>,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label,
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    })
}

/// A storage buffer arena that grows geometrically and never shrinks.
///
/// Logical size and capacity are tracked separately; a request larger than
/// the current capacity destroys the buffer and recreates it at the next
/// power-of-two capacity. Grow-only is the contract: staging for the
/// largest mesh picked so far stays allocated for the rest of the session.
pub struct GrowOnlyBuffer {
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
    len: u64,
    usage: wgpu::BufferUsages,
    label: &'static str,
}

impl GrowOnlyBuffer {
    /// Minimum capacity allocated on first use.
    const MIN_CAPACITY: u64 = 256;

    #[must_use]
    pub fn new(usage: wgpu::BufferUsages, label: &'static str) -> Self {
        Self {
            buffer: None,
            capacity: 0,
            len: 0,
            usage,
            label,
        }
    }

    /// Current logical size in bytes (the last requested size).
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Ensures at least `size` bytes are allocated and returns the buffer.
    pub fn ensure(&mut self, device: &wgpu::Device, size: u64) -> &wgpu::Buffer {
        self.len = size;
        if self.buffer.is_none() || self.capacity < size {
            let mut capacity = self.capacity.max(Self::MIN_CAPACITY);
            while capacity < size {
                capacity *= 2;
            }
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size: capacity,
                usage: self.usage,
                mapped_at_creation: false,
            }));
            self.capacity = capacity;
        }
        self.buffer.as_ref().expect("just ensured")
    }

    /// Returns the buffer if it has ever been allocated.
    #[must_use]
    pub fn get(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }
}

/// Reinterprets little-endian bytes as `u32`s. Readback vectors are not
/// guaranteed aligned for a direct cast.
#[must_use]
pub fn u32s_from_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Reinterprets little-endian bytes as `f32`s.
#[must_use]
pub fn f32s_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Submits the encoder and blocks until `size` bytes of the readback
/// staging buffer are mapped, returning their contents. This is the
/// subsystem's synchronization point: GPU work is asynchronous up to here.
pub fn submit_and_read(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    encoder: wgpu::CommandEncoder,
    staging: &wgpu::Buffer,
    size: u64,
) -> Result<Vec<u8>, String> {
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..size);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    let _ = device.poll(wgpu::PollType::wait_indefinitely());
    rx.recv()
        .map_err(|_| "map callback dropped".to_string())?
        .map_err(|e| e.to_string())?;

    let data = slice.get_mapped_range();
    let bytes = data.to_vec();
    drop(data);
    staging.unmap();
    Ok(bytes)
}

/// Synchronously copies `size` bytes out of `src` and returns them.
///
/// Submits a copy into a transient staging buffer, then blocks on the map.
/// Every call is a full pipeline flush; callers treat this as the
/// synchronization point it is.
pub fn read_buffer_sync(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    src: &wgpu::Buffer,
    offset: u64,
    size: u64,
) -> Result<Vec<u8>, String> {
    // Copy sizes must be 4-byte aligned; round up and trim after.
    let padded = size.div_ceil(4) * 4;
    let staging = create_readback_buffer(device, padded, Some("transient readback"));

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback encoder"),
    });
    encoder.copy_buffer_to_buffer(src, offset, &staging, 0, padded);

    let mut bytes = submit_and_read(device, queue, encoder, &staging, padded)?;
    bytes.truncate(size as usize);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grow_only_capacity_policy() {
        let mut buf = GrowOnlyBuffer::new(wgpu::BufferUsages::STORAGE, "test");
        assert_eq!(buf.capacity(), 0);
        assert!(buf.is_empty());

        // Capacity math is observable without a device.
        let mut capacity = GrowOnlyBuffer::MIN_CAPACITY;
        let request = 5000u64;
        while capacity < request {
            capacity *= 2;
        }
        assert_eq!(capacity, 8192);

        buf.len = request;
        assert_eq!(buf.len(), request);
    }
}
