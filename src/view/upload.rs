use std::sync::Arc;

use tracing::{debug, error};
use wgpu::util::DeviceExt;

use crate::error::{Result, TerrainError};
use crate::utils::Mesh;

/// Storage behind an uploaded buffer.
#[derive(Debug)]
pub enum GpuBuffer {
    /// Device-local wgpu buffer
    Device(wgpu::Buffer),
    /// CPU copy, for headless runs without an adapter
    Host(Arc<[u8]>),
}

impl GpuBuffer {
    pub fn size(&self) -> u64 {
        match self {
            GpuBuffer::Device(buffer) => buffer.size(),
            GpuBuffer::Host(bytes) => bytes.len() as u64,
        }
    }

    pub fn as_device(&self) -> Option<&wgpu::Buffer> {
        match self {
            GpuBuffer::Device(buffer) => Some(buffer),
            GpuBuffer::Host(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct MeshBuffer {
    pub vertex_buffer: GpuBuffer,
    pub index_buffer: GpuBuffer,
    pub index_count: u32,
}

/// Moves a finished CPU mesh into draw-ready buffers.
///
/// Called from generation workers, always while holding the transfer gate,
/// so implementations may assume they are the only upload in flight.
pub trait MeshUploader: Send + Sync {
    fn upload(&self, mesh: &Mesh) -> Result<MeshBuffer>;
}

/// Keeps mesh bytes in host memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostUploader;

impl MeshUploader for HostUploader {
    fn upload(&self, mesh: &Mesh) -> Result<MeshBuffer> {
        Ok(MeshBuffer {
            vertex_buffer: GpuBuffer::Host(Arc::from(mesh.vertex_bytes())),
            index_buffer: GpuBuffer::Host(Arc::from(mesh.index_bytes())),
            index_count: mesh.indices.len() as u32,
        })
    }
}

/// Staging buffer -> device-local buffer copy through a one-shot command
/// encoder. Blocks the calling thread until the queue has drained the copy.
pub struct StagingUploader {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl StagingUploader {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    fn check_size(&self, label: &'static str, size: u64) -> Result<()> {
        let max = self.device.limits().max_buffer_size;
        if size > max {
            return Err(TerrainError::BufferAllocation {
                label,
                reason: format!("{size} bytes exceeds device limit of {max}"),
            });
        }
        Ok(())
    }

    fn allocate(&self, mesh: &Mesh) -> (wgpu::Buffer, wgpu::Buffer, wgpu::Buffer, wgpu::Buffer) {
        let vertices = mesh.vertex_bytes();
        let indices = mesh.index_bytes();

        let vertex_staging = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Vertex Staging Buffer"),
            contents: vertices,
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        let index_staging = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Index Staging Buffer"),
            contents: indices,
            usage: wgpu::BufferUsages::COPY_SRC,
        });

        let vertex_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Terrain Vertex Buffer"),
            size: vertices.len() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Terrain Index Buffer"),
            size: indices.len() as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        (vertex_staging, index_staging, vertex_buffer, index_buffer)
    }
}

impl MeshUploader for StagingUploader {
    fn upload(&self, mesh: &Mesh) -> Result<MeshBuffer> {
        let vertex_size = mesh.vertex_bytes().len() as u64;
        let index_size = mesh.index_bytes().len() as u64;
        self.check_size("vertex", vertex_size)?;
        self.check_size("index", index_size)?;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let (vertex_staging, index_staging, vertex_buffer, index_buffer) = self.allocate(mesh);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            error!(%err, vertex_size, index_size, "terrain buffer allocation failed");
            return Err(TerrainError::BufferAllocation {
                label: "terrain mesh",
                reason: err.to_string(),
            });
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Terrain Upload Encoder"),
        });
        if vertex_size > 0 {
            encoder.copy_buffer_to_buffer(&vertex_staging, 0, &vertex_buffer, 0, vertex_size);
        }
        if index_size > 0 {
            encoder.copy_buffer_to_buffer(&index_staging, 0, &index_buffer, 0, index_size);
        }
        self.queue.submit(Some(encoder.finish()));

        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|err| {
                error!(%err, "terrain upload did not complete");
                TerrainError::Transfer(err.to_string())
            })?;
        debug!(vertex_size, index_size, "uploaded terrain mesh");

        Ok(MeshBuffer {
            vertex_buffer: GpuBuffer::Device(vertex_buffer),
            index_buffer: GpuBuffer::Device(index_buffer),
            index_count: mesh.indices.len() as u32,
        })
    }
}
