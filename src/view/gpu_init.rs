use std::sync::Arc;

use tracing::info;
use wgpu::Device;

use crate::error::{Result, TerrainError};
use crate::view::upload::StagingUploader;

/// Headless GPU context: a device and queue without a surface. Presentation
/// belongs to the embedding renderer, the terrain only needs the transfer queue.
pub struct GpuContext {
    pub device: Arc<Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_info: wgpu::AdapterInfo,
}

async fn init_device_and_queue(
    adapter: &wgpu::Adapter,
    features: wgpu::Features,
) -> Result<(Arc<Device>, Arc<wgpu::Queue>)> {
    let adapter_limits = adapter.limits();
    let limits = wgpu::Limits::downlevel_defaults().using_resolution(adapter_limits);

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("terrain device"),
                required_features: features,
                required_limits: limits,
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::default(),
            },
        )
        .await
        .map_err(|e| TerrainError::RequestDevice(e.to_string()))?;

    Ok((Arc::new(device), Arc::new(queue)))
}

impl GpuContext {
    pub async fn new_headless() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .map_err(|e| TerrainError::NoAdapter(e.to_string()))?;

        let adapter_info = adapter.get_info();
        info!(name = %adapter_info.name, backend = ?adapter_info.backend, "using GPU adapter");

        let (device, queue) = init_device_and_queue(&adapter, wgpu::Features::empty()).await?;

        Ok(GpuContext {
            device,
            queue,
            adapter_info,
        })
    }

    pub fn uploader(&self) -> StagingUploader {
        StagingUploader::new(self.device.clone(), self.queue.clone())
    }
}
