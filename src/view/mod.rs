// VIEW: GPU device setup and mesh uploads
pub mod gpu_init;
pub mod upload;

pub use gpu_init::GpuContext;
pub use upload::{GpuBuffer, HostUploader, MeshBuffer, MeshUploader, StagingUploader};
