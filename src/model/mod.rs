// MODEL: camera, culling volume and per-frame viewer state
pub mod camera;
pub mod frustum;
pub mod viewer;

pub use camera::Camera;
pub use frustum::Frustum;
pub use viewer::ViewerState;
