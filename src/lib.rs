// Re-export all public modules so they can be used from main.rs
pub mod error;
pub mod logging;
pub mod settings;
pub mod utils;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;
pub mod world;

pub use error::{Result, TerrainError};
pub use settings::{GenerationParams, TerrainSettings};
pub use world::ChunkManager;
