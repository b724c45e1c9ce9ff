// WORLD: terrain generation pipeline and chunk streaming
pub mod chunk;
pub mod chunk_manager;
pub mod height_grid;
pub mod mesh_builder;
pub mod noise;
pub mod vegetation;

pub use chunk::{generate_chunk, Chunk, ChunkPayload, ChunkState, FADE_IN_RATE};
pub use chunk_manager::ChunkManager;
pub use height_grid::HeightGrid;
pub use mesh_builder::{MeshBuilder, TerrainMesh, Topology};
pub use self::noise::{NoiseField, NoiseParams};
pub use vegetation::{VegetationInstance, VegetationPlacer};
