use std::sync::Arc;

use glam::{Mat4, Vec3};
use tracing::debug;

use crate::controller::generation_pool::{JobTicket, TransferGate};
use crate::error::Result;
use crate::settings::GenerationParams;
use crate::utils::ChunkCoord;
use crate::view::upload::{MeshBuffer, MeshUploader};
use crate::world::height_grid::HeightGrid;
use crate::world::mesh_builder::{MeshBuilder, Topology};
use crate::world::noise::NoiseField;
use crate::world::vegetation::{VegetationInstance, VegetationPlacer};

/// Alpha gained per second while a freshly generated chunk fades in.
pub const FADE_IN_RATE: f32 = 2.0;

/// Vertical padding added around the generated height range for culling.
const AABB_PADDING: f32 = 20.0;

/// Lifecycle of a chunk. Transitions only ever move forward.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    New = 0,
    Generating = 1,
    Generated = 2,
    // reserved for staged eviction, chunks are currently dropped directly
    Deleting = 3,
    Deleted = 4,
}

impl ChunkState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ChunkState::New,
            1 => ChunkState::Generating,
            2 => ChunkState::Generated,
            3 => ChunkState::Deleting,
            _ => ChunkState::Deleted,
        }
    }
}

/// Everything a worker produces for one chunk.
#[derive(Debug)]
pub struct ChunkPayload {
    pub grid: HeightGrid,
    pub mesh: MeshBuffer,
    pub vegetation: Vec<VegetationInstance>,
    pub min_height: f32,
    pub max_height: f32,
}

/// Run the whole generation pipeline for one chunk coordinate.
///
/// CPU work runs unsynchronized; only the upload takes the transfer gate.
pub fn generate_chunk(
    params: GenerationParams,
    coord: ChunkCoord,
    uploader: &dyn MeshUploader,
    gate: &TransferGate,
) -> Result<ChunkPayload> {
    let field = NoiseField::new(params.noise);
    let grid = HeightGrid::generate(&field, coord, params.interior);

    let built = MeshBuilder::new(
        Vec3::new(1.0, params.height_scale, 1.0),
        Topology::Triangles,
        params.level_of_detail,
    )
    .build(&grid);

    let vegetation = VegetationPlacer::new(params.vegetation).place(&grid, coord, params.height_scale);

    let mesh = {
        let _transfer = gate.lock();
        uploader.upload(&built.mesh)?
    };

    debug!(
        ?coord,
        vertices = built.mesh.vertices.len(),
        trees = vegetation.len(),
        min_height = built.min_height,
        max_height = built.max_height,
        "generated chunk"
    );

    Ok(ChunkPayload {
        grid,
        mesh,
        vegetation,
        min_height: built.min_height,
        max_height: built.max_height,
    })
}

pub struct Chunk {
    coord: ChunkCoord,
    center: Vec3,
    world_size: f32,
    aabb_min: Vec3,
    aabb_max: Vec3,
    ticket: Arc<JobTicket>,
    payload: Option<ChunkPayload>,
    pub visible: bool,
    pub alpha: f32,
}

impl Chunk {
    pub fn new(coord: ChunkCoord, world_size: f32, ticket: Arc<JobTicket>) -> Self {
        let center = coord.world_center(world_size);
        let half = Vec3::splat(world_size / 2.0);
        Self {
            coord,
            center,
            world_size,
            aabb_min: center - half,
            aabb_max: center + half,
            ticket,
            payload: None,
            visible: false,
            alpha: 0.0,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn state(&self) -> ChunkState {
        self.ticket.state()
    }

    pub fn ticket(&self) -> &Arc<JobTicket> {
        &self.ticket
    }

    pub fn is_generated(&self) -> bool {
        self.state() == ChunkState::Generated
    }

    pub fn aabb(&self) -> (Vec3, Vec3) {
        (self.aabb_min, self.aabb_max)
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_translation(self.center)
    }

    /// Attach a worker's payload and publish the chunk as Generated.
    ///
    /// Panics if the chunk was never claimed by a worker.
    pub fn install(&mut self, payload: ChunkPayload) {
        assert_eq!(
            self.state(),
            ChunkState::Generating,
            "payload installed on unclaimed chunk {:?}",
            self.coord
        );
        self.aabb_min.y = payload.min_height - AABB_PADDING;
        self.aabb_max.y = payload.max_height + AABB_PADDING;
        self.payload = Some(payload);
        self.alpha = 0.0;
        self.ticket.mark_generated();
    }

    pub fn update_fade(&mut self, dt: f32) {
        if self.is_generated() && self.alpha < 1.0 {
            self.alpha = (self.alpha + FADE_IN_RATE * dt).min(1.0);
        }
    }

    pub fn payload(&self) -> Option<&ChunkPayload> {
        self.payload.as_ref()
    }

    pub fn mesh(&self) -> Option<&MeshBuffer> {
        self.payload.as_ref().map(|p| &p.mesh)
    }

    pub fn vegetation(&self) -> &[VegetationInstance] {
        self.payload.as_ref().map(|p| p.vegetation.as_slice()).unwrap_or(&[])
    }

    pub fn height_grid(&self) -> Option<&HeightGrid> {
        self.payload.as_ref().map(|p| &p.grid)
    }

    /// Grid cell under a world position, border included.
    pub fn local_cell(&self, world_x: f32, world_z: f32) -> (i32, i32) {
        let half = self.world_size / 2.0;
        let x = (world_x - (self.center.x - half)).round() as i32 + 1;
        let y = (self.center.z + half - world_z).round() as i32 + 1;
        (x, y)
    }
}
