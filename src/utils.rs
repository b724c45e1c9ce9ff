use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// normalized height in [0, 1], used by the terrain shader for layer blending
    pub terrain_height: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<TerrainVertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.indices.is_empty()
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// coordinates of a chunk in chunk space (x, z on the ground plane)
#[derive(Debug, Eq, Hash, PartialEq, Clone, Copy, Default)]
pub struct ChunkCoord(pub i32, pub i32);

impl ChunkCoord {
    /// Chunk containing a ground-plane position. Chunks are centred on
    /// multiples of `chunk_size`, so this rounds rather than floors.
    pub fn from_world(pos: Vec2, chunk_size: f32) -> Self {
        ChunkCoord(
            (pos.x / chunk_size).round() as i32,
            (pos.y / chunk_size).round() as i32,
        )
    }

    /// World-space center of the chunk
    pub fn world_center(&self, chunk_size: f32) -> Vec3 {
        Vec3::new(self.0 as f32 * chunk_size, 0.0, self.1 as f32 * chunk_size)
    }

    /// Neighbouring coordinate, saturating at the edge of the coordinate range.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        ChunkCoord(self.0.saturating_add(dx), self.1.saturating_add(dy))
    }

    pub fn squared_distance(&self, other: &ChunkCoord) -> i64 {
        let dx = self.0 as i64 - other.0 as i64;
        let dy = self.1 as i64 - other.1 as i64;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Chebyshev distance, the ring index around another chunk
    pub fn ring_distance(&self, other: &ChunkCoord) -> i32 {
        let d = self.0.abs_diff(other.0).max(self.1.abs_diff(other.1));
        d.min(i32::MAX as u32) as i32
    }
}

/// pre-compute ring offsets in nearest-first order for chunk loading
pub fn ring_offsets_nearest_first(radius: i32) -> Vec<(i32, i32)> {
    let radius = radius.max(0);
    let side = 2 * radius as usize + 1;
    let mut offsets = Vec::with_capacity(side * side);
    for y in -radius..=radius {
        for x in -radius..=radius {
            offsets.push((x, y));
        }
    }

    // stable sort keeps row-major order among equal distances
    offsets.sort_by_key(|(x, y)| x * x + y * y);
    offsets
}
