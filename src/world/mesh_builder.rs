use glam::Vec3;

use crate::utils::{Mesh, TerrainVertex};
use crate::world::height_grid::HeightGrid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Topology {
    #[default]
    Triangles,
    /// Four corner indices per quad, for tessellation or patch pipelines.
    Quads,
}

/// CPU mesh plus the vertical extent of its vertices.
#[derive(Clone, Debug)]
pub struct TerrainMesh {
    pub mesh: Mesh,
    pub min_height: f32,
    pub max_height: f32,
}

pub struct MeshBuilder {
    scale: Vec3,
    topology: Topology,
    level_of_detail: u32,
}

impl MeshBuilder {
    pub fn new(scale: Vec3, topology: Topology, level_of_detail: u32) -> Self {
        Self {
            scale,
            topology,
            level_of_detail,
        }
    }

    /// Sampling step between emitted vertices. LOD is coarser sampling of
    /// the same grid, there is no separate decimation pass.
    pub fn stride(&self) -> u32 {
        self.level_of_detail.max(1) * 2
    }

    pub fn vertices_per_line(&self, interior: u32) -> u32 {
        (interior - 1) / self.stride() + 1
    }

    pub fn build(&self, grid: &HeightGrid) -> TerrainMesh {
        let size = grid.interior();
        let stride = self.stride();
        let vpl = self.vertices_per_line(size);
        let top_left_x = -((size - 1) as f32) / 2.0;
        let top_left_z = (size - 1) as f32 / 2.0;
        let vertical = self.scale.y.abs();
        let up = if self.scale.y < 0.0 { -2.0 } else { 2.0 };

        let mut vertices = Vec::with_capacity((vpl * vpl) as usize);
        let mut min_height = f32::MAX;
        let mut max_height = f32::MIN;

        for row in 0..vpl {
            for col in 0..vpl {
                let x = col * stride;
                let y = row * stride;
                // interior sample (x, y) lives at grid cell (x + 1, y + 1)
                let gx = x as i32 + 1;
                let gy = y as i32 + 1;
                let h = grid.height(gx, gy);

                let pos = Vec3::new(top_left_x + x as f32, h, top_left_z - y as f32) * self.scale;
                min_height = min_height.min(pos.y.abs());
                max_height = max_height.max(pos.y.abs());

                let h_left = grid.scaled_height(gx - 1, gy, vertical);
                let h_right = grid.scaled_height(gx + 1, gy, vertical);
                let h_up = grid.scaled_height(gx, gy - 1, vertical);
                let h_down = grid.scaled_height(gx, gy + 1, vertical);
                let normal = Vec3::new(h_left - h_right, up, h_down - h_up).normalize();

                vertices.push(TerrainVertex {
                    pos: pos.to_array(),
                    normal: normal.to_array(),
                    uv: [x as f32 / size as f32, y as f32 / size as f32],
                    terrain_height: h,
                });
            }
        }

        let quads = vpl.saturating_sub(1);
        let per_quad = match self.topology {
            Topology::Triangles => 6,
            Topology::Quads => 4,
        };
        let mut indices = Vec::with_capacity((quads * quads * per_quad) as usize);
        for row in 0..quads {
            for col in 0..quads {
                let i = row * vpl + col;
                match self.topology {
                    Topology::Triangles => {
                        indices.extend_from_slice(&[i, i + vpl + 1, i + vpl]);
                        indices.extend_from_slice(&[i + vpl + 1, i, i + 1]);
                    }
                    Topology::Quads => {
                        indices.extend_from_slice(&[i, i + 1, i + vpl + 1, i + vpl]);
                    }
                }
            }
        }

        if vertices.is_empty() {
            min_height = 0.0;
            max_height = 0.0;
        }

        TerrainMesh {
            mesh: Mesh { vertices, indices },
            min_height,
            max_height,
        }
    }
}
