use std::f32::consts::PI;

use glam::{Vec3, Vec4};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::settings::VegetationParams;
use crate::utils::ChunkCoord;
use crate::world::height_grid::HeightGrid;

/// Keeps the vegetation stream apart from the noise octave stream of the same seed.
const VEGETATION_SALT: u64 = 0x7472_6565_7321;

/// One placed tree, in world space so it can be drawn without the chunk transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VegetationInstance {
    pub position: Vec3,
    pub scale: Vec3,
    pub rotation: Vec3,
    pub tint: Vec4,
}

pub struct VegetationPlacer {
    params: VegetationParams,
}

impl VegetationPlacer {
    pub fn new(params: VegetationParams) -> Self {
        Self { params }
    }

    pub fn candidate_count(&self) -> usize {
        (self.params.density as usize).pow(2)
    }

    fn rng_for(&self, coord: ChunkCoord) -> ChaCha8Rng {
        let mut key = (self.params.seed as u32 as u64) ^ VEGETATION_SALT;
        key = key.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ coord.0 as u32 as u64;
        key = key.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ coord.1 as u32 as u64;
        ChaCha8Rng::seed_from_u64(key)
    }

    /// Scatter up to `density^2` trees over the chunk, keeping only those whose
    /// ground sits above the water line and below the tree line.
    pub fn place(&self, grid: &HeightGrid, coord: ChunkCoord, height_scale: f32) -> Vec<VegetationInstance> {
        let size = grid.interior();
        let extent = (size - 1) as f32;
        let top_left_x = -extent / 2.0;
        let top_left_z = extent / 2.0;
        let origin = coord.world_center(extent);

        let mut rng = self.rng_for(coord);
        let mut instances = Vec::new();

        for _ in 0..self.candidate_count() {
            let x: f32 = rng.gen_range(0.0..extent);
            let y: f32 = rng.gen_range(0.0..extent);
            let tx = (x + 0.5).round() as i32;
            let ty = (y + 0.5).round() as i32;

            let h = (grid.scaled_height(tx - 1, ty, height_scale)
                + grid.scaled_height(tx + 1, ty, height_scale)
                + grid.scaled_height(tx, ty - 1, height_scale)
                + grid.scaled_height(tx, ty + 1, height_scale))
                / 4.0;
            if h <= self.params.water_position || h > self.params.height_ceiling {
                continue;
            }

            let size = rng.gen_range(self.params.min_size..=self.params.max_size);
            let rotation = Vec3::new(
                PI * rng.gen::<f32>() * 0.035,
                PI * rng.gen::<f32>(),
                PI * rng.gen::<f32>() * 0.035,
            );
            let shade = 0.6 + rng.gen::<f32>() * 0.4;

            instances.push(VegetationInstance {
                position: origin + Vec3::new(top_left_x + x, h, top_left_z - y),
                scale: Vec3::splat(size),
                rotation,
                tint: Vec4::new(shade, shade, shade, 1.0),
            });
        }

        instances
    }
}
