use crate::utils::ChunkCoord;
use crate::world::noise::NoiseField;

/// Raw fractal sums are mapped onto [0, 1] against these fixed bounds rather
/// than the per-chunk extrema, otherwise every chunk would be normalized
/// differently and neighbouring edges would not meet.
///
/// Results are clamped to [0, 1] on both ends. Sums above `CALIBRATION_MAX`
/// are flattened to the top height instead of overshooting it, so scaled
/// heights never exceed `height_scale`.
pub const CALIBRATION_MIN: f32 = -0.5625;
pub const CALIBRATION_MAX: f32 = 1.2375;

/// Map a raw fractal sum onto the calibrated [0, 1] height range.
pub fn normalize_height(raw: f32) -> f32 {
    inverse_lerp(CALIBRATION_MIN, CALIBRATION_MAX, raw).clamp(0.0, 1.0)
}

fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    if a == b {
        0.0
    } else {
        (value - a) / (b - a)
    }
}

/// Normalized height samples for one chunk, with a one cell border on every
/// side so edge normals can look at their neighbours.
#[derive(Clone, Debug)]
pub struct HeightGrid {
    interior: u32,
    dim: usize,
    heights: Vec<f32>,
    random: Vec<f32>,
    raw_min: f32,
    raw_max: f32,
}

impl HeightGrid {
    pub fn generate(field: &NoiseField, coord: ChunkCoord, interior: u32) -> Self {
        let dim = interior as usize + 2;
        let world_size = interior as i64 - 1;
        let half = dim as i64 / 2;
        // integer origin keeps shared edge cells bit-identical across chunks
        let origin_x = coord.0 as i64 * world_size - half;
        let origin_y = -(coord.1 as i64) * world_size - half;

        let mut heights = Vec::with_capacity(dim * dim);
        let mut random = Vec::with_capacity(dim * dim);
        let mut raw_min = f32::MAX;
        let mut raw_max = f32::MIN;

        for y in 0..dim as i64 {
            for x in 0..dim as i64 {
                let wx = origin_x + x;
                let wy = origin_y + y;
                let raw = field.sample(wx as f64, wy as f64);
                raw_min = raw_min.min(raw);
                raw_max = raw_max.max(raw);

                heights.push(normalize_height(raw));
                random.push(field.sample_random(wx as i32, wy as i32));
            }
        }

        Self {
            interior,
            dim,
            heights,
            random,
            raw_min,
            raw_max,
        }
    }

    /// Grid with every cell at the same normalized height.
    pub fn filled(interior: u32, height: f32) -> Self {
        let dim = interior as usize + 2;
        Self {
            interior,
            dim,
            heights: vec![height.clamp(0.0, 1.0); dim * dim],
            random: vec![0.0; dim * dim],
            raw_min: height,
            raw_max: height,
        }
    }

    /// Interior samples along one edge.
    pub fn interior(&self) -> u32 {
        self.interior
    }

    /// Cells along one edge including the border.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Raw extrema seen while generating, before normalization.
    pub fn raw_range(&self) -> (f32, f32) {
        (self.raw_min, self.raw_max)
    }

    fn index(&self, x: i32, y: i32) -> usize {
        let last = self.dim as i32 - 1;
        let x = x.clamp(0, last) as usize;
        let y = y.clamp(0, last) as usize;
        y * self.dim + x
    }

    pub fn height(&self, x: i32, y: i32) -> f32 {
        self.heights[self.index(x, y)]
    }

    pub fn scaled_height(&self, x: i32, y: i32, scale: f32) -> f32 {
        self.height(x, y) * scale.abs()
    }

    pub fn random_value(&self, x: i32, y: i32) -> f32 {
        self.random[self.index(x, y)]
    }

    #[cfg(test)]
    pub(crate) fn set_height(&mut self, x: i32, y: i32, height: f32) {
        let idx = self.index(x, y);
        self.heights[idx] = height.clamp(0.0, 1.0);
    }
}
