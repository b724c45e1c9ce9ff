// noise.rs - fractal gradient noise and the per-cell random hash
//
// Heights come from a seeded Perlin source summed over octaves. Every octave is
// shifted by its own large offset so the layers do not line up at the origin.

use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const OCTAVE_OFFSET_RANGE: f64 = 100_000.0;
const MIN_SCALE: f64 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseParams {
    pub seed: i32,
    pub scale: f32,
    pub octaves: u32,
    pub persistence: f32,
    pub lacunarity: f32,
    pub offset: [f32; 2],
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            seed: 54,
            scale: 66.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 1.87,
            offset: [0.0, 0.0],
        }
    }
}

/// Deterministic 2D noise source. Identical params give identical samples on
/// every thread, which is what lets neighbouring chunks agree on shared edges.
#[derive(Clone, Debug)]
pub struct NoiseField {
    params: NoiseParams,
    perlin: Perlin,
    octave_offsets: Vec<[f64; 2]>,
}

impl NoiseField {
    pub fn new(params: NoiseParams) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed as i64 as u64);
        let octave_offsets = (0..params.octaves)
            .map(|_| {
                let ox = rng.gen_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE);
                let oy = rng.gen_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE);
                [
                    ox + params.offset[0] as f64,
                    oy - params.offset[1] as f64,
                ]
            })
            .collect();

        Self {
            params,
            perlin: Perlin::new(params.seed as u32),
            octave_offsets,
        }
    }

    pub fn params(&self) -> &NoiseParams {
        &self.params
    }

    /// Raw fractal sum at a world sample position. Each layer is in [-1, 1]
    /// so the result is bounded by `max_amplitude()`.
    pub fn sample(&self, x: f64, y: f64) -> f32 {
        let scale = (self.params.scale as f64).max(MIN_SCALE);
        let persistence = self.params.persistence as f64;
        let lacunarity = self.params.lacunarity as f64;

        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut height = 0.0;

        for [ox, oy] in &self.octave_offsets {
            let sx = (x + ox) / scale * frequency;
            let sy = (y + oy) / scale * frequency;
            let layer = self.perlin.get([sx, sy]).clamp(-1.0, 1.0);
            height += layer * amplitude;

            amplitude *= persistence;
            frequency *= lacunarity;
        }

        height as f32
    }

    /// Hash of an integer world cell into [0, 1). Only the seed feeds in, so
    /// retuning the height parameters never reshuffles vegetation jitter.
    pub fn sample_random(&self, x: i32, y: i32) -> f32 {
        let mut n = x
            .wrapping_mul(374761393)
            .wrapping_add(y.wrapping_mul(668265263))
            .wrapping_add(self.params.seed.wrapping_mul(1442695041));
        n = (n ^ (n >> 13)).wrapping_mul(1274126177);
        let bits = (n ^ (n >> 16)) as u32;
        (bits >> 8) as f32 / 16_777_216.0
    }

    pub fn max_amplitude(&self) -> f32 {
        let mut amplitude = 1.0;
        let mut total = 0.0;
        for _ in 0..self.params.octaves {
            total += amplitude;
            amplitude *= self.params.persistence;
        }
        total
    }
}
