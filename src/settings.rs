use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, TerrainError};
use crate::world::noise::NoiseParams;

/// Terrain generation and streaming settings.
///
/// Loaded from TOML, or from the whitespace separated `key value` preset
/// format the terrain presets ship in. Every field has a default so partial
/// files are fine.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    pub noise_scale: f32,
    pub seed: i32,
    pub height_scale: f32,
    pub octaves: u32,
    pub persistence: f32,
    pub lacunarity: f32,
    pub offset: [f32; 2],

    /// Samples along one chunk edge. Chunks are `map_chunk_size - 1` world units wide.
    pub map_chunk_size: u32,
    pub level_of_detail: u32,

    // Vegetation
    pub tree_density: u32,
    pub min_tree_size: f32,
    pub max_tree_size: f32,
    pub water_position: f32,
    pub tree_height_ceiling: f32,

    // Streaming
    pub max_chunk_draw_distance: f32,
    pub tree_full_distance: f32,
    pub tree_impostor_distance: f32,
    pub grass_dim: u32,
    pub grass_scale: f32,

    /// Generation worker count, 0 picks one per logical CPU.
    pub worker_threads: usize,
    /// Chunks kept beyond the view ring before they are evicted.
    pub eviction_margin: i32,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            noise_scale: 66.0,
            seed: 54,
            height_scale: 28.5,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 1.87,
            offset: [0.0, 0.0],

            map_chunk_size: 241,
            level_of_detail: 1,

            tree_density: 30,
            min_tree_size: 0.75,
            max_tree_size: 1.5,
            water_position: 1.75,
            tree_height_ceiling: 15.0,

            max_chunk_draw_distance: 360.0,
            tree_full_distance: 250.0,
            tree_impostor_distance: 1000.0,
            grass_dim: 175,
            grass_scale: 0.5,

            worker_threads: 0,
            eviction_margin: 2,
        }
    }
}

impl TerrainSettings {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Parse the legacy preset format: one `key value` pair per line.
    /// Unknown keys (colors, sky spheres, texture layers) belong to the
    /// renderer and are ignored.
    pub fn from_preset_str(source: &str) -> Result<Self> {
        let entries: HashMap<&str, &str> = source
            .lines()
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                Some((parts.next()?, parts.next()?))
            })
            .collect();

        let mut settings = Self::default();
        read_key(&entries, "noiseScale", &mut settings.noise_scale)?;
        read_key(&entries, "seed", &mut settings.seed)?;
        read_key(&entries, "heightScale", &mut settings.height_scale)?;
        read_key(&entries, "octaves", &mut settings.octaves)?;
        read_key(&entries, "persistence", &mut settings.persistence)?;
        read_key(&entries, "lacunarity", &mut settings.lacunarity)?;
        read_key(&entries, "levelOfDetail", &mut settings.level_of_detail)?;
        read_key(&entries, "treeDensity", &mut settings.tree_density)?;
        read_key(&entries, "minTreeSize", &mut settings.min_tree_size)?;
        read_key(&entries, "maxTreeSize", &mut settings.max_tree_size)?;
        read_key(&entries, "waterPosition", &mut settings.water_position)?;
        read_key(&entries, "maxChunkDrawDistance", &mut settings.max_chunk_draw_distance)?;
        read_key(&entries, "grassDim", &mut settings.grass_dim)?;
        read_key(&entries, "grassScale", &mut settings.grass_scale)?;
        Ok(settings)
    }

    /// Load settings from disk. `.toml` files go through serde, anything else
    /// is treated as a preset.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let settings = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&source)?,
            _ => Self::from_preset_str(&source)?,
        };
        info!(path = %path.display(), seed = settings.seed, "loaded terrain settings");
        Ok(settings)
    }

    /// World units covered by one chunk.
    pub fn chunk_world_size(&self) -> f32 {
        self.map_chunk_size.saturating_sub(1).max(1) as f32
    }

    /// Snapshot of everything a generation job needs.
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            noise: NoiseParams {
                seed: self.seed,
                scale: self.noise_scale,
                octaves: self.octaves,
                persistence: self.persistence,
                lacunarity: self.lacunarity,
                offset: self.offset,
            },
            interior: self.map_chunk_size.max(2),
            height_scale: self.height_scale,
            level_of_detail: self.level_of_detail,
            vegetation: VegetationParams {
                seed: self.seed,
                density: self.tree_density,
                min_size: self.min_tree_size,
                max_size: self.max_tree_size.max(self.min_tree_size),
                water_position: self.water_position,
                height_ceiling: self.tree_height_ceiling,
            },
        }
    }
}

fn read_key<T: FromStr>(entries: &HashMap<&str, &str>, key: &str, target: &mut T) -> Result<()> {
    if let Some(raw) = entries.get(key) {
        *target = raw.parse().map_err(|_| TerrainError::InvalidSetting {
            key: key.to_string(),
            value: raw.to_string(),
        })?;
        debug!(key, value = raw, "preset override");
    }
    Ok(())
}

/// Immutable per-job generation parameters, copied into every worker task.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationParams {
    pub noise: NoiseParams,
    /// Samples along one chunk edge (without the normal border).
    pub interior: u32,
    pub height_scale: f32,
    pub level_of_detail: u32,
    pub vegetation: VegetationParams,
}

impl GenerationParams {
    pub fn chunk_world_size(&self) -> f32 {
        (self.interior - 1) as f32
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VegetationParams {
    pub seed: i32,
    /// Candidates per chunk are `density * density`.
    pub density: u32,
    pub min_size: f32,
    pub max_size: f32,
    pub water_position: f32,
    pub height_ceiling: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = TerrainSettings::default();
        assert_eq!(s.seed, 54);
        assert_eq!(s.noise_scale, 66.0);
        assert_eq!(s.octaves, 4);
        assert_eq!(s.chunk_world_size(), 240.0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let s = TerrainSettings::from_toml_str("seed = 7\nlacunarity = 2.0\n").unwrap();
        assert_eq!(s.seed, 7);
        assert_eq!(s.lacunarity, 2.0);
        assert_eq!(s.persistence, 0.5);
        assert_eq!(s.map_chunk_size, 241);
    }

    #[test]
    fn test_bad_toml_is_reported() {
        let err = TerrainSettings::from_toml_str("seed = \"many\"").unwrap_err();
        assert!(matches!(err, TerrainError::SettingsParse(_)));
    }

    #[test]
    fn test_preset_overrides_known_keys() {
        let preset = "noiseScale 80.5\nseed 12\nwaterColor.r 40\ntreeType pine\n\ntreeDensity 12\n";
        let s = TerrainSettings::from_preset_str(preset).unwrap();
        assert_eq!(s.noise_scale, 80.5);
        assert_eq!(s.seed, 12);
        assert_eq!(s.tree_density, 12);
        assert_eq!(s.height_scale, 28.5);
    }

    #[test]
    fn test_preset_rejects_unparsable_value() {
        let err = TerrainSettings::from_preset_str("octaves lots").unwrap_err();
        match err {
            TerrainError::InvalidSetting { key, value } => {
                assert_eq!(key, "octaves");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_generation_params_snapshot() {
        let p = TerrainSettings::default().generation_params();
        assert_eq!(p.interior, 241);
        assert_eq!(p.chunk_world_size(), 240.0);
        assert_eq!(p.vegetation.density, 30);
        assert_eq!(p.noise.seed, 54);
    }
}
