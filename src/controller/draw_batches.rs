use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use tracing::trace;

use crate::model::frustum::Frustum;
use crate::world::chunk_manager::ChunkManager;
use crate::world::vegetation::VegetationInstance;

const TREE_CULL_RADIUS: f32 = 10.0;
const GRASS_CULL_RADIUS: f32 = 10.0;
const GRASS_HEIGHT_CEILING: f32 = 12.0;

/// Per-instance data as the instanced tree and grass pipelines read it.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub pos: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
    pub color: [f32; 4],
    pub uv: [f32; 2],
}

impl InstanceData {
    fn from_tree(tree: &VegetationInstance, alpha: f32) -> Self {
        Self {
            pos: tree.position.to_array(),
            rotation: tree.rotation.to_array(),
            scale: tree.scale.to_array(),
            color: Vec4::new(tree.tint.x, tree.tint.y, tree.tint.z, alpha).to_array(),
            uv: [0.0, 0.0],
        }
    }
}

#[derive(Debug, Default)]
pub struct TreeBatches {
    pub full: Vec<InstanceData>,
    pub impostors: Vec<InstanceData>,
    pub culled: usize,
}

enum Band {
    Full,
    Impostor,
    Culled,
}

fn band(frustum: &Frustum, camera_pos: Vec3, tree: &VegetationInstance, full: f32, impostor: f32) -> Band {
    if !frustum.check_sphere(tree.position, TREE_CULL_RADIUS) {
        return Band::Culled;
    }
    let d = tree.position.distance(camera_pos);
    if d < full {
        Band::Full
    } else if d < impostor {
        Band::Impostor
    } else {
        Band::Culled
    }
}

/// Sort the trees of every drawable chunk into full-detail and impostor
/// batches by distance. Trees inherit their chunk's fade alpha.
pub fn build_tree_batches(
    manager: &ChunkManager,
    frustum: &Frustum,
    camera_pos: Vec3,
    full_distance: f32,
    impostor_distance: f32,
) -> TreeBatches {
    let mut count_full = 0;
    let mut count_impostor = 0;
    for chunk in manager.drawable_chunks() {
        for tree in chunk.vegetation() {
            match band(frustum, camera_pos, tree, full_distance, impostor_distance) {
                Band::Full => count_full += 1,
                Band::Impostor => count_impostor += 1,
                Band::Culled => {}
            }
        }
    }

    // both passes classify with `band`, the guards below only bound the buffers
    let mut batches = TreeBatches {
        full: Vec::with_capacity(count_full),
        impostors: Vec::with_capacity(count_impostor),
        culled: 0,
    };
    for chunk in manager.drawable_chunks() {
        for tree in chunk.vegetation() {
            match band(frustum, camera_pos, tree, full_distance, impostor_distance) {
                Band::Full => {
                    if batches.full.len() >= count_full {
                        continue;
                    }
                    batches.full.push(InstanceData::from_tree(tree, chunk.alpha));
                }
                Band::Impostor => {
                    if batches.impostors.len() >= count_impostor {
                        continue;
                    }
                    batches.impostors.push(InstanceData::from_tree(tree, chunk.alpha));
                }
                Band::Culled => batches.culled += 1,
            }
        }
    }

    trace!(
        full = batches.full.len(),
        impostors = batches.impostors.len(),
        culled = batches.culled,
        "tree batches"
    );
    batches
}

/// Grass patches on a `dim x dim` grid centred half a patch ahead of the
/// camera. Patches fade out over the outer quarter of the layer.
pub fn build_grass_layer(
    manager: &ChunkManager,
    frustum: &Frustum,
    camera_pos: Vec3,
    forward: Vec3,
    dim: u32,
    scale: f32,
) -> Vec<InstanceData> {
    let water = manager.settings().water_position;
    let half_extent = dim as f32 * scale / 2.0;
    let extent = dim as f32 * scale;
    let fade_start = extent * 0.75;
    let center = camera_pos + forward * half_extent;

    let capacity = (dim as usize).pow(2);
    let mut grass = Vec::with_capacity(capacity);
    let half = dim as i32 / 2;

    for x in -half..half {
        for y in -half..half {
            let mut pos = Vec3::new(
                center.x.round() + x as f32 * scale,
                0.0,
                center.z.round() + y as f32 * scale,
            );
            let Some((base_height, r)) = manager.height_and_random_at(pos) else {
                continue;
            };
            pos.x += r;
            pos.z -= r;
            let h = manager.height_at(pos).unwrap_or(base_height);
            if h <= water || h > GRASS_HEIGHT_CEILING {
                continue;
            }
            pos.y = h;
            if !frustum.check_sphere(pos, GRASS_CULL_RADIUS) {
                continue;
            }
            if grass.len() >= capacity {
                continue;
            }

            let shade = 0.6 + r * 0.4;
            let d = pos.distance(camera_pos);
            let alpha = if d > fade_start {
                ((extent - d) / (extent - fade_start)).clamp(0.0, 1.0)
            } else {
                1.0
            };

            grass.push(InstanceData {
                pos: pos.to_array(),
                rotation: [PI * r * 0.035, 2.0 * PI * r, -PI * r * 0.035],
                scale: [1.0 + r * 0.15, 0.5 + r * 0.25, 1.0 + r * 0.15],
                color: [shade, shade, shade, alpha],
                uv: [((r * 5.0).round() as i32 % 4) as f32 * 0.25, 0.0],
            });
        }
    }

    grass
}
