use tracing::debug;

use crate::controller::draw_batches::{build_grass_layer, build_tree_batches, InstanceData, TreeBatches};
use crate::error::Result;
use crate::model::viewer::ViewerState;
use crate::world::chunk_manager::ChunkManager;

/// Whatever drives the frames: a window, a headless fly-over, a test script.
pub trait FrameSource {
    /// Viewer state for the frame about to be built
    fn viewer(&mut self) -> ViewerState;
    /// Seconds since the previous frame
    fn delta_time(&mut self) -> f32;
    /// Hand over the terrain output of the finished frame
    fn present(&mut self, frame: &FrameOutput);
}

/// Per-frame terrain summary and instance batches for the renderer.
#[derive(Debug)]
pub struct FrameOutput {
    pub frame: u64,
    pub created_chunks: bool,
    pub visible_chunks: usize,
    pub resident_chunks: usize,
    pub pending_chunks: usize,
    pub active_workers: usize,
    /// Terrain height under the viewer, `None` while that chunk is not ready
    pub ground_height: Option<f32>,
    pub trees: TreeBatches,
    pub grass: Vec<InstanceData>,
}

pub struct FrameLoop {
    manager: ChunkManager,
    frame: u64,
}

impl FrameLoop {
    pub fn new(manager: ChunkManager) -> Self {
        Self { manager, frame: 0 }
    }

    pub fn manager(&self) -> &ChunkManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ChunkManager {
        &mut self.manager
    }

    /// Update streaming, fades and batches for one frame
    pub fn run_frame<S: FrameSource>(&mut self, source: &mut S) -> Result<()> {
        let dt = source.delta_time().clamp(0.0, 0.1);
        let viewer = source.viewer();

        self.manager.set_viewer_position(viewer.position);
        let created_chunks = self.manager.update_visible_chunks(&viewer.frustum)?;
        self.manager.update(dt);

        let settings = self.manager.settings();
        let trees = build_tree_batches(
            &self.manager,
            &viewer.frustum,
            viewer.eye,
            settings.tree_full_distance,
            settings.tree_impostor_distance,
        );
        let grass = build_grass_layer(
            &self.manager,
            &viewer.frustum,
            viewer.eye,
            viewer.forward,
            settings.grass_dim,
            settings.grass_scale,
        );

        self.frame += 1;
        let output = FrameOutput {
            frame: self.frame,
            created_chunks,
            visible_chunks: self.manager.visible_chunk_count(),
            resident_chunks: self.manager.resident_chunk_count(),
            pending_chunks: self.manager.pending_chunk_count(),
            active_workers: self.manager.active_worker_count(),
            ground_height: self.manager.height_at(viewer.eye),
            trees,
            grass,
        };
        debug!(
            frame = output.frame,
            visible = output.visible_chunks,
            pending = output.pending_chunks,
            trees = output.trees.full.len() + output.trees.impostors.len(),
            "frame"
        );

        source.present(&output);
        Ok(())
    }
}
