use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use tracing::{error, info, warn};

use crate::controller::generation_pool::{GenerationPool, JobOutcome, TransferGate};
use crate::error::Result;
use crate::model::frustum::Frustum;
use crate::settings::{GenerationParams, TerrainSettings};
use crate::utils::{ring_offsets_nearest_first, ChunkCoord};
use crate::view::upload::MeshUploader;
use crate::world::chunk::{Chunk, ChunkState};

const WAIT_SLICE: Duration = Duration::from_millis(50);
/// Largest ring radius around the viewer, (2 * 64 + 1)^2 chunks.
pub const MAX_VIEW_RING: i32 = 64;

/// Owns every live chunk. Decides which chunks should exist around the viewer,
/// hands missing ones to the generation pool and publishes finished ones.
pub struct ChunkManager {
    settings: TerrainSettings,
    params: GenerationParams,
    chunk_size: f32,
    view_distance: f32,
    chunks_visible: i32,
    ring_offsets: Vec<(i32, i32)>,
    viewer_position: Vec2,

    chunks: HashMap<ChunkCoord, Chunk>,
    uploader: Arc<dyn MeshUploader>,
    pool: GenerationPool,
}

impl ChunkManager {
    pub fn new(settings: TerrainSettings, uploader: Arc<dyn MeshUploader>) -> Result<Self> {
        let pool = GenerationPool::new(settings.worker_threads, uploader.clone())?;
        let mut manager = Self {
            params: settings.generation_params(),
            chunk_size: settings.chunk_world_size(),
            view_distance: 0.0,
            chunks_visible: 0,
            ring_offsets: Vec::new(),
            viewer_position: Vec2::ZERO,
            chunks: HashMap::new(),
            uploader,
            pool,
            settings,
        };
        manager.update_view_distance(manager.settings.max_chunk_draw_distance);
        Ok(manager)
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    pub fn chunk_size(&self) -> f32 {
        self.chunk_size
    }

    pub fn set_viewer_position(&mut self, position: Vec2) {
        self.viewer_position = position;
    }

    pub fn viewer_position(&self) -> Vec2 {
        self.viewer_position
    }

    /// Chunk under the viewer, pulled in far enough from the edge of the
    /// coordinate range that the whole ring still fits.
    pub fn viewer_chunk(&self) -> ChunkCoord {
        let ChunkCoord(x, y) = ChunkCoord::from_world(self.viewer_position, self.chunk_size);
        let lo = i32::MIN + self.chunks_visible;
        let hi = i32::MAX - self.chunks_visible;
        ChunkCoord(x.clamp(lo, hi), y.clamp(lo, hi))
    }

    /// Lock shared with every chunk upload. Other background uploads to the
    /// same queue should hold it too.
    pub fn transfer_gate(&self) -> TransferGate {
        self.pool.transfer_gate()
    }

    /// Publish finished chunks, make sure every chunk in the view ring exists,
    /// drop chunks that fell far behind and re-cull everything.
    ///
    /// Returns whether any chunk was created.
    pub fn update_visible_chunks(&mut self, frustum: &Frustum) -> Result<bool> {
        self.install_completed()?;

        let viewer = self.viewer_chunk();
        let mut created = 0;
        for &(dx, dy) in &self.ring_offsets {
            let coord = viewer.offset(dx, dy);
            if self.chunks.contains_key(&coord) {
                continue;
            }
            let ticket = self.pool.submit(coord, self.params);
            self.chunks.insert(coord, Chunk::new(coord, self.chunk_size, ticket));
            created += 1;
        }

        self.evict_out_of_range(viewer);

        for chunk in self.chunks.values_mut() {
            let (min, max) = chunk.aabb();
            chunk.visible = frustum.check_box(min, max);
        }

        if created > 0 {
            info!(created, ?viewer, resident = self.chunks.len(), "requested terrain chunks");
        }
        Ok(created > 0)
    }

    fn evict_out_of_range(&mut self, viewer: ChunkCoord) {
        let ring = self.chunks_visible;
        let keep = ring.saturating_add(self.settings.eviction_margin.max(0));
        self.chunks.retain(|coord, chunk| {
            let distance = coord.ring_distance(&viewer);
            let unclaimed = chunk.state() == ChunkState::New;
            if distance > keep || (unclaimed && distance > ring) {
                chunk.ticket().cancel();
                false
            } else {
                true
            }
        });
    }

    fn install_completed(&mut self) -> Result<()> {
        while let Some(outcome) = self.pool.try_recv() {
            self.handle_outcome(outcome)?;
        }
        Ok(())
    }

    fn handle_outcome(&mut self, outcome: JobOutcome) -> Result<()> {
        let JobOutcome { ticket, result } = outcome;
        // cancelled before it ran, its chunk is already gone
        let Some(result) = result else {
            return Ok(());
        };

        let current = self
            .chunks
            .get(&ticket.coord())
            .is_some_and(|chunk| chunk.ticket().id() == ticket.id());
        if !current {
            warn!(id = ticket.id(), coord = ?ticket.coord(), "dropping stale chunk payload");
            return Ok(());
        }

        match result {
            Ok(payload) => {
                if let Some(chunk) = self.chunks.get_mut(&ticket.coord()) {
                    chunk.install(payload);
                }
                Ok(())
            }
            Err(err) => {
                error!(%err, coord = ?ticket.coord(), "chunk generation failed");
                self.chunks.remove(&ticket.coord());
                Err(err)
            }
        }
    }

    /// Advance fade-in of generated chunks.
    pub fn update(&mut self, dt: f32) {
        for chunk in self.chunks.values_mut() {
            chunk.update_fade(dt);
        }
    }

    pub fn update_view_distance(&mut self, distance: f32) {
        if !distance.is_finite() {
            warn!(distance, kept = self.view_distance, "ignoring non-finite view distance");
            return;
        }
        self.view_distance = distance.max(0.0);
        let ring = (self.view_distance / self.chunk_size).ceil();
        self.chunks_visible = ring.min(MAX_VIEW_RING as f32) as i32;
        self.ring_offsets = ring_offsets_nearest_first(self.chunks_visible);
    }

    pub fn view_distance(&self) -> f32 {
        self.view_distance
    }

    pub fn chunks_visible_in_view_distance(&self) -> i32 {
        self.chunks_visible
    }

    /// Terrain height under a world position, `None` while that chunk is
    /// missing or still generating.
    pub fn height_at(&self, world: Vec3) -> Option<f32> {
        self.height_and_random_at(world).map(|(h, _)| h)
    }

    pub fn height_and_random_at(&self, world: Vec3) -> Option<(f32, f32)> {
        let coord = ChunkCoord::from_world(Vec2::new(world.x, world.z), self.chunk_size);
        let chunk = self.chunks.get(&coord).filter(|c| c.is_generated())?;
        let grid = chunk.height_grid()?;
        let (x, y) = chunk.local_cell(world.x, world.z);
        Some((
            grid.scaled_height(x, y, self.params.height_scale),
            grid.random_value(x, y),
        ))
    }

    pub fn drawable_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values().filter(|c| c.visible && c.is_generated())
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values().filter(|c| c.is_generated())
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// Chunks inside the frustum, whether or not they finished generating.
    pub fn visible_chunk_count(&self) -> usize {
        self.chunks.values().filter(|c| c.visible).count()
    }

    pub fn resident_chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn pending_chunk_count(&self) -> usize {
        self.chunks.values().filter(|c| !c.is_generated()).count()
    }

    pub fn visible_tree_count(&self) -> usize {
        self.drawable_chunks().map(|c| c.vegetation().len()).sum()
    }

    pub fn active_worker_count(&self) -> usize {
        self.pool.active_workers()
    }

    /// Drop every chunk. Jobs not yet started are cancelled, results of running
    /// jobs are discarded when they arrive.
    pub fn clear(&mut self) {
        for chunk in self.chunks.values() {
            chunk.ticket().cancel();
        }
        let dropped = self.chunks.len();
        self.chunks.clear();
        info!(dropped, "cleared terrain chunks");
    }

    /// Swap in new settings and regenerate from scratch.
    pub fn apply_settings(&mut self, settings: TerrainSettings) -> Result<()> {
        if settings.worker_threads != self.settings.worker_threads {
            self.clear();
            self.pool = GenerationPool::new(settings.worker_threads, self.uploader.clone())?;
        }
        self.params = settings.generation_params();
        self.chunk_size = settings.chunk_world_size();
        self.settings = settings;
        self.update_view_distance(self.settings.max_chunk_draw_distance);
        self.clear();
        Ok(())
    }

    /// Block until every submitted job has reported back or the timeout runs
    /// out, publishing results as they arrive. Returns the jobs still in flight.
    pub fn wait_for_pending(&mut self, timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        self.install_completed()?;
        while self.pool.in_flight() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if let Some(outcome) = self.pool.recv_timeout(remaining.min(WAIT_SLICE)) {
                self.handle_outcome(outcome)?;
            }
        }
        Ok(self.pool.in_flight())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TerrainError;
    use crate::utils::Mesh;
    use crate::view::upload::{HostUploader, MeshBuffer};
    use glam::Mat4;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(120);

    fn overhead_frustum() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 1000.0, 0.0), Vec3::ZERO, Vec3::NEG_Z);
        let proj = Mat4::orthographic_rh(-2000.0, 2000.0, -2000.0, 2000.0, 0.1, 5000.0);
        Frustum::from_matrix(proj * view)
    }

    /// 32 unit chunks, one ring around the viewer
    fn small_settings() -> TerrainSettings {
        TerrainSettings {
            map_chunk_size: 33,
            max_chunk_draw_distance: 32.0,
            tree_density: 4,
            worker_threads: 2,
            ..TerrainSettings::default()
        }
    }

    #[derive(Default)]
    struct CountingUploader {
        current: AtomicUsize,
        peak: AtomicUsize,
        total: AtomicUsize,
    }

    impl MeshUploader for CountingUploader {
        fn upload(&self, mesh: &Mesh) -> Result<MeshBuffer> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            self.current.fetch_sub(1, Ordering::SeqCst);
            self.total.fetch_add(1, Ordering::SeqCst);
            HostUploader.upload(mesh)
        }
    }

    struct FailingUploader;

    impl MeshUploader for FailingUploader {
        fn upload(&self, _mesh: &Mesh) -> Result<MeshBuffer> {
            Err(TerrainError::BufferAllocation {
                label: "vertex",
                reason: "out of device memory".to_string(),
            })
        }
    }

    #[test]
    fn test_initial_ring_of_default_chunks() {
        let mut manager = ChunkManager::new(TerrainSettings::default(), Arc::new(HostUploader)).unwrap();
        manager.set_viewer_position(Vec2::ZERO);
        assert_eq!(manager.chunks_visible_in_view_distance(), 2);

        assert!(manager.update_visible_chunks(&overhead_frustum()).unwrap());
        assert_eq!(manager.resident_chunk_count(), 25);
        assert_eq!(manager.visible_chunk_count(), 25);
        assert_eq!(manager.drawable_chunks().count(), 0, "nothing is drawable before generation");

        assert_eq!(manager.wait_for_pending(WAIT).unwrap(), 0);
        assert_eq!(manager.visible_chunk_count(), 25);
        assert_eq!(manager.drawable_chunks().count(), 25);
        assert_eq!(manager.pending_chunk_count(), 0);
        assert!(manager.visible_tree_count() > 0);

        // nothing new to request from the same spot
        assert!(!manager.update_visible_chunks(&overhead_frustum()).unwrap());
        assert_eq!(manager.resident_chunk_count(), 25);
    }

    #[test]
    fn test_height_queries() {
        let mut manager = ChunkManager::new(small_settings(), Arc::new(HostUploader)).unwrap();
        let far = Vec3::new(10_000.0, 0.0, 10_000.0);
        assert_eq!(manager.height_at(Vec3::ZERO), None);

        manager.update_visible_chunks(&overhead_frustum()).unwrap();
        manager.wait_for_pending(WAIT).unwrap();

        let h = manager.height_at(Vec3::new(3.0, 0.0, -5.0)).expect("chunk is generated");
        assert!((0.0..=28.5).contains(&h));
        assert_eq!(manager.height_at(far), None);

        // same cell through the chunk grid directly
        let chunk = manager.chunk(ChunkCoord(0, 0)).unwrap();
        let grid = chunk.height_grid().unwrap();
        let (x, y) = chunk.local_cell(3.0, -5.0);
        assert_eq!((x, y), (20, 22));
        assert_eq!(h, grid.scaled_height(x, y, 28.5));

        let (h2, r) = manager.height_and_random_at(Vec3::new(3.0, 0.0, -5.0)).unwrap();
        assert_eq!(h, h2);
        assert!((0.0..1.0).contains(&r));
    }

    #[test]
    fn test_heights_match_across_chunk_boundary() {
        let mut manager = ChunkManager::new(small_settings(), Arc::new(HostUploader)).unwrap();
        manager.update_visible_chunks(&overhead_frustum()).unwrap();
        manager.wait_for_pending(WAIT).unwrap();

        let west = manager.chunk(ChunkCoord(0, 0)).unwrap().height_grid().unwrap();
        let east = manager.chunk(ChunkCoord(1, 0)).unwrap().height_grid().unwrap();
        for i in 1..=33 {
            assert_eq!(west.height(33, i), east.height(1, i));
        }
    }

    #[test]
    fn test_uploads_are_serialized() {
        let uploader = Arc::new(CountingUploader::default());
        let settings = TerrainSettings { worker_threads: 4, max_chunk_draw_distance: 64.0, ..small_settings() };
        let mut manager = ChunkManager::new(settings, uploader.clone()).unwrap();
        manager.update_visible_chunks(&overhead_frustum()).unwrap();
        assert_eq!(manager.wait_for_pending(WAIT).unwrap(), 0);

        assert_eq!(uploader.total.load(Ordering::SeqCst), 25);
        assert_eq!(uploader.peak.load(Ordering::SeqCst), 1);
        assert_eq!(manager.active_worker_count(), 0);
    }

    #[test]
    fn test_failed_upload_is_reported() {
        let mut manager = ChunkManager::new(small_settings(), Arc::new(FailingUploader)).unwrap();
        manager.update_visible_chunks(&overhead_frustum()).unwrap();
        let err = manager.wait_for_pending(WAIT).unwrap_err();
        assert!(matches!(err, TerrainError::BufferAllocation { .. }));
        assert!(manager.resident_chunk_count() < 9);
    }

    #[test]
    fn test_moving_away_evicts_old_chunks() {
        let mut manager = ChunkManager::new(small_settings(), Arc::new(HostUploader)).unwrap();
        manager.update_visible_chunks(&overhead_frustum()).unwrap();
        manager.wait_for_pending(WAIT).unwrap();
        assert!(manager.chunk(ChunkCoord(0, 0)).is_some());

        // within the eviction margin, old chunks are kept
        manager.set_viewer_position(Vec2::new(64.0, 0.0));
        manager.update_visible_chunks(&overhead_frustum()).unwrap();
        assert!(manager.chunk(ChunkCoord(-1, 0)).is_some());

        manager.set_viewer_position(Vec2::new(3200.0, 3200.0));
        manager.update_visible_chunks(&overhead_frustum()).unwrap();
        assert!(manager.chunk(ChunkCoord(0, 0)).is_none());
        assert_eq!(manager.resident_chunk_count(), 9);
        assert_eq!(manager.viewer_chunk(), ChunkCoord(100, 100));

        assert_eq!(manager.wait_for_pending(WAIT).unwrap(), 0);
        assert_eq!(manager.chunks().count(), 9);
    }

    #[test]
    fn test_clear_discards_in_flight_results() {
        let mut manager = ChunkManager::new(small_settings(), Arc::new(HostUploader)).unwrap();
        manager.update_visible_chunks(&overhead_frustum()).unwrap();
        manager.clear();
        assert_eq!(manager.resident_chunk_count(), 0);

        assert_eq!(manager.wait_for_pending(WAIT).unwrap(), 0);
        assert_eq!(manager.resident_chunk_count(), 0);
        assert_eq!(manager.chunks().count(), 0);

        // the ring comes back on the next update with fresh jobs
        assert!(manager.update_visible_chunks(&overhead_frustum()).unwrap());
        manager.wait_for_pending(WAIT).unwrap();
        assert_eq!(manager.visible_chunk_count(), 9);
    }

    #[test]
    fn test_fade_in_after_generation() {
        let mut manager = ChunkManager::new(small_settings(), Arc::new(HostUploader)).unwrap();
        manager.update_visible_chunks(&overhead_frustum()).unwrap();
        manager.wait_for_pending(WAIT).unwrap();

        assert!(manager.chunks().all(|c| c.alpha == 0.0));
        manager.update(0.25);
        assert!(manager.chunks().all(|c| (c.alpha - 0.5).abs() < 1e-6));
        manager.update(10.0);
        assert!(manager.chunks().all(|c| c.alpha == 1.0));
    }

    #[test]
    fn test_view_distance_controls_ring() {
        let mut manager = ChunkManager::new(TerrainSettings::default(), Arc::new(HostUploader)).unwrap();
        manager.update_view_distance(500.0);
        assert_eq!(manager.chunks_visible_in_view_distance(), 3);
        manager.update_view_distance(240.0);
        assert_eq!(manager.chunks_visible_in_view_distance(), 1);
        manager.update_view_distance(-10.0);
        assert_eq!(manager.chunks_visible_in_view_distance(), 0);
        assert_eq!(manager.view_distance(), 0.0);
    }

    #[test]
    fn test_view_distance_rejects_unbounded_values() {
        let mut manager = ChunkManager::new(TerrainSettings::default(), Arc::new(HostUploader)).unwrap();
        manager.update_view_distance(f32::INFINITY);
        assert_eq!(manager.view_distance(), 360.0);
        assert_eq!(manager.chunks_visible_in_view_distance(), 2);
        manager.update_view_distance(f32::NAN);
        assert_eq!(manager.chunks_visible_in_view_distance(), 2);

        manager.update_view_distance(1.0e30);
        assert_eq!(manager.chunks_visible_in_view_distance(), MAX_VIEW_RING);
        let side = 2 * MAX_VIEW_RING as usize + 1;
        assert_eq!(manager.ring_offsets.len(), side * side);
    }

    #[test]
    fn test_viewer_at_edge_of_coordinate_range() {
        let mut manager = ChunkManager::new(small_settings(), Arc::new(HostUploader)).unwrap();
        manager.set_viewer_position(Vec2::new(1.0e12, -1.0e12));
        assert_eq!(manager.viewer_chunk(), ChunkCoord(i32::MAX - 1, i32::MIN + 1));

        manager.update_visible_chunks(&overhead_frustum()).unwrap();
        assert_eq!(manager.resident_chunk_count(), 9);
        assert!(manager.chunk(ChunkCoord(i32::MAX, i32::MIN)).is_some());
        manager.clear();

        // back to the origin, the far chunks are gone and the ring is rebuilt
        manager.set_viewer_position(Vec2::ZERO);
        manager.update_visible_chunks(&overhead_frustum()).unwrap();
        assert_eq!(manager.resident_chunk_count(), 9);
        assert!(manager.chunk(ChunkCoord(-1, 1)).is_some());
    }

    #[test]
    fn test_frustum_hides_chunks_behind_viewer() {
        let mut manager = ChunkManager::new(small_settings(), Arc::new(HostUploader)).unwrap();
        let view = Mat4::look_at_rh(Vec3::new(0.0, 30.0, 0.0), Vec3::new(100.0, 30.0, 0.0), Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 1000.0);
        let frustum = Frustum::from_matrix(proj * view);

        manager.update_visible_chunks(&frustum).unwrap();
        manager.wait_for_pending(WAIT).unwrap();
        assert_eq!(manager.chunks().count(), 9);
        assert!(manager.chunk(ChunkCoord(1, 0)).unwrap().visible);
        assert!(!manager.chunk(ChunkCoord(-1, 0)).unwrap().visible);
        assert!(manager.visible_chunk_count() < 9);
    }

    #[test]
    fn test_apply_settings_regenerates() {
        let mut manager = ChunkManager::new(small_settings(), Arc::new(HostUploader)).unwrap();
        manager.update_visible_chunks(&overhead_frustum()).unwrap();
        manager.wait_for_pending(WAIT).unwrap();
        let sample = |m: &ChunkManager| -> Vec<Option<f32>> {
            (-10..10).map(|i| m.height_at(Vec3::new(i as f32 * 2.5, 0.0, i as f32 * -1.5))).collect()
        };
        let before = sample(&manager);

        manager
            .apply_settings(TerrainSettings { seed: 999, worker_threads: 1, ..small_settings() })
            .unwrap();
        assert_eq!(manager.resident_chunk_count(), 0);
        manager.update_visible_chunks(&overhead_frustum()).unwrap();
        manager.wait_for_pending(WAIT).unwrap();
        assert_eq!(manager.settings().seed, 999);
        assert_ne!(sample(&manager), before);
    }
}
