use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec3;
use tracing::{error, info, warn};

// Import from the library crate
use terrastream::{
    logging,
    controller::{FrameLoop, FrameOutput, FrameSource},
    model::{Camera, ViewerState},
    view::{GpuContext, HostUploader, MeshUploader},
    ChunkManager, Result, TerrainSettings,
};

const FRAME_TIME: Duration = Duration::from_millis(16);
const FLY_SPEED: f32 = 60.0;
const EYE_HEIGHT: f32 = 12.0;

/// Headless camera gliding over the terrain along a fixed heading.
struct FlyOver {
    camera: Camera,
    heading: Vec3,
    last_frame: Instant,
    dt: f32,
}

impl FlyOver {
    fn new() -> Self {
        let mut camera = Camera::new(1280, 720);
        camera.eye = Vec3::new(0.0, 40.0, 0.0);
        let heading = Vec3::new(1.0, 0.0, 0.35).normalize();
        camera.set_look_at(camera.eye + heading * 100.0 - Vec3::Y * 15.0);
        Self {
            camera,
            heading,
            last_frame: Instant::now(),
            dt: 0.0,
        }
    }
}

impl FrameSource for FlyOver {
    fn viewer(&mut self) -> ViewerState {
        self.camera.eye += self.heading * FLY_SPEED * self.dt;
        ViewerState::from_camera(&self.camera)
    }

    fn delta_time(&mut self) -> f32 {
        std::thread::sleep(FRAME_TIME.saturating_sub(self.last_frame.elapsed()));
        let now = Instant::now();
        self.dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.dt
    }

    fn present(&mut self, frame: &FrameOutput) {
        // stick to terrain once the chunk below is ready
        if let Some(ground) = frame.ground_height {
            self.camera.eye.y = ground + EYE_HEIGHT;
        }
        if frame.frame % 60 == 0 {
            info!(
                frame = frame.frame,
                x = self.camera.eye.x,
                z = self.camera.eye.z,
                visible = frame.visible_chunks,
                resident = frame.resident_chunks,
                pending = frame.pending_chunks,
                workers = frame.active_workers,
                trees = frame.trees.full.len(),
                impostors = frame.trees.impostors.len(),
                grass = frame.grass.len(),
                "terrain status"
            );
        }
    }
}

fn uploader() -> Arc<dyn MeshUploader> {
    match pollster::block_on(GpuContext::new_headless()) {
        Ok(gpu) => Arc::new(gpu.uploader()),
        Err(err) => {
            warn!(%err, "no GPU available, keeping terrain meshes in host memory");
            Arc::new(HostUploader)
        }
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let settings = match args.next() {
        Some(path) => TerrainSettings::load(path)?,
        None => TerrainSettings::default(),
    };
    let frames: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(600);
    info!(seed = settings.seed, frames, "starting terrain fly-over");

    let manager = ChunkManager::new(settings, uploader())?;
    let mut frame_loop = FrameLoop::new(manager);
    let mut source = FlyOver::new();

    for _ in 0..frames {
        frame_loop.run_frame(&mut source)?;
    }

    let manager = frame_loop.manager_mut();
    let unfinished = manager.wait_for_pending(Duration::from_secs(30))?;
    info!(
        resident = manager.resident_chunk_count(),
        generated = manager.chunks().count(),
        unfinished,
        "fly-over finished"
    );
    Ok(())
}

fn main() {
    logging::init();

    if let Err(err) = run() {
        error!(%err, "terrastream failed");
        std::process::exit(1);
    }
}
