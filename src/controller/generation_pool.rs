use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::error::Result;
use crate::settings::GenerationParams;
use crate::utils::ChunkCoord;
use crate::view::upload::MeshUploader;
use crate::world::chunk::{generate_chunk, ChunkPayload, ChunkState};

/// Serializes access to the GPU transfer queue. Anything else that uploads in
/// the background should take the same lock.
pub type TransferGate = Arc<Mutex<()>>;

/// Shared handle between a chunk and the job generating it.
#[derive(Debug)]
pub struct JobTicket {
    id: u64,
    coord: ChunkCoord,
    state: AtomicU8,
    cancelled: AtomicBool,
}

impl JobTicket {
    pub fn new(id: u64, coord: ChunkCoord) -> Self {
        Self {
            id,
            coord,
            state: AtomicU8::new(ChunkState::New as u8),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn state(&self) -> ChunkState {
        ChunkState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// New -> Generating. Only one worker ever wins, and a cancelled ticket is
    /// never claimed.
    pub fn try_claim(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.state
            .compare_exchange(
                ChunkState::New as u8,
                ChunkState::Generating as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Generating -> Generated, once the payload is installed on the render thread.
    pub fn mark_generated(&self) -> bool {
        self.state
            .compare_exchange(
                ChunkState::Generating as u8,
                ChunkState::Generated as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// A finished job. `result` is `None` when the job was cancelled before it ran.
pub struct JobOutcome {
    pub ticket: Arc<JobTicket>,
    pub result: Option<Result<ChunkPayload>>,
}

/// Bounded worker pool for chunk generation. Jobs run in submission order
/// and report back over a channel drained by the render thread.
pub struct GenerationPool {
    pool: rayon::ThreadPool,
    uploader: Arc<dyn MeshUploader>,
    gate: TransferGate,
    sender: Sender<JobOutcome>,
    receiver: Receiver<JobOutcome>,
    active: Arc<AtomicUsize>,
    in_flight: usize,
    next_id: u64,
}

impl GenerationPool {
    /// `worker_threads == 0` picks one worker per logical CPU.
    pub fn new(worker_threads: usize, uploader: Arc<dyn MeshUploader>) -> Result<Self> {
        let threads = if worker_threads == 0 { num_cpus::get() } else { worker_threads };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("terrain-gen-{i}"))
            .build()?;
        info!(threads, "created chunk generation pool");

        let (sender, receiver) = channel::unbounded();
        Ok(Self {
            pool,
            uploader,
            gate: Arc::new(Mutex::new(())),
            sender,
            receiver,
            active: Arc::new(AtomicUsize::new(0)),
            in_flight: 0,
            next_id: 0,
        })
    }

    pub fn transfer_gate(&self) -> TransferGate {
        self.gate.clone()
    }

    pub fn submit(&mut self, coord: ChunkCoord, params: GenerationParams) -> Arc<JobTicket> {
        self.next_id += 1;
        let ticket = Arc::new(JobTicket::new(self.next_id, coord));
        self.in_flight += 1;

        let job_ticket = ticket.clone();
        let uploader = self.uploader.clone();
        let gate = self.gate.clone();
        let sender = self.sender.clone();
        let active = self.active.clone();

        self.pool.spawn_fifo(move || {
            if !job_ticket.try_claim() {
                trace!(id = job_ticket.id(), coord = ?job_ticket.coord(), "skipping cancelled job");
                let _ = sender.send(JobOutcome { ticket: job_ticket, result: None });
                return;
            }

            active.fetch_add(1, Ordering::AcqRel);
            let result = generate_chunk(params, job_ticket.coord(), uploader.as_ref(), &gate);
            active.fetch_sub(1, Ordering::AcqRel);

            // receiver gone means the pool is shutting down
            let _ = sender.send(JobOutcome { ticket: job_ticket, result: Some(result) });
        });

        debug!(id = ticket.id(), ?coord, "queued chunk generation");
        ticket
    }

    pub fn try_recv(&mut self) -> Option<JobOutcome> {
        let outcome = self.receiver.try_recv().ok()?;
        self.in_flight -= 1;
        Some(outcome)
    }

    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<JobOutcome> {
        let outcome = self.receiver.recv_timeout(timeout).ok()?;
        self.in_flight -= 1;
        Some(outcome)
    }

    /// Jobs submitted whose outcome has not been received yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Jobs currently executing on a worker.
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}
