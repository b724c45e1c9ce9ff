// CONTROLLER: background generation, per-frame batching and the update loop
pub mod draw_batches;
pub mod frame_loop;
pub mod generation_pool;

pub use draw_batches::{build_grass_layer, build_tree_batches, InstanceData, TreeBatches};
pub use frame_loop::{FrameLoop, FrameOutput, FrameSource};
pub use generation_pool::{GenerationPool, JobTicket, TransferGate};
