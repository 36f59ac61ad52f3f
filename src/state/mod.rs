// DANS : src/state/mod.rs

pub mod poll_loop;
pub mod snapshot;

pub use poll_loop::PollLoop;
pub use snapshot::{CycleOutcome, LatestSnapshot, Snapshot, SnapshotResponse};
