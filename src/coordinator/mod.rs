//! Process group lifecycle: rendezvous, collectives and teardown.

mod context;
mod group;
mod rendezvous;
mod sync;

pub use context::WorkerContext;
pub use group::ProcessGroup;
pub use rendezvous::{DEFAULT_ADDR, DEFAULT_PORT, DEFAULT_TIMEOUT, Rendezvous};
pub use sync::{LocalSync, Synchronizer};
