// ============================================================================
// paracoder-core/src/process/mod.rs
// ============================================================================
//
// PROCESS EXECUTION: Pipelines of External Programs
//
// KEY COMPONENTS:
// - runner: Spawning and waiting for command line pipelines
// - registry: Tracking of spawned children for forced termination

pub mod registry;
pub mod runner;

pub use registry::{ChildRegistry, SharedChild, global_children};
pub use runner::{ProcessRunner, split_pipeline};
