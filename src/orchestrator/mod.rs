//! Poll engine orchestration modules.
//!
//! Covers poll creation, scheduled finalization, post-finalization queue
//! mutation, the interactive creation wizard, and the durable task runner
//! that drives finalization.

pub mod finalizer;
pub mod lifecycle;
pub mod locks;
pub mod queue;
pub mod render;
pub mod scheduler;
pub mod wizard;
