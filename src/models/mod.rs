//! Domain model module declarations.

pub mod intent;
pub mod poll;
pub mod task;
pub mod vote;
pub mod wizard;
