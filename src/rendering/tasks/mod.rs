//! # Rendering Tasks
//!
//! Deferred actions that network threads queue for the render thread.

pub mod chunk_rebuild_task;

pub use chunk_rebuild_task::ChunkRebuildTask;
