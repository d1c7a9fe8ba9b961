#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Realm
//!
//! A networked voxel world: a server that generates terrain from a seed and owns the
//! authoritative copy of every chunk, and clients that mirror the chunks they are sent
//! and turn them into meshes on their render thread.
//!
//! ## Key Modules
//!
//! * `voxels` - Voxel types, chunk storage, terrain generation and the server's world
//! * `network` - The binary wire protocol, the server threads and the client connection
//! * `task_management` - The queue that moves work from network threads to the render thread
//! * `rendering` - Greedy meshing with ambient occlusion and per-chunk buffer ownership
//! * `core` - Shared-ownership primitives
//! * `config`, `error`, `logging` - Ambient plumbing used by everything above
//!
//! ## Architecture
//!
//! Chunks travel one way: generated on the server, encoded with run-length compression,
//! decoded into the client cache, then rebuilt into meshes when the render thread
//! drains its work queue. Network threads never mesh and never touch render buffers.
//!
//! ## Usage
//!
//! ```rust
//! use voxel_realm::config::TerrainSettings;
//! use voxel_realm::rendering::meshing::mesh::mesh_chunk;
//! use voxel_realm::voxels::{chunk::ChunkCoords, generation::TerrainGenerator};
//!
//! let generator = TerrainGenerator::new(TerrainSettings::default(), 7);
//! let chunk = generator.generate(ChunkCoords::new(0, 0));
//! let mesh = mesh_chunk(&chunk);
//! assert_eq!(mesh.index_count() % 6, 0);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod network;
pub mod rendering;
pub mod task_management;
pub mod voxels;
