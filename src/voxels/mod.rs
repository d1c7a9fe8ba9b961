//! # Voxels
//!
//! The shared data model and the server-side world.
//!
//! * **Block**: voxel types, face directions and their texture layers
//! * **Chunk**: fixed-size 3-D voxel grids and their grid coordinates
//! * **Generation**: deterministic terrain, from noise to classified voxels
//! * **World**: the authoritative chunk store that generates on demand

pub mod block;
pub mod chunk;
pub mod generation;
pub mod world;
