//! Mesh generation for voxel rendering.
//!
//! This module converts chunk voxel data into flat, GPU-friendly vertex and index
//! buffers.
//!
//! # Architecture
//! - [`MeshBuffers`]: the vertex and index lists of one chunk
//! - [`Face`]: one quad, a single voxel face or a greedy merge of several
//! - [`mesh_chunk`]: face culling, ambient occlusion and greedy merging over a chunk
//!
//! # Usage
//! ```
//! use voxel_realm::rendering::meshing::mesh::mesh_chunk;
//! use voxel_realm::voxels::{block::block_type::VoxelType, chunk::{ChunkCoords, ChunkData}};
//!
//! let mut chunk = ChunkData::empty(ChunkCoords::new(0, 0), 4, 4, 4);
//! chunk.set_voxel(1, 1, 1, VoxelType::Stone);
//! let mesh = mesh_chunk(&chunk);
//! assert_eq!(mesh.index_count(), 36);
//! ```

pub mod ambient_occlusion;
mod face;
mod greedy;
mod mesh;

pub use face::Face;
pub use greedy::mesh_chunk;
pub use mesh::MeshBuffers;
