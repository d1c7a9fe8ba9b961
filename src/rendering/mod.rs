//! # Rendering
//!
//! Everything the client does between receiving chunk data and handing geometry to a
//! graphics backend. The backend itself sits behind [`meshing::MeshBackend`].

pub mod meshing;
pub mod tasks;
pub mod vertex;

pub use meshing::{ChunkMeshes, HeadlessBackend, MeshBackend, RenderContext};
pub use vertex::Vertex;
