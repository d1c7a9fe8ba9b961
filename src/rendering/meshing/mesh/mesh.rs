//! Mesh buffer description handed to the rendering backend.

use crate::rendering::Vertex;

use super::face::Face;

/// Flat vertex and index lists for one chunk.
///
/// An empty description is a valid result: a chunk with no visible faces still
/// produces one, and backends check the counts before uploading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffers {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn face_count(&self) -> usize {
        self.vertices.len() / 4
    }

    /// Appends a quad's four vertices and six indices.
    pub fn add_face(&mut self, face: &Face) {
        let first_vertex = self.vertices.len() as u32;
        self.vertices.extend(face.vertices());
        self.indices.extend(face.indices(first_vertex));
    }

    /// Raw vertex bytes, ready for a GPU buffer.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
