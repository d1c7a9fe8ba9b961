//! # Chunk Meshes
//!
//! Render-thread ownership of per-chunk geometry.
//!
//! The client keeps at most one backend handle per chunk. A rebuild always gives the
//! previous handle back to the backend before anything new is installed, including when
//! the rebuild fails or produces no geometry, so a chunk can never leak or double-own
//! buffers.

pub mod mesh;

use std::collections::HashMap;

use log::debug;

use crate::core::MtResource;
use crate::network::client::world_cache::ClientWorldCache;
use crate::task_management::{DrainReport, TaskError, WorkQueue};
use crate::voxels::chunk::{ChunkCoords, ChunkData};

use mesh::{mesh_chunk, MeshBuffers};

/// Seam to the graphics backend that turns mesh descriptions into GPU buffers.
pub trait MeshBackend {
    /// Whatever the backend needs to find and free the buffers of one mesh again.
    type Handle;

    /// Creates buffers for a non-empty mesh.
    fn upload(&mut self, coords: ChunkCoords, mesh: &MeshBuffers) -> Self::Handle;

    /// Frees the buffers behind `handle`.
    fn release(&mut self, handle: Self::Handle);
}

/// Handle issued by [`HeadlessBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessHandle(u64);

/// Copy of what one upload handed to the GPU.
#[derive(Debug)]
struct HeadlessBuffers {
    coords: ChunkCoords,
    index_count: usize,
    vertex_data: Vec<u8>,
    index_data: Vec<u8>,
}

/// A backend without a GPU. It keeps the raw buffer bytes a real backend would upload.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_handle: u64,
    live: HashMap<HeadlessHandle, HeadlessBuffers>,
    uploads: usize,
    releases: usize,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> usize {
        self.uploads
    }

    pub fn releases(&self) -> usize {
        self.releases
    }

    /// Number of meshes currently holding buffers.
    pub fn live_meshes(&self) -> usize {
        self.live.len()
    }

    /// Total index count across the live meshes, what a frame would draw.
    pub fn live_indices(&self) -> usize {
        self.live.values().map(|buffers| buffers.index_count).sum()
    }

    /// Bytes held across the live vertex and index buffers.
    pub fn live_bytes(&self) -> usize {
        self.live
            .values()
            .map(|buffers| buffers.vertex_data.len() + buffers.index_data.len())
            .sum()
    }

    /// Chunks that currently own buffers.
    pub fn live_chunks(&self) -> impl Iterator<Item = ChunkCoords> + '_ {
        self.live.values().map(|buffers| buffers.coords)
    }
}

impl MeshBackend for HeadlessBackend {
    type Handle = HeadlessHandle;

    fn upload(&mut self, coords: ChunkCoords, mesh: &MeshBuffers) -> HeadlessHandle {
        let handle = HeadlessHandle(self.next_handle);
        self.next_handle += 1;
        self.uploads += 1;
        self.live.insert(
            handle,
            HeadlessBuffers {
                coords,
                index_count: mesh.index_count(),
                vertex_data: mesh.vertex_bytes().to_vec(),
                index_data: mesh.index_bytes().to_vec(),
            },
        );
        handle
    }

    fn release(&mut self, handle: HeadlessHandle) {
        if self.live.remove(&handle).is_some() {
            self.releases += 1;
        }
    }
}

struct ChunkMesh<H> {
    handle: Option<H>,
    revision: u64,
    index_count: usize,
}

/// The mesh of every chunk the render thread currently knows about.
pub struct ChunkMeshes<B: MeshBackend> {
    backend: B,
    meshes: HashMap<ChunkCoords, ChunkMesh<B::Handle>>,
    rebuilds: usize,
}

impl<B: MeshBackend> ChunkMeshes<B> {
    pub fn new(backend: B) -> Self {
        ChunkMeshes {
            backend,
            meshes: HashMap::new(),
            rebuilds: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Rebuilds attempted so far, failed ones included.
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    /// Revision of the chunk data the current mesh was built from.
    pub fn revision(&self, coords: ChunkCoords) -> Option<u64> {
        self.meshes.get(&coords).map(|mesh| mesh.revision)
    }

    pub fn index_count(&self, coords: ChunkCoords) -> Option<usize> {
        self.meshes.get(&coords).map(|mesh| mesh.index_count)
    }

    pub fn has_buffers(&self, coords: ChunkCoords) -> bool {
        self.meshes
            .get(&coords)
            .is_some_and(|mesh| mesh.handle.is_some())
    }

    /// Frees the buffers of one chunk.
    pub fn release(&mut self, coords: ChunkCoords) {
        if let Some(ChunkMesh {
            handle: Some(handle),
            ..
        }) = self.meshes.remove(&coords)
        {
            self.backend.release(handle);
        }
    }

    /// Replaces the mesh of `coords` with one built from `chunk`.
    ///
    /// The old buffers are released first on every path. `None` means the chunk
    /// vanished before the rebuild ran; the chunk is left without a mesh and the call
    /// reports an error.
    pub fn rebuild(
        &mut self,
        coords: ChunkCoords,
        chunk: Option<(&ChunkData, u64)>,
    ) -> Result<(), TaskError> {
        self.rebuilds += 1;
        self.release(coords);

        let (data, revision) = chunk.ok_or_else(|| {
            TaskError::new(format!("chunk ({}, {}) is not cached", coords.x, coords.z))
        })?;

        let mesh = mesh_chunk(data);
        let handle = (!mesh.is_empty()).then(|| self.backend.upload(coords, &mesh));
        debug!(
            "Rebuilt mesh of chunk ({}, {}) at revision {}: {} indices",
            coords.x,
            coords.z,
            revision,
            mesh.index_count()
        );
        self.meshes.insert(
            coords,
            ChunkMesh {
                handle,
                revision,
                index_count: mesh.index_count(),
            },
        );
        Ok(())
    }
}

impl<B: MeshBackend> Drop for ChunkMeshes<B> {
    fn drop(&mut self) {
        for (_, mesh) in self.meshes.drain() {
            if let Some(handle) = mesh.handle {
                self.backend.release(handle);
            }
        }
    }
}

/// State owned by the render thread: the shared chunk cache and the meshes built from
/// it. Deferred work from the network threads runs against this.
pub struct RenderContext<B: MeshBackend> {
    pub cache: MtResource<ClientWorldCache>,
    pub meshes: ChunkMeshes<B>,
}

impl<B: MeshBackend> RenderContext<B> {
    pub fn new(cache: MtResource<ClientWorldCache>, backend: B) -> Self {
        RenderContext {
            cache,
            meshes: ChunkMeshes::new(backend),
        }
    }

    /// Runs everything the network threads queued since the last frame.
    pub fn process_frame(&mut self, queue: &WorkQueue<Self>) -> DrainReport {
        queue.drain(self)
    }
}
