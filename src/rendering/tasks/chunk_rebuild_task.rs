//! # Chunk Rebuild Task
//!
//! Queued once for every chunk update the client cache accepts. It runs on the render
//! thread, where it re-meshes the chunk from the cache and swaps the chunk's buffers.

use crate::{
    network::client::world_cache::ChunkUpdate,
    rendering::meshing::{MeshBackend, RenderContext},
    task_management::{Task, TaskError},
};

/// Re-meshes one chunk from whatever the cache holds when the task runs.
#[derive(Debug, Clone, Copy)]
pub struct ChunkRebuildTask {
    update: ChunkUpdate,
}

impl ChunkRebuildTask {
    pub fn new(update: ChunkUpdate) -> Self {
        ChunkRebuildTask { update }
    }

    pub fn update(&self) -> ChunkUpdate {
        self.update
    }
}

impl<B: MeshBackend> Task<RenderContext<B>> for ChunkRebuildTask {
    fn process(self: Box<Self>, context: &mut RenderContext<B>) -> Result<(), TaskError> {
        let coords = self.update.coords;
        // Copy out so the network thread is not held up while meshing.
        let snapshot = context
            .cache
            .get()
            .chunk(coords)
            .map(|chunk| (chunk.data.clone(), chunk.revision));

        context
            .meshes
            .rebuild(coords, snapshot.as_ref().map(|(data, revision)| (data, *revision)))
    }

    fn name(&self) -> &str {
        "chunk rebuild"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MtResource;
    use crate::network::client::world_cache::ClientWorldCache;
    use crate::rendering::meshing::HeadlessBackend;
    use crate::task_management::WorkQueue;
    use crate::voxels::{
        block::block_type::VoxelType,
        chunk::{ChunkCoords, ChunkData},
    };

    #[test]
    fn test_rebuild_uses_the_latest_cached_data() {
        let cache = MtResource::new(ClientWorldCache::new());
        let mut context = RenderContext::new(cache.clone(), HeadlessBackend::new());
        let (sender, queue) = WorkQueue::new(4);

        let coords = ChunkCoords::new(0, 0);
        let mut first = ChunkData::empty(coords, 2, 2, 2);
        first.set_voxel(0, 0, 0, VoxelType::Stone);
        let mut second = first.clone();
        second.set_voxel(1, 1, 1, VoxelType::Stone);

        for data in [first, second.clone()] {
            let update = cache.get_mut().insert_chunk(data);
            sender.enqueue(ChunkRebuildTask::new(update)).unwrap();
        }

        let report = context.process_frame(&queue);
        assert_eq!(report.executed, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(context.meshes.revision(coords), Some(2));
        assert_eq!(context.meshes.index_count(coords), Some(72));
        assert_eq!(context.meshes.backend().live_meshes(), 1);
        assert_eq!(cache.get().chunk(coords).map(|chunk| &chunk.data), Some(&second));
    }
}
