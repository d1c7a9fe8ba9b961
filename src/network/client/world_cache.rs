//! # Client World Cache
//!
//! The client's mirror of every chunk the server has delivered. It is shared between
//! the stream reader thread, which inserts, and the render thread, which reads while
//! rebuilding meshes, behind one `MtResource` lock.

use std::collections::HashMap;

use crate::voxels::{
    block::block_type::VoxelType,
    chunk::{ChunkCoords, ChunkData},
};

/// A delivered chunk and its bookkeeping.
#[derive(Debug, Clone)]
pub struct ClientChunk {
    pub data: ChunkData,
    /// Bumped on every delivery of this coordinate, starting at 1.
    pub revision: u64,
}

/// What an insert changed. Exactly one mesh rebuild is scheduled per update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkUpdate {
    pub coords: ChunkCoords,
    pub revision: u64,
    /// Whether an older copy of the chunk was overwritten.
    pub replaced: bool,
}

#[derive(Debug, Default)]
pub struct ClientWorldCache {
    chunks: HashMap<ChunkCoords, ClientChunk>,
    updates: u64,
}

impl ClientWorldCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a delivered chunk, replacing the data of an existing one.
    pub fn insert_chunk(&mut self, data: ChunkData) -> ChunkUpdate {
        let coords = data.coords();
        self.updates += 1;
        match self.chunks.get_mut(&coords) {
            Some(existing) => {
                existing.data = data;
                existing.revision += 1;
                ChunkUpdate {
                    coords,
                    revision: existing.revision,
                    replaced: true,
                }
            }
            None => {
                self.chunks.insert(coords, ClientChunk { data, revision: 1 });
                ChunkUpdate {
                    coords,
                    revision: 1,
                    replaced: false,
                }
            }
        }
    }

    pub fn chunk(&self, coords: ChunkCoords) -> Option<&ClientChunk> {
        self.chunks.get(&coords)
    }

    pub fn contains(&self, coords: ChunkCoords) -> bool {
        self.chunks.contains_key(&coords)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total number of accepted chunk deliveries.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn coords(&self) -> impl Iterator<Item = ChunkCoords> + '_ {
        self.chunks.keys().copied()
    }

    /// The voxel at a world-space position, `Empty` where no chunk is cached.
    ///
    /// Uses the same floor-division key as the server, with the chunk size taken from
    /// the cached chunks.
    pub fn get_voxel_world(&self, world_x: i32, world_y: i32, world_z: i32) -> VoxelType {
        let Some(size) = self.chunks.values().next().map(|chunk| chunk.data.size_x()) else {
            return VoxelType::Empty;
        };
        let coords = ChunkCoords::from_world(world_x, world_z, size);
        match self.chunks.get(&coords) {
            Some(chunk) => chunk
                .data
                .world_to_local(world_x, world_y, world_z)
                .map_or(VoxelType::Empty, |local| chunk.data.get_voxel_at(local)),
            None => VoxelType::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(coords: ChunkCoords, voxel: VoxelType) -> ChunkData {
        let mut data = ChunkData::empty(coords, 4, 4, 4);
        data.set_voxel(0, 0, 0, voxel);
        data
    }

    #[test]
    fn test_second_delivery_replaces_the_first() {
        let mut cache = ClientWorldCache::new();
        let coords = ChunkCoords::new(3, -1);

        let first = cache.insert_chunk(chunk(coords, VoxelType::Dirt));
        let second = cache.insert_chunk(chunk(coords, VoxelType::Sand));

        assert_eq!(first, ChunkUpdate { coords, revision: 1, replaced: false });
        assert_eq!(second, ChunkUpdate { coords, revision: 2, replaced: true });
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.updates(), 2);
        assert_eq!(
            cache.chunk(coords).unwrap().data.get_voxel(0, 0, 0),
            VoxelType::Sand
        );
    }

    #[test]
    fn test_world_lookup_finds_the_owning_chunk() {
        let mut cache = ClientWorldCache::new();
        cache.insert_chunk(chunk(ChunkCoords::new(-1, 0), VoxelType::Stone));

        assert_eq!(cache.get_voxel_world(-4, 0, 0), VoxelType::Stone);
        assert_eq!(cache.get_voxel_world(-3, 0, 0), VoxelType::Empty);
        assert_eq!(cache.get_voxel_world(50, 0, 0), VoxelType::Empty);
    }
}
