//! # World Module
//!
//! This module provides the server's `World`, the authoritative mapping from chunk
//! coordinate to `ChunkData`.
//!
//! ## Architecture
//!
//! Storage is sparse: a chunk exists only after something asked for it. A miss is
//! answered by generating the chunk synchronously with the world's `TerrainGenerator`,
//! so every chunk a client ever sees came from here. Clients never generate terrain.
//!
//! The server shares one `World` between its connection threads and the tick thread
//! through `MtResource`, which serialises every mutation behind a single write lock.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use log::debug;

use super::block::block_type::VoxelType;
use super::chunk::{ChunkCoords, ChunkData};
use super::generation::TerrainGenerator;

pub struct World {
    chunks: HashMap<ChunkCoords, ChunkData>,
    generator: TerrainGenerator,
}

impl World {
    /// Creates an empty world that fills itself from `generator`.
    pub fn new(generator: TerrainGenerator) -> Self {
        World {
            chunks: HashMap::new(),
            generator,
        }
    }

    pub fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    /// Horizontal chunk size in voxels.
    pub fn chunk_size(&self) -> usize {
        self.generator.settings().chunk_size
    }

    /// Number of chunks currently held.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn contains(&self, coords: ChunkCoords) -> bool {
        self.chunks.contains_key(&coords)
    }

    /// The stored chunk, without generating on a miss.
    pub fn get_chunk_at(&self, coords: ChunkCoords) -> Option<&ChunkData> {
        self.chunks.get(&coords)
    }

    /// The stored chunk, generating and inserting it first if it does not exist yet.
    pub fn get_or_generate(&mut self, coords: ChunkCoords) -> &ChunkData {
        self.get_or_generate_mut(coords)
    }

    fn get_or_generate_mut(&mut self, coords: ChunkCoords) -> &mut ChunkData {
        match self.chunks.entry(coords) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("Chunk ({}, {}) not stored, generating", coords.x, coords.z);
                entry.insert(self.generator.generate(coords))
            }
        }
    }

    /// The chunk coordinate and local coordinate of a world-space voxel.
    fn locate(&self, world_x: i32, world_y: i32, world_z: i32) -> (ChunkCoords, [i32; 3]) {
        let size = self.chunk_size() as i32;
        let coords = ChunkCoords::from_world(world_x, world_z, self.chunk_size());
        (
            coords,
            [
                world_x.rem_euclid(size),
                world_y,
                world_z.rem_euclid(size),
            ],
        )
    }

    /// The voxel at a world-space position, generating its chunk on a miss.
    ///
    /// Positions above or below the chunk column are `Empty`.
    pub fn get_voxel_world(&mut self, world_x: i32, world_y: i32, world_z: i32) -> VoxelType {
        let (coords, [x, y, z]) = self.locate(world_x, world_y, world_z);
        self.get_or_generate_mut(coords).get_voxel(x, y, z)
    }

    /// Overwrites the voxel at a world-space position in place.
    ///
    /// # Returns
    /// The edited chunk's coordinate, so the caller can re-broadcast it, or `None` when
    /// the position lies outside the chunk column and nothing changed.
    pub fn set_voxel_world(
        &mut self,
        world_x: i32,
        world_y: i32,
        world_z: i32,
        voxel: VoxelType,
    ) -> Option<ChunkCoords> {
        let (coords, [x, y, z]) = self.locate(world_x, world_y, world_z);
        if y < 0 || y >= self.generator.settings().chunk_height as i32 {
            return None;
        }
        self.get_or_generate_mut(coords)
            .set_voxel(x, y, z, voxel)
            .then_some(coords)
    }

    /// One above the highest solid voxel of a column, used to place new players.
    pub fn surface_height(&mut self, world_x: i32, world_z: i32) -> i32 {
        let (coords, [x, _, z]) = self.locate(world_x, 0, world_z);
        let chunk = self.get_or_generate_mut(coords);
        (0..chunk.size_y() as i32)
            .rev()
            .find(|&y| chunk.get_voxel(x, y, z).is_solid())
            .map_or(0, |y| y + 1)
    }

    /// Drops a chunk from memory. It is regenerated from the seed on the next request,
    /// so any edits made to it are lost.
    pub fn unload_chunk(&mut self, coords: ChunkCoords) -> Option<ChunkData> {
        self.chunks.remove(&coords)
    }
}
