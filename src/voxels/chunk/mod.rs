//! # Chunk Module
//!
//! This module provides `ChunkData`, the dense voxel grid that is generated on the
//! server, streamed to clients and meshed there, and `ChunkCoords`, the key both sides
//! file chunks under.
//!
//! ## Storage
//!
//! Voxels are kept in one flat vector in `x + size_x * (y + size_y * z)` order. That is
//! also the order of the run-length encoded wire payload, so encoding and decoding
//! never reshuffle data.
//!
//! ## Bounds
//!
//! `get_voxel` takes signed coordinates and answers `VoxelType::Empty` for anything
//! outside the grid. The mesher relies on this when it samples neighbours past the
//! chunk edge.

use cgmath::{Point2, Point3};

use super::block::block_type::VoxelType;

pub mod chunk_iteration;

use chunk_iteration::SolidVoxelIterator;

/// Chunk-grid key on the XZ plane (chunk units, not world units).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoords {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoords {
    pub fn new(x: i32, z: i32) -> Self {
        ChunkCoords { x, z }
    }

    /// The chunk containing the world-space voxel column `(world_x, world_z)`.
    ///
    /// Uses floor division so that negative coordinates land in the chunk to their
    /// left, matching `from_world_f32`.
    pub fn from_world(world_x: i32, world_z: i32, chunk_size: usize) -> Self {
        let size = chunk_size as i32;
        ChunkCoords {
            x: world_x.div_euclid(size),
            z: world_z.div_euclid(size),
        }
    }

    /// The chunk containing a continuous world-space position.
    pub fn from_world_f32(world_x: f32, world_z: f32, chunk_size: usize) -> Self {
        let size = chunk_size as f32;
        ChunkCoords {
            x: (world_x / size).floor() as i32,
            z: (world_z / size).floor() as i32,
        }
    }

    /// World-space origin of the chunk.
    pub fn origin(self, size_x: usize, size_z: usize) -> Point2<i32> {
        Point2::new(self.x * size_x as i32, self.z * size_z as i32)
    }
}

/// A dense 3-D grid of voxels with a fixed size and a world-space origin.
///
/// # Invariants
/// * `voxels.len() == size_x * size_y * size_z`
/// * `position == coords.origin(size_x, size_z)` for the coordinate the chunk was
///   created for, so the origin is always a multiple of the horizontal size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkData {
    size_x: usize,
    size_y: usize,
    size_z: usize,
    position: Point2<i32>,
    voxels: Vec<VoxelType>,
}

impl ChunkData {
    /// Creates an all-`Empty` chunk for the given chunk coordinate.
    pub fn empty(coords: ChunkCoords, size_x: usize, size_y: usize, size_z: usize) -> Self {
        ChunkData {
            size_x,
            size_y,
            size_z,
            position: coords.origin(size_x, size_z),
            voxels: vec![VoxelType::Empty; size_x * size_y * size_z],
        }
    }

    /// Wraps an existing flat voxel vector.
    ///
    /// # Returns
    /// `None` if `voxels` does not hold exactly `size_x * size_y * size_z` entries.
    pub fn from_voxels(
        coords: ChunkCoords,
        size_x: usize,
        size_y: usize,
        size_z: usize,
        voxels: Vec<VoxelType>,
    ) -> Option<Self> {
        if voxels.len() != size_x * size_y * size_z {
            return None;
        }
        Some(ChunkData {
            size_x,
            size_y,
            size_z,
            position: coords.origin(size_x, size_z),
            voxels,
        })
    }

    pub fn size_x(&self) -> usize {
        self.size_x
    }

    pub fn size_y(&self) -> usize {
        self.size_y
    }

    pub fn size_z(&self) -> usize {
        self.size_z
    }

    /// `[size_x, size_y, size_z]`, indexable by axis.
    pub fn dimensions(&self) -> [usize; 3] {
        [self.size_x, self.size_y, self.size_z]
    }

    /// World-space origin of the chunk (X, Z).
    pub fn position(&self) -> Point2<i32> {
        self.position
    }

    /// Chunk-grid key derived from the origin.
    pub fn coords(&self) -> ChunkCoords {
        ChunkCoords {
            x: self.position.x.div_euclid(self.size_x.max(1) as i32),
            z: self.position.y.div_euclid(self.size_z.max(1) as i32),
        }
    }

    /// Flat voxel storage, in `x + size_x * (y + size_y * z)` order.
    pub fn voxels(&self) -> &[VoxelType] {
        &self.voxels
    }

    pub(crate) fn voxels_mut(&mut self) -> &mut [VoxelType] {
        &mut self.voxels
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Flat index of a local coordinate, or `None` outside the grid.
    pub fn index(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        if x < 0 || y < 0 || z < 0 {
            return None;
        }
        let (x, y, z) = (x as usize, y as usize, z as usize);
        if x >= self.size_x || y >= self.size_y || z >= self.size_z {
            return None;
        }
        Some(x + self.size_x * (y + self.size_y * z))
    }

    /// Local coordinate of a flat index. Inverse of `index`.
    pub fn local_position(&self, index: usize) -> Point3<usize> {
        let x = index % self.size_x;
        let y = (index / self.size_x) % self.size_y;
        let z = index / (self.size_x * self.size_y);
        Point3::new(x, y, z)
    }

    /// The voxel at a local coordinate. Anything outside the grid is `Empty`.
    pub fn get_voxel(&self, x: i32, y: i32, z: i32) -> VoxelType {
        match self.index(x, y, z) {
            Some(index) => self.voxels[index],
            None => VoxelType::Empty,
        }
    }

    /// Same as `get_voxel`, taking an axis-indexed coordinate.
    pub fn get_voxel_at(&self, position: [i32; 3]) -> VoxelType {
        self.get_voxel(position[0], position[1], position[2])
    }

    /// Overwrites the voxel at a local coordinate.
    ///
    /// # Returns
    /// `false`, leaving the chunk untouched, when the coordinate is outside the grid.
    pub fn set_voxel(&mut self, x: i32, y: i32, z: i32, voxel: VoxelType) -> bool {
        match self.index(x, y, z) {
            Some(index) => {
                self.voxels[index] = voxel;
                true
            }
            None => false,
        }
    }

    /// Local coordinate of a world-space voxel, if it falls inside this chunk.
    pub fn world_to_local(&self, world_x: i32, world_y: i32, world_z: i32) -> Option<[i32; 3]> {
        let local = [
            world_x - self.position.x,
            world_y,
            world_z - self.position.y,
        ];
        self.index(local[0], local[1], local[2]).map(|_| local)
    }

    /// Iterates the non-empty voxels together with their local coordinates.
    pub fn solid_voxels(&self) -> SolidVoxelIterator<'_> {
        SolidVoxelIterator::new(self)
    }

    pub fn solid_count(&self) -> usize {
        self.voxels.iter().filter(|voxel| voxel.is_solid()).count()
    }
}
