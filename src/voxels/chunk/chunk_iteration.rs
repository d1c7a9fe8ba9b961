//! # Chunk Iteration Module
//!
//! An iterator over the non-empty voxels of a chunk, yielding each one with its local
//! coordinate. Air is skipped without materialising positions for it.

use cgmath::Point3;

use crate::voxels::block::block_type::VoxelType;

use super::ChunkData;

pub struct SolidVoxelIterator<'a> {
    chunk_ref: &'a ChunkData,
    current_offset: usize,
}

impl<'a> SolidVoxelIterator<'a> {
    pub fn new(chunk_ref: &'a ChunkData) -> Self {
        SolidVoxelIterator {
            chunk_ref,
            current_offset: 0,
        }
    }
}

impl<'a> Iterator for SolidVoxelIterator<'a> {
    type Item = (Point3<usize>, VoxelType);

    fn next(&mut self) -> Option<Self::Item> {
        let voxels = self.chunk_ref.voxels();
        while self.current_offset < voxels.len() {
            let offset = self.current_offset;
            self.current_offset += 1;
            let voxel = voxels[offset];
            if voxel.is_solid() {
                return Some((self.chunk_ref.local_position(offset), voxel));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxels::chunk::ChunkCoords;

    #[test]
    fn test_yields_only_solid_voxels_in_storage_order() {
        let mut chunk = ChunkData::empty(ChunkCoords::new(0, 0), 3, 3, 3);
        chunk.set_voxel(2, 2, 2, VoxelType::Stone);
        chunk.set_voxel(1, 0, 0, VoxelType::Dirt);
        chunk.set_voxel(0, 1, 0, VoxelType::Grass);

        let visited: Vec<_> = chunk.solid_voxels().collect();
        assert_eq!(
            visited,
            vec![
                (Point3::new(1, 0, 0), VoxelType::Dirt),
                (Point3::new(0, 1, 0), VoxelType::Grass),
                (Point3::new(2, 2, 2), VoxelType::Stone),
            ]
        );
    }

    #[test]
    fn test_empty_chunk_yields_nothing() {
        let chunk = ChunkData::empty(ChunkCoords::new(0, 0), 4, 4, 4);
        assert_eq!(chunk.solid_voxels().count(), 0);
    }
}
