//! # Block Module
//!
//! Voxel materials, voxel faces, and the mapping from the pair of them to a layer of
//! the renderer's texture array.

pub mod block_side;
pub mod block_type;

use block_side::BlockSide;
use block_type::{VoxelType, VOXEL_TYPE_COUNT};

/// The underlying integer type used to represent voxel types in memory and on the wire.
pub type BlockTypeSize = u8;

/// Maps each voxel type to its texture-array layer for each face.
///
/// The outer array is indexed by `VoxelType` as a `usize`.
/// The inner array contains 6 layers, one for each face in the order:
/// [Front, Back, Bottom, Top, Left, Right]
pub static VOXEL_TYPE_TO_TEXTURE_LAYERS: [[u32; 6]; VOXEL_TYPE_COUNT] = [
    [0, 0, 0, 0, 0, 0], // EMPTY (never meshed)
    [2, 2, 1, 3, 2, 2], // GRASS (top: 3, bottom: dirt, sides: 2)
    [1, 1, 1, 1, 1, 1], // DIRT
    [4, 4, 4, 4, 4, 4], // STONE
    [5, 5, 5, 5, 5, 5], // WATER
    [6, 6, 6, 6, 6, 6], // SAND
];

/// Texture-array layer for one face of a voxel.
pub fn texture_layer(voxel: VoxelType, side: BlockSide) -> u32 {
    VOXEL_TYPE_TO_TEXTURE_LAYERS[voxel as usize][side as usize]
}
