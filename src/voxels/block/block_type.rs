//! # Voxel Type Module
//!
//! The closed set of materials a voxel can hold. Each variant fits in one byte, which is
//! also how it travels inside run-length encoded chunk payloads.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use super::BlockTypeSize;

/// Enumerates every material a voxel can hold.
///
/// `Empty` is the universal "no geometry, not solid" value. It is the zero value of the
/// enum, the value of every voxel a chunk was never told about, and the answer to any
/// lookup outside a chunk's bounds.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, FromPrimitive)]
pub enum VoxelType {
    /// Air. Non-solid, never meshed.
    #[default]
    Empty = 0,

    /// Topmost voxel of a column above the water line.
    Grass = 1,

    /// The layer directly below the surface.
    Dirt = 2,

    /// Everything deeper than the dirt layer.
    Stone = 3,

    /// Open space at or below the water level.
    Water = 4,

    /// Surface voxels at the shore line.
    Sand = 5,
}

/// Number of `VoxelType` variants.
pub const VOXEL_TYPE_COUNT: usize = 6;

impl VoxelType {
    /// Converts a wire byte back into a voxel type.
    ///
    /// # Returns
    /// `None` for bytes that do not name a variant.
    pub fn from_byte(byte: BlockTypeSize) -> Option<Self> {
        FromPrimitive::from_u8(byte)
    }

    pub fn to_byte(self) -> BlockTypeSize {
        self as BlockTypeSize
    }

    /// Whether the voxel occupies space: it produces geometry, culls its neighbours'
    /// faces and contributes to ambient occlusion.
    pub fn is_solid(self) -> bool {
        self != VoxelType::Empty
    }
}
