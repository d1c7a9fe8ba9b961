//! Per-corner ambient occlusion.
//!
//! For a face of voxel `p` with outward normal `n`, every sample is taken in the layer
//! `p + n`, the empty space the face opens into. A corner lying in direction
//! `(du, dv)` of the face checks:
//!
//! * `side1` at `p + n + du * u`
//! * `side2` at `p + n + dv * v`
//! * `corner` at `p + n + du * u + dv * v`
//!
//! Both sides solid shadow the corner completely. Otherwise every solid sample takes
//! away a third of the light.

use crate::voxels::{block::block_side::BlockSide, chunk::ChunkData};

/// Light level of a corner with no occluders.
pub const MAX_AO_LEVEL: u8 = 3;

/// In-plane direction of each corner in emission order `[ll, lr, ul, ur]`.
pub const CORNER_DIRECTIONS: [(i32, i32); 4] = [(-1, -1), (1, -1), (-1, 1), (1, 1)];

/// Discrete light level from the three samples, `0..=3`.
pub fn occlusion_level(side1: bool, side2: bool, corner: bool) -> u8 {
    if side1 && side2 {
        return 0;
    }
    MAX_AO_LEVEL - (side1 as u8 + side2 as u8 + corner as u8)
}

/// Vertex attribute value of a light level: `(3 - occupants) / 3`.
pub fn level_to_ao(level: u8) -> f32 {
    level as f32 / MAX_AO_LEVEL as f32
}

/// Light levels of the four corners of the unit face of `position` that looks along
/// `side`, in emission order.
pub fn face_levels(chunk: &ChunkData, position: [i32; 3], side: BlockSide) -> [u8; 4] {
    let (u, v) = side.plane_axes();
    let mut base = position;
    base[side.axis()] += side.sign();

    let solid = |du: i32, dv: i32| {
        let mut sample = base;
        sample[u] += du;
        sample[v] += dv;
        chunk.get_voxel_at(sample).is_solid()
    };

    CORNER_DIRECTIONS.map(|(du, dv)| occlusion_level(solid(du, 0), solid(0, dv), solid(du, dv)))
}
