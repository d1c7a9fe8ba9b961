//! Greedy meshing implementation for voxel rendering.
//!
//! This module implements the greedy meshing algorithm which combines adjacent coplanar
//! faces into larger quads, reducing the number of vertices the renderer has to draw.
//!
//! For each of the six sides the chunk is swept slice by slice along the side's axis. A
//! slice is reduced to a 2-D mask of visible faces, each keyed by its voxel type and its
//! four corner light levels. Rectangles of identical keys are then grown greedily, first
//! along `u`, then along `v`. Faces with different light levels never merge, which keeps
//! the occlusion gradient intact.

use bitvec::prelude::*;
use log::trace;
use web_time::Instant;

use crate::voxels::{
    block::{block_side::BlockSide, block_type::VoxelType},
    chunk::ChunkData,
};

use super::{ambient_occlusion::face_levels, face::Face, mesh::MeshBuffers};

type MaskCell = Option<(VoxelType, [u8; 4])>;

/// Whether the face of `position` towards `side` is visible, and with which key.
fn visible_face(chunk: &ChunkData, position: [i32; 3], side: BlockSide) -> MaskCell {
    let voxel = chunk.get_voxel_at(position);
    if !voxel.is_solid() {
        return None;
    }
    let offset = side.offset();
    let neighbour = [
        position[0] + offset[0],
        position[1] + offset[1],
        position[2] + offset[2],
    ];
    if chunk.get_voxel_at(neighbour).is_solid() {
        return None;
    }
    Some((voxel, face_levels(chunk, position, side)))
}

/// Appends the merged faces of one side of the chunk.
fn greedy_side(chunk: &ChunkData, side: BlockSide, faces: &mut Vec<Face>) {
    let dimensions = chunk.dimensions();
    let axis = side.axis();
    let (u, v) = side.plane_axes();
    let (size_u, size_v) = (dimensions[u], dimensions[v]);

    let mut mask: Vec<MaskCell> = vec![None; size_u * size_v];
    let mut consumed = bitvec![0; size_u * size_v];

    for layer in 0..dimensions[axis] {
        for j in 0..size_v {
            for i in 0..size_u {
                let mut position = [0; 3];
                position[axis] = layer as i32;
                position[u] = i as i32;
                position[v] = j as i32;
                mask[i + size_u * j] = visible_face(chunk, position, side);
            }
        }
        consumed.fill(false);

        for j in 0..size_v {
            let mut i = 0;
            while i < size_u {
                let start = i + size_u * j;
                let Some((voxel, ao)) = mask[start].filter(|_| !consumed[start]) else {
                    i += 1;
                    continue;
                };
                let key = mask[start];

                let mut width = 1;
                while i + width < size_u
                    && !consumed[start + width]
                    && mask[start + width] == key
                {
                    width += 1;
                }

                let mut height = 1;
                'grow: while j + height < size_v {
                    let row = i + size_u * (j + height);
                    for cell in row..row + width {
                        if consumed[cell] || mask[cell] != key {
                            break 'grow;
                        }
                    }
                    height += 1;
                }

                for row in j..j + height {
                    let first = i + size_u * row;
                    consumed[first..first + width].fill(true);
                }

                let mut origin = [0; 3];
                origin[axis] = layer as i32;
                origin[u] = i as i32;
                origin[v] = j as i32;
                faces.push(Face::new(
                    origin,
                    width as i32,
                    height as i32,
                    side,
                    voxel,
                    ao,
                ));

                i += width;
            }
        }
    }
}

/// Builds the surface mesh of a chunk in local chunk space.
///
/// Neighbours outside the chunk count as empty, so faces on the chunk border are
/// always emitted.
pub fn mesh_chunk(chunk: &ChunkData) -> MeshBuffers {
    let start = Instant::now();
    let mut mesh = MeshBuffers::new();
    if chunk.solid_count() == 0 {
        return mesh;
    }

    let mut faces = Vec::new();
    for side in BlockSide::all() {
        greedy_side(chunk, side, &mut faces);
    }
    for face in &faces {
        mesh.add_face(face);
    }

    trace!(
        "Meshed chunk ({}, {}): {} faces in {:?}",
        chunk.coords().x,
        chunk.coords().z,
        faces.len(),
        start.elapsed()
    );
    mesh
}
