use cgmath::Point3;

use crate::voxels::block::{block_side::BlockSide, block_type::VoxelType, texture_layer};

use super::ambient_occlusion::level_to_ao;

use crate::rendering::Vertex;

/// Represents one quad of the mesh: a single voxel face or a greedy merge of several
/// coplanar ones.
///
/// The four corners are named lower-left, lower-right, upper-left and upper-right in
/// the face's own `(u, v)` plane (see `BlockSide::plane_axes`), and are always emitted in
/// that order. Because `u × v` points outward, `(lr - ll) × (ul - ll)` does too.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    pub ll: Point3<i32>,
    pub lr: Point3<i32>,
    pub ul: Point3<i32>,
    pub ur: Point3<i32>,
    /// Extent along `u`, in voxels
    pub width: i32,
    /// Extent along `v`, in voxels
    pub height: i32,
    pub voxel: VoxelType,
    pub side: BlockSide,
    /// Light level `0..=3` per corner, in emission order
    pub ao: [u8; 4],
}

impl Face {
    /// Builds the quad covering `width × height` voxel faces, starting at the voxel
    /// `origin` and growing along the side's `u` and `v` axes.
    pub fn new(
        origin: [i32; 3],
        width: i32,
        height: i32,
        side: BlockSide,
        voxel: VoxelType,
        ao: [u8; 4],
    ) -> Self {
        let (u, v) = side.plane_axes();
        let mut ll = origin;
        if side.sign() > 0 {
            ll[side.axis()] += 1;
        }
        let mut lr = ll;
        lr[u] += width;
        let mut ul = ll;
        ul[v] += height;
        let mut ur = lr;
        ur[v] += height;

        Face {
            ll: ll.into(),
            lr: lr.into(),
            ul: ul.into(),
            ur: ur.into(),
            width,
            height,
            voxel,
            side,
            ao,
        }
    }

    /// Whether the quad is split along the `lr`/`ul` diagonal instead of `ll`/`ur`.
    ///
    /// The split runs along the diagonal with the lower combined light level.
    pub fn flipped(&self) -> bool {
        let [ao0, ao1, ao2, ao3] = self.ao.map(u16::from);
        ao0 + ao3 > ao1 + ao2
    }

    /// The four vertices in `[ll, lr, ul, ur]` order.
    pub fn vertices(&self) -> [Vertex; 4] {
        let normal = self.side.normal();
        let layer = texture_layer(self.voxel, self.side);
        let (w, h) = (self.width as f32, self.height as f32);
        let tex_coords = [[0.0, h], [w, h], [0.0, 0.0], [w, 0.0]];

        let corners = [self.ll, self.lr, self.ul, self.ur];
        std::array::from_fn(|i| {
            Vertex::new(corners[i], normal, tex_coords[i], layer, level_to_ao(self.ao[i]))
        })
    }

    /// Two counter-clockwise triangles, offset by the index of this face's first vertex.
    pub fn indices(&self, first_vertex: u32) -> [u32; 6] {
        let local = if self.flipped() {
            [0, 1, 2, 1, 3, 2]
        } else {
            [0, 1, 3, 0, 3, 2]
        };
        local.map(|index| index + first_vertex)
    }
}
