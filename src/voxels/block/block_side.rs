//! # Block Side Module
//!
//! This module defines the six axis-aligned faces of a voxel and the geometry the
//! mesher needs for each one: the outward normal and the two in-plane axes.

use cgmath::Vector3;

/// Represents the six possible faces of a voxel.
///
/// The values match the order of the texture-layer table in the parent module.
///
/// The order is: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// The front face (facing positive Z)
    FRONT = 0,

    /// The back face (facing negative Z)
    BACK = 1,

    /// The bottom face (facing negative Y)
    BOTTOM = 2,

    /// The top face (facing positive Y)
    TOP = 3,

    /// The left face (facing negative X)
    LEFT = 4,

    /// The right face (facing positive X)
    RIGHT = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in a consistent order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::LEFT,
            BlockSide::RIGHT,
        ]
    }

    /// Index of the axis the face is perpendicular to (0 = X, 1 = Y, 2 = Z).
    pub fn axis(self) -> usize {
        match self {
            BlockSide::LEFT | BlockSide::RIGHT => 0,
            BlockSide::BOTTOM | BlockSide::TOP => 1,
            BlockSide::FRONT | BlockSide::BACK => 2,
        }
    }

    /// `1` when the face looks along the positive axis, `-1` otherwise.
    pub fn sign(self) -> i32 {
        match self {
            BlockSide::FRONT | BlockSide::TOP | BlockSide::RIGHT => 1,
            BlockSide::BACK | BlockSide::BOTTOM | BlockSide::LEFT => -1,
        }
    }

    /// The two in-plane axes `(u, v)` of the face, ordered so that `u × v` is the
    /// outward normal. Quads built along `u` then `v` are therefore counter-clockwise
    /// when seen from outside.
    pub fn plane_axes(self) -> (usize, usize) {
        let axis = self.axis();
        let next = (axis + 1) % 3;
        let after = (axis + 2) % 3;
        if self.sign() > 0 {
            (next, after)
        } else {
            (after, next)
        }
    }

    /// Integer offset to the neighbouring voxel this face opens onto.
    pub fn offset(self) -> [i32; 3] {
        let mut offset = [0; 3];
        offset[self.axis()] = self.sign();
        offset
    }

    /// Outward unit normal of the face.
    pub fn normal(self) -> Vector3<f32> {
        let [x, y, z] = self.offset();
        Vector3::new(x as f32, y as f32, z as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;

    fn unit(axis: usize) -> Vector3<f32> {
        let mut v = Vector3::new(0.0, 0.0, 0.0);
        v[axis] = 1.0;
        v
    }

    #[test]
    fn test_plane_axes_are_right_handed() {
        for side in BlockSide::all() {
            let (u, v) = side.plane_axes();
            assert_ne!(u, side.axis());
            assert_ne!(v, side.axis());
            let cross = unit(u).cross(unit(v));
            assert_eq!(cross, side.normal(), "side {:?}", side);
        }
    }

    #[test]
    fn test_normals_are_unit_and_opposed_in_pairs() {
        for side in BlockSide::all() {
            assert_eq!(side.normal().magnitude(), 1.0);
        }
        assert_eq!(BlockSide::TOP.normal(), -BlockSide::BOTTOM.normal());
        assert_eq!(BlockSide::LEFT.normal(), -BlockSide::RIGHT.normal());
        assert_eq!(BlockSide::FRONT.normal(), -BlockSide::BACK.normal());
    }
}
