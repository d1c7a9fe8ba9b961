//! Vertex data structures and layouts for voxel rendering.
//!
//! This module defines the vertex format the mesher emits and the attribute layout a
//! rendering backend needs to bind it.

use cgmath::{Point3, Vector3};

/// A vertex of a chunk mesh, in local chunk space.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes)
/// - Normal: [f32; 3] (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Texture Layer: u32 (4 bytes)
/// - Ambient Occlusion: f32 (4 bytes)
///
/// Total size: 40 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// Not normalised: a merged quad of width `w` spans `0..w` so the texture tiles.
    pub tex_coords: [f32; 2],
    /// Layer of the texture array
    pub texture_layer: u32,
    /// 1.0 fully lit, 0.0 fully occluded
    pub ao: f32,
}

impl Vertex {
    pub fn new(
        position: Point3<i32>,
        normal: Vector3<f32>,
        tex_coords: [f32; 2],
        texture_layer: u32,
        ao: f32,
    ) -> Self {
        Vertex {
            position: [position.x as f32, position.y as f32, position.z as f32],
            normal: normal.into(),
            tex_coords,
            texture_layer,
            ao,
        }
    }

    /// Attribute layout of the vertex for a shader pipeline.
    ///
    /// # Shader Attributes
    /// - `location = 0`: position (vec3<f32>)
    /// - `location = 1`: normal (vec3<f32>)
    /// - `location = 2`: tex_coords (vec2<f32>)
    /// - `location = 3`: texture_layer (u32)
    /// - `location = 4`: ao (f32)
    pub const ATTRIBUTES: [VertexAttribute; 5] = [
        VertexAttribute {
            location: 0,
            offset: 0,
            format: VertexFormat::Float32x3,
        },
        VertexAttribute {
            location: 1,
            offset: std::mem::size_of::<[f32; 3]>(),
            format: VertexFormat::Float32x3,
        },
        VertexAttribute {
            location: 2,
            offset: std::mem::size_of::<[f32; 6]>(),
            format: VertexFormat::Float32x2,
        },
        VertexAttribute {
            location: 3,
            offset: std::mem::size_of::<[f32; 8]>(),
            format: VertexFormat::Uint32,
        },
        VertexAttribute {
            location: 4,
            offset: std::mem::size_of::<[f32; 9]>(),
            format: VertexFormat::Float32,
        },
    ];

    pub const STRIDE: usize = std::mem::size_of::<Vertex>();
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Uint32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub offset: usize,
    pub format: VertexFormat,
}
