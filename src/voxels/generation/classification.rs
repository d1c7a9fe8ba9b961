//! # Voxel Classification
//!
//! Decides the material of one voxel from its precomputed generation context. The
//! decision is an ordered list of rules: the first rule that claims the voxel assigns
//! its type, and a voxel no rule claims stays `Empty`.

use cgmath::Point3;

use crate::voxels::block::block_type::VoxelType;

/// Everything known about one voxel while its column is being generated.
///
/// Built once per voxel by the terrain generator and dropped as soon as the voxel is
/// classified.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelGenerationContext {
    /// Coordinate inside the chunk.
    pub local: Point3<i32>,
    /// Coordinate in the world.
    pub world: Point3<i32>,
    /// Ground height of this column, from the 2-D height field.
    pub ground_height: i32,
    /// Effective density of this voxel. Positive is ground, non-positive is open space.
    pub density: f64,
    /// Effective density of the voxel directly above.
    pub density_above: f64,
    pub water_level: i32,
    pub dirt_depth: i32,
    /// World seed, used to vary per-column details deterministically.
    pub seed_offset: u32,
}

impl VoxelGenerationContext {
    fn is_ground(&self) -> bool {
        self.density > 0.0
    }

    fn is_open(&self) -> bool {
        self.density <= 0.0
    }

    /// Dirt thickness for this column: the configured depth plus a 0..=1 jitter.
    fn column_dirt_depth(&self) -> i32 {
        let mut hash = (self.world.x as u32).wrapping_mul(0x9E37_79B1)
            ^ (self.world.z as u32).wrapping_mul(0x85EB_CA77)
            ^ self.seed_offset;
        hash ^= hash >> 15;
        hash = hash.wrapping_mul(0x2C1B_3C6D);
        hash ^= hash >> 12;
        self.dirt_depth + (hash & 1) as i32
    }
}

/// One classification rule. Variants are listed in their default priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoxelRule {
    /// Open space above the water level is air.
    Sky,
    /// Open space at or below the water level is water.
    Water,
    /// Ground with open space directly above it is the surface voxel.
    Surface,
    /// Ground within the dirt layer below the column's surface.
    Subsoil,
    /// Any remaining ground.
    Stone,
}

/// The rule order the terrain generator uses.
pub const DEFAULT_RULES: [VoxelRule; 5] = [
    VoxelRule::Sky,
    VoxelRule::Water,
    VoxelRule::Surface,
    VoxelRule::Subsoil,
    VoxelRule::Stone,
];

impl VoxelRule {
    /// Returns the voxel type if this rule claims the voxel.
    pub fn classify(self, context: &VoxelGenerationContext) -> Option<VoxelType> {
        let y = context.world.y;
        match self {
            VoxelRule::Sky => {
                (context.is_open() && y > context.water_level).then_some(VoxelType::Empty)
            }
            VoxelRule::Water => {
                (context.is_open() && y <= context.water_level).then_some(VoxelType::Water)
            }
            VoxelRule::Surface => {
                if !(context.is_ground() && context.density_above <= 0.0) {
                    return None;
                }
                if y <= context.water_level + 1 {
                    Some(VoxelType::Sand)
                } else {
                    Some(VoxelType::Grass)
                }
            }
            VoxelRule::Subsoil => (context.is_ground()
                && y >= context.ground_height - context.column_dirt_depth())
            .then_some(VoxelType::Dirt),
            VoxelRule::Stone => context.is_ground().then_some(VoxelType::Stone),
        }
    }
}

/// Runs `rules` in order and returns the first match.
///
/// A voxel no rule claims (for example one whose density is NaN) is `Empty`.
pub fn classify_voxel(rules: &[VoxelRule], context: &VoxelGenerationContext) -> VoxelType {
    rules
        .iter()
        .find_map(|rule| rule.classify(context))
        .unwrap_or(VoxelType::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(y: i32, density: f64, density_above: f64) -> VoxelGenerationContext {
        VoxelGenerationContext {
            local: Point3::new(0, y, 0),
            world: Point3::new(0, y, 0),
            ground_height: 30,
            density,
            density_above,
            water_level: 20,
            dirt_depth: 3,
            seed_offset: 0,
        }
    }

    #[test]
    fn test_open_space_above_water_is_empty() {
        assert_eq!(classify_voxel(&DEFAULT_RULES, &context(40, -10.0, -11.0)), VoxelType::Empty);
    }

    #[test]
    fn test_open_space_at_or_below_water_level_is_water() {
        assert_eq!(classify_voxel(&DEFAULT_RULES, &context(20, -1.0, -2.0)), VoxelType::Water);
        assert_eq!(classify_voxel(&DEFAULT_RULES, &context(5, 0.0, -1.0)), VoxelType::Water);
    }

    #[test]
    fn test_surface_voxel_is_grass_or_sand() {
        assert_eq!(classify_voxel(&DEFAULT_RULES, &context(30, 0.5, -0.5)), VoxelType::Grass);
        assert_eq!(classify_voxel(&DEFAULT_RULES, &context(21, 0.5, -0.5)), VoxelType::Sand);
    }

    #[test]
    fn test_dirt_layer_then_stone() {
        assert_eq!(classify_voxel(&DEFAULT_RULES, &context(28, 2.0, 1.0)), VoxelType::Dirt);
        assert_eq!(classify_voxel(&DEFAULT_RULES, &context(27, 3.0, 2.0)), VoxelType::Dirt);
        assert_eq!(classify_voxel(&DEFAULT_RULES, &context(10, 20.0, 19.0)), VoxelType::Stone);
    }

    #[test]
    fn test_dirt_depth_jitter_is_bounded() {
        for x in -8..8 {
            let mut sample = context(0, 1.0, 1.0);
            sample.world.x = x;
            let depth = sample.column_dirt_depth();
            assert!(depth == 3 || depth == 4);
        }
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let reordered = [VoxelRule::Stone, VoxelRule::Surface];
        assert_eq!(classify_voxel(&reordered, &context(30, 0.5, -0.5)), VoxelType::Stone);
    }

    #[test]
    fn test_unclaimed_voxel_falls_back_to_empty() {
        assert_eq!(
            classify_voxel(&DEFAULT_RULES, &context(10, f64::NAN, f64::NAN)),
            VoxelType::Empty
        );
        assert_eq!(classify_voxel(&[], &context(10, 5.0, 5.0)), VoxelType::Empty);
        assert_eq!(
            classify_voxel(&[VoxelRule::Sky], &context(10, 5.0, 5.0)),
            VoxelType::Empty
        );
    }
}
