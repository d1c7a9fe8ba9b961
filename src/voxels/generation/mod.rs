//! # Terrain Generation
//!
//! Turns a chunk coordinate into a fully populated `ChunkData`.
//!
//! ## Pipeline
//!
//! 1. One batched 2-D sample of the height field (optionally domain warped) for every
//!    column of the chunk, reshaped into a ground height per column.
//! 2. One batched 3-D sample of the density field for every voxel, plus one extra layer
//!    on top so the highest voxel also knows the density above it.
//! 3. A single pass over every voxel, classifying it from a `VoxelGenerationContext`.
//!
//! The server regenerates chunks on demand instead of persisting them, so the output
//! depends on nothing but the coordinate, the settings and the world seed.

pub mod classification;
pub mod noise_field;

use log::debug;
use web_time::Instant;

use cgmath::Point3;
use classification::{classify_voxel, VoxelGenerationContext, VoxelRule, DEFAULT_RULES};
use noise_field::{redistribution, remap_value_01, to_unit_interval, DomainWarp, NoiseField};

use crate::config::TerrainSettings;

use super::chunk::{ChunkCoords, ChunkData};

/// Generates chunks for one world seed.
#[derive(Clone, Debug)]
pub struct TerrainGenerator {
    settings: TerrainSettings,
    world_seed: u32,
    height_field: NoiseField,
    density_field: NoiseField,
    warp: Option<DomainWarp>,
    rules: [VoxelRule; 5],
}

impl TerrainGenerator {
    pub fn new(settings: TerrainSettings, world_seed: u32) -> Self {
        TerrainGenerator {
            height_field: NoiseField::new(settings.height_noise, world_seed),
            density_field: NoiseField::new(settings.density_noise, world_seed),
            warp: settings
                .warp
                .as_ref()
                .map(|warp| DomainWarp::new(warp, world_seed)),
            rules: DEFAULT_RULES,
            world_seed,
            settings,
        }
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    pub fn world_seed(&self) -> u32 {
        self.world_seed
    }

    /// `(size_x, size_y, size_z)` of every chunk this generator produces.
    pub fn chunk_dimensions(&self) -> (usize, usize, usize) {
        (
            self.settings.chunk_size,
            self.settings.chunk_height,
            self.settings.chunk_size,
        )
    }

    /// Ground height of every column of a chunk, indexed `x + size_x * z`.
    pub fn column_heights(&self, coords: ChunkCoords) -> Vec<i32> {
        let (size_x, _, size_z) = self.chunk_dimensions();
        let origin = coords.origin(size_x, size_z);

        let mut xs = Vec::with_capacity(size_x * size_z);
        let mut zs = Vec::with_capacity(size_x * size_z);
        for z in 0..size_z {
            for x in 0..size_x {
                xs.push((origin.x + x as i32) as f64);
                zs.push((origin.y + z as i32) as f64);
            }
        }

        let raw = match &self.warp {
            Some(warp) => warp.sample_2d(&self.height_field, &xs, &zs),
            None => self.height_field.sample_2d(&xs, &zs),
        };

        let noise = &self.settings.height_noise;
        raw.into_iter()
            .map(|sample| {
                let shaped = redistribution(
                    to_unit_interval(sample),
                    noise.redistribution_modifier,
                    noise.exponent,
                )
                .clamp(0.0, 1.0);
                remap_value_01(shaped, self.settings.ground_min, self.settings.ground_max).floor()
                    as i32
            })
            .collect()
    }

    /// Height gradient plus weighted 3-D noise. Positive is ground.
    fn effective_density(&self, ground_height: i32, y: i32, noise: f64) -> f64 {
        (ground_height - y) as f64 + noise * self.settings.density_amplitude
    }

    /// Generates the chunk at `coords`.
    pub fn generate(&self, coords: ChunkCoords) -> ChunkData {
        let start = Instant::now();
        let (size_x, size_y, size_z) = self.chunk_dimensions();
        let origin = coords.origin(size_x, size_z);
        let heights = self.column_heights(coords);

        let layers = size_y + 1;
        let sample_count = size_x * layers * size_z;
        let mut xs = Vec::with_capacity(sample_count);
        let mut ys = Vec::with_capacity(sample_count);
        let mut zs = Vec::with_capacity(sample_count);
        for z in 0..size_z {
            for y in 0..layers {
                for x in 0..size_x {
                    xs.push((origin.x + x as i32) as f64);
                    ys.push(y as f64);
                    zs.push((origin.y + z as i32) as f64);
                }
            }
        }
        let densities = self.density_field.sample_3d(&xs, &ys, &zs);

        let mut chunk = ChunkData::empty(coords, size_x, size_y, size_z);
        let voxels = chunk.voxels_mut();
        let mut index = 0;
        for z in 0..size_z {
            for y in 0..size_y {
                for x in 0..size_x {
                    let ground_height = heights[x + size_x * z];
                    let here = x + size_x * (y + layers * z);
                    let above = x + size_x * (y + 1 + layers * z);
                    let y = y as i32;

                    let context = VoxelGenerationContext {
                        local: Point3::new(x as i32, y, z as i32),
                        world: Point3::new(origin.x + x as i32, y, origin.y + z as i32),
                        ground_height,
                        density: self.effective_density(ground_height, y, densities[here]),
                        density_above: self.effective_density(
                            ground_height,
                            y + 1,
                            densities[above],
                        ),
                        water_level: self.settings.water_level,
                        dirt_depth: self.settings.dirt_depth,
                        seed_offset: self.world_seed,
                    };
                    voxels[index] = classify_voxel(&self.rules, &context);
                    index += 1;
                }
            }
        }

        debug!(
            "Generated chunk ({}, {}) in {:?}",
            coords.x,
            coords.z,
            start.elapsed()
        );
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxels::block::block_type::VoxelType;

    fn small_settings() -> TerrainSettings {
        TerrainSettings {
            chunk_size: 8,
            chunk_height: 48,
            ..TerrainSettings::default()
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let first = TerrainGenerator::new(small_settings(), 1234).generate(ChunkCoords::new(2, 3));
        let second = TerrainGenerator::new(small_settings(), 1234).generate(ChunkCoords::new(2, 3));
        assert_eq!(first, second);
        assert_eq!(first.voxels(), second.voxels());
    }

    #[test]
    fn test_chunks_differ_across_coordinates_and_seeds() {
        let generator = TerrainGenerator::new(small_settings(), 1234);
        let a = generator.generate(ChunkCoords::new(0, 0));
        let b = generator.generate(ChunkCoords::new(5, -7));
        assert_ne!(a.voxels(), b.voxels());

        let other_seed = TerrainGenerator::new(small_settings(), 4321).generate(ChunkCoords::new(0, 0));
        assert_ne!(a.voxels(), other_seed.voxels());
    }

    #[test]
    fn test_dimensions_and_position() {
        let generator = TerrainGenerator::new(small_settings(), 7);
        let chunk = generator.generate(ChunkCoords::new(2, 3));
        assert_eq!(chunk.dimensions(), [8, 48, 8]);
        assert_eq!(chunk.position(), cgmath::Point2::new(16, 24));
        assert_eq!(chunk.coords(), ChunkCoords::new(2, 3));
    }

    #[test]
    fn test_column_heights_stay_within_configured_range() {
        let settings = small_settings();
        let generator = TerrainGenerator::new(settings.clone(), 99);
        for coords in [ChunkCoords::new(0, 0), ChunkCoords::new(-4, 9)] {
            for height in generator.column_heights(coords) {
                assert!(height >= settings.ground_min.floor() as i32);
                assert!(height <= settings.ground_max as i32);
            }
        }
    }

    #[test]
    fn test_generated_layers_are_consistent() {
        let settings = small_settings();
        let generator = TerrainGenerator::new(settings.clone(), 5);
        let chunk = generator.generate(ChunkCoords::new(1, 1));

        for (position, voxel) in chunk.solid_voxels() {
            let (x, y, z) = (position.x as i32, position.y as i32, position.z as i32);
            match voxel {
                VoxelType::Water => assert!(y <= settings.water_level),
                VoxelType::Grass | VoxelType::Sand => {
                    let above = chunk.get_voxel(x, y + 1, z);
                    assert!(
                        above == VoxelType::Empty || above == VoxelType::Water,
                        "{:?} above surface at {:?}",
                        above,
                        position
                    );
                }
                _ => {}
            }
        }

        assert_eq!(chunk.get_voxel(0, 0, 0), VoxelType::Stone);
        assert_eq!(chunk.get_voxel(0, 47, 0), VoxelType::Empty);
    }
}
