//! # Configuration
//!
//! Plain numeric parameters for terrain generation and networking. Everything has a
//! default, so an empty JSON object is a complete configuration:
//!
//! ```rust
//! use voxel_realm::config::RealmConfig;
//!
//! let config = RealmConfig::from_json_str("{}").unwrap();
//! assert_eq!(config.terrain.chunk_size, 16);
//! ```

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::RealmError;

/// Parameters for one octave-accumulated noise field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    /// World units per noise unit; larger values give broader features.
    pub zoom: f64,
    /// Number of octaves summed together.
    pub octaves: u32,
    /// Amplitude multiplier applied after each octave.
    pub persistence: f64,
    /// Scale applied before the redistribution exponent.
    pub redistribution_modifier: f64,
    /// Exponent reshaping the normalized height distribution.
    pub exponent: f64,
    /// Offset added to the world seed to decorrelate independent fields.
    pub seed: u32,
    /// Scale applied to the normalized octave sum.
    pub amplitude: f64,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            zoom: 64.0,
            octaves: 4,
            persistence: 0.5,
            redistribution_modifier: 1.0,
            exponent: 1.0,
            seed: 0,
            amplitude: 1.0,
        }
    }
}

/// Two independent fields that displace the coordinates of the height field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainWarpSettings {
    pub x: NoiseSettings,
    pub y: NoiseSettings,
    /// World units of displacement at a warp sample of 1.0.
    pub strength: f64,
}

impl Default for DomainWarpSettings {
    fn default() -> Self {
        Self {
            x: NoiseSettings {
                zoom: 96.0,
                octaves: 2,
                seed: 101,
                ..NoiseSettings::default()
            },
            y: NoiseSettings {
                zoom: 96.0,
                octaves: 2,
                seed: 202,
                ..NoiseSettings::default()
            },
            strength: 12.0,
        }
    }
}

/// Everything the terrain generator needs to turn a chunk coordinate into voxels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    /// Seed of the whole world. `None` lets the server pick one at start-up.
    pub world_seed: Option<u32>,
    /// Horizontal edge length of a chunk, in voxels (both X and Z).
    pub chunk_size: usize,
    /// Vertical extent of a chunk, in voxels.
    pub chunk_height: usize,
    pub water_level: i32,
    pub ground_min: f64,
    pub ground_max: f64,
    /// Number of dirt voxels below the surface voxel before stone begins.
    pub dirt_depth: i32,
    /// Weight of the 3-D density noise against the height gradient.
    pub density_amplitude: f64,
    pub height_noise: NoiseSettings,
    pub density_noise: NoiseSettings,
    pub warp: Option<DomainWarpSettings>,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            world_seed: None,
            chunk_size: 16,
            chunk_height: 64,
            water_level: 20,
            ground_min: 12.0,
            ground_max: 48.0,
            dirt_depth: 3,
            density_amplitude: 4.0,
            height_noise: NoiseSettings {
                zoom: 128.0,
                octaves: 5,
                persistence: 0.45,
                redistribution_modifier: 1.1,
                exponent: 2.0,
                seed: 1,
                amplitude: 1.0,
            },
            density_noise: NoiseSettings {
                zoom: 24.0,
                octaves: 3,
                persistence: 0.5,
                seed: 2,
                ..NoiseSettings::default()
            },
            warp: Some(DomainWarpSettings::default()),
        }
    }
}

/// Addresses, ports and pacing shared by the server and client roles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub address: String,
    pub tcp_port: u16,
    pub udp_port: u16,
    /// Server simulation ticks per second.
    pub tick_rate: u32,
    /// Capacity of the client's network-to-render work queue.
    pub work_queue_capacity: usize,
    /// Largest accepted stream frame, in bytes.
    pub max_frame_len: u32,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_owned(),
            tcp_port: 7777,
            udp_port: 7778,
            tick_rate: 20,
            work_queue_capacity: 256,
            max_frame_len: 1 << 20,
        }
    }
}

/// `ChunkInfo` bytes ahead of the voxel runs: tag, coordinates, sizes and run length.
const CHUNK_INFO_HEADER_LEN: u64 = 2 + 4 + 4 + 4 + 4 + 4;

impl TerrainSettings {
    /// Voxels in one chunk, or `None` if the count overflows.
    pub fn voxels_per_chunk(&self) -> Option<usize> {
        self.chunk_size
            .checked_mul(self.chunk_size)?
            .checked_mul(self.chunk_height)
    }

    /// Rejects settings the generator and the wire format cannot handle.
    pub fn validate(&self) -> Result<(), RealmError> {
        let invalid = |msg: String| Err(RealmError::InvalidConfig(msg));
        if self.chunk_size == 0 {
            return invalid("terrain.chunk_size must be at least 1".to_owned());
        }
        if self.chunk_height == 0 {
            return invalid("terrain.chunk_height must be at least 1".to_owned());
        }
        if i32::try_from(self.chunk_size.max(self.chunk_height)).is_err() {
            return invalid("terrain chunk dimensions must fit an i32".to_owned());
        }
        if self.voxels_per_chunk().is_none() {
            return invalid("terrain chunk volume overflows".to_owned());
        }
        if !(self.ground_min <= self.ground_max) {
            return invalid(format!(
                "terrain.ground_min ({}) must not exceed terrain.ground_max ({})",
                self.ground_min, self.ground_max
            ));
        }
        Ok(())
    }

    /// Size of the largest possible `ChunkInfo` payload: one run per voxel.
    pub fn max_chunk_frame_len(&self) -> u64 {
        let voxels = self.voxels_per_chunk().unwrap_or(usize::MAX) as u64;
        CHUNK_INFO_HEADER_LEN.saturating_add(voxels.saturating_mul(2))
    }

    /// Fails if a frame limit of `max_frame_len` could reject a chunk of this size.
    pub fn check_frame_limit(&self, max_frame_len: u32) -> Result<(), RealmError> {
        let needed = self.max_chunk_frame_len();
        if u64::from(max_frame_len) < needed {
            return Err(RealmError::InvalidConfig(format!(
                "network.max_frame_len ({}) is below the largest chunk frame ({})",
                max_frame_len, needed
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealmConfig {
    pub terrain: TerrainSettings,
    pub network: NetworkSettings,
}

impl RealmConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, RealmError> {
        let config: RealmConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RealmError> {
        self.terrain.validate()?;
        self.terrain.check_frame_limit(self.network.max_frame_len)
    }

    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RealmError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_empty_object_yields_defaults() {
        let config = RealmConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RealmConfig::default());
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let config = RealmConfig::from_json_str(
            r#"{ "terrain": { "world_seed": 42, "height_noise": { "octaves": 2 } },
                 "network": { "tcp_port": 9000 } }"#,
        )
        .unwrap();

        assert_eq!(config.terrain.world_seed, Some(42));
        assert_eq!(config.terrain.height_noise.octaves, 2);
        assert_eq!(config.terrain.height_noise.persistence, 0.5);
        assert_eq!(config.terrain.chunk_size, 16);
        assert_eq!(config.network.tcp_port, 9000);
        assert_eq!(config.network.udp_port, 7778);
    }

    #[test]
    fn test_malformed_json_is_a_config_error() {
        let result = RealmConfig::from_json_str("{ terrain: ");
        assert_matches!(result, Err(RealmError::Config(_)));
    }

    #[test]
    fn test_zero_chunk_dimensions_are_rejected() {
        assert_matches!(
            RealmConfig::from_json_str(r#"{ "terrain": { "chunk_size": 0 } }"#),
            Err(RealmError::InvalidConfig(_))
        );
        assert_matches!(
            RealmConfig::from_json_str(r#"{ "terrain": { "chunk_height": 0 } }"#),
            Err(RealmError::InvalidConfig(_))
        );
    }

    #[test]
    fn test_inverted_ground_range_is_rejected() {
        let result = RealmConfig::from_json_str(
            r#"{ "terrain": { "ground_min": 40.0, "ground_max": 10.0 } }"#,
        );
        assert_matches!(result, Err(RealmError::InvalidConfig(_)));
    }

    #[test]
    fn test_frame_limit_must_fit_the_largest_chunk() {
        // 16 * 64 * 16 voxels, two bytes each in the worst case, plus the header.
        let needed = 2 * 16 * 64 * 16 + 22;
        let too_small = format!(r#"{{ "network": {{ "max_frame_len": {} }} }}"#, needed - 1);
        assert_matches!(
            RealmConfig::from_json_str(&too_small),
            Err(RealmError::InvalidConfig(_))
        );
        let exact = format!(r#"{{ "network": {{ "max_frame_len": {} }} }}"#, needed);
        assert!(RealmConfig::from_json_str(&exact).is_ok());
    }

    #[test]
    fn test_worst_case_chunk_frame_matches_the_bound() {
        use crate::network::protocol::Packet;
        use crate::voxels::block::block_type::VoxelType;
        use crate::voxels::chunk::{ChunkCoords, ChunkData};

        let settings = TerrainSettings {
            chunk_size: 4,
            chunk_height: 3,
            ..TerrainSettings::default()
        };
        let mut chunk = ChunkData::empty(ChunkCoords::new(-2, 5), 4, 3, 4);
        for index in (0..chunk.len()).step_by(2) {
            let position = chunk.local_position(index);
            chunk.set_voxel(position.x as i32, position.y as i32, position.z as i32, VoxelType::Stone);
        }
        let encoded = Packet::ChunkInfo(chunk).encode().unwrap();
        assert_eq!(encoded.len() as u64, settings.max_chunk_frame_len());
    }
}
