//! Run-length coding of flat voxel arrays.
//!
//! Each run is two bytes, `(voxel type, count)`, with `1 <= count <= 255`. A run ends
//! when the type changes or the count would pass 255, so a long stretch of one type is
//! split across several consecutive runs.

use crate::voxels::block::block_type::VoxelType;

use super::{ProtocolError, Result};

pub const MAX_RUN: usize = u8::MAX as usize;

pub fn encode(voxels: &[VoxelType]) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut iter = voxels.iter().copied();
    let Some(mut current) = iter.next() else {
        return bytes;
    };
    let mut count: usize = 1;

    for voxel in iter {
        if voxel == current && count < MAX_RUN {
            count += 1;
        } else {
            bytes.push(current.to_byte());
            bytes.push(count as u8);
            current = voxel;
            count = 1;
        }
    }
    bytes.push(current.to_byte());
    bytes.push(count as u8);
    bytes
}

/// Replays `(type, count)` runs into a flat voxel array of exactly `expected_len` voxels.
pub fn decode(bytes: &[u8], expected_len: usize) -> Result<Vec<VoxelType>> {
    if bytes.len() % 2 != 0 {
        return Err(ProtocolError::CorruptChunk(format!(
            "odd run-length payload of {} bytes",
            bytes.len()
        )));
    }
    let max_len = (bytes.len() / 2).saturating_mul(MAX_RUN);
    if expected_len > max_len {
        return Err(ProtocolError::CorruptChunk(format!(
            "{} runs cannot cover {} voxels",
            bytes.len() / 2,
            expected_len
        )));
    }

    let mut voxels = Vec::with_capacity(expected_len);
    for run in bytes.chunks_exact(2) {
        let voxel = VoxelType::from_byte(run[0]).ok_or(ProtocolError::UnknownVoxelType(run[0]))?;
        let count = run[1] as usize;
        if count == 0 {
            return Err(ProtocolError::CorruptChunk("zero-length run".to_owned()));
        }
        if voxels.len() + count > expected_len {
            return Err(ProtocolError::CorruptChunk(format!(
                "runs overflow the expected {} voxels",
                expected_len
            )));
        }
        voxels.extend(std::iter::repeat(voxel).take(count));
    }

    if voxels.len() != expected_len {
        return Err(ProtocolError::CorruptChunk(format!(
            "runs cover {} of {} voxels",
            voxels.len(),
            expected_len
        )));
    }
    Ok(voxels)
}
