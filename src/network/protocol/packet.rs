//! Packet set and per-packet codecs.
//!
//! Field order in each encoder is the wire order.

use cgmath::{Point3, Quaternion, Vector3};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::voxels::chunk::{ChunkCoords, ChunkData};

use super::{rle, PacketBuffer, ProtocolError, Result};

/// Wire tag of each packet.
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum PacketType {
    Connect = 0,
    JoinConfirm = 1,
    ChunkRequest = 2,
    ChunkInfo = 3,
    PlayerInput = 4,
    PlayerRotation = 5,
    PlayerState = 6,
}

/// One discrete input symbol. Held keys repeat every tick.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum PlayerAction {
    MoveForward = 0,
    MoveBack = 1,
    MoveLeft = 2,
    MoveRight = 3,
    Jump = 4,
    Break = 5,
    Place = 6,
}

impl PlayerAction {
    pub fn from_byte(byte: u8) -> Option<Self> {
        FromPrimitive::from_u8(byte)
    }
}

/// Authoritative snapshot of one player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerState {
    pub client_id: u16,
    pub position: Point3<f32>,
    pub body_orientation: Quaternion<f32>,
    pub head_orientation: Quaternion<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// Client handshake announcing a display name.
    Connect { name: String },
    /// Server reply assigning the session identifier.
    JoinConfirm { client_id: u16, name: String },
    ChunkRequest { coords: ChunkCoords },
    /// A whole chunk. Only square columns (`size_z == size_x`) can be sent.
    ChunkInfo(ChunkData),
    PlayerInput {
        client_id: u16,
        inputs: Vec<PlayerAction>,
    },
    /// Look deltas in degrees, not absolute angles.
    PlayerRotation { yaw_delta: f32, pitch_delta: f32 },
    PlayerState(PlayerState),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect { .. } => PacketType::Connect,
            Packet::JoinConfirm { .. } => PacketType::JoinConfirm,
            Packet::ChunkRequest { .. } => PacketType::ChunkRequest,
            Packet::ChunkInfo(_) => PacketType::ChunkInfo,
            Packet::PlayerInput { .. } => PacketType::PlayerInput,
            Packet::PlayerRotation { .. } => PacketType::PlayerRotation,
            Packet::PlayerState(_) => PacketType::PlayerState,
        }
    }

    /// Serialises the tag and payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = PacketBuffer::new();
        buffer.write_u16(self.packet_type() as u16);

        match self {
            Packet::Connect { name } => buffer.write_string(name)?,
            Packet::JoinConfirm { client_id, name } => {
                buffer.write_u16(*client_id);
                buffer.write_string(name)?;
            }
            Packet::ChunkRequest { coords } => write_coords(&mut buffer, *coords),
            Packet::ChunkInfo(chunk) => write_chunk(&mut buffer, chunk)?,
            Packet::PlayerInput { client_id, inputs } => {
                let count = u16::try_from(inputs.len()).map_err(|_| {
                    ProtocolError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "too many inputs for one packet",
                    ))
                })?;
                buffer.write_u16(*client_id);
                buffer.write_u16(count);
                for action in inputs {
                    buffer.write_u8(*action as u8);
                }
            }
            Packet::PlayerRotation {
                yaw_delta,
                pitch_delta,
            } => {
                buffer.write_f32(*yaw_delta);
                buffer.write_f32(*pitch_delta);
            }
            Packet::PlayerState(state) => {
                buffer.write_u16(state.client_id);
                buffer.write_f32(state.position.x);
                buffer.write_f32(state.position.y);
                buffer.write_f32(state.position.z);
                write_quaternion(&mut buffer, state.body_orientation);
                write_quaternion(&mut buffer, state.head_orientation);
            }
        }

        Ok(buffer.into_bytes())
    }

    /// Parses one complete packet. Leftover bytes after the payload are an error.
    pub fn decode(bytes: &[u8]) -> Result<Packet> {
        let mut buffer = PacketBuffer::from_bytes(bytes);
        let tag = buffer.read_u16()?;
        let packet_type: PacketType =
            FromPrimitive::from_u16(tag).ok_or(ProtocolError::UnknownPacketType(tag))?;

        let packet = match packet_type {
            PacketType::Connect => Packet::Connect {
                name: buffer.read_string()?,
            },
            PacketType::JoinConfirm => Packet::JoinConfirm {
                client_id: buffer.read_u16()?,
                name: buffer.read_string()?,
            },
            PacketType::ChunkRequest => Packet::ChunkRequest {
                coords: read_coords(&mut buffer)?,
            },
            PacketType::ChunkInfo => Packet::ChunkInfo(read_chunk(&mut buffer)?),
            PacketType::PlayerInput => {
                let client_id = buffer.read_u16()?;
                let count = buffer.read_u16()? as usize;
                let inputs = buffer
                    .read_bytes(count)?
                    .into_iter()
                    .map(|byte| PlayerAction::from_byte(byte).ok_or(ProtocolError::InvalidAction(byte)))
                    .collect::<Result<Vec<_>>>()?;
                Packet::PlayerInput { client_id, inputs }
            }
            PacketType::PlayerRotation => Packet::PlayerRotation {
                yaw_delta: buffer.read_f32()?,
                pitch_delta: buffer.read_f32()?,
            },
            PacketType::PlayerState => Packet::PlayerState(PlayerState {
                client_id: buffer.read_u16()?,
                position: Point3::new(buffer.read_f32()?, buffer.read_f32()?, buffer.read_f32()?),
                body_orientation: read_quaternion(&mut buffer)?,
                head_orientation: read_quaternion(&mut buffer)?,
            }),
        };

        buffer.finish()?;
        Ok(packet)
    }
}

fn write_coords(buffer: &mut PacketBuffer, coords: ChunkCoords) {
    buffer.write_i32(coords.x);
    buffer.write_i32(coords.z);
}

fn read_coords(buffer: &mut PacketBuffer) -> Result<ChunkCoords> {
    Ok(ChunkCoords::new(buffer.read_i32()?, buffer.read_i32()?))
}

// (x, y, z, w)
fn write_quaternion(buffer: &mut PacketBuffer, quaternion: Quaternion<f32>) {
    buffer.write_f32(quaternion.v.x);
    buffer.write_f32(quaternion.v.y);
    buffer.write_f32(quaternion.v.z);
    buffer.write_f32(quaternion.s);
}

fn read_quaternion(buffer: &mut PacketBuffer) -> Result<Quaternion<f32>> {
    let v = Vector3::new(buffer.read_f32()?, buffer.read_f32()?, buffer.read_f32()?);
    let s = buffer.read_f32()?;
    Ok(Quaternion::from_sv(s, v))
}

fn write_chunk(buffer: &mut PacketBuffer, chunk: &ChunkData) -> Result<()> {
    if chunk.size_z() != chunk.size_x() {
        return Err(ProtocolError::CorruptChunk(format!(
            "chunk columns must be square, got {}x{}",
            chunk.size_x(),
            chunk.size_z()
        )));
    }
    let size = |value: usize| {
        i32::try_from(value)
            .map_err(|_| ProtocolError::CorruptChunk(format!("dimension {} overflows i32", value)))
    };
    let runs = rle::encode(chunk.voxels());

    write_coords(buffer, chunk.coords());
    buffer.write_i32(size(chunk.size_x())?);
    buffer.write_i32(size(chunk.size_y())?);
    buffer.write_i32(size(runs.len())?);
    buffer.write_bytes(&runs);
    Ok(())
}

fn read_chunk(buffer: &mut PacketBuffer) -> Result<ChunkData> {
    let coords = read_coords(buffer)?;
    let size_x = buffer.read_i32()?;
    let size_y = buffer.read_i32()?;
    let run_bytes = buffer.read_i32()?;

    if size_x <= 0 || size_y <= 0 {
        return Err(ProtocolError::CorruptChunk(format!(
            "invalid dimensions {}x{}",
            size_x, size_y
        )));
    }
    let run_bytes = usize::try_from(run_bytes)
        .map_err(|_| ProtocolError::CorruptChunk(format!("negative run length {}", run_bytes)))?;
    let (size_x, size_y) = (size_x as usize, size_y as usize);
    let expected = size_x
        .checked_mul(size_y)
        .and_then(|area| area.checked_mul(size_x))
        .ok_or_else(|| ProtocolError::CorruptChunk("dimensions overflow".to_owned()))?;

    let runs = buffer.read_bytes(run_bytes)?;
    let voxels = rle::decode(&runs, expected)?;
    ChunkData::from_voxels(coords, size_x, size_y, size_x, voxels)
        .ok_or_else(|| ProtocolError::CorruptChunk("voxel count mismatch".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxels::block::block_type::VoxelType;
    use assert_matches::assert_matches;
    use cgmath::One;

    fn sample_chunk() -> ChunkData {
        let mut chunk = ChunkData::empty(ChunkCoords::new(-2, 5), 4, 3, 4);
        chunk.set_voxel(0, 0, 0, VoxelType::Stone);
        chunk.set_voxel(3, 2, 3, VoxelType::Grass);
        chunk.set_voxel(1, 1, 2, VoxelType::Water);
        chunk
    }

    #[test]
    fn test_envelope_layout() {
        let bytes = Packet::ChunkRequest {
            coords: ChunkCoords::new(2, -3),
        }
        .encode()
        .unwrap();
        assert_eq!(
            bytes,
            vec![0x00, 0x02, 0x00, 0x00, 0x00, 0x02, 0xFF, 0xFF, 0xFF, 0xFD]
        );
    }

    #[test]
    fn test_join_confirm_layout() {
        let bytes = Packet::JoinConfirm {
            client_id: 7,
            name: "ab".to_owned(),
        }
        .encode()
        .unwrap();
        assert_eq!(bytes, vec![0x00, 0x01, 0x00, 0x07, 0x00, 0x02, b'a', b'b']);
    }

    #[test]
    fn test_player_state_quaternion_order() {
        let state = PlayerState {
            client_id: 1,
            position: Point3::new(1.0, 2.0, 3.0),
            body_orientation: Quaternion::new(4.0, 5.0, 6.0, 7.0),
            head_orientation: Quaternion::one(),
        };
        let bytes = Packet::PlayerState(state).encode().unwrap();
        assert_eq!(bytes.len(), 2 + 2 + 12 + 16 + 16);

        let mut buffer = PacketBuffer::from_bytes(&bytes[16..]);
        let body: Vec<f32> = (0..4).map(|_| buffer.read_f32().unwrap()).collect();
        assert_eq!(body, vec![5.0, 6.0, 7.0, 4.0]);

        assert_eq!(Packet::decode(&bytes).unwrap(), Packet::PlayerState(state));
    }

    #[test]
    fn test_chunk_info_carries_position_and_voxels() {
        let chunk = sample_chunk();
        let bytes = Packet::ChunkInfo(chunk.clone()).encode().unwrap();

        let decoded = Packet::decode(&bytes).unwrap();
        assert_matches!(decoded, Packet::ChunkInfo(ref received) if *received == chunk);
        if let Packet::ChunkInfo(received) = decoded {
            assert_eq!(received.position(), cgmath::Point2::new(-8, 20));
            assert_eq!(received.get_voxel(1, 1, 2), VoxelType::Water);
        }
    }

    #[test]
    fn test_player_input_keeps_duplicates() {
        let packet = Packet::PlayerInput {
            client_id: 3,
            inputs: vec![PlayerAction::Jump, PlayerAction::Jump, PlayerAction::Place],
        };
        let bytes = packet.encode().unwrap();
        assert_eq!(&bytes[2..], &[0x00, 0x03, 0x00, 0x03, 4, 4, 6]);
        assert_eq!(Packet::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_unknown_tag_is_a_decode_fault() {
        assert_matches!(
            Packet::decode(&[0x00, 0x2A, 0x00]),
            Err(ProtocolError::UnknownPacketType(42))
        );
        assert_matches!(Packet::decode(&[0x00]), Err(ProtocolError::Truncated { .. }));
    }

    #[test]
    fn test_unknown_action_is_a_decode_fault() {
        assert_matches!(
            Packet::decode(&[0x00, 0x04, 0x00, 0x01, 0x00, 0x01, 0x09]),
            Err(ProtocolError::InvalidAction(9))
        );
    }

    #[test]
    fn test_truncated_chunk_info_is_rejected() {
        let mut bytes = Packet::ChunkInfo(sample_chunk()).encode().unwrap();

        // Drop the last run and patch the declared byte count so only the voxel
        // count is wrong.
        bytes.truncate(bytes.len() - 2);
        let declared = (bytes.len() - 22) as i32;
        bytes[18..22].copy_from_slice(&declared.to_be_bytes());
        assert_matches!(Packet::decode(&bytes), Err(ProtocolError::CorruptChunk(_)));

        let short = Packet::ChunkInfo(sample_chunk()).encode().unwrap();
        assert_matches!(
            Packet::decode(&short[..short.len() - 1]),
            Err(ProtocolError::Truncated { .. })
        );
    }

    #[test]
    fn test_chunk_info_rejects_bad_dimensions() {
        let mut buffer = PacketBuffer::new();
        buffer.write_u16(PacketType::ChunkInfo as u16);
        buffer.write_i32(0);
        buffer.write_i32(0);
        buffer.write_i32(-4);
        buffer.write_i32(4);
        buffer.write_i32(0);
        assert_matches!(
            Packet::decode(buffer.as_bytes()),
            Err(ProtocolError::CorruptChunk(_))
        );
    }

    #[test]
    fn test_non_square_chunks_cannot_be_sent() {
        let chunk = ChunkData::empty(ChunkCoords::new(0, 0), 4, 4, 2);
        assert_matches!(
            Packet::ChunkInfo(chunk).encode(),
            Err(ProtocolError::CorruptChunk(_))
        );
    }

    #[test]
    fn test_trailing_bytes_are_a_decode_fault() {
        let mut bytes = Packet::Connect {
            name: "steve".to_owned(),
        }
        .encode()
        .unwrap();
        bytes.push(0);
        assert_matches!(Packet::decode(&bytes), Err(ProtocolError::TrailingBytes(1)));
    }
}
