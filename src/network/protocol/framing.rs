//! Length-prefixed framing for the stream transport.
//!
//! A frame is a big-endian `u32` byte count followed by exactly that many bytes of one
//! encoded [`Packet`]. Datagrams are never framed.

use std::io::{self, ErrorKind, Read, Write};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use super::{Packet, ProtocolError, Result};

/// Reads one frame.
///
/// # Returns
/// `Ok(None)` when the peer closed the stream cleanly, i.e. the read of the length
/// prefix returned zero bytes. A stream that ends anywhere else is an error.
pub fn read_frame<R: Read>(reader: &mut R, max_len: u32) -> Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        match reader.read(&mut prefix[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                let err = io::Error::new(ErrorKind::UnexpectedEof, "stream ended inside a length prefix");
                return Err(err.into());
            }
            Ok(read) => filled += read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }

    let len = BigEndian::read_u32(&prefix);
    if len > max_len {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(Some(payload))
}

pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "payload does not fit a u32 prefix"))?;
    writer.write_u32::<BigEndian>(len)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Encodes and frames one packet.
pub fn send_packet<W: Write>(writer: &mut W, packet: &Packet) -> Result<()> {
    write_frame(writer, &packet.encode()?)
}
