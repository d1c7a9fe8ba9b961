use byteorder::{BigEndian, ByteOrder};

use super::{ProtocolError, Result};

/// Packet buffer with a read cursor.
///
/// Writers append to the end, readers consume from the cursor. All multi-byte values
/// are in network (big-endian) order.
#[derive(Debug, Default)]
pub struct PacketBuffer {
    buffer: Vec<u8>,
    cursor: usize,
}

impl PacketBuffer {
    /// An empty buffer for writing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps received bytes for reading. The cursor starts at 0.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            buffer: bytes.to_vec(),
            cursor: 0,
        }
    }

    /// The written bytes, read cursor discarded.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Bytes not yet consumed by a read.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// Consumes `needed` bytes, or fails with `Truncated` without moving the cursor.
    fn take(&mut self, needed: usize) -> Result<&[u8]> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(ProtocolError::Truncated { needed, remaining });
        }
        let start = self.cursor;
        self.cursor += needed;
        Ok(&self.buffer[start..self.cursor])
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// # Errors
    /// `Truncated` when the buffer is exhausted. The same holds for every `read_*`.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut bytes = [0; 2];
        BigEndian::write_u16(&mut bytes, value);
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut bytes = [0; 4];
        BigEndian::write_i32(&mut bytes, value);
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    /// Writes the IEEE 754 bit pattern, so NaN payloads survive the trip.
    pub fn write_f32(&mut self, value: f32) {
        let mut bytes = [0; 4];
        BigEndian::write_f32(&mut bytes, value);
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(BigEndian::read_f32(self.take(4)?))
    }

    /// Appends raw bytes with no length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Reads exactly `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        Ok(self.take(len)?.to_vec())
    }

    /// Writes a `u16` byte length followed by the UTF-8 bytes.
    ///
    /// # Errors
    /// `StringTooLong` for strings over 65535 bytes.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        let len = u16::try_from(bytes.len()).map_err(|_| ProtocolError::StringTooLong(bytes.len()))?;
        self.write_u16(len);
        self.write_bytes(bytes);
        Ok(())
    }

    /// Reads a length-prefixed string.
    ///
    /// # Errors
    /// `Truncated` if the declared length runs past the end, `InvalidUtf8` if the bytes
    /// are not valid UTF-8.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Fails if anything is left after a complete payload.
    pub fn finish(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            count => Err(ProtocolError::TrailingBytes(count)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_integers_are_big_endian() {
        let mut buffer = PacketBuffer::new();
        buffer.write_u16(0x0102);
        buffer.write_i32(-2);
        buffer.write_f32(1.0);
        assert_eq!(
            buffer.as_bytes(),
            &[0x01, 0x02, 0xFF, 0xFF, 0xFF, 0xFE, 0x3F, 0x80, 0x00, 0x00]
        );
    }

    #[test]
    fn test_reads_consume_in_order() {
        let mut buffer = PacketBuffer::from_bytes(&[0x00, 0x05, 0x00, 0x00, 0x00, 0x07, 0x09]);
        assert_eq!(buffer.read_u16().unwrap(), 5);
        assert_eq!(buffer.read_i32().unwrap(), 7);
        assert_eq!(buffer.remaining(), 1);
        assert_eq!(buffer.read_u8().unwrap(), 9);
        assert!(buffer.finish().is_ok());
    }

    #[test]
    fn test_truncated_read_reports_sizes() {
        let mut buffer = PacketBuffer::from_bytes(&[0x00, 0x01, 0x02]);
        assert_matches!(
            buffer.read_i32(),
            Err(ProtocolError::Truncated {
                needed: 4,
                remaining: 3
            })
        );
    }

    #[test]
    fn test_string_codec() {
        let mut buffer = PacketBuffer::new();
        buffer.write_string("héllo").unwrap();
        assert_eq!(&buffer.as_bytes()[..2], &[0x00, 0x06]);

        let mut reader = PacketBuffer::from_bytes(buffer.as_bytes());
        assert_eq!(reader.read_string().unwrap(), "héllo");
    }

    #[test]
    fn test_string_rejects_invalid_utf8() {
        let mut buffer = PacketBuffer::from_bytes(&[0x00, 0x02, 0xC3, 0x28]);
        assert_matches!(buffer.read_string(), Err(ProtocolError::InvalidUtf8));
    }

    #[test]
    fn test_string_length_must_fit_u16() {
        let long = "a".repeat(u16::MAX as usize + 1);
        let mut buffer = PacketBuffer::new();
        assert_matches!(
            buffer.write_string(&long),
            Err(ProtocolError::StringTooLong(65536))
        );
        assert_eq!(buffer.as_bytes().len(), 0);
    }

    #[test]
    fn test_string_length_beyond_payload_is_truncated() {
        let mut buffer = PacketBuffer::from_bytes(&[0x00, 0x09, b'a']);
        assert_matches!(buffer.read_string(), Err(ProtocolError::Truncated { .. }));
    }

    #[test]
    fn test_trailing_bytes_are_reported() {
        let buffer = PacketBuffer::from_bytes(&[1, 2, 3]);
        assert_matches!(buffer.finish(), Err(ProtocolError::TrailingBytes(3)));
    }
}
