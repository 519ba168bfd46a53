//! MySQL packet reading utilities.
//!
//! [`PacketReader`] is a cursor over exactly one packet's payload inside a
//! buffer owned by the transport. Every read is checked against the packet
//! limit, not the buffer end, so a malformed field can never spill into the
//! next packet.

use mysqlwire_core::{Error, ProtocolError, ProtocolErrorKind, Result};

use crate::codec;
use crate::protocol::{MAX_PACKET_SIZE, PacketHeader, marker};

/// Length-encoded NULL sentinel.
const LENENC_NULL: u8 = 0xFB;

/// A reader for one MySQL packet.
///
/// Borrows the connection buffer; `offset` only moves forward and never
/// passes `limit`.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    start: usize,
    offset: usize,
    limit: usize,
    payload_length: usize,
    sequence_id: u8,
}

impl<'a> PacketReader<'a> {
    /// Parse the packet header at `offset` and scope a reader to its payload.
    ///
    /// Fails with a protocol error when the header itself is cut off, and
    /// with a buffer underflow when the buffer holds fewer payload bytes
    /// than the header declares.
    pub fn create(data: &'a [u8], offset: usize) -> Result<Self> {
        let header_bytes: [u8; PacketHeader::SIZE] =
            codec::read_bytes(data, offset, PacketHeader::SIZE)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| {
                    Error::protocol(
                        ProtocolErrorKind::InvalidHeader,
                        format!(
                            "Packet header at offset {} needs {} bytes, buffer holds {}",
                            offset,
                            PacketHeader::SIZE,
                            data.len().saturating_sub(offset)
                        ),
                    )
                })?;
        let header = PacketHeader::from_bytes(&header_bytes);

        let start = offset + PacketHeader::SIZE;
        let payload_length = header.payload_length as usize;
        let available = data.len() - start;
        if available < payload_length {
            return Err(Error::underflow(payload_length, available, start));
        }

        tracing::trace!(
            offset,
            payload_length,
            sequence_id = header.sequence_id,
            "Framed packet"
        );

        Ok(Self {
            data,
            start,
            offset: start,
            limit: start + payload_length,
            payload_length,
            sequence_id: header.sequence_id,
        })
    }

    /// Create a reader over an already-deframed payload.
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            data: payload,
            start: 0,
            offset: 0,
            limit: payload.len(),
            payload_length: payload.len(),
            sequence_id: 0,
        }
    }

    /// Create a reader for the packet that starts where this one ends.
    ///
    /// Only sequences readers; continuation payloads are not merged.
    pub fn create_next_reader(&self) -> Result<PacketReader<'a>> {
        PacketReader::create(self.data, self.limit)
    }

    /// Does the logical message continue in the next packet?
    pub fn is_continued(&self) -> bool {
        self.payload_length == MAX_PACKET_SIZE
    }

    /// Sequence id from the packet header.
    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    /// Declared payload length.
    pub fn payload_length(&self) -> usize {
        self.payload_length
    }

    /// Bytes consumed from this packet's payload so far.
    pub fn position(&self) -> usize {
        self.offset - self.start
    }

    /// Absolute buffer offset one past the payload.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Get remaining bytes in the packet.
    pub fn remaining(&self) -> usize {
        self.limit - self.offset
    }

    /// Check if we've reached the end of the packet.
    pub fn is_empty(&self) -> bool {
        self.offset == self.limit
    }

    /// The packet's payload, independent of the cursor.
    pub fn payload(&self) -> &'a [u8] {
        &self.data[self.start..self.limit]
    }

    fn verify(&self, count: usize) -> Result<()> {
        if self.remaining() < count {
            return Err(Error::underflow(count, self.remaining(), self.offset));
        }
        Ok(())
    }

    /// The buffer cut off at the packet limit.
    fn window(&self) -> &'a [u8] {
        &self.data[..self.limit]
    }

    fn take<T>(
        &mut self,
        count: usize,
        read: impl FnOnce(&'a [u8], usize) -> Option<T>,
    ) -> Result<T> {
        self.verify(count)?;
        let value = read(self.window(), self.offset)
            .ok_or_else(|| Error::underflow(count, self.remaining(), self.offset))?;
        self.offset += count;
        Ok(value)
    }

    /// Peek at the next byte without advancing.
    pub fn peek(&self) -> Option<u8> {
        codec::read_u8(self.window(), self.offset)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.take(1, codec::read_u8)
    }

    /// Read a signed byte.
    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_u8().map(|b| i8::from_le_bytes([b]))
    }

    /// Read a u16 (little-endian).
    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.take(2, codec::read_u16_le)
    }

    /// Read an i16 (little-endian).
    pub fn read_i16_le(&mut self) -> Result<i16> {
        self.take(2, codec::read_i16_le)
    }

    /// Read a u24 (little-endian, 3 bytes).
    pub fn read_u24_le(&mut self) -> Result<u32> {
        self.take(3, codec::read_u24_le)
    }

    /// Read a u32 (little-endian).
    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.take(4, codec::read_u32_le)
    }

    /// Read an i32 (little-endian).
    pub fn read_i32_le(&mut self) -> Result<i32> {
        self.take(4, codec::read_i32_le)
    }

    /// Read a u64 (little-endian).
    pub fn read_u64_le(&mut self) -> Result<u64> {
        self.take(8, codec::read_u64_le)
    }

    /// Read an i64 (little-endian).
    pub fn read_i64_le(&mut self) -> Result<i64> {
        self.take(8, codec::read_i64_le)
    }

    /// Read a fixed number of bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len, |buf, offset| codec::read_bytes(buf, offset, len))
    }

    /// Read a fixed number of bytes into an owned buffer.
    pub fn read_bytes_owned(&mut self, len: usize) -> Result<Vec<u8>> {
        self.read_bytes(len).map(<[u8]>::to_vec)
    }

    /// Read a fixed-length string.
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        self.take(len, |buf, offset| codec::read_string(buf, offset, len))
    }

    /// Skip a number of bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.verify(n)?;
        self.offset += n;
        Ok(())
    }

    /// Read bytes up to the next NUL, consuming the terminator.
    ///
    /// A terminator outside the packet is an underflow.
    pub fn read_null_bytes(&mut self) -> Result<&'a [u8]> {
        let (bytes, consumed) = codec::read_null_terminated(self.window(), self.offset)
            .ok_or_else(|| Error::underflow(self.remaining() + 1, self.remaining(), self.offset))?;
        self.offset += consumed;
        Ok(bytes)
    }

    /// Read a null-terminated string.
    pub fn read_null_string(&mut self) -> Result<String> {
        self.read_null_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Read remaining bytes.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.offset..self.limit];
        self.offset = self.limit;
        rest
    }

    /// Read remaining data as a string.
    pub fn read_rest_string(&mut self) -> String {
        String::from_utf8_lossy(self.read_rest()).into_owned()
    }

    /// Read a length-encoded integer.
    ///
    /// MySQL uses a variable-length integer encoding:
    /// - 0x00-0xFA: 1-byte value
    /// - 0xFB: NULL
    /// - 0xFC: 2-byte value follows
    /// - 0xFD: 3-byte value follows
    /// - 0xFE: 8-byte value follows
    /// - 0xFF: undefined, a protocol error
    pub fn read_lenenc_int(&mut self) -> Result<Option<u64>> {
        let at = self.offset;
        let first = self.read_u8()?;
        match first {
            0x00..=0xFA => Ok(Some(u64::from(first))),
            LENENC_NULL => Ok(None),
            0xFC => self.read_u16_le().map(|v| Some(u64::from(v))),
            0xFD => self.read_u24_le().map(|v| Some(u64::from(v))),
            0xFE => self.read_u64_le().map(Some),
            0xFF => Err(Error::Protocol(
                ProtocolError::new(
                    ProtocolErrorKind::InvalidLengthEncoding,
                    format!("Undefined length-encoded integer sentinel 0xFF at offset {at}"),
                )
                .with_raw_data(vec![first]),
            )),
        }
    }

    /// Read a length that must not be NULL and must fit in this packet.
    fn read_lenenc_len(&mut self) -> Result<usize> {
        let at = self.offset;
        let len = self.read_lenenc_int()?.ok_or_else(|| {
            Error::protocol(
                ProtocolErrorKind::UnexpectedNull,
                format!("NULL length-encoded length at offset {at}"),
            )
        })?;
        match usize::try_from(len) {
            Ok(len) if len <= self.remaining() => Ok(len),
            _ => Err(Error::underflow(
                usize::try_from(len).unwrap_or(usize::MAX),
                self.remaining(),
                self.offset,
            )),
        }
    }

    /// Read a length-encoded string.
    pub fn read_lenenc_string(&mut self) -> Result<String> {
        let len = self.read_lenenc_len()?;
        self.read_string(len)
    }

    /// Read a length-encoded byte slice without copying.
    pub fn read_lenenc_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_lenenc_len()?;
        self.read_bytes(len)
    }

    /// Read a length-encoded byte slice into an owned buffer.
    pub fn read_lenenc_bytes_owned(&mut self) -> Result<Vec<u8>> {
        self.read_lenenc_bytes().map(<[u8]>::to_vec)
    }

    /// Read a length-encoded value that may be NULL (text row cells).
    pub fn read_lenenc_nullable_bytes(&mut self) -> Result<Option<&'a [u8]>> {
        if self.peek() == Some(LENENC_NULL) {
            self.offset += 1;
            return Ok(None);
        }
        self.read_lenenc_bytes().map(Some)
    }

    /// Is the next byte an OK marker?
    ///
    /// Only the 0x00 form; the 0xFE terminator used with
    /// `CLIENT_DEPRECATE_EOF` needs the capability flags, see
    /// [`PacketType::from_first_byte`](crate::protocol::PacketType::from_first_byte).
    pub fn peek_is_ok(&self) -> bool {
        self.peek() == Some(marker::OK)
    }

    /// Is the next byte an ERR marker?
    pub fn peek_is_error(&self) -> bool {
        self.peek() == Some(marker::ERR)
    }

    /// Is the next byte an EOF marker on a short packet?
    ///
    /// Looks at the bytes only. Once `CLIENT_DEPRECATE_EOF` is negotiated
    /// the same packet is an OK terminator, which
    /// [`packet_type`](Self::packet_type) and [`classify`](Self::classify)
    /// report when given the capability flags.
    pub fn peek_is_eof(&self) -> bool {
        self.peek() == Some(marker::EOF) && self.remaining() < 9
    }

    /// Turn an ERR packet into [`Error::Server`]; leave other packets alone.
    pub fn raise_if_error(&mut self, capabilities: u32) -> Result<()> {
        if self.peek_is_error() {
            let err = self.parse_err_packet(capabilities)?;
            tracing::debug!(code = err.error_code, "Server returned ERR packet");
            return Err(Error::Server(err.into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(seq: u8, payload: &[u8]) -> Vec<u8> {
        let mut data = PacketHeader {
            payload_length: u32::try_from(payload.len()).unwrap(),
            sequence_id: seq,
        }
        .to_bytes()
        .to_vec();
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_create_scopes_to_payload() {
        let mut data = framed(2, &[1, 2, 3, 4, 5]);
        data.extend_from_slice(&[0xAA, 0xBB]);
        let mut reader = PacketReader::create(&data, 0).unwrap();
        assert_eq!(reader.sequence_id(), 2);
        assert_eq!(reader.payload_length(), 5);
        assert_eq!(reader.remaining(), 5);
        assert_eq!(reader.limit(), 9);
        assert_eq!(reader.read_bytes(5).unwrap(), &[1, 2, 3, 4, 5]);
        assert!(reader.is_empty());
        assert!(matches!(reader.read_u8(), Err(Error::BufferUnderflow(_))));
    }

    #[test]
    fn test_create_short_header() {
        let err = PacketReader::create(&[0x05, 0x00], 0).unwrap_err();
        assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::InvalidHeader));
    }

    #[test]
    fn test_create_truncated_payload() {
        let data = [0x05, 0x00, 0x00, 0x00, 1, 2];
        let err = PacketReader::create(&data, 0).unwrap_err();
        match err {
            Error::BufferUnderflow(u) => {
                assert_eq!(u.needed, 5);
                assert_eq!(u.remaining, 2);
            }
            other => panic!("expected underflow, got {other:?}"),
        }
    }

    #[test]
    fn test_read_u8() {
        let mut reader = PacketReader::new(&[0x42, 0x43]);
        assert_eq!(reader.read_u8().unwrap(), 0x42);
        assert_eq!(reader.read_u8().unwrap(), 0x43);
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn test_read_fixed_width() {
        let mut reader = PacketReader::new(&[0x34, 0x12]);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);

        let mut reader = PacketReader::new(&[0x56, 0x34, 0x12]);
        assert_eq!(reader.read_u24_le().unwrap(), 0x0012_3456);

        let mut reader = PacketReader::new(&[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(reader.read_u32_le().unwrap(), 0x1234_5678);

        let mut reader = PacketReader::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert_eq!(reader.read_u64_le().unwrap(), 0x0807_0605_0403_0201);

        let mut reader = PacketReader::new(&[0xFF, 0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(reader.read_i8().unwrap(), -1);
        assert_eq!(reader.read_i32_le().unwrap(), -2);
    }

    #[test]
    fn test_failed_read_does_not_advance() {
        let mut reader = PacketReader::new(&[1, 2, 3]);
        assert!(reader.read_u32_le().is_err());
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_u24_le().unwrap(), 0x0003_0201);
    }

    #[test]
    fn test_zero_length_reads() {
        let mut reader = PacketReader::new(&[]);
        assert_eq!(reader.read_bytes(0).unwrap(), &[] as &[u8]);
        assert_eq!(reader.read_string(0).unwrap(), "");
        reader.skip(0).unwrap();
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_lenenc_int() {
        let mut reader = PacketReader::new(&[0x42]);
        assert_eq!(reader.read_lenenc_int().unwrap(), Some(0x42));

        let mut reader = PacketReader::new(&[0xFC, 0x34, 0x12]);
        assert_eq!(reader.read_lenenc_int().unwrap(), Some(0x1234));

        let mut reader = PacketReader::new(&[0xFD, 0x56, 0x34, 0x12]);
        assert_eq!(reader.read_lenenc_int().unwrap(), Some(0x0012_3456));

        let mut reader = PacketReader::new(&[0xFE, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert_eq!(reader.read_lenenc_int().unwrap(), Some(0x0807_0605_0403_0201));

        let mut reader = PacketReader::new(&[0xFB]);
        assert_eq!(reader.read_lenenc_int().unwrap(), None);
    }

    #[test]
    fn test_read_lenenc_int_invalid() {
        let mut reader = PacketReader::new(&[0xFF, 0x00]);
        let err = reader.read_lenenc_int().unwrap_err();
        assert_eq!(
            err.protocol_kind(),
            Some(ProtocolErrorKind::InvalidLengthEncoding)
        );
    }

    #[test]
    fn test_read_lenenc_int_truncated() {
        let mut reader = PacketReader::new(&[0xFE, 0x01, 0x02]);
        assert!(matches!(
            reader.read_lenenc_int(),
            Err(Error::BufferUnderflow(_))
        ));
    }

    #[test]
    fn test_read_lenenc_string() {
        let mut reader = PacketReader::new(&[0x05, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(reader.read_lenenc_string().unwrap(), "hello");

        let mut reader = PacketReader::new(&[0x03, b'd', b'e', b'f', 0x01]);
        assert_eq!(reader.read_lenenc_bytes().unwrap(), b"def");
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn test_read_lenenc_string_null() {
        let mut reader = PacketReader::new(&[0xFB, b'x']);
        let err = reader.read_lenenc_string().unwrap_err();
        assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::UnexpectedNull));
    }

    #[test]
    fn test_read_lenenc_string_too_long() {
        let mut reader = PacketReader::new(&[0x0A, b'a', b'b']);
        assert!(matches!(
            reader.read_lenenc_bytes(),
            Err(Error::BufferUnderflow(_))
        ));
    }

    #[test]
    fn test_read_lenenc_nullable() {
        let mut reader = PacketReader::new(&[0xFB, 0x01, b'7']);
        assert_eq!(reader.read_lenenc_nullable_bytes().unwrap(), None);
        assert_eq!(reader.read_lenenc_nullable_bytes().unwrap(), Some(&b"7"[..]));
    }

    #[test]
    fn test_read_null_string() {
        let mut reader = PacketReader::new(b"hello\0world\0");
        assert_eq!(reader.read_null_string().unwrap(), "hello");
        assert_eq!(reader.read_null_string().unwrap(), "world");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_null_string_stops_at_packet_limit() {
        // The terminator belongs to the next packet.
        let mut data = framed(0, b"abc");
        data.extend_from_slice(&[0x00]);
        let mut reader = PacketReader::create(&data, 0).unwrap();
        assert!(matches!(
            reader.read_null_string(),
            Err(Error::BufferUnderflow(_))
        ));
        assert_eq!(reader.remaining(), 3);
    }

    #[test]
    fn test_read_rest() {
        let mut reader = PacketReader::new(b"\x01Access denied");
        reader.skip(1).unwrap();
        assert_eq!(reader.read_rest_string(), "Access denied");
        assert!(reader.is_empty());
        assert_eq!(reader.read_rest(), b"");
    }

    #[test]
    fn test_create_next_reader() {
        let mut data = framed(0, &[0xAA, 0xBB]);
        data.extend(framed(1, &[0xCC]));
        let first = PacketReader::create(&data, 0).unwrap();
        let second = first.create_next_reader().unwrap();
        assert_eq!(second.sequence_id(), 1);
        assert_eq!(second.payload(), &[0xCC]);
        assert!(!first.is_continued());
        assert!(second.create_next_reader().is_err());
    }

    #[test]
    fn test_peek_markers() {
        let ok = PacketReader::new(&[0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]);
        assert!(ok.peek_is_ok());
        assert!(!ok.peek_is_error());

        let eof = PacketReader::new(&[0xFE, 0x00, 0x00, 0x02, 0x00]);
        assert!(eof.peek_is_eof());
        assert!(!eof.peek_is_ok());

        let long_fe = PacketReader::new(&[0xFE; 12]);
        assert!(!long_fe.peek_is_eof());

        let err = PacketReader::new(&[0xFF, 0x15, 0x04]);
        assert!(err.peek_is_error());
        assert_eq!(err.position(), 0);

        let empty = PacketReader::new(&[]);
        assert!(!empty.peek_is_ok() && !empty.peek_is_error() && !empty.peek_is_eof());
    }

    #[test]
    fn test_raise_if_error() {
        use crate::protocol::capabilities::CLIENT_PROTOCOL_41;

        let mut data = vec![0xFF, 0x15, 0x04, b'#'];
        data.extend_from_slice(b"28000");
        data.extend_from_slice(b"Access denied for user 'root'");
        let mut reader = PacketReader::new(&data);
        let err = reader.raise_if_error(CLIENT_PROTOCOL_41).unwrap_err();
        assert_eq!(err.server_code(), Some(1045));
        assert_eq!(err.sqlstate(), Some("28000"));

        let mut reader = PacketReader::new(&[0x01, 0x02]);
        reader.raise_if_error(CLIENT_PROTOCOL_41).unwrap();
        assert_eq!(reader.position(), 0);
    }
}
