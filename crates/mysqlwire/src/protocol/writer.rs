//! Outgoing payload buffer and packet framing.
//!
//! [`PacketWriter`] appends fields to a growable payload; fixed-width
//! integers go through the [`codec`](crate::codec) encoders so both sides of
//! the wire share one byte-order implementation.
//! [`build_packet_from_payload`] cuts a finished payload into framed packets.

#![allow(clippy::cast_possible_truncation)]

use crate::codec;
use crate::protocol::{MAX_PACKET_SIZE, PacketHeader};

/// Growable buffer for one logical payload.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop the contents, keeping the allocation.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Grow by `n` zero bytes and return the offset of the new region.
    fn extend_zeroed(&mut self, n: usize) -> usize {
        let at = self.buffer.len();
        self.buffer.resize(at + n, 0);
        at
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u16_le(&mut self, value: u16) {
        let at = self.extend_zeroed(2);
        let written = codec::write_u16_le(&mut self.buffer, at, value);
        debug_assert!(written);
    }

    /// Write the low 24 bits of `value`.
    pub fn write_u24_le(&mut self, value: u32) {
        let at = self.extend_zeroed(3);
        let written = codec::write_u24_le(&mut self.buffer, at, value & 0x00FF_FFFF);
        debug_assert!(written);
    }

    pub fn write_u32_le(&mut self, value: u32) {
        let at = self.extend_zeroed(4);
        let written = codec::write_u32_le(&mut self.buffer, at, value);
        debug_assert!(written);
    }

    pub fn write_u64_le(&mut self, value: u64) {
        let at = self.extend_zeroed(8);
        let written = codec::write_u64_le(&mut self.buffer, at, value);
        debug_assert!(written);
    }

    /// Write a length-encoded integer in its shortest form.
    ///
    /// Values below 251 take one byte; larger ones use the 0xFC, 0xFD or
    /// 0xFE prefix followed by 2, 3 or 8 bytes.
    pub fn write_lenenc_int(&mut self, value: u64) {
        match value {
            0..=250 => self.write_u8(value as u8),
            251..=0xFFFF => {
                self.write_u8(0xFC);
                self.write_u16_le(value as u16);
            }
            0x1_0000..=0xFF_FFFF => {
                self.write_u8(0xFD);
                self.write_u24_le(value as u32);
            }
            _ => {
                self.write_u8(0xFE);
                self.write_u64_le(value);
            }
        }
    }

    /// Length-encoded NULL (0xFB).
    pub fn write_lenenc_null(&mut self) {
        self.write_u8(0xFB);
    }

    pub fn write_lenenc_string(&mut self, s: &str) {
        self.write_lenenc_bytes(s.as_bytes());
    }

    pub fn write_lenenc_bytes(&mut self, data: &[u8]) {
        self.write_lenenc_int(data.len() as u64);
        self.write_bytes(data);
    }

    pub fn write_null_string(&mut self, s: &str) {
        self.write_null_bytes(s.as_bytes());
    }

    /// Write `data` and a NUL terminator. `data` must not contain a zero byte.
    pub fn write_null_bytes(&mut self, data: &[u8]) {
        self.write_bytes(data);
        self.write_u8(0);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Reserved / filler bytes.
    pub fn write_zeros(&mut self, count: usize) {
        self.extend_zeroed(count);
    }

    /// Frame the buffer as packets starting at `sequence_id`.
    pub fn build_packet(&self, sequence_id: u8) -> Vec<u8> {
        build_packet_from_payload(&self.buffer, sequence_id)
    }
}

/// Frame `payload` into one or more packets starting at `sequence_id`.
///
/// A chunk of exactly `MAX_PACKET_SIZE` bytes signals continuation, so a
/// payload that is a multiple of it ends with an empty packet.
pub fn build_packet_from_payload(payload: &[u8], mut sequence_id: u8) -> Vec<u8> {
    let packets = payload.len() / MAX_PACKET_SIZE + 1;
    let mut result = Vec::with_capacity(payload.len() + packets * PacketHeader::SIZE);

    let mut chunks = payload.chunks(MAX_PACKET_SIZE);
    loop {
        let chunk = chunks.next().unwrap_or_default();
        let header = PacketHeader {
            payload_length: chunk.len() as u32,
            sequence_id,
        };
        result.extend_from_slice(&header.to_bytes());
        result.extend_from_slice(chunk);
        sequence_id = sequence_id.wrapping_add(1);

        if chunk.len() < MAX_PACKET_SIZE {
            break;
        }
    }

    tracing::trace!(
        payload_length = payload.len(),
        packets,
        "Framed outgoing payload"
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PacketReader;

    #[test]
    fn test_write_u8() {
        let mut writer = PacketWriter::new();
        writer.write_u8(0x42);
        assert_eq!(writer.as_bytes(), &[0x42]);
    }

    #[test]
    fn test_write_fixed_width() {
        let mut writer = PacketWriter::new();
        writer.write_u16_le(0x1234);
        writer.write_u24_le(0x0012_3456);
        writer.write_u32_le(0x1234_5678);
        assert_eq!(
            writer.as_bytes(),
            &[0x34, 0x12, 0x56, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12]
        );

        let mut writer = PacketWriter::new();
        writer.write_u64_le(0x0807_0605_0403_0201);
        assert_eq!(
            writer.as_bytes(),
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );
    }

    #[test]
    fn test_write_u24_keeps_low_bits() {
        let mut writer = PacketWriter::new();
        writer.write_u24_le(0x0112_3456);
        assert_eq!(writer.as_bytes(), &[0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_write_appends_after_existing_bytes() {
        let mut writer = PacketWriter::new();
        writer.write_zeros(2);
        writer.write_u32_le(0xAABB_CCDD);
        writer.write_u8(1);
        assert_eq!(writer.as_bytes(), &[0, 0, 0xDD, 0xCC, 0xBB, 0xAA, 1]);
        assert_eq!(writer.len(), 7);

        writer.clear();
        assert!(writer.is_empty());
    }

    #[test]
    fn test_write_lenenc_int() {
        // 1-byte value
        let mut writer = PacketWriter::new();
        writer.write_lenenc_int(0x42);
        assert_eq!(writer.as_bytes(), &[0x42]);

        // 250 is the largest direct value
        let mut writer = PacketWriter::new();
        writer.write_lenenc_int(250);
        assert_eq!(writer.as_bytes(), &[0xFA]);

        let mut writer = PacketWriter::new();
        writer.write_lenenc_int(251);
        assert_eq!(writer.as_bytes(), &[0xFC, 0xFB, 0x00]);

        // 2-byte value
        let mut writer = PacketWriter::new();
        writer.write_lenenc_int(0x1234);
        assert_eq!(writer.as_bytes(), &[0xFC, 0x34, 0x12]);

        // 3-byte value
        let mut writer = PacketWriter::new();
        writer.write_lenenc_int(0x0012_3456);
        assert_eq!(writer.as_bytes(), &[0xFD, 0x56, 0x34, 0x12]);

        // 8-byte value
        let mut writer = PacketWriter::new();
        writer.write_lenenc_int(0x0807_0605_0403_0201);
        assert_eq!(
            writer.as_bytes(),
            &[0xFE, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );
    }

    #[test]
    fn test_write_null_string() {
        let mut writer = PacketWriter::new();
        writer.write_null_string("hello");
        assert_eq!(writer.as_bytes(), b"hello\0");
    }

    #[test]
    fn test_write_lenenc_string() {
        let mut writer = PacketWriter::new();
        writer.write_lenenc_string("hello");
        writer.write_lenenc_null();
        assert_eq!(
            writer.as_bytes(),
            &[0x05, b'h', b'e', b'l', b'l', b'o', 0xFB]
        );
    }

    #[test]
    fn test_build_packet() {
        let mut writer = PacketWriter::new();
        writer.write_bytes(b"hello");
        let packet = writer.build_packet(1);
        // Header: 05 00 00 01 + payload: hello
        assert_eq!(&packet[..4], &[0x05, 0x00, 0x00, 0x01]);
        assert_eq!(&packet[4..], b"hello");
    }

    #[test]
    fn test_build_empty_packet() {
        let packet = build_packet_from_payload(&[], 3);
        assert_eq!(packet, vec![0x00, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn test_build_split_packet() {
        let payload = vec![0xAB; MAX_PACKET_SIZE + 2];
        let packet = build_packet_from_payload(&payload, 255);
        assert_eq!(packet.len(), payload.len() + 2 * PacketHeader::SIZE);

        let first = PacketReader::create(&packet, 0).unwrap();
        assert!(first.is_continued());
        assert_eq!(first.sequence_id(), 255);

        let second = first.create_next_reader().unwrap();
        assert_eq!(second.sequence_id(), 0);
        assert_eq!(second.payload(), &[0xAB, 0xAB]);
        assert!(!second.is_continued());
    }

    #[test]
    fn test_build_exact_multiple_adds_empty_packet() {
        let payload = vec![0u8; MAX_PACKET_SIZE];
        let packet = build_packet_from_payload(&payload, 0);
        assert_eq!(packet.len(), MAX_PACKET_SIZE + 2 * PacketHeader::SIZE);
        assert_eq!(&packet[packet.len() - 4..], &[0x00, 0x00, 0x00, 0x01]);
    }
}
