//! Primitive little-endian byte codec.
//!
//! Stateless helpers over `(buffer, offset)`. Readers return `None` when the
//! requested bytes are not inside `buf`; writers return `false` when the
//! value does not fit. Neither ever panics, so callers can apply their own
//! bounds policy on top.

fn array_at<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    buf.get(offset..end)?.try_into().ok()
}

/// Read one byte.
pub fn read_u8(buf: &[u8], offset: usize) -> Option<u8> {
    buf.get(offset).copied()
}

/// Read a u16 (little-endian).
pub fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    array_at(buf, offset).map(u16::from_le_bytes)
}

/// Read an i16 (little-endian).
pub fn read_i16_le(buf: &[u8], offset: usize) -> Option<i16> {
    array_at(buf, offset).map(i16::from_le_bytes)
}

/// Read an unsigned 3-byte integer: `b0 | b1 << 8 | b2 << 16`.
pub fn read_u24_le(buf: &[u8], offset: usize) -> Option<u32> {
    let [b0, b1, b2] = array_at::<3>(buf, offset)?;
    Some(u32::from(b0) | (u32::from(b1) << 8) | (u32::from(b2) << 16))
}

/// Read a u32 (little-endian).
pub fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    array_at(buf, offset).map(u32::from_le_bytes)
}

/// Read an i32 (little-endian).
pub fn read_i32_le(buf: &[u8], offset: usize) -> Option<i32> {
    array_at(buf, offset).map(i32::from_le_bytes)
}

/// Read a u64 (little-endian).
pub fn read_u64_le(buf: &[u8], offset: usize) -> Option<u64> {
    array_at(buf, offset).map(u64::from_le_bytes)
}

/// Read an i64 (little-endian).
pub fn read_i64_le(buf: &[u8], offset: usize) -> Option<i64> {
    array_at(buf, offset).map(i64::from_le_bytes)
}

/// Borrow `count` bytes starting at `offset`.
pub fn read_bytes(buf: &[u8], offset: usize, count: usize) -> Option<&[u8]> {
    let end = offset.checked_add(count)?;
    buf.get(offset..end)
}

/// Decode `count` bytes as a string, replacing invalid UTF-8.
pub fn read_string(buf: &[u8], offset: usize, count: usize) -> Option<String> {
    read_bytes(buf, offset, count).map(|b| String::from_utf8_lossy(b).into_owned())
}

/// Scan forward from `offset` to the next zero byte.
///
/// Returns the bytes before the terminator and the number of bytes consumed,
/// terminator included. `None` if no terminator exists in `buf`.
pub fn read_null_terminated(buf: &[u8], offset: usize) -> Option<(&[u8], usize)> {
    let tail = buf.get(offset..)?;
    let nul = tail.iter().position(|&b| b == 0)?;
    Some((&tail[..nul], nul + 1))
}

/// Null-terminated string variant of [`read_null_terminated`].
pub fn read_null_terminated_string(buf: &[u8], offset: usize) -> Option<(String, usize)> {
    read_null_terminated(buf, offset)
        .map(|(bytes, consumed)| (String::from_utf8_lossy(bytes).into_owned(), consumed))
}

fn put<const N: usize>(buf: &mut [u8], offset: usize, bytes: [u8; N]) -> bool {
    let Some(end) = offset.checked_add(N) else {
        return false;
    };
    match buf.get_mut(offset..end) {
        Some(dst) => {
            dst.copy_from_slice(&bytes);
            true
        }
        None => false,
    }
}

/// Write a u16 (little-endian).
pub fn write_u16_le(buf: &mut [u8], offset: usize, value: u16) -> bool {
    put(buf, offset, value.to_le_bytes())
}

/// Write the low 24 bits of `value` (little-endian).
///
/// Values above `0xFF_FF_FF` are rejected rather than truncated.
pub fn write_u24_le(buf: &mut [u8], offset: usize, value: u32) -> bool {
    if value > 0x00FF_FFFF {
        return false;
    }
    let [b0, b1, b2, _] = value.to_le_bytes();
    put(buf, offset, [b0, b1, b2])
}

/// Write a u32 (little-endian).
pub fn write_u32_le(buf: &mut [u8], offset: usize, value: u32) -> bool {
    put(buf, offset, value.to_le_bytes())
}

/// Write a u64 (little-endian).
pub fn write_u64_le(buf: &mut [u8], offset: usize, value: u64) -> bool {
    put(buf, offset, value.to_le_bytes())
}
