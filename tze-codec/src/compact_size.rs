//! Byte cursor and compact-size integers.
//!
//! Compact sizes use the Bitcoin/Zcash varint layout: a tag byte below `0xfd`
//! is the value itself, otherwise the tag selects a 2, 4 or 8 byte
//! little-endian value that follows it.

/// Tag announcing a 2-byte value.
pub const COMPACT_SIZE_U16: u8 = 0xfd;
/// Tag announcing a 4-byte value.
pub const COMPACT_SIZE_U32: u8 = 0xfe;
/// Tag announcing an 8-byte value.
pub const COMPACT_SIZE_U64: u8 = 0xff;

/// Cursor over a decoded byte sequence.
///
/// The offset never exceeds the length of the underlying bytes. Reads that run
/// past the end return the bytes that were available and leave the cursor at
/// the end.
#[derive(Clone, Copy, Debug)]
pub struct ByteFrame<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteFrame<'a> {
    /// Create a frame positioned at the first byte.
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Create a frame positioned at `offset`, clamped to the end of `bytes`.
    pub fn at(bytes: &'a [u8], offset: usize) -> Self {
        Self {
            bytes,
            offset: offset.min(bytes.len()),
        }
    }

    /// Current position in bytes.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.offset..]
    }

    /// True when the cursor sits at the end of the frame.
    pub const fn is_exhausted(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Option<u8> {
        let byte = self.bytes.get(self.offset).copied()?;
        self.offset += 1;
        Some(byte)
    }

    /// Read up to `len` bytes. Fewer are returned at the end of the frame.
    pub fn take(&mut self, len: usize) -> &'a [u8] {
        let end = self.offset.saturating_add(len).min(self.bytes.len());
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        slice
    }

    /// Advance by up to `len` bytes.
    pub fn skip(&mut self, len: usize) {
        self.take(len);
    }

    /// Read an `N`-byte field, right-padding with zeros when the frame ends early.
    ///
    /// Returns the field and the number of zero bytes that had to be appended.
    pub fn read_padded<const N: usize>(&mut self) -> ([u8; N], usize) {
        let available = self.take(N);
        let mut field = [0u8; N];
        field[..available.len()].copy_from_slice(available);
        (field, N - available.len())
    }

    /// Read a compact-size integer.
    ///
    /// Truncated input yields a truncated value rather than an error; callers
    /// bound-check before relying on the result.
    pub fn read_compact_size(&mut self) -> u64 {
        let Some(tag) = self.read_u8() else {
            return 0;
        };
        let width = match tag {
            COMPACT_SIZE_U16 => 2,
            COMPACT_SIZE_U32 => 4,
            COMPACT_SIZE_U64 => 8,
            value => return u64::from(value),
        };
        self.take(width)
            .iter()
            .rev()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
    }
}

/// Decode a compact-size integer at `offset`, returning the value and the
/// offset of the first byte after it.
pub fn decode_compact_size(bytes: &[u8], offset: usize) -> (u64, usize) {
    let mut frame = ByteFrame::at(bytes, offset);
    let value = frame.read_compact_size();
    (value, frame.offset())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_value() {
        assert_eq!(decode_compact_size(&[0x00], 0), (0, 1));
        assert_eq!(decode_compact_size(&[0xfc, 0xaa], 0), (0xfc, 1));
    }

    #[test]
    fn u16_branch_is_little_endian() {
        assert_eq!(decode_compact_size(&[0xfd, 0x34, 0x12], 0), (0x1234, 3));
    }

    #[test]
    fn u32_branch_is_little_endian() {
        let bytes = [0xfe, 0x78, 0x56, 0x34, 0x12];
        assert_eq!(decode_compact_size(&bytes, 0), (0x1234_5678, 5));
    }

    #[test]
    fn u64_branch_is_little_endian() {
        let bytes = [0xff, 0xef, 0xcd, 0xab, 0x89, 0x67, 0x45, 0x23, 0x01];
        assert_eq!(decode_compact_size(&bytes, 0), (0x0123_4567_89ab_cdef, 9));
    }

    #[test]
    fn respects_offset() {
        let bytes = [0xaa, 0xbb, 0xfd, 0x00, 0x01, 0x07];
        assert_eq!(decode_compact_size(&bytes, 2), (0x0100, 5));
        assert_eq!(decode_compact_size(&bytes, 5), (7, 6));
    }

    #[test]
    fn truncated_input_yields_partial_value() {
        // Only the low byte of a u32 is present.
        assert_eq!(decode_compact_size(&[0xfe, 0x2a], 0), (0x2a, 2));
        assert_eq!(decode_compact_size(&[], 0), (0, 0));
        assert_eq!(decode_compact_size(&[0x01], 9), (0, 1));
    }

    #[test]
    fn padded_read_reports_padding() {
        let mut frame = ByteFrame::new(&[1, 2, 3]);
        let (field, padding) = frame.read_padded::<5>();
        assert_eq!(field, [1, 2, 3, 0, 0]);
        assert_eq!(padding, 2);
        assert!(frame.is_exhausted());
    }
}
