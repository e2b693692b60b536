//! Little-endian block writer and bounds-checked reader.
//!
//! A "block" is one self-contained byte region (tensor block, params block,
//! layer record, section). Writers append variable tails after a fixed
//! header and patch the header's offset fields afterwards, so every stored
//! offset is relative to the block's own start.

use crate::error::{FormatError, Result};

/// Append-only writer for one block.
#[derive(Debug, Default)]
pub struct BlockWriter {
    buf: Vec<u8>,
}

impl BlockWriter {
    /// New empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// New writer with a capacity hint.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Current length, which is also the offset of the next write.
    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    /// Append a byte.
    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Append a little-endian u32.
    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Append a little-endian i32.
    pub fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Append a little-endian f32.
    pub fn put_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Append a little-endian i64.
    pub fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Append a little-endian u64.
    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Append raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a NUL-terminated string.
    pub fn put_cstr(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    /// Append a zeroed i64 and return its position for a later patch.
    pub fn reserve_i64(&mut self) -> usize {
        let at = self.pos();
        self.put_i64(0);
        at
    }

    /// Overwrite the i64 previously reserved at `at`.
    ///
    /// # Panics
    /// Panics if `at` was not a position inside the buffer.
    pub fn patch_i64(&mut self, at: usize, v: i64) {
        self.buf[at..at + 8].copy_from_slice(&v.to_le_bytes());
    }

    /// Zero-fill up to `len` bytes total.
    ///
    /// # Panics
    /// Panics if the buffer is already longer than `len`.
    pub fn pad_to(&mut self, len: usize) {
        assert!(
            self.buf.len() <= len,
            "block already {} bytes, cannot pad to {}",
            self.buf.len(),
            len
        );
        self.buf.resize(len, 0);
    }

    /// Finish and take the block bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// Sequential reader over one block with block-relative random access.
#[derive(Debug, Clone)]
pub struct BlockReader<'a> {
    block: &'a [u8],
    pos: usize,
}

impl<'a> BlockReader<'a> {
    /// Reader positioned at the start of `block`.
    pub fn new(block: &'a [u8]) -> Self {
        Self { block, pos: 0 }
    }

    /// The whole block.
    pub fn block(&self) -> &'a [u8] {
        self.block
    }

    /// Current read position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move the read position.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.block.len() {
            return Err(FormatError::Truncated {
                at: pos,
                need: 0,
                have: self.block.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(FormatError::Truncated {
            at: self.pos,
            need: len,
            have: self.block.len(),
        })?;
        if end > self.block.len() {
            return Err(FormatError::Truncated {
                at: self.pos,
                need: len,
                have: self.block.len() - self.pos,
            });
        }
        let bytes = &self.block[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Read a little-endian u32.
    pub fn get_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    /// Read a little-endian i32.
    pub fn get_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    /// Read a little-endian f32.
    pub fn get_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    /// Read a little-endian i64.
    pub fn get_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    /// Read a little-endian u64.
    pub fn get_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    /// Read `len` raw bytes.
    pub fn get_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Resolve a stored block-relative offset to a sub-slice of `len` bytes.
    pub fn slice_at(&self, offset: i64, len: usize) -> Result<&'a [u8]> {
        let start = usize::try_from(offset).map_err(|_| FormatError::BadOffset { offset })?;
        let end = start
            .checked_add(len)
            .ok_or(FormatError::BadOffset { offset })?;
        if end > self.block.len() {
            return Err(FormatError::Truncated {
                at: start,
                need: len,
                have: self.block.len().saturating_sub(start),
            });
        }
        Ok(&self.block[start..end])
    }

    /// Resolve a stored block-relative offset to the rest of the block.
    pub fn tail_at(&self, offset: i64) -> Result<&'a [u8]> {
        let start = usize::try_from(offset).map_err(|_| FormatError::BadOffset { offset })?;
        if start > self.block.len() {
            return Err(FormatError::BadOffset { offset });
        }
        Ok(&self.block[start..])
    }

    /// Read the NUL-terminated UTF-8 string at a block-relative offset.
    pub fn cstr_at(&self, offset: i64) -> Result<&'a str> {
        let tail = self.tail_at(offset)?;
        let at = offset as usize;
        let nul = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(FormatError::BadString { at })?;
        std::str::from_utf8(&tail[..nul]).map_err(|_| FormatError::BadString { at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_patch_read() {
        let mut w = BlockWriter::new();
        w.put_u32(7);
        let at = w.reserve_i64();
        w.put_cstr("abc");
        w.patch_i64(at, w.pos() as i64);
        w.put_i32(-5);
        let block = w.into_vec();

        let mut r = BlockReader::new(&block);
        assert_eq!(r.get_u32().unwrap(), 7);
        let off = r.get_i64().unwrap();
        assert_eq!(off, 16);
        assert_eq!(r.cstr_at(12).unwrap(), "abc");
        r.seek(off as usize).unwrap();
        assert_eq!(r.get_i32().unwrap(), -5);
    }

    #[test]
    fn truncated_reads_fail() {
        let block = [1u8, 2, 3];
        let mut r = BlockReader::new(&block);
        assert!(matches!(
            r.get_u32(),
            Err(FormatError::Truncated { need: 4, .. })
        ));
        assert!(r.slice_at(1, 3).is_err());
        assert!(r.slice_at(-1, 1).is_err());
    }

    #[test]
    fn unterminated_string_fails() {
        let block = b"abc".to_vec();
        let r = BlockReader::new(&block);
        assert!(matches!(r.cstr_at(0), Err(FormatError::BadString { .. })));
    }
}
