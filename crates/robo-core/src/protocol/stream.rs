//! Header-synchronised frame extraction from a chunked byte stream.
//!
//! The reader is protocol-agnostic: it is configured with the set of valid
//! frame headers, a minimum frame size, and a function that reads the total
//! frame length out of the first bytes of a frame.

use tracing::trace;

/// Reads the total frame length (header included) from a buffer that starts
/// with a recognised header and holds at least the minimum frame size.
pub type FrameLength = fn(&[u8]) -> usize;

/// Carry-over buffer that cuts complete frames out of a byte stream.
///
/// # Invariants
///
/// - After [`StreamReader::next_frame`] returns, the buffer either is empty,
///   starts with a recognised header, or holds a trailing partial header.
/// - A returned frame is exactly as long as its declared length; any extra
///   bytes stay buffered for the next call.
#[derive(Debug, Clone)]
pub struct StreamReader {
    headers: Vec<Vec<u8>>,
    minimum_size: usize,
    frame_length: FrameLength,
    buffer: Vec<u8>,
}

impl StreamReader {
    /// Creates a reader recognising any of `headers`.
    pub fn new(headers: &[&[u8]], minimum_size: usize, frame_length: FrameLength) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_vec()).collect(),
            minimum_size,
            frame_length,
            buffer: Vec::new(),
        }
    }

    /// Appends received bytes to the carry-over buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Appends `bytes` and returns the first complete frame, if any.
    pub fn read_by_header(&mut self, bytes: &[u8]) -> Option<Vec<u8>> {
        self.push(bytes);
        self.next_frame()
    }

    /// Returns the next complete frame from the buffered bytes, if any.
    ///
    /// Bytes preceding the first recognised header are discarded.  When the
    /// buffer holds only part of a frame, it is kept and `None` is returned.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        if !self.synchronise() {
            return None;
        }
        if self.buffer.len() < self.minimum_size {
            return None;
        }

        // A frame never shrinks below the minimum, so a corrupt length field
        // still consumes bytes and the reader makes progress.
        let length = (self.frame_length)(&self.buffer).max(self.minimum_size);
        if self.buffer.len() < length {
            trace!(buffered = self.buffer.len(), length, "partial frame buffered");
            return None;
        }

        Some(self.buffer.drain(..length).collect())
    }

    /// Discards all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes currently held for the next frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drops leading junk so the buffer starts at a header.
    ///
    /// Returns `true` when a full header is now at the front.  A trailing
    /// partial header is kept and reported as `false`.
    fn synchronise(&mut self) -> bool {
        for start in 0..self.buffer.len() {
            let rest = &self.buffer[start..];
            let full = self.headers.iter().any(|h| rest.starts_with(h));
            let partial = !full
                && self
                    .headers
                    .iter()
                    .any(|h| rest.len() < h.len() && h.starts_with(rest));
            if full || partial {
                if start > 0 {
                    trace!(discarded = start, "dropping bytes before frame header");
                    self.buffer.drain(..start);
                }
                return full;
            }
        }
        if !self.buffer.is_empty() {
            trace!(discarded = self.buffer.len(), "no frame header in buffer");
            self.buffer.clear();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADERS: [&[u8]; 2] = [&[0xFF, 0xFF], &[0xFF, 0xFE]];

    fn length_at_4(buf: &[u8]) -> usize {
        buf[4] as usize + 5
    }

    fn reader() -> StreamReader {
        StreamReader::new(&HEADERS, 6, length_at_4)
    }

    #[test]
    fn test_single_complete_frame_is_returned() {
        let mut r = reader();
        let frame = [0xFF, 0xFF, 0x00, 0x01, 0x01, 0xFD];
        assert_eq!(r.read_by_header(&frame), Some(frame.to_vec()));
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn test_partial_frame_is_kept_until_complete() {
        let mut r = reader();
        assert_eq!(r.read_by_header(&[0xFF, 0xFF, 0x00]), None);
        assert_eq!(r.buffered(), 3);

        let frame = r.read_by_header(&[0x01, 0x01, 0xFD]);
        assert_eq!(frame, Some(vec![0xFF, 0xFF, 0x00, 0x01, 0x01, 0xFD]));
    }

    #[test]
    fn test_junk_before_header_is_discarded() {
        let mut r = reader();
        let frame = r.read_by_header(&[0x12, 0x34, 0xFF, 0xFF, 0x00, 0x01, 0x01, 0xFD]);
        assert_eq!(frame, Some(vec![0xFF, 0xFF, 0x00, 0x01, 0x01, 0xFD]));
    }

    #[test]
    fn test_trailing_partial_header_survives_junk_scan() {
        let mut r = reader();
        assert_eq!(r.read_by_header(&[0x01, 0x02, 0xFF]), None);
        assert_eq!(r.buffered(), 1);
    }

    #[test]
    fn test_buffer_without_header_is_emptied() {
        let mut r = reader();
        assert_eq!(r.read_by_header(&[0x01, 0x02, 0x03]), None);
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn test_remainder_after_frame_stays_buffered() {
        // Arrange: one full frame followed by the start of the next
        let mut r = reader();
        let mut bytes = vec![0xFF, 0xFF, 0x00, 0x01, 0x01, 0xFD];
        bytes.extend_from_slice(&[0xFF, 0xFE, 0x07]);

        // Act
        let first = r.read_by_header(&bytes);

        // Assert
        assert_eq!(first.map(|f| f.len()), Some(6));
        assert_eq!(r.buffered(), 3);
        assert_eq!(r.next_frame(), None);
    }

    #[test]
    fn test_clear_discards_partial_frame() {
        let mut r = reader();
        r.push(&[0xFF, 0xFF, 0x00]);
        r.clear();
        assert_eq!(r.buffered(), 0);
    }
}
