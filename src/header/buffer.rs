use std::collections::TryReserveError;

/// Result of [`HeaderBuffer::read_line`].
#[derive(Debug, PartialEq)]
pub enum Line {
    /// A complete line, without its terminator.
    Text(String),

    /// The buffered data does not contain a complete line.
    ///
    /// The cursor is not moved. Another block must be appended before
    /// trying again.
    NeedMoreData,

    /// End of the header text.
    Eof,
}

/// Error from [`HeaderBuffer::read_line`].
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum LineError {
    #[error("Line longer than {0} bytes.")]
    TooLong(usize),

    #[error("Line is not valid UTF-8.")]
    InvalidText,
}

/// Append-only buffer to hold the raw header of a datastream.
///
/// Data is appended in blocks, as read from the device, and the text is
/// consumed line by line. Blocks are padded with NUL bytes, so the first
/// NUL marks the end of the text.
#[derive(Clone, Debug, Default)]
pub struct HeaderBuffer {
    data: Vec<u8>,
    cursor: usize,
}

impl HeaderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block to the end of the buffer.
    ///
    /// It fails if the memory for the block can't be allocated.
    pub fn append_block(&mut self, block: &[u8]) -> Result<(), TryReserveError> {
        self.data.try_reserve(block.len())?;
        self.data.extend_from_slice(block);
        Ok(())
    }

    /// Raw bytes in the buffer, as read from the device.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if `marker` appears anywhere in the buffer.
    pub fn contains(&self, marker: &[u8]) -> bool {
        !marker.is_empty() && self.data.windows(marker.len()).any(|w| w == marker)
    }

    /// Move the cursor to the beginning of the buffer.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Read the next line from the cursor.
    ///
    /// Lines longer than `max_len` bytes are rejected, even if the line
    /// is not complete yet.
    pub fn read_line(&mut self, max_len: usize) -> Result<Line, LineError> {
        let tail = &self.data[self.cursor..];

        let Some(end) = tail.iter().position(|&b| b == b'\n' || b == 0) else {
            if tail.len() > max_len {
                return Err(LineError::TooLong(max_len));
            }

            return Ok(Line::NeedMoreData);
        };

        if tail[end] == 0 {
            return Ok(Line::Eof);
        }

        if end > max_len {
            return Err(LineError::TooLong(max_len));
        }

        let line = std::str::from_utf8(&tail[..end])
            .map_err(|_| LineError::InvalidText)?
            .to_owned();

        self.cursor += end + 1;

        Ok(Line::Text(line))
    }
}

#[test]
fn read_lines_across_blocks() {
    let mut buffer = HeaderBuffer::new();
    buffer.append_block(b"first\nsec").unwrap();

    assert_eq!(buffer.read_line(16), Ok(Line::Text("first".into())));
    assert_eq!(buffer.read_line(16), Ok(Line::NeedMoreData));

    // The cursor is kept after `NeedMoreData`.
    buffer.append_block(b"ond\n\n\0\0\0").unwrap();
    assert_eq!(buffer.read_line(16), Ok(Line::Text("second".into())));
    assert_eq!(buffer.read_line(16), Ok(Line::Text("".into())));
    assert_eq!(buffer.read_line(16), Ok(Line::Eof));
    assert_eq!(buffer.read_line(16), Ok(Line::Eof));

    assert_eq!(buffer.len(), 17);

    buffer.rewind();
    assert_eq!(buffer.read_line(16), Ok(Line::Text("first".into())));
}

#[test]
fn reject_long_lines() {
    let mut buffer = HeaderBuffer::new();
    buffer.append_block(b"0123456789\n").unwrap();
    assert_eq!(buffer.read_line(8), Err(LineError::TooLong(8)));

    // Incomplete lines are rejected too.
    let mut buffer = HeaderBuffer::new();
    buffer.append_block(b"0123456789").unwrap();
    assert_eq!(buffer.read_line(8), Err(LineError::TooLong(8)));

    let mut buffer = HeaderBuffer::new();
    buffer.append_block(b"01234567\n").unwrap();
    assert_eq!(buffer.read_line(8), Ok(Line::Text("01234567".into())));
}

#[test]
fn reject_invalid_text() {
    let mut buffer = HeaderBuffer::new();
    buffer.append_block(b"SUNW\xff\xfe 1 0\nnext\n").unwrap();
    assert_eq!(buffer.read_line(16), Err(LineError::InvalidText));

    // The cursor is not moved.
    assert_eq!(buffer.read_line(16), Err(LineError::InvalidText));
}

#[test]
fn find_markers() {
    let mut buffer = HeaderBuffer::new();
    buffer.append_block(b"abc\n# end of header\n\0\0").unwrap();

    assert!(buffer.contains(b"# end of header"));
    assert!(!buffer.contains(b"# end of headers"));
    assert!(!buffer.contains(b""));
}
