//! # Line Assembler
//!
//! Reassembles the device's newline-terminated text records from
//! arbitrary-sized serial read chunks.

use bytes::BytesMut;

use crate::error::{DaqError, Result};

/// Incremental assembler for newline-terminated text records.
///
/// A serial read returns whatever happens to sit in the OS buffer, so a
/// single chunk can end mid-record. Complete lines drain out as soon as
/// their terminator arrives; the unterminated tail stays buffered until a
/// later chunk completes it. A device that stops mid-line therefore stalls
/// the pipeline until it resumes, matching the line-buffered output
/// discipline of the firmware on the other end.
#[derive(Debug, Default)]
pub struct LineAssembler {
    /// Bytes received after the last line terminator
    residue: BytesMut,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self {
            residue: BytesMut::new(),
        }
    }

    /// Feed one raw chunk and drain every line it completes.
    ///
    /// Returned lines keep their original terminators so downstream
    /// persistence reproduces the stream byte-for-byte. No trailing empty
    /// fragment is ever produced.
    ///
    /// # Errors
    ///
    /// Returns `DaqError::Decode` if the chunk is not valid UTF-8. The chunk
    /// is discarded, previously buffered bytes are kept, and the caller is
    /// expected to retry on the next poll.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        let text = std::str::from_utf8(chunk)
            .map_err(|e| DaqError::Decode(format!("invalid UTF-8 in serial chunk: {}", e)))?;
        self.residue.extend_from_slice(text.as_bytes());

        // Everything up to and including the last newline is complete.
        let cut = match self.residue.iter().rposition(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            None => return Ok(Vec::new()),
        };
        let complete = self.residue.split_to(cut);
        let complete = std::str::from_utf8(&complete)
            .map_err(|e| DaqError::Decode(format!("invalid UTF-8 in line buffer: {}", e)))?;

        Ok(complete.split_inclusive('\n').map(str::to_owned).collect())
    }

    /// Number of buffered bytes still waiting for a terminator
    pub fn pending_bytes(&self) -> usize {
        self.residue.len()
    }

    /// Drop any partially assembled line (session reset path)
    pub fn reset(&mut self) {
        self.residue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_line() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push_chunk(b"1,0,5,5\r\n").unwrap();
        assert_eq!(lines, vec!["1,0,5,5\r\n".to_string()]);
        assert_eq!(assembler.pending_bytes(), 0);
    }

    #[test]
    fn test_partial_line_buffers_until_terminator() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push_chunk(b"1,0,").unwrap().is_empty());
        assert!(assembler.push_chunk(b"5,5").unwrap().is_empty());
        assert_eq!(assembler.pending_bytes(), 7);

        let lines = assembler.push_chunk(b"\r\n2,10,").unwrap();
        assert_eq!(lines, vec!["1,0,5,5\r\n".to_string()]);
        assert_eq!(assembler.pending_bytes(), 5);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push_chunk(b"1,0,5\r\n2,10,6\r\n3,20,7\r\n").unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "1,0,5\r\n");
        assert_eq!(lines[2], "3,20,7\r\n");
    }

    #[test]
    fn test_no_trailing_empty_fragment() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push_chunk(b"1,0,5\r\n").unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines.iter().all(|l| !l.is_empty()));
    }

    #[test]
    fn test_bare_newline_terminator() {
        // Some firmware builds emit \n without \r
        let mut assembler = LineAssembler::new();
        let lines = assembler.push_chunk(b"1,0,5\n2,10,6\n").unwrap();
        assert_eq!(lines, vec!["1,0,5\n".to_string(), "2,10,6\n".to_string()]);
    }

    #[test]
    fn test_invalid_utf8_drops_chunk_keeps_residue() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push_chunk(b"1,0,").unwrap().is_empty());

        let result = assembler.push_chunk(&[0xFF, 0xFE]);
        assert!(matches!(result, Err(DaqError::Decode(_))));

        // The buffered partial line survives and still completes
        let lines = assembler.push_chunk(b"5\r\n").unwrap();
        assert_eq!(lines, vec!["1,0,5\r\n".to_string()]);
    }

    #[test]
    fn test_replay_is_idempotent() {
        // The identical byte stream yields the identical line sequence no
        // matter how it is chunked
        let stream = b"0,0,1,1\r\n1,0,5,5\r\n2,10,6,6\r\n";

        let mut whole = LineAssembler::new();
        let all_at_once = whole.push_chunk(stream).unwrap();

        let mut split = LineAssembler::new();
        let mut piecewise = Vec::new();
        for chunk in stream.chunks(3) {
            piecewise.extend(split.push_chunk(chunk).unwrap());
        }

        assert_eq!(all_at_once, piecewise);
    }

    #[test]
    fn test_reset_discards_partial_line() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push_chunk(b"1,0,garbage").unwrap().is_empty());
        assembler.reset();
        assert_eq!(assembler.pending_bytes(), 0);

        let lines = assembler.push_chunk(b"2,10,6\r\n").unwrap();
        assert_eq!(lines, vec!["2,10,6\r\n".to_string()]);
    }
}
