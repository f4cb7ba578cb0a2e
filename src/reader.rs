//! Line/Frame Reader: accumulates helper stdout bytes into
//! a per-session buffer and decides whether the active operation's state
//! machine should be invoked for a given chunk.

/// Stateful UTF-8 decoder that handles multi-byte sequences split across
/// read boundaries. Generalizes `core::process_manager::Utf8Decoder` from
/// fixed 4 KiB PTY reads to helper stdout chunks of any size.
pub(crate) struct Utf8Decoder {
    incomplete: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self {
            incomplete: Vec::with_capacity(4),
        }
    }

    pub fn decode(&mut self, input: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.incomplete);
        data.extend_from_slice(input);

        let valid_up_to = Self::find_valid_boundary(&data);

        if valid_up_to < data.len() {
            self.incomplete = data[valid_up_to..].to_vec();
        }

        String::from_utf8(data[..valid_up_to].to_vec())
            .unwrap_or_else(|_| String::from_utf8_lossy(&data[..valid_up_to]).into_owned())
    }

    fn find_valid_boundary(data: &[u8]) -> usize {
        match std::str::from_utf8(data) {
            Ok(_) => data.len(),
            Err(e) => {
                let valid = e.valid_up_to();
                if e.error_len().is_none() {
                    valid
                } else {
                    valid + e.error_len().unwrap_or(1)
                }
            }
        }
    }
}

/// Append-only byte accumulator for one active operation's stdout. Never
/// shared across operations.
pub struct ReadBuffer {
    decoder: Utf8Decoder,
    text: String,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self {
            decoder: Utf8Decoder::new(),
            text: String::new(),
        }
    }

    /// Appends a raw stdout chunk, decoding it against any pending partial
    /// UTF-8 sequence from the previous chunk. Returns whether this chunk
    /// contained a newline, which the driver uses to decide whether to
    /// invoke the active operation's state machine.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        let contains_newline = chunk.contains(&b'\n');
        let decoded = self.decoder.decode(chunk);
        self.text.push_str(&decoded);
        contains_newline
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Removes a token (e.g. a delimiter) from the buffer in place.
    pub fn remove_token(&mut self, token: &str) {
        if self.text.contains(token) {
            self.text = self.text.replace(token, "");
        }
    }
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_split_multibyte_sequence() {
        let mut buf = ReadBuffer::new();
        let text = "caf\u{e9}"; // "café"
        let bytes = text.as_bytes();
        // split in the middle of the 2-byte 'é' sequence
        let split = bytes.len() - 1;
        buf.push(&bytes[..split]);
        buf.push(&bytes[split..]);
        assert_eq!(buf.as_str(), text);
    }

    #[test]
    fn detects_newline_presence() {
        let mut buf = ReadBuffer::new();
        assert!(!buf.push(b"no newline yet"));
        assert!(buf.push(b"\nnow there is\n"));
    }

    #[test]
    fn removes_sentinel_token() {
        let mut buf = ReadBuffer::new();
        buf.push(b"before!!__SENTINEL__!!after");
        buf.remove_token("!!__SENTINEL__!!");
        assert_eq!(buf.as_str(), "beforeafter");
    }
}
