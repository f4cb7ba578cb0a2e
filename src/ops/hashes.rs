//! `calcHashes` parsing. The parsed map surfaces as
//! `OperationOutcome::HashMap`; `project_sync.rs` is the only consumer that
//! chains it into a follow-up `uploadFiles` request.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct HashFrame {
    file: String,
    hash: String,
}

/// Parses the buffer (terminator already stripped) into a `path -> hash`
/// map, skipping any line containing `"error"` or `!!ERR!!`.
pub fn parse_hash_frames(buffer: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for raw in buffer.split('\n') {
        let line = raw.replace('\r', "");
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.contains("error") || trimmed.contains("!!ERR!!") {
            continue;
        }
        if let Ok(frame) = serde_json::from_str::<HashFrame>(trimmed) {
            map.insert(frame.file, frame.hash);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hash_frames_and_skips_errors() {
        let buffer = "{\"file\":\"a.py\",\"hash\":\"h1\"}\nerror reading b.py\n{\"file\":\"c.py\",\"hash\":\"h3\"}\n";
        let map = parse_hash_frames(buffer);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a.py"), Some(&"h1".to_string()));
        assert_eq!(map.get("c.py"), Some(&"h3".to_string()));
    }
}
