//! Wire-level constants and request encoding for the helper protocol.
//! Requests are one line of JSON; responses are free-form text terminated
//! by a small set of delimiter tokens that must never leak into a
//! caller-visible payload.

use serde_json::Value;

/// End of a response.
pub const EOO: &str = "!!EOO!!";
/// Helper-reported error within a response.
pub const ERR: &str = "!!ERR!!";
/// Helper requests a `\n` on stdin to unblock a blocking read.
pub const SENTINEL: &str = "!!__SENTINEL__!!";
/// Helper failed to parse a streamed JSON progress frame.
pub const JSON_DECODE_ERROR: &str = "!!JSONDecodeError!!";
/// Prefix marking a "simple" tab-completion result.
pub const SIMPLE_AUTO_COMP: &str = "!!SIMPLE_AUTO_COMP!!";

/// Encodes a single request line: `{"command": <name>, "args": {...}}\n`.
pub fn encode_request(command: &str, args: Value) -> String {
    let record = serde_json::json!({
        "command": command,
        "args": args,
    });
    let mut line = serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string());
    line.push('\n');
    line
}

/// Strips `!!EOO!!` (and anything after it, since it is the terminator) from
/// a buffer and returns the content that preceded it.
pub fn strip_eoo(buffer: &str) -> &str {
    match buffer.find(EOO) {
        Some(idx) => &buffer[..idx],
        None => buffer,
    }
}

/// True if the buffer contains a line mentioning the post-reset pyboard
/// listen banner, which must be skipped rather than surfaced.
pub fn is_pyboard_wait_banner(line: &str) -> bool {
    line.contains("Waiting") && line.contains("seconds for pyboard")
}

/// Removes benign notice tokens (`!!JSONDecodeError!!`) and pyboard-wait
/// banner lines from a buffer, leaving the rest untouched.
pub fn strip_benign_notices(buffer: &str) -> String {
    buffer
        .lines()
        .filter(|line| !is_pyboard_wait_banner(line))
        .collect::<Vec<_>>()
        .join("\n")
        .replace(JSON_DECODE_ERROR, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_command_line() {
        let line = encode_request("list_contents", serde_json::json!({"target": "/"}));
        assert_eq!(line, "{\"args\":{\"target\":\"/\"},\"command\":\"list_contents\"}\n");
    }

    #[test]
    fn strips_eoo_terminator() {
        assert_eq!(strip_eoo("hello\n!!EOO!!\n"), "hello\n");
        assert_eq!(strip_eoo("no terminator"), "no terminator");
    }

    #[test]
    fn filters_pyboard_wait_banner() {
        let buf = "Waiting 3 seconds for pyboard\nreal output\n";
        assert_eq!(strip_benign_notices(buf), "\nreal output");
    }
}
