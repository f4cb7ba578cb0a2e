//! `checkStatus` / `softReset` parsing.
//!
//! `checkStatus`'s `"Exception"` substring check is preserved verbatim: it
//! may misfire if legitimate device output contains the word, but changing
//! the behavior would change what callers observe on a real device.

use crate::codec::{strip_eoo, ERR};

/// True once the buffer (mid-stream, before `!!EOO!!`) contains the literal
/// substring `"Exception"` — the trigger for a synthetic exit code 3.
pub fn saw_exception_mid_stream(buffer: &str) -> bool {
    buffer.contains("Exception")
}

/// `checkStatus`: `Status{ok = no !!ERR!! AND no "Exception"}`.
pub fn check_status_ok(buffer_with_terminator: &str) -> bool {
    let payload = strip_eoo(buffer_with_terminator);
    !payload.contains(ERR) && !payload.contains("Exception")
}

/// `softReset`: verbose mode echoes the trimmed response; non-verbose mode
/// reduces to an ok/err flag.
pub fn soft_reset_response(buffer_with_terminator: &str) -> String {
    strip_eoo(buffer_with_terminator).trim_end().to_string()
}

pub fn soft_reset_ok(buffer_with_terminator: &str) -> bool {
    !strip_eoo(buffer_with_terminator).contains(ERR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_exception_mid_stream() {
        assert!(saw_exception_mid_stream("Traceback\nException: boom\n"));
        assert!(!saw_exception_mid_stream("all fine\n"));
    }

    #[test]
    fn check_status_ok_requires_no_err_and_no_exception() {
        assert!(check_status_ok("ready\n!!EOO!!\n"));
        assert!(!check_status_ok("!!ERR!!\n!!EOO!!\n"));
        assert!(!check_status_ok("Exception: boom\n!!EOO!!\n"));
    }

    #[test]
    fn soft_reset_trims_trailing_whitespace() {
        assert_eq!(soft_reset_response("booted\n!!EOO!!\n"), "booted");
    }
}
