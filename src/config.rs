use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a single [`crate::session::Session`].
///
/// Built by the caller and handed to `Session::connect`; there is no
/// file-format loader here because a device session has no persisted state
/// across process restarts.
#[derive(Debug, Clone)]
pub struct HelperConfig {
    /// Serial device identifier, e.g. `"COM3"` or `"/dev/ttyUSB0"`.
    pub device: String,
    /// Path to the helper executable.
    pub helper_path: PathBuf,
    /// Baud rate passed to the helper via `--baud`.
    pub baud: u32,
    /// Working directory for the spawned helper (its install directory).
    pub working_dir: Option<PathBuf>,
    /// Grace period `disconnect()` waits for the helper to exit after an
    /// `exit` request before forcefully killing it.
    pub disconnect_grace: Duration,
}

impl HelperConfig {
    /// Creates a config with the documented default baud rate (115200) and
    /// disconnect grace window (500ms).
    pub fn new(device: impl Into<String>, helper_path: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            helper_path: helper_path.into(),
            baud: 115_200,
            working_dir: None,
            disconnect_grace: Duration::from_millis(500),
        }
    }

    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_disconnect_grace(mut self, grace: Duration) -> Self {
        self.disconnect_grace = grace;
        self
    }
}
