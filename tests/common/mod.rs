//! Shared fixture wiring for the integration tests: a small
//! `make_test_config`-style helper that points `HelperConfig` at the
//! scripted helper script instead of a real device bridge.

use std::path::PathBuf;
use std::time::Duration;

use pyboard_session::HelperConfig;

pub fn helper_config() -> HelperConfig {
    let script = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/scripted_helper.py");
    HelperConfig::new("COM_TEST", script).with_disconnect_grace(Duration::from_millis(200))
}
