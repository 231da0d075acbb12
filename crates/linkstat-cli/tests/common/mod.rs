#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[allow(dead_code)]
pub const CMD_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_OVERRIDES: &[&str] = &[
    "LINKSTAT_COMPLETED_FILE",
    "LINKSTAT_PENDING_LINKS_FILE",
    "LINKSTAT_PENDING_NUMBERS_FILE",
    "LINKSTAT_PROBE_TIMEOUT_SECS",
];

/// Ledger directory used by [`linkstat_cmd`] for a given test root
#[allow(dead_code)]
pub fn storage_dir(root: &Path) -> PathBuf {
    root.join("storage")
}

/// Create a `linkstat` command isolated to `root`: its own config file and
/// ledger directory, no colors, no inherited overrides.
#[allow(dead_code)]
pub fn linkstat_cmd(root: &Path) -> Command {
    let config = root.join("config.toml");
    if !config.exists() {
        std::fs::write(&config, "[probe]\ntimeout_secs = 2\n\n[service]\nshutdown_timeout_secs = 10\n")
            .expect("failed to write test config");
    }

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("linkstat"));
    cmd.timeout(CMD_TIMEOUT);
    for key in ENV_OVERRIDES {
        cmd.env_remove(key);
    }
    cmd.env("LINKSTAT_CONFIG", &config);
    cmd.env("LINKSTAT_DATA_DIR", storage_dir(root));
    cmd.env("NO_COLOR", "1");
    cmd
}
