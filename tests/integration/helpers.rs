//! Shared test helpers: a fake toolchain built from shell scripts

use std::path::Path;

use depcheck::config::Config;

/// Creates a Stylus-like project skeleton at the path given as `$0`
pub const FAKE_SCAFFOLD: &str = r#"mkdir -p "$0/src" && printf '[package]\nname = "stylus-hello-world"\nversion = "0.1.0"\n\n[dependencies]\nstylus-sdk = "0.6.0"\n' > "$0/Cargo.toml" && printf '#![cfg_attr(not(feature = "export-abi"), no_main)]\nextern crate alloc;\n\nuse stylus_sdk::prelude::*;\n' > "$0/src/main.rs""#;

/// Verifier that fails according to the injected crate name:
/// `bad-compile*` -> compilation marker, `bad-wasm*` -> build marker,
/// `bad-deploy*` -> verification marker, `bad-other*` -> unmarked failure.
pub const FAKE_VERIFY: &str = r#"
sed -n '/^extern crate alloc;$/{n;p;}' src/main.rs | grep -q '^use ' || { echo 'import missing' >&2; exit 90; }
line=$(sed -n '/^\[dependencies\]$/{n;p;}' Cargo.toml)
case "$line" in
  bad-compile*) echo 'error: could not compile `bad-compile` (lib) due to 1 previous error' >&2; exit 101 ;;
  bad-wasm*) echo 'failed to build project to WASM: linker error' >&2; exit 1 ;;
  bad-deploy*) echo 'program predeployment check failed when checking against ARB_WASM_ADDRESS 0x0000000000000000000000000000000000000071' >&2; exit 1 ;;
  bad-other*) echo 'segmentation fault' >&2; exit 139 ;;
  *) echo 'Stylus checks passed'; exit 0 ;;
esac
"#;

/// Configuration wired to the fake toolchain with workspaces under `root`
pub fn fake_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.scaffold.command = vec!["sh".into(), "-c".into(), FAKE_SCAFFOLD.into()];
    config.scaffold.timeout_secs = 30;
    config.verify.command = vec!["sh".into(), "-c".into(), FAKE_VERIFY.into()];
    config.verify.timeout_secs = 30;
    config.workspace.root = root.join(".temp");
    config.batch.report = root.join("assessments.csv");
    config
}

/// Number of workspace directories still on disk
pub fn leftover_workspaces(config: &Config) -> usize {
    match std::fs::read_dir(&config.workspace.root) {
        Ok(entries) => entries.filter_map(|e| e.ok()).count(),
        Err(_) => 0,
    }
}
