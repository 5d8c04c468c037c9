//! Stamps amber-progress with the commit, build time and profile it was
//! built from. `/build_info` and the startup log read these back through
//! `env!`.

use std::env;
use std::process::Command;

const UNKNOWN: &str = "unknown";

/// Short commit hash, or `None` outside a git checkout
fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_owned()).filter(|h| !h.is_empty())
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn main() {
    // No rerun-if-changed: the timestamp and hash refresh on every build
    emit("GIT_HASH", &git_short_hash().unwrap_or_else(|| UNKNOWN.to_owned()));
    emit(
        "BUILD_TIMESTAMP",
        &chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    );
    emit(
        "BUILD_PROFILE",
        &env::var("PROFILE").unwrap_or_else(|_| UNKNOWN.to_owned()),
    );
}
