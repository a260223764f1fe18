// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=FILTER_PREVIEW_VERSION");

    // Packagers building from a tarball have no git history to describe
    let version = std::env::var("FILTER_PREVIEW_VERSION").unwrap_or_else(|_| describe());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// "0.1.0-abcdef1", with "-dirty" when the tree has local changes
fn describe() -> String {
    let base = env!("CARGO_PKG_VERSION");

    let Some(hash) = git(&["rev-parse", "--short", "HEAD"]) else {
        return base.to_string();
    };

    let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
        .map(|status| !status.is_empty())
        .unwrap_or(false);

    if dirty {
        format!("{}-{}-dirty", base, hash)
    } else {
        format!("{}-{}", base, hash)
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
