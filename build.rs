use std::env;
use std::process::Command;

/// Stamp the binary with where and when it was built. Read back by `src/build_info.rs`.
fn main() {
    let stamp = [
        ("LANEVIS_BUILD_TIME", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ("LANEVIS_GIT_DESCRIBE", git(&["describe", "--always", "--dirty", "--abbrev=7"])),
        ("LANEVIS_TARGET", env_or_unknown("TARGET")),
        ("LANEVIS_PROFILE", env_or_unknown("PROFILE")),
    ];
    for (key, value) in stamp {
        println!("cargo:rustc-env={}={}", key, value);
    }

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
}

fn env_or_unknown(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| "unknown".to_string())
}

// Source tarballs have no .git, so every failure maps to "unknown"
fn git(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
