use std::process::Command;

/// Stdout of a successful `git` invocation, trimmed.
fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    out.status
        .success()
        .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
}

fn main() {
    // HEAD moves on commit and checkout; tags live under refs/
    for watched in [".git/HEAD", ".git/refs/"] {
        println!("cargo:rerun-if-changed={watched}");
    }

    // Outside a checkout (crates.io tarball) both stay empty/false and
    // `zipview --version` reports dev@unknown.
    let hash = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_default();
    let tagged = git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some();

    println!("cargo:rustc-env=GIT_HASH={hash}");
    println!("cargo:rustc-env=ON_RELEASE_TAG={tagged}");
}
