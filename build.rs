fn main() {
    let rev = git_revision_hash().unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=SCANPLOT_GIT_HASH={rev}");
    println!("cargo:rerun-if-changed=.git/HEAD");
}

fn git_revision_hash() -> Option<String> {
    let output = std::process::Command::new("git")
        .args(["rev-parse", "--short=10", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let v = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if v.is_empty() { None } else { Some(v) }
}
