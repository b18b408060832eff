use std::process::Command;

fn main() {
    // USERAPPS_VERSION set by a release pipeline wins; local builds use git describe.
    if let Ok(version) = std::env::var("USERAPPS_VERSION") {
        println!("cargo:rustc-env=USERAPPS_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !version.is_empty() {
            println!("cargo:rustc-env=USERAPPS_VERSION={version}");
        }
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-env-changed=USERAPPS_VERSION");
}
