//! Command: print version information.

/// Print the userapps version to stdout.
pub fn run() {
    println!("userapps {}", crate::VERSION);
}
