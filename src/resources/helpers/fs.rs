//! File-system resource helpers.
use anyhow::{Context as _, Result};
use std::fmt::Write as _;
use std::path::Path;

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// Whether `path` is a directory and not a symlink to one.
#[must_use]
pub fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata().is_ok_and(|m| m.is_dir())
}

/// Remove whatever sits at `path`: a file, a symlink (including a broken
/// one), or a whole directory tree. Does nothing if `path` does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_existing(path: &Path) -> Result<()> {
    if is_real_dir(path) {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("remove existing directory: {}", path.display()))?;
    } else if path.symlink_metadata().is_ok() {
        std::fs::remove_file(path)
            .with_context(|| format!("remove existing: {}", path.display()))?;
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target =
        std::fs::read_link(src).with_context(|| format!("reading link {}", src.display()))?;
    std::os::unix::fs::symlink(&target, dst)
        .with_context(|| format!("creating symlink {}", dst.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    std::fs::copy(src, dst)
        .map(|_| ())
        .with_context(|| format!("copying {} to {}", src.display(), dst.display()))
}

/// Move the tree at `src` into `dst`, merging with what is already there.
///
/// Directories are merged entry by entry. Files and symlinks from `src`
/// overwrite their counterparts in `dst`; anything in `dst` that `src` does
/// not provide is left alone. Symlinks inside `src` are recreated rather than
/// followed, so extracted archives keep their internal links. A file never
/// replaces a real directory.
///
/// # Errors
///
/// Returns an error if an entry cannot be read, moved, or copied, or if a
/// file would replace a directory.
pub fn merge_into(src: &Path, dst: &Path) -> Result<()> {
    let file_type = src
        .symlink_metadata()
        .with_context(|| format!("reading {}", src.display()))?
        .file_type();

    if file_type.is_dir() {
        if !is_real_dir(dst) {
            remove_existing(dst)?;
            std::fs::create_dir_all(dst)
                .with_context(|| format!("creating directory {}", dst.display()))?;
        }
        for entry in
            std::fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))?
        {
            let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
            merge_into(&entry.path(), &dst.join(entry.file_name()))?;
        }
        return Ok(());
    }

    if is_real_dir(dst) {
        anyhow::bail!(
            "{} is a directory; not replacing it with {}",
            dst.display(),
            src.display()
        );
    }
    ensure_parent_dir(dst)?;
    if file_type.is_symlink() {
        remove_existing(dst)?;
        return copy_symlink(src, dst);
    }
    // Rename fails across filesystems; the extraction directory usually is one.
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    remove_existing(dst)?;
    std::fs::copy(src, dst)
        .with_context(|| format!("copying {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Compute the lowercase hex SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};

    let mut file =
        std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).with_context(|| format!("hashing {}", path.display()))?;
    let mut hex = String::with_capacity(64);
    for b in &hasher.finalize() {
        // write! to a String is infallible; unwrap_or(()) makes that explicit.
        write!(hex, "{b:02x}").unwrap_or(());
    }
    Ok(hex)
}
