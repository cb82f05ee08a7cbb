//! Moves files into destination folders without ever overwriting
//!
//! Same filesystem: a plain rename. Across filesystems: copy to a hidden
//! temporary sibling, verify length and SHA-256, rename into place, and only
//! then delete the source. Any failure leaves the source untouched.

use crate::{Result, SortError};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Highest numeric suffix tried before giving up on a name
const MAX_COLLISION_SUFFIX: u32 = 10_000;

/// Where a file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedFile {
    pub path: PathBuf,
    /// True when the original name was taken and a suffix was added
    pub renamed: bool,
}

/// Moves files below a destination root
#[derive(Debug, Clone)]
pub struct Mover {
    dest_root: PathBuf,
}

impl Mover {
    pub fn new(dest_root: impl Into<PathBuf>) -> Self {
        Self {
            dest_root: dest_root.into(),
        }
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    /// Move `src` into `dest_root/folder`, creating the folder if needed.
    /// Returns the final path.
    pub fn move_file(&self, src: &Path, folder: &str) -> Result<MovedFile> {
        let dest_dir = self.dest_root.join(folder);
        let file_name = src
            .file_name()
            .ok_or_else(|| failure(src, &dest_dir, "source has no file name"))?;

        fs::create_dir_all(&dest_dir).map_err(|e| failure(src, &dest_dir, e))?;

        let (dest, renamed) = reserve_destination(src, &dest_dir, Path::new(file_name))?;
        if renamed {
            tracing::info!(
                file = %file_name.to_string_lossy(),
                dest = %dest.display(),
                "Name already taken, using suffix"
            );
        }

        match fs::rename(src, &dest) {
            Ok(()) => {
                tracing::info!(src = %src.display(), dest = %dest.display(), "Moved file");
                Ok(MovedFile { path: dest, renamed })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                release(&dest);
                Err(failure(src, &dest, e))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rename failed, falling back to copy+remove");
                match copy_then_remove(src, &dest) {
                    Ok(()) => {
                        tracing::info!(src = %src.display(), dest = %dest.display(), "Copied file and removed source");
                        Ok(MovedFile { path: dest, renamed })
                    }
                    Err(err) => {
                        release(&dest);
                        Err(err)
                    }
                }
            }
        }
    }
}

fn failure(from: &Path, to: &Path, reason: impl ToString) -> SortError {
    SortError::MoveFailure {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// `name.ext`, `name (1).ext`, `name (2).ext`, ...
pub fn numbered_name(file_name: &Path, n: u32) -> PathBuf {
    if n == 0 {
        return file_name.to_path_buf();
    }

    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let ext = file_name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    PathBuf::from(format!("{} ({}){}", stem, n, ext))
}

/// Claim a free name by creating an empty placeholder with `create_new`.
/// The move then replaces only our own placeholder.
fn reserve_destination(src: &Path, dest_dir: &Path, file_name: &Path) -> Result<(PathBuf, bool)> {
    for n in 0..=MAX_COLLISION_SUFFIX {
        let candidate = dest_dir.join(numbered_name(file_name, n));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok((candidate, n > 0)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(failure(src, &candidate, e)),
        }
    }

    Err(SortError::MoveConflict {
        path: dest_dir.join(file_name),
    })
}

fn release(placeholder: &Path) {
    if let Err(e) = fs::remove_file(placeholder) {
        tracing::debug!(path = %placeholder.display(), error = %e, "Could not remove placeholder");
    }
}

fn copy_then_remove(src: &Path, dest: &Path) -> Result<()> {
    let temp = temp_sibling(dest);

    if let Err(err) = copy_verified(src, &temp) {
        let _ = fs::remove_file(&temp);
        return Err(err);
    }

    if let Err(e) = fs::rename(&temp, dest) {
        let _ = fs::remove_file(&temp);
        return Err(failure(src, dest, e));
    }

    if let Err(e) = fs::remove_file(src) {
        // Keep exactly one copy: the source stays, the copy goes
        let _ = fs::remove_file(dest);
        return Err(failure(src, dest, format!("could not remove source after copy: {}", e)));
    }

    Ok(())
}

fn temp_sibling(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.dropsort-partial", name))
}

fn copy_verified(src: &Path, temp: &Path) -> Result<()> {
    let copied = fs::copy(src, temp).map_err(|e| failure(src, temp, e))?;
    File::open(temp)
        .and_then(|f| f.sync_all())
        .map_err(|e| failure(src, temp, e))?;

    let source_len = fs::metadata(src).map_err(|e| failure(src, temp, e))?.len();
    if copied != source_len {
        return Err(failure(
            src,
            temp,
            format!("copied {} of {} bytes", copied, source_len),
        ));
    }

    let source_hash = file_hash(src).map_err(|e| failure(src, temp, e))?;
    let copy_hash = file_hash(temp).map_err(|e| failure(src, temp, e))?;
    if source_hash != copy_hash {
        return Err(failure(src, temp, "checksum mismatch after copy"));
    }

    tracing::debug!(src = %src.display(), sha256 = %source_hash, "Copy verified");
    Ok(())
}

/// SHA-256 of a file's content (hex encoded)
pub fn file_hash(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
