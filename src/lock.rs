use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Config-root lock guard; the lock is released on drop.
/// The lock file itself stays in place: unlinking it would let a waiter lock an
/// orphaned inode while a newcomer locks a fresh file at the same path.
#[derive(Debug)]
pub struct ConfigLock {
    file: File,
    path: PathBuf,
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl ConfigLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Acquire a non-blocking exclusive lock at `path`, creating parent directories (0700).
pub fn acquire_lock(path: &Path) -> io::Result<ConfigLock> {
    if let Some(parent) = path.parent() {
        crate::util::fs::ensure_dir_with_mode(parent, 0o700)?;
    }
    let f = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    match f.try_lock_exclusive() {
        Ok(()) => Ok(ConfigLock {
            file: f,
            path: path.to_path_buf(),
        }),
        Err(e)
            if e.kind() == io::ErrorKind::WouldBlock
                || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
        {
            tracing::error!(path = %path.display(), "lock held by another process");
            Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "Another kdk command is already modifying this configuration (lock held). Please try again later.",
            ))
        }
        Err(e) => Err(e),
    }
}
