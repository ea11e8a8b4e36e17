use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Create `dir` with `mode` (unix) unless it already exists. Returns true when created.
/// The parent must exist; the config root is created first, then its children.
pub fn ensure_dir_with_mode(dir: &Path, mode: u32) -> io::Result<bool> {
    if dir.is_dir() {
        return Ok(false);
    }
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    match builder.create(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Write `bytes` to `path` (create or truncate) and force `mode` on unix.
pub fn write_file_with_mode(path: &Path, bytes: &[u8], mode: u32) -> io::Result<()> {
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(mode);
    }
    let mut f = opts.open(path)?;
    f.write_all(bytes)?;
    f.flush()?;
    // mode() only applies on creation; existing files keep their old bits otherwise
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_ensure_dir_with_mode_creates_once() {
        let td = tempfile::tempdir().expect("tmpdir");
        let d = td.path().join("root");
        assert!(ensure_dir_with_mode(&d, 0o700).unwrap());
        assert!(!ensure_dir_with_mode(&d, 0o700).unwrap());
        let mode = fs::metadata(&d).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }

    #[test]
    fn test_ensure_dir_with_mode_needs_parent() {
        let td = tempfile::tempdir().expect("tmpdir");
        let err = ensure_dir_with_mode(&td.path().join("a").join("b"), 0o700).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_write_file_with_mode_resets_permissions() {
        let td = tempfile::tempdir().expect("tmpdir");
        let f = td.path().join("config.yaml");
        fs::write(&f, "old").unwrap();
        fs::set_permissions(&f, fs::Permissions::from_mode(0o644)).unwrap();
        write_file_with_mode(&f, b"new", 0o600).unwrap();
        assert_eq!(fs::read_to_string(&f).unwrap(), "new");
        let mode = fs::metadata(&f).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
