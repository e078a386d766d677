//! File status queries and metadata mutation.
//!
//! [`copy_file_stat`] propagates a source file's modification time and, on
//! Unix, ownership and permission bits to a freshly written output file, so
//! a compressed or restored file looks like the original. Time uses the
//! [`filetime`] crate; ownership uses [`nix`].

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use filetime::FileTime;

/// `true` if `path` refers to a regular file.
pub fn is_reg_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.file_type().is_file())
        .unwrap_or(false)
}

/// `true` if `path` refers to a directory.
pub fn is_directory(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.file_type().is_dir())
        .unwrap_or(false)
}

/// Modification time of `path` as Unix seconds.
pub fn file_mtime(path: &Path) -> Option<i64> {
    let m = fs::metadata(path).ok()?;
    let t = m.modified().ok()?;
    Some(
        t.duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
    )
}

/// Applies modification time, ownership (Unix), and permission bits to
/// `path`. Attribute operations are applied in order; the first failure is
/// returned.
pub fn set_file_stat(
    path: &Path,
    mtime: SystemTime,
    uid: u32,
    gid: u32,
    mode: u32,
) -> io::Result<()> {
    let atime = FileTime::from_system_time(SystemTime::now());
    let ft_mtime = FileTime::from_system_time(mtime);
    filetime::set_file_times(path, atime, ft_mtime)?;

    #[cfg(unix)]
    {
        use nix::unistd::{chown, Gid, Uid};
        use std::os::unix::fs::PermissionsExt;

        // Ownership change may legitimately fail for unprivileged users.
        let _ = chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)));
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))?;
    }
    #[cfg(not(unix))]
    {
        let _ = (uid, gid, mode);
    }
    Ok(())
}

/// Copies mtime, ownership, and mode from `src` to `dst`.
pub fn copy_file_stat(src: &Path, dst: &Path) -> io::Result<()> {
    let m = fs::metadata(src)?;
    let mtime = m.modified().unwrap_or(SystemTime::UNIX_EPOCH);

    #[cfg(unix)]
    let (uid, gid, mode) = {
        use std::os::unix::fs::MetadataExt;
        (m.uid(), m.gid(), m.mode())
    };
    #[cfg(not(unix))]
    let (uid, gid, mode) = (0u32, 0u32, 0o644u32);

    set_file_stat(dst, mtime, uid, gid, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_reg_file_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"x").unwrap();
        assert!(is_reg_file(&file));
        assert!(!is_reg_file(dir.path()));
        assert!(is_directory(dir.path()));
        assert!(!is_directory(&file));
    }

    #[test]
    fn copy_file_stat_propagates_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"a").unwrap();
        fs::write(&dst, b"b").unwrap();

        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, old).unwrap();
        copy_file_stat(&src, &dst).unwrap();

        let got = FileTime::from_last_modification_time(&fs::metadata(&dst).unwrap());
        assert_eq!(got.unix_seconds(), 1_600_000_000);
    }

    #[test]
    fn file_mtime_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("t");
        fs::write(&f, b"x").unwrap();
        filetime::set_file_mtime(&f, FileTime::from_unix_time(1_234_567_890, 0)).unwrap();
        assert_eq!(file_mtime(&f), Some(1_234_567_890));
    }
}
