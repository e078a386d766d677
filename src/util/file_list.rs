//! Recursive directory expansion for the `-r` option.

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Expands `paths` into a flat list: regular files pass through, directories
/// are walked recursively (regular files only, in directory order). Broken
/// entries surface as errors.
pub fn create_file_list(paths: &[&Path]) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(false) {
                let entry = entry.map_err(|e| {
                    io::Error::new(io::ErrorKind::Other, format!("{}: {}", path.display(), e))
                })?;
                if entry.file_type().is_file() {
                    out.push(entry.into_path());
                }
            }
        } else {
            out.push(path.to_path_buf());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn expands_directories_and_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(sub.join("b.txt"), b"b").unwrap();

        let lone = dir.path().join("a.txt");
        let list = create_file_list(&[&lone, &sub]).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(&lone));
        assert!(list.contains(&sub.join("b.txt")));
    }

    #[test]
    fn plain_file_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("x");
        fs::write(&f, b"x").unwrap();
        let list = create_file_list(&[&f]).unwrap();
        assert_eq!(list, vec![f]);
    }
}
