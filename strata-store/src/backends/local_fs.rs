//! Local-disk filesystem rooted at a directory.

use std::io;
use std::path::{Component, Path, PathBuf};

use strata_core::traits::FileSystem;

/// Filesystem over `std::fs`, rooted at a base directory. All paths are
/// resolved relative to the root; escaping it is rejected.
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalFileSystem { root: root.into() }
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let relative = Path::new(path);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("path '{path}' escapes the filesystem root"),
                    ))
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

impl FileSystem for LocalFileSystem {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path)?)
    }

    fn write_new(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        let mut file = options.open(&full)?;
        io::Write::write_all(&mut file, bytes)
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let source = self.resolve(from)?;
        let destination = self.resolve(to)?;
        if !source.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("rename source '{from}' does not exist"),
            ));
        }
        if destination.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("rename destination '{to}' already exists"),
            ));
        }
        std::fs::rename(source, destination)
    }

    fn delete(&self, path: &str) -> io::Result<()> {
        std::fs::remove_file(self.resolve(path)?)
    }

    fn exists(&self, path: &str) -> io::Result<bool> {
        Ok(self.resolve(path)?.exists())
    }

    fn is_dir(&self, path: &str) -> io::Result<bool> {
        Ok(self.resolve(path)?.is_dir())
    }

    fn list(&self, dir: &str) -> io::Result<Vec<String>> {
        let full = self.resolve(dir)?;
        if !full.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(full)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn create_dir_all(&self, path: &str) -> io::Result<()> {
        std::fs::create_dir_all(self.resolve(path)?)
    }

    fn delete_dir(&self, path: &str) -> io::Result<()> {
        std::fs::remove_dir_all(self.resolve(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs() -> (tempfile::TempDir, LocalFileSystem) {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem::new(dir.path());
        (dir, fs)
    }

    #[test]
    fn write_new_refuses_overwrite() {
        let (_dir, fs) = fs();
        fs.write_new("a/b.bin", b"one").unwrap();
        let err = fs.write_new("a/b.bin", b"two").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs.read("a/b.bin").unwrap(), b"one");
    }

    #[test]
    fn rename_refuses_clobber_and_moves_files() {
        let (_dir, fs) = fs();
        fs.write_new("x.bin", b"payload").unwrap();
        fs.write_new("taken.bin", b"other").unwrap();
        assert_eq!(
            fs.rename("x.bin", "taken.bin").unwrap_err().kind(),
            io::ErrorKind::AlreadyExists
        );
        fs.rename("x.bin", "moved.bin").unwrap();
        assert!(!fs.exists("x.bin").unwrap());
        assert_eq!(fs.read("moved.bin").unwrap(), b"payload");
    }

    #[test]
    fn rename_missing_source_is_not_found() {
        let (_dir, fs) = fs();
        assert_eq!(
            fs.rename("ghost", "dest").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn list_returns_sorted_names_and_empty_for_missing_dir() {
        let (_dir, fs) = fs();
        fs.write_new("d/b.bin", b"").unwrap();
        fs.write_new("d/a.bin", b"").unwrap();
        assert_eq!(fs.list("d").unwrap(), vec!["a.bin", "b.bin"]);
        assert!(fs.list("missing").unwrap().is_empty());
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let (_dir, fs) = fs();
        assert!(fs.read("../outside").is_err());
    }

    #[test]
    fn directories_rename_atomically() {
        let (_dir, fs) = fs();
        fs.write_new("bundle/meta.json", b"{}").unwrap();
        fs.write_new("bundle/c0", b"chunk").unwrap();
        fs.rename("bundle", "bundle__time_of_removal_00000000001690000000")
            .unwrap();
        assert!(!fs.exists("bundle").unwrap());
        assert!(fs
            .is_dir("bundle__time_of_removal_00000000001690000000")
            .unwrap());
    }
}
