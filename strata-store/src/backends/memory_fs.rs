//! In-memory filesystem test double. Directories are implicit: a path is a
//! directory exactly when some file lives beneath it.

use std::collections::BTreeMap;
use std::io;
use std::sync::Mutex;

use strata_core::traits::FileSystem;

#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

impl MemoryFileSystem {
    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_dir_locked(files: &BTreeMap<String, Vec<u8>>, path: &str) -> bool {
        let prefix = format!("{path}/");
        files.keys().any(|key| key.starts_with(&prefix))
    }
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let files = self.lock();
        files
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no file '{path}'")))
    }

    fn write_new(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let mut files = self.lock();
        let key = normalize(path);
        if files.contains_key(&key) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("file '{path}' already exists"),
            ));
        }
        files.insert(key, bytes.to_vec());
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let mut files = self.lock();
        let (from, to) = (normalize(from), normalize(to));
        let from_is_file = files.contains_key(&from);
        let from_is_dir = Self::is_dir_locked(&files, &from);
        if !from_is_file && !from_is_dir {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("rename source '{from}' does not exist"),
            ));
        }
        if files.contains_key(&to) || Self::is_dir_locked(&files, &to) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("rename destination '{to}' already exists"),
            ));
        }
        if from_is_file {
            let bytes = files.remove(&from).unwrap_or_default();
            files.insert(to, bytes);
        } else {
            let prefix = format!("{from}/");
            let moved: Vec<(String, Vec<u8>)> = files
                .iter()
                .filter(|(key, _)| key.starts_with(&prefix))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            for (key, value) in moved {
                files.remove(&key);
                let suffix = &key[prefix.len()..];
                files.insert(format!("{to}/{suffix}"), value);
            }
        }
        Ok(())
    }

    fn delete(&self, path: &str) -> io::Result<()> {
        let mut files = self.lock();
        files
            .remove(&normalize(path))
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no file '{path}'")))
    }

    fn exists(&self, path: &str) -> io::Result<bool> {
        let files = self.lock();
        let key = normalize(path);
        Ok(files.contains_key(&key) || Self::is_dir_locked(&files, &key))
    }

    fn is_dir(&self, path: &str) -> io::Result<bool> {
        let files = self.lock();
        Ok(Self::is_dir_locked(&files, &normalize(path)))
    }

    fn list(&self, dir: &str) -> io::Result<Vec<String>> {
        let files = self.lock();
        let dir = normalize(dir);
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };
        let mut names: Vec<String> = files
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .map(|rest| match rest.split_once('/') {
                Some((head, _)) => head.to_string(),
                None => rest.to_string(),
            })
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn create_dir_all(&self, _path: &str) -> io::Result<()> {
        // Directories are implicit.
        Ok(())
    }

    fn delete_dir(&self, path: &str) -> io::Result<()> {
        let mut files = self.lock();
        let prefix = format!("{}/", normalize(path));
        let keys: Vec<String> = files
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect();
        if keys.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no directory '{path}'"),
            ));
        }
        for key in keys {
            files.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_round_trip_and_no_clobber() {
        let fs = MemoryFileSystem::new();
        fs.write_new("p/a.nc", b"bytes").unwrap();
        assert_eq!(fs.read("p/a.nc").unwrap(), b"bytes");
        assert_eq!(
            fs.write_new("p/a.nc", b"x").unwrap_err().kind(),
            io::ErrorKind::AlreadyExists
        );
    }

    #[test]
    fn directory_rename_moves_every_entry() {
        let fs = MemoryFileSystem::new();
        fs.write_new("p/bundle/meta.json", b"{}").unwrap();
        fs.write_new("p/bundle/c0", b"chunk").unwrap();
        fs.rename("p/bundle", "p/bundle__gone").unwrap();
        assert!(!fs.exists("p/bundle").unwrap());
        assert_eq!(fs.read("p/bundle__gone/c0").unwrap(), b"chunk");
    }

    #[test]
    fn list_shows_immediate_children_only() {
        let fs = MemoryFileSystem::new();
        fs.write_new("p/a.nc", b"").unwrap();
        fs.write_new("p/dir/inner.bin", b"").unwrap();
        assert_eq!(fs.list("p").unwrap(), vec!["a.nc", "dir"]);
    }

    #[test]
    fn exists_sees_implicit_directories() {
        let fs = MemoryFileSystem::new();
        fs.write_new("p/zarr/meta.json", b"").unwrap();
        assert!(fs.exists("p/zarr").unwrap());
        assert!(fs.is_dir("p/zarr").unwrap());
        assert!(!fs.is_dir("p/zarr/meta.json").unwrap());
    }
}
