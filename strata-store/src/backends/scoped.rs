//! Filesystem view confined to a subdirectory of another filesystem.

use std::io;
use std::sync::Arc;

use strata_core::traits::FileSystem;

/// Prefixes every path with a directory, giving each project its own
/// filesystem namespace over a shared backing store.
pub struct ScopedFileSystem {
    inner: Arc<dyn FileSystem>,
    prefix: String,
}

impl ScopedFileSystem {
    pub fn new(inner: Arc<dyn FileSystem>, prefix: impl Into<String>) -> Self {
        ScopedFileSystem {
            inner,
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    fn scoped(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }
}

impl FileSystem for ScopedFileSystem {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.inner.read(&self.scoped(path))
    }

    fn write_new(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_new(&self.scoped(path), bytes)
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        self.inner.rename(&self.scoped(from), &self.scoped(to))
    }

    fn delete(&self, path: &str) -> io::Result<()> {
        self.inner.delete(&self.scoped(path))
    }

    fn exists(&self, path: &str) -> io::Result<bool> {
        self.inner.exists(&self.scoped(path))
    }

    fn is_dir(&self, path: &str) -> io::Result<bool> {
        self.inner.is_dir(&self.scoped(path))
    }

    fn list(&self, dir: &str) -> io::Result<Vec<String>> {
        self.inner.list(&self.scoped(dir))
    }

    fn create_dir_all(&self, path: &str) -> io::Result<()> {
        self.inner.create_dir_all(&self.scoped(path))
    }

    fn delete_dir(&self, path: &str) -> io::Result<()> {
        self.inner.delete_dir(&self.scoped(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryFileSystem;

    #[test]
    fn projects_do_not_see_each_other() {
        let shared: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        let demo = ScopedFileSystem::new(shared.clone(), "demo");
        let other = ScopedFileSystem::new(shared.clone(), "other");

        demo.write_new("a.nc", b"demo-bytes").unwrap();
        assert!(demo.exists("a.nc").unwrap());
        assert!(!other.exists("a.nc").unwrap());
        assert!(shared.exists("demo/a.nc").unwrap());
    }

    #[test]
    fn listing_is_relative_to_the_scope() {
        let shared: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        let demo = ScopedFileSystem::new(shared, "demo");
        demo.write_new("x.nc", b"").unwrap();
        assert_eq!(demo.list("").unwrap(), vec!["x.nc"]);
    }
}
