//! The filesystem contract the store consumes.
//!
//! Paths are `/`-separated strings relative to the filesystem root. Rename is
//! the sole atomicity primitive; both it and `write_new` refuse to clobber an
//! existing destination. Directory entries support data formats laid out as
//! directories.

pub trait FileSystem: Send + Sync {
    fn read(&self, path: &str) -> std::io::Result<Vec<u8>>;

    /// Write a new file. Fails with `AlreadyExists` if the path is taken.
    /// Parent directories are created as needed.
    fn write_new(&self, path: &str, bytes: &[u8]) -> std::io::Result<()>;

    /// Atomic rename of a file or directory. Fails with `AlreadyExists` if
    /// the destination is taken and `NotFound` if the source is absent.
    fn rename(&self, from: &str, to: &str) -> std::io::Result<()>;

    fn delete(&self, path: &str) -> std::io::Result<()>;

    fn exists(&self, path: &str) -> std::io::Result<bool>;

    fn is_dir(&self, path: &str) -> std::io::Result<bool>;

    /// Names of the immediate entries of a directory. An absent directory
    /// lists as empty.
    fn list(&self, dir: &str) -> std::io::Result<Vec<String>>;

    fn create_dir_all(&self, path: &str) -> std::io::Result<()>;

    /// Recursively delete a directory entry.
    fn delete_dir(&self, path: &str) -> std::io::Result<()>;
}
