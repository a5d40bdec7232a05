use std::{io, path::Path};

/// Raw byte-level file access. Implementations may fail transiently (a file
/// held open by another handle); callers own the retry policy.
pub trait FileSystem: Send + Sync {
    /// Whole-file read; `Ok(None)` when the file does not exist.
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>>;

    /// Replace the file contents wholesale.
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Remove a file; missing files are not an error.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Names of the files directly inside `dir` ending in `.{extension}`.
    /// A missing directory yields an empty list.
    fn list_files(&self, dir: &Path, extension: &str) -> io::Result<Vec<String>>;

    /// Recursive delete; a missing directory is not an error.
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}
