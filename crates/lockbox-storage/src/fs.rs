use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::Path,
};

use lockbox_core::FileSystem;
use tempfile::NamedTempFile;

/// `std::fs` backed file system. Writes go through a temp file in the target
/// directory and are persisted with a rename, so readers never see a torn file.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(Some(buf))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid storage path"))?;
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn list_files(&self, dir: &Path, extension: &str) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("record.cry");
        let fs = LocalFileSystem;

        assert_eq!(fs.read(&path).expect("read missing"), None);
        fs.write(&path, b"first").expect("write");
        fs.write(&path, b"second").expect("overwrite");
        assert_eq!(fs.read(&path).expect("read").as_deref(), Some(&b"second"[..]));

        fs.remove_file(&path).expect("remove");
        fs.remove_file(&path).expect("remove again");
        assert_eq!(fs.read(&path).expect("read removed"), None);
    }

    #[test]
    fn lists_only_matching_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = LocalFileSystem;
        fs.write(&dir.path().join("a.cry"), b"1").expect("write");
        fs.write(&dir.path().join("b.json"), b"2").expect("write");
        fs.create_dir_all(&dir.path().join("c.cry")).expect("mkdir");

        let names = fs.list_files(dir.path(), "cry").expect("list");
        assert_eq!(names, vec!["a.cry".to_string()]);
        assert!(fs
            .list_files(&dir.path().join("missing"), "cry")
            .expect("list missing")
            .is_empty());
    }

    #[test]
    fn remove_dir_all_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("domain");
        let fs = LocalFileSystem;
        fs.write(&root.join("type").join("k.cry"), b"x").expect("write");
        fs.remove_dir_all(&root).expect("remove");
        fs.remove_dir_all(&root).expect("remove again");
        assert!(!root.exists());
    }
}
