// File System Abstraction
//
// Every read the core performs goes through this trait so that tests and
// alternative hosts can substitute their own backing store.

use std::io;
use std::path::Path;

pub trait FileSystem: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    fn exists(&self, path: &Path) -> bool;
}

/// File system backed by the host OS.
pub struct OsFileSystem;

impl OsFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OsFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for OsFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    mod os_file_system_tests {
        use super::*;

        #[test]
        fn should_read_files_from_disk() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("a.txt");
            let mut file = std::fs::File::create(&path).unwrap();
            file.write_all(b"hello").unwrap();

            let fs = OsFileSystem::new();
            assert!(fs.exists(&path));
            assert_eq!(fs.read(&path).unwrap(), b"hello");
            assert_eq!(fs.read_to_string(&path).unwrap(), "hello");
        }

        #[test]
        fn should_report_missing_files() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("missing.txt");
            let fs = OsFileSystem::new();
            assert!(!fs.exists(&path));
            assert!(fs.read(&path).is_err());
        }
    }
}
