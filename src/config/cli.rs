use crate::core::Storage;
use crate::utils::error::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Files under one output directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let full_path = Path::new(&self.base_path).join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(full_path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = Path::new(&self.base_path).join(path);
        let data = fs::read(full_path)?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        fs::write(self.full_path(path)?, data)?;
        Ok(())
    }

    async fn append_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.full_path(path)?)?;
        file.write_all(data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_nested_directories() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_string_lossy().to_string());

        tokio_test::block_on(async {
            storage.write_file("tables/fips.csv", b"DUNS,FIPS\n").await.unwrap();
            let data = storage.read_file("tables/fips.csv").await.unwrap();
            assert_eq!(data, b"DUNS,FIPS\n");
        });
    }

    #[test]
    fn test_append_never_rewrites() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_string_lossy().to_string());

        tokio_test::block_on(async {
            storage.append_file("errors.log", b"first\n").await.unwrap();
            storage.append_file("errors.log", b"second\n").await.unwrap();
            let data = storage.read_file("errors.log").await.unwrap();
            assert_eq!(data, b"first\nsecond\n");
        });
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_string_lossy().to_string());

        let err = tokio_test::block_on(storage.read_file("absent.csv")).unwrap_err();
        assert!(matches!(err, crate::utils::error::EtlError::IoError(_)));
    }
}
