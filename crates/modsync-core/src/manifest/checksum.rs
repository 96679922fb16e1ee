//! CRC-32 content checksums for change detection

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crc32fast::Hasher;

/// File checksum calculator
pub struct FileChecksum;

impl FileChecksum {
    /// Compute the CRC-32 of a file by streaming its contents
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn compute(path: &Path) -> std::io::Result<u32> {
        let file = File::open(path)?;

        let mut reader = BufReader::new(file);
        let mut hasher = Hasher::new();
        let mut buffer = [0; 8192]; // 8KB buffer for streaming

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finalize())
    }

    /// Compute the CRC-32 of an in-memory buffer
    #[must_use]
    pub fn of_bytes(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_checksum_identical_files() {
        let tmp = TempDir::new().unwrap();
        let file1 = tmp.path().join("file1.txt");
        let file2 = tmp.path().join("file2.txt");

        fs::write(&file1, "same content").unwrap();
        fs::write(&file2, "same content").unwrap();

        assert_eq!(
            FileChecksum::compute(&file1).unwrap(),
            FileChecksum::compute(&file2).unwrap()
        );
    }

    #[test]
    fn test_checksum_different_files() {
        let tmp = TempDir::new().unwrap();
        let file1 = tmp.path().join("file1.txt");
        let file2 = tmp.path().join("file2.txt");

        fs::write(&file1, "content 1").unwrap();
        fs::write(&file2, "content 2").unwrap();

        assert_ne!(
            FileChecksum::compute(&file1).unwrap(),
            FileChecksum::compute(&file2).unwrap()
        );
    }

    #[test]
    fn test_checksum_matches_known_value() {
        // IEEE CRC-32 check value
        assert_eq!(FileChecksum::of_bytes(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_checksum_streams_large_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("large.bin");

        let content: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
        fs::write(&file, &content).unwrap();

        assert_eq!(
            FileChecksum::compute(&file).unwrap(),
            FileChecksum::of_bytes(&content)
        );
    }

    #[test]
    fn test_checksum_empty_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("empty.txt");
        fs::write(&file, "").unwrap();

        assert_eq!(FileChecksum::compute(&file).unwrap(), 0);
    }

    #[test]
    fn test_checksum_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert!(FileChecksum::compute(&tmp.path().join("missing")).is_err());
    }
}
