//! Battery save backed by a file on disk.

use crate::HostError;
use std::fs;
use std::path::{Path, PathBuf};
use tile_core::nv::{MemoryNv, NvHost};

/// Default region size: magic tag plus a small payload
pub const FILE_NV_SIZE: usize = 32;

/// NV region loaded from a file at startup and written back on every flush.
pub struct FileNv {
    path: PathBuf,
    ram: MemoryNv,
}

impl FileNv {
    /// Open `path`, starting from a zeroed region if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HostError> {
        let path = path.into();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => vec![0; FILE_NV_SIZE],
            Err(source) => return Err(HostError::Read { path, source }),
        };
        log::debug!("battery file {} ({} bytes)", path.display(), bytes.len());
        Ok(Self {
            path,
            ram: MemoryNv::from_bytes(bytes),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), HostError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| HostError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, self.ram.bytes()).map_err(|source| HostError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl NvHost for FileNv {
    fn enable(&mut self) {
        self.ram.enable();
    }

    fn disable(&mut self) {
        self.ram.disable();
    }

    fn len(&self) -> usize {
        self.ram.len()
    }

    fn read(&self, addr: usize) -> u8 {
        self.ram.read(addr)
    }

    fn write(&mut self, addr: usize, val: u8) {
        self.ram.write(addr, val);
    }

    fn flush(&mut self) {
        // A failed write leaves the old file; the game keeps running
        if let Err(e) = self.persist() {
            log::warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tile_core::nv::MIN_NV_SIZE;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tile_host_{}_{}.sav", name, std::process::id()))
    }

    #[test]
    fn test_missing_file_is_zeroed() {
        let path = temp_path("missing");
        let _ = fs::remove_file(&path);
        let mut nv = FileNv::open(&path).unwrap();
        assert_eq!(nv.len(), FILE_NV_SIZE);
        nv.enable();
        assert_eq!(nv.read(0), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_short_file_is_padded() {
        let path = temp_path("short");
        fs::write(&path, [0x42, 7]).unwrap();
        let mut nv = FileNv::open(&path).unwrap();
        assert_eq!(nv.len(), MIN_NV_SIZE);
        nv.enable();
        assert_eq!(nv.read(0), 0x42);
        assert_eq!(nv.read(1), 7);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_flush_writes_region() {
        let path = temp_path("flush");
        let _ = fs::remove_file(&path);
        let mut nv = FileNv::open(&path).unwrap();
        nv.enable();
        nv.write(0, 0xA5);
        nv.write(3, 9);
        nv.flush();
        nv.disable();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), FILE_NV_SIZE);
        assert_eq!(bytes[0], 0xA5);
        assert_eq!(bytes[3], 9);
        let _ = fs::remove_file(&path);
    }
}
