//! File-backed medium
//!
//! The region is a regular file. Every access repositions the cursor and
//! writes are flushed, so visibility between processes goes through the page
//! cache like any other file I/O.

use super::{check_bounds, Medium};
use crate::error::{RendezvousError, Result};
use crate::layout::{region_size, HEADER_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Handle to a region file
pub struct FileMedium {
    file: File,
    path: PathBuf,
    size: usize,
}

impl FileMedium {
    /// Create (or truncate) the region file with room for `max_payload` bytes
    ///
    /// The file is sized with `set_len`, so every byte starts out zero.
    pub fn create(path: impl AsRef<Path>, max_payload: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size = region_size(max_payload);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| RendezvousError::FileCreate {
                path: path.clone(),
                source,
            })?;
        file.set_len(size as u64).map_err(RendezvousError::Truncate)?;

        debug!(path = %path.display(), size, "created region file");
        Ok(Self { file, path, size })
    }

    /// Open an existing region file created by the peer
    pub fn attach(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| RendezvousError::FileOpen {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(open_err)?;
        let size = file.metadata().map_err(open_err)?.len() as usize;
        if size < HEADER_SIZE {
            return Err(RendezvousError::RegionTooSmall {
                size,
                header: HEADER_SIZE,
            });
        }

        debug!(path = %path.display(), size, "attached region file");
        Ok(Self { file, path, size })
    }

    /// Path of the region file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Medium for FileMedium {
    fn len(&self) -> usize {
        self.size
    }

    fn read_field(&mut self, offset: usize, out: &mut [u8]) -> Result<()> {
        check_bounds(offset, out.len(), self.size)?;
        let io_err = |source| RendezvousError::Io { offset, source };

        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(io_err)?;
        self.file.read_exact(out).map_err(io_err)
    }

    fn write_field(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        check_bounds(offset, data.len(), self.size)?;
        let io_err = |source| RendezvousError::Io { offset, source };

        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(io_err)?;
        self.file.write_all(data).map_err(io_err)?;
        self.file.flush().map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PAYLOAD_OFFSET;

    #[test]
    fn test_create_is_zeroed() {
        let dir = tempfile::tempdir().unwrap();
        let mut medium = FileMedium::create(dir.path().join("region"), 64).unwrap();
        assert_eq!(medium.len(), region_size(64));

        let mut buf = vec![0xAAu8; medium.len()];
        medium.read_field(0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_create_truncates_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region");
        std::fs::write(&path, vec![0xFFu8; 4096]).unwrap();

        let mut medium = FileMedium::create(&path, 16).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), region_size(16) as u64);
        assert_eq!(medium.read_i32(0).unwrap(), 0);
    }

    #[test]
    fn test_attach_sees_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region");

        let mut creator = FileMedium::create(&path, 32).unwrap();
        let mut peer = FileMedium::attach(&path).unwrap();
        assert_eq!(peer.len(), creator.len());

        creator.write_i32(4, 42).unwrap();
        creator.write_field(PAYLOAD_OFFSET, b"hello").unwrap();

        assert_eq!(peer.read_i32(4).unwrap(), 42);
        let mut buf = [0u8; 5];
        peer.read_field(PAYLOAD_OFFSET, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut medium = FileMedium::create(dir.path().join("region"), 4).unwrap();
        let mut buf = [0u8; 8];
        assert!(matches!(
            medium.read_field(8, &mut buf),
            Err(RendezvousError::OutOfBounds { .. })
        ));
        assert!(medium.write_field(10, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_attach_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileMedium::attach(dir.path().join("missing"));
        assert!(matches!(result, Err(RendezvousError::FileOpen { .. })));
    }

    #[test]
    fn test_attach_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short");
        std::fs::write(&path, [0u8; 3]).unwrap();
        assert!(matches!(
            FileMedium::attach(&path),
            Err(RendezvousError::RegionTooSmall { size: 3, .. })
        ));
    }
}
