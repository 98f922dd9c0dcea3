//! Shared-memory medium
//!
//! The region is a POSIX shared memory object. No mapping is held between
//! calls: every field access maps the segment, copies, and unmaps again, so
//! each access pays an attach/release cost comparable to the file backend.

use super::{check_bounds, Medium};
use crate::error::{RendezvousError, Result};
use crate::layout::{region_size, HEADER_SIZE};
use rustix::fd::OwnedFd;
use rustix::fs::{fstat, ftruncate};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use rustix::shm::{shm_open, shm_unlink, Mode, ShmOFlags};
use std::ffi::CString;
use std::io;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicU64, Ordering};
use tracing::{debug, warn};

const SHM_PREFIX: &str = "/rendezvous_";

static NEXT_SEGMENT: AtomicU64 = AtomicU64::new(0);

/// Handle to a shared memory segment
pub struct ShmMedium {
    fd: OwnedFd,
    size: usize,
    name: String,
    is_owner: bool,
}

impl ShmMedium {
    /// Allocate a fresh, exclusive segment with room for `max_payload` bytes
    ///
    /// The name is generated from the process id and a per-process counter.
    /// The kernel zero-fills the segment when it is sized.
    pub fn create(max_payload: usize) -> Result<Self> {
        let name = format!(
            "{}{}_{}",
            SHM_PREFIX,
            std::process::id(),
            NEXT_SEGMENT.fetch_add(1, Ordering::Relaxed)
        );
        let size = region_size(max_payload);
        let c_name = c_name(&name).map_err(|source| RendezvousError::ShmCreate {
            name: name.clone(),
            source,
        })?;

        let fd = shm_open(
            c_name.as_c_str(),
            ShmOFlags::CREATE | ShmOFlags::EXCL | ShmOFlags::RDWR,
            Mode::RUSR | Mode::WUSR,
        )
        .map_err(|e| RendezvousError::ShmCreate {
            name: name.clone(),
            source: e.into(),
        })?;

        // From here on the name exists; Drop unlinks it if sizing fails
        let medium = Self {
            fd,
            size,
            name,
            is_owner: true,
        };
        ftruncate(&medium.fd, size as u64).map_err(|e| RendezvousError::Truncate(e.into()))?;

        debug!(name = %medium.name, size, "created shared memory segment");
        Ok(medium)
    }

    /// Open an existing segment created by the peer
    pub fn attach(name: &str) -> Result<Self> {
        let open_err = |source: io::Error| RendezvousError::ShmOpen {
            name: name.to_string(),
            source,
        };
        let c_name = c_name(name).map_err(open_err)?;

        let fd = shm_open(c_name.as_c_str(), ShmOFlags::RDWR, Mode::empty())
            .map_err(|e| open_err(e.into()))?;
        let stat = fstat(&fd).map_err(|e| open_err(e.into()))?;
        let size = stat.st_size as usize;
        if size < HEADER_SIZE {
            return Err(RendezvousError::RegionTooSmall {
                size,
                header: HEADER_SIZE,
            });
        }

        debug!(name, size, "attached shared memory segment");
        Ok(Self {
            fd,
            size,
            name: name.to_string(),
            is_owner: false,
        })
    }

    /// Name the peer passes to [`ShmMedium::attach`]
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if this handle owns (and will unlink) the segment
    #[inline]
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    fn map(&self) -> Result<Mapping> {
        Mapping::new(&self.fd, self.size)
    }
}

impl Medium for ShmMedium {
    fn len(&self) -> usize {
        self.size
    }

    fn read_field(&mut self, offset: usize, out: &mut [u8]) -> Result<()> {
        check_bounds(offset, out.len(), self.size)?;
        let mapping = self.map()?;
        fence(Ordering::Acquire);
        unsafe {
            std::ptr::copy_nonoverlapping(
                mapping.as_ptr().add(offset),
                out.as_mut_ptr(),
                out.len(),
            );
        }
        Ok(())
    }

    fn write_field(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        check_bounds(offset, data.len(), self.size)?;
        let mapping = self.map()?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapping.as_ptr().add(offset), data.len());
        }
        fence(Ordering::Release);
        Ok(())
    }
}

impl Drop for ShmMedium {
    fn drop(&mut self) {
        if !self.is_owner {
            return;
        }
        let Ok(c_name) = CString::new(self.name.as_str()) else {
            return;
        };
        match shm_unlink(c_name.as_c_str()) {
            Ok(()) => debug!(name = %self.name, "unlinked shared memory segment"),
            Err(e) => warn!(name = %self.name, error = %e, "failed to unlink shared memory segment"),
        }
    }
}

/// A mapping that lives for a single field access
struct Mapping {
    addr: NonNull<u8>,
    size: usize,
}

impl Mapping {
    fn new(fd: &OwnedFd, size: usize) -> Result<Self> {
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                fd,
                0,
            )
            .map_err(|e| RendezvousError::Mmap(e.into()))?
        };
        let addr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| RendezvousError::Mmap(io::Error::other("mmap returned null")))?;
        Ok(Self { addr, size })
    }

    #[inline(always)]
    fn as_ptr(&self) -> *mut u8 {
        self.addr.as_ptr()
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(self.addr.as_ptr().cast(), self.size);
        }
    }
}

fn c_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PAYLOAD_OFFSET;

    #[test]
    fn test_create_and_attach() {
        let mut creator = ShmMedium::create(256).unwrap();
        assert!(creator.is_owner());
        assert_eq!(creator.len(), region_size(256));
        assert!(creator.name().starts_with(SHM_PREFIX));

        creator.write_i32(0, 3).unwrap();
        creator.write_field(PAYLOAD_OFFSET, b"shared").unwrap();

        let mut peer = ShmMedium::attach(creator.name()).unwrap();
        assert!(!peer.is_owner());
        assert_eq!(peer.len(), creator.len());
        assert_eq!(peer.read_i32(0).unwrap(), 3);

        let mut buf = [0u8; 6];
        peer.read_field(PAYLOAD_OFFSET, &mut buf).unwrap();
        assert_eq!(&buf, b"shared");

        peer.write_i32(4, -1).unwrap();
        assert_eq!(creator.read_i32(4).unwrap(), -1);
    }

    #[test]
    fn test_create_is_zeroed() {
        let mut medium = ShmMedium::create(64).unwrap();
        let mut buf = vec![0xAAu8; medium.len()];
        medium.read_field(0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_segments_are_distinct() {
        let a = ShmMedium::create(8).unwrap();
        let b = ShmMedium::create(8).unwrap();
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn test_owner_drop_unlinks() {
        let creator = ShmMedium::create(8).unwrap();
        let name = creator.name().to_string();
        drop(creator);
        assert!(matches!(
            ShmMedium::attach(&name),
            Err(RendezvousError::ShmOpen { .. })
        ));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut medium = ShmMedium::create(4).unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(
            medium.read_field(region_size(4) - 2, &mut buf),
            Err(RendezvousError::OutOfBounds { .. })
        ));
    }
}
