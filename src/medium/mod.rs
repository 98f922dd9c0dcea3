//! Shared media backing a rendezvous channel
//!
//! A medium is a fixed-size byte region that two endpoints can both reach.
//! It only offers positional copies; all coordination happens in
//! [`crate::transport`] on top of it.

pub mod file;
pub mod shm;

use crate::error::{RendezvousError, Result};

pub use file::FileMedium;
pub use shm::ShmMedium;

/// Positional access to a shared byte region
///
/// Each call copies the whole range or fails; callers never see a partial copy.
/// Dropping the handle releases whatever the backend holds.
#[allow(clippy::len_without_is_empty)]
pub trait Medium {
    /// Total region size in bytes (header included)
    fn len(&self) -> usize;

    /// Copy `out.len()` bytes starting at `offset` out of the region
    fn read_field(&mut self, offset: usize, out: &mut [u8]) -> Result<()>;

    /// Copy `data` into the region starting at `offset`
    fn write_field(&mut self, offset: usize, data: &[u8]) -> Result<()>;

    /// Read a native-endian `i32` field
    fn read_i32(&mut self, offset: usize) -> Result<i32> {
        let mut raw = [0u8; 4];
        self.read_field(offset, &mut raw)?;
        Ok(i32::from_ne_bytes(raw))
    }

    /// Write a native-endian `i32` field
    fn write_i32(&mut self, offset: usize, value: i32) -> Result<()> {
        self.write_field(offset, &value.to_ne_bytes())
    }
}

/// Reject accesses that would run past the end of the region
#[inline]
pub(crate) fn check_bounds(offset: usize, len: usize, size: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(RendezvousError::OutOfBounds { offset, len, size }),
    }
}
