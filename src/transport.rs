//! Rendezvous transport
//!
//! A single-slot, two-party channel whose only synchronization is the header
//! stored in the shared medium itself:
//!
//! - `pending_size == 0`: the slot is free, either side may write
//! - `pending_size > 0`: a message waits for the side that did not write it
//! - `pending_size == -1`: the channel is closed for good
//!
//! `owner_turn` records which endpoint last touched the slot. A reader skips a
//! slot it owns, so it never consumes its own message or close marker.
//!
//! A read frees the slot (`pending_size = 0`) before claiming the turn, and
//! a close poisons the size field before claiming the turn. Any header the
//! peer can observe in between is either empty or closed, never a pending
//! message with the wrong owner. The poison value is honoured whoever owns
//! the turn.

use crate::config::{PollStrategy, TransportConfig};
use crate::error::{RendezvousError, Result};
use crate::layout::{
    Header, CLOSED, EMPTY, HEADER_SIZE, OWNER_TURN_OFFSET, PAYLOAD_OFFSET, PENDING_SIZE_OFFSET,
};
use crate::medium::Medium;
use tracing::{debug, trace, warn};

/// One side of a rendezvous channel
pub struct Endpoint<M: Medium> {
    medium: M,
    sender_id: i32,
    closed: bool,
    max_payload: usize,
    poll: PollStrategy,
}

impl<M: Medium> Endpoint<M> {
    /// Open the channel as its creator
    ///
    /// Resets the header to `owner_turn = sender_id, pending_size = 0`.
    /// Exactly one of the two endpoints opens this way.
    pub fn create(mut medium: M, sender_id: i32) -> Result<Self> {
        let max_payload = payload_capacity(&medium)?;
        let header = Header {
            owner_turn: sender_id,
            pending_size: EMPTY,
        };
        medium.write_field(OWNER_TURN_OFFSET, &header.encode())?;

        debug!(sender_id, max_payload, "opened channel as creator");
        Ok(Self::new(medium, sender_id, max_payload))
    }

    /// Join a channel the peer already created, leaving the header untouched
    pub fn attach(medium: M, sender_id: i32) -> Result<Self> {
        let max_payload = payload_capacity(&medium)?;

        debug!(sender_id, max_payload, "attached to channel");
        Ok(Self::new(medium, sender_id, max_payload))
    }

    fn new(medium: M, sender_id: i32, max_payload: usize) -> Self {
        Self {
            medium,
            sender_id,
            closed: false,
            max_payload,
            poll: PollStrategy::default(),
        }
    }

    /// Set what the endpoint does between unsuccessful polls
    pub fn with_poll(mut self, poll: PollStrategy) -> Self {
        self.set_poll(poll);
        self
    }

    #[inline]
    pub fn set_poll(&mut self, poll: PollStrategy) {
        self.poll = poll;
    }

    /// Apply a transport configuration
    ///
    /// Fails if the medium cannot hold `config.max_payload` bytes.
    pub fn configure(self, config: &TransportConfig) -> Result<Self> {
        if config.max_payload > self.max_payload {
            return Err(RendezvousError::PayloadTooLarge {
                max: self.max_payload,
                got: config.max_payload,
            });
        }
        Ok(self.with_poll(config.poll))
    }

    /// Identity written into the turn field
    #[inline]
    pub fn sender_id(&self) -> i32 {
        self.sender_id
    }

    /// Largest message this channel can carry
    #[inline]
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// True once this endpoint closed or observed the peer's close
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[inline]
    pub fn poll_strategy(&self) -> PollStrategy {
        self.poll
    }

    /// The underlying medium
    pub fn medium(&self) -> &M {
        &self.medium
    }

    /// Close the channel
    ///
    /// Marks this endpoint closed and poisons the size field. The peer finds
    /// out on its next read or write. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.medium.write_i32(PENDING_SIZE_OFFSET, CLOSED)?;
        self.medium.write_i32(OWNER_TURN_OFFSET, self.sender_id)?;

        debug!(sender_id = self.sender_id, "closed channel");
        Ok(())
    }

    /// Send `data`, spinning until the slot is free
    ///
    /// Returns [`RendezvousError::Closed`] if either side has closed the
    /// channel. If the peer stops reading without closing, this never returns.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.check_outgoing(data)?;
        while !self.offer(data)? {
            self.poll.pause();
        }
        Ok(())
    }

    /// Send `data` if the slot is free right now
    ///
    /// Returns `Ok(false)` when a message is still pending.
    pub fn try_write_bytes(&mut self, data: &[u8]) -> Result<bool> {
        self.check_outgoing(data)?;
        self.offer(data)
    }

    /// Receive the peer's next message into `out`, spinning until one arrives
    ///
    /// Returns the message length, or [`RendezvousError::Closed`] once the
    /// channel is closed.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> Result<usize> {
        loop {
            if let Some(len) = self.try_read_bytes(out)? {
                return Ok(len);
            }
            self.poll.pause();
        }
    }

    /// Receive the peer's message if one is pending right now
    pub fn try_read_bytes(&mut self, out: &mut [u8]) -> Result<Option<usize>> {
        if self.closed {
            return Err(RendezvousError::Closed);
        }

        let header = self.header()?;
        if header.is_closed() {
            self.closed = true;
            debug!(sender_id = self.sender_id, "peer closed channel");
            return Err(RendezvousError::Closed);
        }
        if header.is_empty() || header.owner_turn == self.sender_id {
            return Ok(None);
        }

        let len = header.pending_size as usize;
        if out.len() < len {
            return Err(RendezvousError::BufferTooSmall {
                need: len,
                got: out.len(),
            });
        }

        self.medium.read_field(PAYLOAD_OFFSET, &mut out[..len])?;
        self.medium.write_i32(PENDING_SIZE_OFFSET, EMPTY)?;
        self.medium.write_i32(OWNER_TURN_OFFSET, self.sender_id)?;

        trace!(sender_id = self.sender_id, len, "received message");
        Ok(Some(len))
    }

    fn check_outgoing(&self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(RendezvousError::Closed);
        }
        if data.is_empty() {
            return Err(RendezvousError::EmptyMessage);
        }
        if data.len() > self.max_payload {
            return Err(RendezvousError::PayloadTooLarge {
                max: self.max_payload,
                got: data.len(),
            });
        }
        Ok(())
    }

    /// One poll of the slot; writes `data` if it is free
    fn offer(&mut self, data: &[u8]) -> Result<bool> {
        let header = self.header()?;
        if header.is_closed() {
            self.closed = true;
            debug!(sender_id = self.sender_id, "peer closed channel");
            return Err(RendezvousError::Closed);
        }
        if !header.is_empty() {
            return Ok(false);
        }

        self.medium.write_field(PAYLOAD_OFFSET, data)?;
        self.medium.write_i32(OWNER_TURN_OFFSET, self.sender_id)?;
        self.medium
            .write_i32(PENDING_SIZE_OFFSET, data.len() as i32)?;

        trace!(sender_id = self.sender_id, len = data.len(), "sent message");
        Ok(true)
    }

    /// Read both header fields in a single access
    fn header(&mut self) -> Result<Header> {
        let mut raw = [0u8; HEADER_SIZE];
        self.medium.read_field(OWNER_TURN_OFFSET, &mut raw)?;
        let header = Header::decode(&raw);

        if header.pending_size < CLOSED || header.pending_size as i64 > self.max_payload as i64 {
            return Err(RendezvousError::CorruptHeader {
                pending_size: header.pending_size,
                max: self.max_payload,
            });
        }
        Ok(header)
    }
}

impl<M: Medium> Drop for Endpoint<M> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(sender_id = self.sender_id, error = %e, "failed to close channel on drop");
        }
    }
}

fn payload_capacity<M: Medium>(medium: &M) -> Result<usize> {
    let size = medium.len();
    if size <= HEADER_SIZE {
        return Err(RendezvousError::RegionTooSmall {
            size,
            header: HEADER_SIZE,
        });
    }
    Ok((size - HEADER_SIZE).min(i32::MAX as usize))
}
