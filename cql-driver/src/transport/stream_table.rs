use std::collections::VecDeque;

use cql_protocol::frame::StreamId;

/// Number of request streams a single connection can multiplex.
pub const MAX_STREAMS: usize = 128;

/// Stream id bookkeeping for one connection. Every id in `0..MAX_STREAMS` is either in the free
/// queue or has exactly one handler registered, never both.
pub(crate) struct StreamTable<H> {
    free: VecDeque<StreamId>,
    handlers: Vec<Option<H>>,
}

impl<H> Default for StreamTable<H> {
    fn default() -> Self {
        StreamTable {
            free: (0..MAX_STREAMS).map(|slot| slot as StreamId).collect(),
            handlers: (0..MAX_STREAMS).map(|_| None).collect(),
        }
    }
}

impl<H> StreamTable<H> {
    /// Takes a free stream id and registers the handler under it. Gives the handler back when all
    /// streams are live.
    pub fn acquire(&mut self, handler: H) -> Result<StreamId, H> {
        match self.free.pop_front() {
            Some(stream_id) => {
                self.handlers[stream_id as usize] = Some(handler);
                Ok(stream_id)
            }
            None => Err(handler),
        }
    }

    /// Releases a live stream id and returns its handler. Unknown or already free ids yield
    /// `None`.
    pub fn release(&mut self, stream_id: StreamId) -> Option<H> {
        let slot = usize::try_from(stream_id).ok()?;
        let handler = self.handlers.get_mut(slot)?.take()?;

        self.free.push_back(stream_id);
        Some(handler)
    }

    /// Releases every live stream id, returning their handlers.
    pub fn drain(&mut self) -> Vec<H> {
        let mut drained = vec![];
        for (slot, handler) in self.handlers.iter_mut().enumerate() {
            if let Some(handler) = handler.take() {
                self.free.push_back(slot as StreamId);
                drained.push(handler);
            }
        }

        drained
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    #[inline]
    pub fn live(&self) -> usize {
        MAX_STREAMS - self.free.len()
    }
}
