//! The push-channel table.
//!
//! Three slots, each naming at most one live connection whose event page has
//! finished its head and now waits for payloads from an external publisher.
//! A slot never owns its connection: it only stores the id, and every use
//! checks the connection is still alive.

use button_http::protocol::SendError;
use thiserror::Error;

use crate::request::ConnectionId;

pub const CHANNEL_SLOTS: usize = 3;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("channel slot {slot} is empty")]
    EmptySlot { slot: usize },

    #[error("channel slot {slot} refers to a closed connection")]
    Stale { slot: usize },

    #[error("unable to push chunk: {source}")]
    Send {
        #[from]
        source: SendError,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelTable {
    slots: [Option<ConnectionId>; CHANNEL_SLOTS],
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `id` into the first free slot.
    pub fn register(&mut self, id: ConnectionId) -> Option<usize> {
        let slot = self.slots.iter().position(Option::is_none)?;
        self.slots[slot] = Some(id);
        Some(slot)
    }

    /// Empties `slot`, returning who held it.
    pub fn unregister(&mut self, slot: usize) -> Option<ConnectionId> {
        self.slots.get_mut(slot)?.take()
    }

    pub fn get(&self, slot: usize) -> Option<ConnectionId> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn slot_of(&self, id: ConnectionId) -> Option<usize> {
        self.slots.iter().position(|held| *held == Some(id))
    }

    /// Empties every slot not held by `keep`, returning the evicted entries.
    pub fn evict_others(&mut self, keep: ConnectionId) -> Vec<(usize, ConnectionId)> {
        let mut evicted = Vec::new();
        for (slot, held) in self.slots.iter_mut().enumerate() {
            if let Some(id) = *held
                && id != keep
            {
                *held = None;
                evicted.push((slot, id));
            }
        }
        evicted
    }

    /// Occupied slots in slot order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, ConnectionId)> + '_ {
        self.slots.iter().enumerate().filter_map(|(slot, held)| held.map(|id| (slot, id)))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}
