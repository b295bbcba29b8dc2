// Authoritative map of connected players.

use crate::domain::player::{ConnectionId, PlayerState, PlayerUpdate};
use std::collections::HashMap;

/// Errors returned by registry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// An entry for this connection already exists.
    AlreadyExists,
    /// No entry for this connection (never joined, or already removed).
    NotFound,
}

/// In-memory `ConnectionId -> PlayerState` table.
///
/// The registry does no locking of its own. It is owned by exactly one writer (the relay task)
/// and handed to it explicitly.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    players: HashMap<ConnectionId, PlayerState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a player with the default spawn state.
    pub fn create(&mut self, id: ConnectionId) -> Result<PlayerState, RegistryError> {
        if self.players.contains_key(&id) {
            return Err(RegistryError::AlreadyExists);
        }
        let state = PlayerState::spawn(id);
        self.players.insert(id, state.clone());
        Ok(state)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    /// Applies a validated partial update and returns the resulting state.
    pub fn update(
        &mut self,
        id: ConnectionId,
        update: PlayerUpdate,
    ) -> Result<PlayerState, RegistryError> {
        let state = self
            .players
            .get_mut(&id)
            .ok_or(RegistryError::NotFound)?;
        state.apply(update);
        Ok(state.clone())
    }

    /// Removes the entry. Removing an absent id is a no-op and returns `None`.
    pub fn remove(&mut self, id: ConnectionId) -> Option<PlayerState> {
        self.players.remove(&id)
    }

    /// Copy of every entry, used to seed a newly joined client.
    pub fn snapshot(&self) -> HashMap<ConnectionId, PlayerState> {
        self.players.clone()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.players.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
