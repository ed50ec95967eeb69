//! Room registry: live rooms, room codes, and the commit path.
//!
//! Every mutation of a room goes through [`Registry::transact`], which holds
//! the room's lock for the whole read-modify-persist-publish sequence.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tycoon_core::PlayerId;
use uuid::Uuid;

use crate::error::{RoomError, StoreError};
use crate::protocol::RoomInfo;
use crate::room::GameRoom;
use crate::store::{persist_with_retry, with_retry, RetryPolicy, RoomStore};

pub const ROOM_CODE_LEN: usize = 6;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Six uppercase alphanumeric characters, matched case-insensitively
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..ROOM_CODE_LEN)
            .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomCode {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        if code.len() != ROOM_CODE_LEN || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(RoomError::RoomNotFound);
        }
        Ok(Self(code))
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type RoomHandle = Arc<Mutex<GameRoom>>;

/// All live rooms, each behind its own lock
pub struct Registry {
    rooms: DashMap<RoomCode, RoomHandle>,
    store: Arc<dyn RoomStore>,
    retry: RetryPolicy,
}

impl Registry {
    pub fn new(store: Arc<dyn RoomStore>, retry: RetryPolicy) -> Self {
        Self {
            rooms: DashMap::new(),
            store,
            retry,
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn room(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(code)
            .map(|r| Arc::clone(r.value()))
            .ok_or(RoomError::RoomNotFound)
    }

    /// Load every persisted room. Nobody is connected after a restart.
    pub fn restore(&self) -> Result<usize, RoomError> {
        let mut restored = 0;
        for snapshot in self.store.load_all()? {
            let id = snapshot.id.clone();
            let mut room = match GameRoom::from_snapshot(snapshot) {
                Ok(room) => room,
                Err(e) => {
                    warn!(room = %id, error = %e, "Skipping unreadable room");
                    continue;
                }
            };
            for player in room.game.players.iter_mut() {
                player.connected = false;
            }
            self.rooms
                .insert(room.code.clone(), Arc::new(Mutex::new(room)));
            restored += 1;
        }
        Ok(restored)
    }

    /// Create a room with its host seated, persist it, then register it.
    ///
    /// `publish` runs with the committed room before its lock is released.
    pub async fn create_room<P>(
        &self,
        host_name: String,
        max_players: u8,
        publish: P,
    ) -> Result<(RoomCode, PlayerId), RoomError>
    where
        P: FnOnce(&mut GameRoom, PlayerId),
    {
        let host_id = Uuid::new_v4();

        let handle = loop {
            let code = RoomCode::random(&mut rand::thread_rng());
            match self.rooms.entry(code.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let mut room = GameRoom::new(code, host_id, host_name.clone(), max_players);
                    room.version = 1;
                    let handle = Arc::new(Mutex::new(room));
                    slot.insert(Arc::clone(&handle));
                    break handle;
                }
            }
        };

        let mut room = handle.lock().await;
        let code = room.code.clone();
        if let Err(e) =
            persist_with_retry(Arc::clone(&self.store), room.snapshot(), 0, &self.retry).await
        {
            warn!(room = %code, error = %e, "Failed to persist new room");
            room.close();
            self.rooms.remove(&code);
            return Err(e.into());
        }

        info!(room = %code, host = %host_id, "Room created");
        publish(&mut *room, host_id);
        Ok((code, host_id))
    }

    /// Apply `f` to a working copy of the room under its lock.
    ///
    /// The copy is persisted with a compare-and-swap on the version and only
    /// then committed; `publish` sees the committed room while the lock is
    /// still held, so broadcasts leave in commit order. A room the mutation
    /// closes is deleted from the store and the registry.
    pub async fn transact<T, F, P>(&self, code: &RoomCode, f: F, publish: P) -> Result<T, RoomError>
    where
        F: FnOnce(&mut GameRoom) -> Result<T, RoomError>,
        P: FnOnce(&mut GameRoom, &T),
    {
        let handle = self.room(code)?;
        let mut room = handle.lock().await;
        if room.closed {
            return Err(RoomError::RoomNotFound);
        }

        let mut working = room.clone();
        let out = f(&mut working)?;

        if working == *room {
            publish(&mut *room, &out);
            return Ok(out);
        }

        working.version = room.version + 1;

        if working.closed {
            let store = Arc::clone(&self.store);
            let key = code.to_string();
            with_retry(&self.retry, move || store.delete(&key))
                .await
                .map_err(RoomError::from)?;
            *room = working;
            self.rooms.remove(code);
            info!(room = %code, "Room destroyed");
            publish(&mut *room, &out);
            return Ok(out);
        }

        match persist_with_retry(
            Arc::clone(&self.store),
            working.snapshot(),
            room.version,
            &self.retry,
        )
        .await
        {
            Ok(()) => {}
            Err(StoreError::VersionConflict { expected, found }) => {
                warn!(room = %code, expected, found, "Version conflict, reloading room");
                self.reload(&mut *room).await;
                return Err(RoomError::VersionConflict);
            }
            Err(e) => {
                warn!(room = %code, error = %e, "Failed to persist room");
                return Err(e.into());
            }
        }

        *room = working;
        debug!(room = %code, version = room.version, "Room committed");
        publish(&mut *room, &out);
        Ok(out)
    }

    /// Replace the in-memory room with the stored one, keeping connections
    async fn reload(&self, room: &mut GameRoom) {
        let store = Arc::clone(&self.store);
        let key = room.code.to_string();
        match with_retry(&self.retry, move || store.load(&key)).await {
            Ok(Some(snapshot)) => match GameRoom::from_snapshot(snapshot) {
                Ok(mut fresh) => {
                    fresh.members = std::mem::take(&mut room.members);
                    *room = fresh;
                }
                Err(e) => warn!(room = %room.code, error = %e, "Stored room unreadable"),
            },
            Ok(None) => warn!(room = %room.code, "Room missing from store"),
            Err(e) => warn!(room = %room.code, error = %e, "Failed to reload room"),
        }
    }

    /// Rooms that can still be joined
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let handles: Vec<RoomHandle> = self.rooms.iter().map(|r| Arc::clone(r.value())).collect();

        let mut rooms = Vec::new();
        for handle in handles {
            let room = handle.lock().await;
            if !room.closed && !room.is_started() && !room.is_full() {
                rooms.push(room.to_info());
            }
        }
        rooms.sort_by_key(|r| r.created_at);
        rooms
    }
}
