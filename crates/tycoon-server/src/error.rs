//! Server-side error types.

use thiserror::Error;
use tycoon_core::GameError;

/// Errors from the durable room store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt room record: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },
}

impl StoreError {
    /// Only I/O failures are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}

/// Room-level rejections, reported to the requesting client only
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("Game already started")]
    RoomAlreadyStarted,

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Not enough players")]
    NotEnoughPlayers,

    #[error("Player not in room")]
    NotInRoom,

    #[error("Connection already bound to a room")]
    AlreadyInRoom,

    #[error(transparent)]
    Game(#[from] GameError),

    #[error("Room changed concurrently, retry")]
    VersionConflict,

    #[error("Storage unavailable, retry")]
    StorageUnavailable,

    #[error(transparent)]
    Store(StoreError),

    #[error("Request timed out; outcome unknown")]
    Timeout,

    #[error("Internal error")]
    Internal,
}

impl RoomError {
    /// Stable machine-readable name sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::RoomNotFound => "RoomNotFound",
            RoomError::RoomFull => "RoomFull",
            RoomError::RoomAlreadyStarted => "RoomAlreadyStarted",
            RoomError::NotAuthorized => "NotAuthorized",
            RoomError::NotEnoughPlayers => "NotEnoughPlayers",
            RoomError::NotInRoom => "NotInRoom",
            RoomError::AlreadyInRoom => "AlreadyInRoom",
            RoomError::Game(e) => e.code(),
            RoomError::VersionConflict => "VersionConflict",
            RoomError::StorageUnavailable => "StorageUnavailable",
            RoomError::Store(_) => "StorageError",
            RoomError::Timeout => "Timeout",
            RoomError::Internal => "Internal",
        }
    }
}

impl From<StoreError> for RoomError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Io(_) => RoomError::StorageUnavailable,
            StoreError::VersionConflict { .. } => RoomError::VersionConflict,
            other => RoomError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_pass_through_game_errors() {
        let err = RoomError::from(GameError::AlreadyOwned);
        assert_eq!(err.code(), "AlreadyOwned");
        assert_eq!(err.to_string(), "Property already owned");
    }

    #[test]
    fn test_store_errors_map_to_retryable_codes() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        assert!(StoreError::Io(io).is_transient());

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        assert_eq!(RoomError::from(StoreError::Io(io)).code(), "StorageUnavailable");

        let conflict = StoreError::VersionConflict {
            expected: 1,
            found: 2,
        };
        assert!(!conflict.is_transient());
        assert_eq!(RoomError::from(conflict).code(), "VersionConflict");
    }
}
