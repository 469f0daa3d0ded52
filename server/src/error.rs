use shared::RoomId;
use thiserror::Error;

/// Why a join request was refused. The `Display` text is sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// No room has an open slot and no new room may be created.
    #[error("Game room is full")]
    RoomFull,

    /// Every attempt lost the race for the slot it picked.
    #[error("Server busy, please try again")]
    ServerBusy,

    #[error("Already in room {0}")]
    AlreadyInRoom(RoomId),
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
