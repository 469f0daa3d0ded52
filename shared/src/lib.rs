//! Playfield constants and the JSON wire protocol shared by the server and its clients.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const PLAYFIELD_WIDTH: f32 = 800.0;
pub const PLAYFIELD_HEIGHT: f32 = 400.0;
pub const PADDLE_WIDTH: f32 = 10.0;
pub const PADDLE_HEIGHT: f32 = 80.0;
pub const BALL_RADIUS: f32 = 8.0;
/// Serve speed along x, and the scale of the paddle deflection formula.
pub const BALL_SPEED: f32 = 5.0;
/// Paddle travel per tick while an intent is held.
pub const PADDLE_SPEED: f32 = 8.0;
pub const WINNING_SCORE: u32 = 5;
pub const TICK_RATE: u32 = 60;

/// Process-unique identifier of one client connection.
pub type ConnectionId = u32;

pub type RoomId = String;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// A held paddle input. Persists until the client sends a different one.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    #[default]
    Stop,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Waiting,
    Playing,
    Paused,
    Finished,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BallState {
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub radius: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub id: ConnectionId,
    pub y: f32,
    pub side: Side,
    pub connected: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Players {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<PlayerState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<PlayerState>,
}

impl Players {
    pub fn get(&self, side: Side) -> Option<&PlayerState> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Score {
    pub left: u32,
    pub right: u32,
}

impl Score {
    pub fn of(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// Full copy of one room's simulation state, as broadcast to clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub ball: BallState,
    pub players: Players,
    pub score: Score,
    pub game_status: GameStatus,
    pub room_id: RoomId,
}

/// Messages sent by clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(alias = "joinGame")]
    Join,
    PaddleMove { direction: Direction },
    LeaveGame,
}

impl ClientMessage {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Messages sent by the server, either to one connection or to a whole room.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    PlayerJoined {
        #[serde(rename = "playerId")]
        player_id: ConnectionId,
        side: Side,
    },
    GameStateUpdate {
        state: GameSnapshot,
    },
    GameStarted,
    GameEnded {
        winner: Side,
    },
    PlayerLeft {
        #[serde(rename = "playerId")]
        player_id: ConnectionId,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
