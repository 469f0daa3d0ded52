//! # Pong Server Library
//!
//! This library provides the authoritative server for real-time two-player
//! pong. Clients connect over WebSocket, are matched into rooms of two, and
//! receive the room's full state every tick. Clients only ever send intents;
//! every position, collision and score is decided here.
//!
//! ## Core Responsibilities
//!
//! ### Matchmaking
//! The registry pairs incoming players into rooms:
//! - The first player in a room takes the left paddle, the second the right
//! - A full room starts its match immediately
//! - A third player is seated in a fresh room, up to a configured room cap
//! - Emptied rooms are torn down together with their tick task
//!
//! ### Authoritative Simulation
//! Each room steps its own simulation at a fixed rate (60Hz by default).
//! A step applies the players' held intents, moves the ball, resolves wall
//! and paddle collisions, and awards a point when the ball leaves the field.
//! The first side to reach the winning score ends the match.
//!
//! ### State Broadcasting
//! After every step the room sends a full snapshot to both players. Joins,
//! departures, match start and match end are announced to the room as
//! discrete events, in the order they happened.
//!
//! ## Architecture Design
//!
//! ### One Task Per Room
//! Rooms run independently: each playing room owns a tick task that holds
//! the room lock for the duration of a step. Joins, leaves and intents take
//! the same lock, so a room's state has a single writer at any time and a
//! snapshot is never torn.
//!
//! ### Fixed-Step Scheduling
//! Tick tasks measure elapsed time into an accumulator and run as many fixed
//! steps as it holds, capped so a stalled task can't spiral. The scheduler is
//! cancelled exactly once when the match stops, whether by a win or by a
//! departure.
//!
//! ### Lock Ordering
//! The registry lock is always taken before a room lock and is never held
//! while waiting for one. Joins that lose a race for a slot retry a bounded
//! number of times.
//!
//! ## Module Organization
//!
//! ### Physics Module (`physics`)
//! Ball and paddle primitives: integration, wall reflection, paddle
//! deflection and out-of-bounds detection.
//!
//! ### Game Module (`game`)
//! The per-room match state machine (`Waiting`, `Playing`, `Finished`) and
//! its tick function.
//!
//! ### Room Module (`room`)
//! Binds a simulation to its connections and to its tick scheduler.
//!
//! ### Registry Module (`registry`)
//! Process-wide index of rooms and of which room each connection is in.
//!
//! ### Network Module (`network`)
//! WebSocket listener, per-connection reader/writer tasks and the
//! `ConnectionHandler` that maps client messages onto registry calls.
//!
//! ### Error Module (`error`)
//! Join rejections and transport failures.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:3001".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     // Accepts clients until the task is dropped. Each pair of joining
//!     // players gets its own room ticking at 60Hz.
//!     let server = Server::bind(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod game;
pub mod network;
pub mod physics;
pub mod registry;
pub mod room;
