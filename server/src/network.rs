//! Server network layer handling WebSocket connections
//!
//! Every accepted socket gets its own task pair: a reader that turns inbound
//! frames into [`ConnectionHandler`] calls, and a writer that drains the
//! connection's outbound queue. Rooms never write to sockets directly; they
//! push frames onto that queue, so a slow client can't stall a tick.

use crate::error::ServerError;
use crate::game::GameConfig;
use crate::registry::RoomRegistry;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, ConnectionId, RoomId, ServerMessage};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Outbound queue of one connection.
pub type ClientSender = mpsc::UnboundedSender<Message>;

/// Serializes a message into a WebSocket text frame.
pub fn encode(message: &ServerMessage) -> Result<Message, serde_json::Error> {
    Ok(Message::Text(message.to_json()?.into()))
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_rooms: usize,
    /// Period of the statistics log line. Zero disables it.
    pub stats_interval: Duration,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            max_rooms: 1024,
            stats_interval: Duration::from_secs(10),
            game: GameConfig::default(),
        }
    }
}

/// Accepts WebSocket clients and hands each one to a [`ConnectionHandler`].
pub struct Server {
    listener: TcpListener,
    registry: Arc<RoomRegistry>,
    config: ServerConfig,
    next_connection_id: AtomicU32,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            registry: Arc::new(RoomRegistry::new(config.game, config.max_rooms)),
            config,
            next_connection_id: AtomicU32::new(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept loop. Only returns if the task is dropped.
    pub async fn run(self) -> Result<(), ServerError> {
        if !self.config.stats_interval.is_zero() {
            spawn_stats_reporter(Arc::clone(&self.registry), self.config.stats_interval);
        }

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
            let registry = Arc::clone(&self.registry);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, id, registry).await {
                    warn!("Connection {} ({}) ended with error: {}", id, addr, e);
                }
            });
        }
    }
}

/// Spawns task that periodically logs registry statistics
fn spawn_stats_reporter(registry: Arc<RoomRegistry>, period: Duration) {
    tokio::spawn(async move {
        let mut interval_timer = interval(period);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval_timer.tick().await;

        loop {
            interval_timer.tick().await;
            let stats = registry.stats().await;
            info!(
                "Stats: {} active rooms, {} seated players",
                stats.active_rooms, stats.active_players
            );
        }
    });
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: ConnectionId,
    registry: Arc<RoomRegistry>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream).await?;
    info!("Connection {} opened from {}", id, addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = ws_sender.send(frame).await {
                debug!("Connection {}: send failed: {}", id, e);
                break;
            }
        }
    });

    let handler = ConnectionHandler::new(id, registry, outbound);
    let result = loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => handler.handle_text(text.as_str()).await,
            Some(Ok(Message::Binary(_))) => {
                debug!("Connection {}: rejected binary frame", id);
                handler.reply(&ServerMessage::error("Binary frames are not supported"));
            }
            Some(Ok(Message::Close(_))) | None => break Ok(()),
            Some(Ok(_)) => {}
            Some(Err(e)) => break Err(ServerError::from(e)),
        }
    };

    handler.disconnect().await;
    writer.abort();
    result
}

/// Per-connection protocol logic, independent of the socket.
pub struct ConnectionHandler {
    id: ConnectionId,
    registry: Arc<RoomRegistry>,
    outbound: ClientSender,
}

impl ConnectionHandler {
    pub fn new(id: ConnectionId, registry: Arc<RoomRegistry>, outbound: ClientSender) -> Self {
        Self {
            id,
            registry,
            outbound,
        }
    }

    /// Decodes one text frame and dispatches it. Malformed input is answered
    /// with an `error` message to this connection only.
    pub async fn handle_text(&self, text: &str) {
        match ClientMessage::from_json(text) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                debug!("Connection {}: invalid message: {}", self.id, e);
                self.reply(&ServerMessage::error(format!("Invalid message: {}", e)));
            }
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) {
        match message {
            ClientMessage::Join => self.join().await,
            ClientMessage::PaddleMove { direction } => {
                if !self.registry.route_intent(self.id, direction).await {
                    debug!("Connection {}: paddle move outside a room", self.id);
                }
            }
            ClientMessage::LeaveGame => {
                self.leave().await;
            }
        }
    }

    /// Transport closed. Same as `leaveGame`.
    pub async fn disconnect(&self) {
        self.leave().await;
        info!("Connection {} closed", self.id);
    }

    /// Queues a message for this connection alone.
    pub fn reply(&self, message: &ServerMessage) {
        match encode(message) {
            Ok(frame) => {
                if self.outbound.send(frame).is_err() {
                    debug!("Connection {} is closed, dropping reply", self.id);
                }
            }
            Err(e) => error!("Failed to encode reply: {}", e),
        }
    }

    // The room announces the join itself, so only failures are answered here.
    async fn join(&self) {
        match self.registry.join_room(self.id, self.outbound.clone()).await {
            Ok(joined) => info!(
                "Connection {} joined {} on the {} side",
                self.id, joined.room_id, joined.side
            ),
            Err(e) => {
                info!("Connection {}: join rejected: {}", self.id, e);
                self.reply(&ServerMessage::error(e.to_string()));
            }
        }
    }

    async fn leave(&self) -> Option<RoomId> {
        let room_id = self.registry.leave_room(self.id).await?;
        info!("Connection {} left {}", self.id, room_id);
        Some(room_id)
    }
}
