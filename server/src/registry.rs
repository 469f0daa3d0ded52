//! Process-wide index of live rooms and of which room each connection sits in.
//!
//! The registry's maps live behind one mutex, so concurrent joins and leaves
//! are serialized. That lock is never held while awaiting a room: a join
//! reserves a seat under the lock, releases it, then takes the room lock to
//! sit down. A reservation only fails to turn into a seat if the room closed
//! or finished in between, in which case the join picks again, up to
//! [`MAX_JOIN_ATTEMPTS`] times.

use crate::error::JoinError;
use crate::game::GameConfig;
use crate::network::ClientSender;
use crate::room::{Room, SeatReservation};
use log::{debug, info, warn};
use rand::Rng;
use shared::{ConnectionId, Direction, RoomId, Side};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const MAX_JOIN_ATTEMPTS: usize = 3;

/// Where a successful join landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub room_id: RoomId,
    pub side: Side,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    pub active_rooms: usize,
    pub active_players: usize,
}

pub struct RoomRegistry {
    config: GameConfig,
    max_rooms: usize,
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    /// Live rooms in creation order, which is also the matchmaking scan order.
    rooms: Vec<Arc<Room>>,
    connections: HashMap<ConnectionId, Arc<Room>>,
    rooms_created: u64,
}

impl RoomRegistry {
    pub fn new(config: GameConfig, max_rooms: usize) -> Self {
        Self {
            config,
            max_rooms,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Reserves a seat in the oldest room with one free, creating a room if
    /// none has.
    ///
    /// Rooms that are finished or closed are never picked. Fails with
    /// [`JoinError::RoomFull`] when a room would have to be created but
    /// `max_rooms` are already live.
    pub async fn find_or_create_room(&self) -> Result<SeatReservation, JoinError> {
        let mut inner = self.inner.lock().await;

        if let Some(reservation) = inner.rooms.iter().find_map(|room| room.try_reserve()) {
            return Ok(reservation);
        }

        if inner.rooms.len() >= self.max_rooms {
            return Err(JoinError::RoomFull);
        }

        inner.rooms_created += 1;
        let room_id = format!(
            "room-{}-{:08x}",
            inner.rooms_created,
            rand::thread_rng().gen::<u32>()
        );
        let room = Room::new(room_id, self.config);
        let reservation = room.try_reserve().ok_or(JoinError::ServerBusy)?;
        inner.rooms.push(Arc::clone(&room));
        info!("Created room {} ({} live)", room.id(), inner.rooms.len());

        Ok(reservation)
    }

    /// Seats `id` in a room and subscribes `sender` to its broadcasts.
    pub async fn join_room(
        &self,
        id: ConnectionId,
        sender: ClientSender,
    ) -> Result<Joined, JoinError> {
        if let Some(room) = self.room_of(id).await {
            return Err(JoinError::AlreadyInRoom(room.id().clone()));
        }

        for attempt in 1..=MAX_JOIN_ATTEMPTS {
            let reservation = self.find_or_create_room().await?;
            let room = Arc::clone(reservation.room());

            // Indexed before seating, so the connection is routable by the
            // time the room announces it.
            self.inner
                .lock()
                .await
                .connections
                .insert(id, Arc::clone(&room));

            if let Some(side) = room.seat(reservation, id, sender.clone()).await {
                let room_id = room.id().clone();
                return Ok(Joined { room_id, side });
            }

            self.inner.lock().await.connections.remove(&id);

            debug!(
                "Room {} closed before player {} could sit down (attempt {}/{})",
                room.id(),
                id,
                attempt,
                MAX_JOIN_ATTEMPTS
            );
        }

        warn!("Player {} gave up joining after {} attempts", id, MAX_JOIN_ATTEMPTS);
        Err(JoinError::ServerBusy)
    }

    /// Takes `id` out of its room. An emptied room is dropped from the
    /// registry; its scheduler was already cancelled when it closed.
    /// Returns the room that was left, if any.
    pub async fn leave_room(&self, id: ConnectionId) -> Option<RoomId> {
        let room = self.inner.lock().await.connections.remove(&id)?;
        room.remove_player(id).await;

        if room.is_closed() {
            let mut inner = self.inner.lock().await;
            inner.rooms.retain(|live| !Arc::ptr_eq(live, &room));
            info!("Removed empty room {} ({} live)", room.id(), inner.rooms.len());
        }

        Some(room.id().clone())
    }

    /// Forwards a paddle intent to `id`'s room. Returns false if `id` is not in a room.
    pub async fn route_intent(&self, id: ConnectionId, direction: Direction) -> bool {
        match self.room_of(id).await {
            Some(room) => room.set_intent(id, direction).await,
            None => false,
        }
    }

    pub async fn room_of(&self, id: ConnectionId) -> Option<Arc<Room>> {
        self.inner.lock().await.connections.get(&id).cloned()
    }

    pub async fn room(&self, room_id: &str) -> Option<Arc<Room>> {
        let inner = self.inner.lock().await;
        inner
            .rooms
            .iter()
            .find(|room| room.id() == room_id)
            .cloned()
    }

    pub async fn stats(&self) -> RegistryStats {
        let inner = self.inner.lock().await;
        RegistryStats {
            active_rooms: inner.rooms.len(),
            active_players: inner.connections.len(),
        }
    }
}
