//! One match: a [`Simulation`], the connections seated in it, and the task that ticks it.
//!
//! All mutation of a room's state happens under its `state` mutex. The tick
//! task takes that lock for the whole of each wake-up, and so do
//! `add_player`, `remove_player` and `set_intent`, which keeps each room
//! single-writer. Broadcasts are pushed onto the connections' outbound
//! queues while the lock is held, so every connection sees a room's
//! messages in the order they were produced.
//!
//! The room never touches the registry. Lock order is registry before room,
//! and the registry releases its own lock before awaiting a room.

use crate::game::{GameConfig, Simulation, TickOutcome};
use crate::network::{encode, ClientSender};
use log::{debug, error, warn};
use shared::{ConnectionId, Direction, GameSnapshot, GameStatus, RoomId, ServerMessage, Side};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

/// Upper bound on steps run in one wake-up after the task fell behind.
const MAX_CATCH_UP_TICKS: u32 = 5;

const SEATS: usize = 2;

pub struct Room {
    id: RoomId,
    config: GameConfig,
    // Mirrors of the locked state, readable by the registry without waiting on the room.
    accepting: AtomicBool,
    closed: AtomicBool,
    players: AtomicUsize,
    /// Seated players plus outstanding [`SeatReservation`]s. Never above `SEATS`.
    seats_claimed: AtomicUsize,
    state: Mutex<RoomState>,
}

struct RoomState {
    simulation: Simulation,
    intents: HashMap<ConnectionId, Direction>,
    members: HashMap<ConnectionId, ClientSender>,
    scheduler: Option<TickScheduler>,
    generation: u64,
}

impl Room {
    pub fn new(id: RoomId, config: GameConfig) -> Arc<Self> {
        let simulation = Simulation::new(id.clone(), &config);
        Self::with_simulation(simulation, config)
    }

    pub fn with_simulation(simulation: Simulation, config: GameConfig) -> Arc<Self> {
        Arc::new(Self {
            id: simulation.room_id().clone(),
            config,
            accepting: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            players: AtomicUsize::new(0),
            seats_claimed: AtomicUsize::new(0),
            state: Mutex::new(RoomState {
                simulation,
                intents: HashMap::new(),
                members: HashMap::new(),
                scheduler: None,
                generation: 0,
            }),
        })
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Whether a seat is free and not held by a pending reservation.
    pub fn is_joinable(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
            && self.seats_claimed.load(Ordering::Acquire) < SEATS
    }

    /// Closed rooms emptied out and will never accept players again.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn player_count(&self) -> usize {
        self.players.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> GameSnapshot {
        self.state.lock().await.simulation.snapshot()
    }

    /// Claims a seat without taking the room lock. The claim is what keeps
    /// concurrent joiners from all picking the same open seat.
    pub fn try_reserve(self: &Arc<Self>) -> Option<SeatReservation> {
        if !self.accepting.load(Ordering::Acquire) {
            return None;
        }
        self.seats_claimed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |claimed| {
                (claimed < SEATS).then_some(claimed + 1)
            })
            .ok()?;

        Some(SeatReservation {
            room: Arc::clone(self),
            consumed: false,
        })
    }

    /// Reserves a seat and fills it. Returns `None` when no seat is open.
    pub async fn add_player(
        self: &Arc<Self>,
        id: ConnectionId,
        sender: ClientSender,
    ) -> Option<Side> {
        let reservation = self.try_reserve()?;
        self.seat(reservation, id, sender).await
    }

    /// Seats `id` on a reserved seat and subscribes `sender` to the room's broadcasts.
    ///
    /// Announces the join and the current state to the whole room. If this
    /// fills the second slot, the match starts: `gameStarted` goes out and the
    /// tick scheduler is spawned. Returns `None`, releasing the reservation,
    /// if the room closed or finished since the seat was reserved.
    pub async fn seat(
        self: &Arc<Self>,
        mut reservation: SeatReservation,
        id: ConnectionId,
        sender: ClientSender,
    ) -> Option<Side> {
        debug_assert!(Arc::ptr_eq(&reservation.room, self));

        let mut state = self.state.lock().await;
        if self.is_closed() || state.simulation.status() == GameStatus::Finished {
            return None;
        }

        let side = state.simulation.add_player(id)?;
        reservation.consumed = true;
        state.members.insert(id, sender);
        state.broadcast(&ServerMessage::PlayerJoined {
            player_id: id,
            side,
        });
        state.broadcast_snapshot();

        if state.simulation.start() {
            state.broadcast(&ServerMessage::GameStarted);
            state.generation += 1;
            let scheduler = TickScheduler::start(Arc::clone(self), state.generation);
            state.scheduler = Some(scheduler);
        }

        self.refresh(&state);
        Some(side)
    }

    /// Unseats `id`, halting the match if it was in progress, and tells the
    /// remaining connection. Returns the number of players left, or `None`
    /// if `id` was not in this room. A room that drops to zero closes.
    pub async fn remove_player(&self, id: ConnectionId) -> Option<usize> {
        let mut state = self.state.lock().await;
        state.members.remove(&id)?;
        state.intents.remove(&id);

        let was_playing = state.simulation.status() == GameStatus::Playing;
        if state.simulation.remove_player(id).is_some() {
            self.seats_claimed.fetch_sub(1, Ordering::AcqRel);
        }
        if was_playing {
            state.stop_ticking();
        }
        state.broadcast(&ServerMessage::PlayerLeft { player_id: id });

        let remaining = state.simulation.player_count();
        if remaining == 0 {
            self.closed.store(true, Ordering::Release);
            state.stop_ticking();
        }

        self.refresh(&state);
        Some(remaining)
    }

    /// Replaces `id`'s held intent. Returns false if `id` has no paddle here.
    pub async fn set_intent(&self, id: ConnectionId, direction: Direction) -> bool {
        let mut state = self.state.lock().await;
        if state.simulation.side_of(id).is_none() {
            return false;
        }
        state.intents.insert(id, direction);
        true
    }

    fn refresh(&self, state: &RoomState) {
        let accepting = !self.is_closed() && state.simulation.status() != GameStatus::Finished;
        self.accepting.store(accepting, Ordering::Release);
        self.players
            .store(state.simulation.player_count(), Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) async fn with_simulation_mut<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> R {
        f(&mut self.state.lock().await.simulation)
    }

    /// Called after the tick task for `generation` died without being cancelled.
    /// Parks the match in `Waiting` and tells both players.
    async fn interrupt(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return;
        }

        state.stop_ticking();
        if state.simulation.interrupt() {
            state.broadcast(&ServerMessage::error("Match interrupted, please rejoin"));
            state.broadcast_snapshot();
        }
        self.refresh(&state);
    }
}

/// One claimed seat in a room, obtained from [`Room::try_reserve`].
/// Dropping it without seating a player gives the seat back.
pub struct SeatReservation {
    room: Arc<Room>,
    consumed: bool,
}

impl SeatReservation {
    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }
}

impl Drop for SeatReservation {
    fn drop(&mut self) {
        if !self.consumed {
            self.room.seats_claimed.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl RoomState {
    fn broadcast(&self, message: &ServerMessage) {
        let frame = match encode(message) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode message: {}", e);
                return;
            }
        };

        for (id, sender) in &self.members {
            if sender.send(frame.clone()).is_err() {
                debug!("Connection {} is closed, dropping message", id);
            }
        }
    }

    fn broadcast_snapshot(&self) {
        self.broadcast(&ServerMessage::GameStateUpdate {
            state: self.simulation.snapshot(),
        });
    }

    /// Cancels the running scheduler, if any. Safe to call repeatedly.
    fn stop_ticking(&mut self) -> bool {
        self.scheduler
            .as_mut()
            .is_some_and(|scheduler| scheduler.cancel())
    }

    fn owns_ticks(&self, generation: u64) -> bool {
        self.generation == generation
            && self.simulation.status() == GameStatus::Playing
            && self
                .scheduler
                .as_ref()
                .is_some_and(|scheduler| !scheduler.is_cancelled())
    }

    /// Runs one step and broadcasts its result. Returns false once the match is over.
    fn advance(&mut self) -> bool {
        match self.simulation.tick(&self.intents) {
            TickOutcome::Finished { winner } => {
                self.stop_ticking();
                self.broadcast(&ServerMessage::GameEnded { winner });
                false
            }
            TickOutcome::Continue | TickOutcome::Scored(_) => {
                self.broadcast_snapshot();
                true
            }
        }
    }
}

/// Handle to a room's fixed-rate tick task.
///
/// Cancellation is a one-shot signal: the first [`TickScheduler::cancel`]
/// fires it, later calls are no-ops. Dropping the handle also stops the task.
pub struct TickScheduler {
    stop_tx: Option<oneshot::Sender<()>>,
}

impl TickScheduler {
    fn start(room: Arc<Room>, generation: u64) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let supervised = Arc::clone(&room);
        let handle = tokio::spawn(run_tick_loop(room, generation, stop_rx));

        // A panicking room must not take anything else down with it.
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!("Room {}: tick loop panicked: {}", supervised.id, e);
                    supervised.interrupt(generation).await;
                }
            }
        });

        Self {
            stop_tx: Some(stop_tx),
        }
    }

    /// Returns true only for the call that actually cancelled the task.
    pub fn cancel(&mut self) -> bool {
        match self.stop_tx.take() {
            Some(stop_tx) => {
                let _ = stop_tx.send(());
                true
            }
            None => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop_tx.is_none()
    }
}

/// Steps the room at its configured rate using a fixed-step accumulator, so
/// the number of simulated ticks tracks elapsed time even if wake-ups jitter.
async fn run_tick_loop(room: Arc<Room>, generation: u64, mut stop_rx: oneshot::Receiver<()>) {
    let step = Duration::from_secs_f64(1.0 / f64::from(room.config.tick_rate.max(1)));
    let max_backlog = step * MAX_CATCH_UP_TICKS;

    let mut interval_timer = interval(step);
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first tick since it fires immediately
    interval_timer.tick().await;

    let mut last_update = Instant::now();
    let mut accumulator = Duration::ZERO;

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = interval_timer.tick() => {
                let current_time = Instant::now();
                accumulator += current_time - last_update;
                last_update = current_time;

                if accumulator > max_backlog {
                    warn!(
                        "Room {}: tick loop fell behind by {:.3}s, dropping backlog",
                        room.id,
                        (accumulator - max_backlog).as_secs_f32()
                    );
                    accumulator = max_backlog;
                }

                let mut state = room.state.lock().await;
                if !state.owns_ticks(generation) {
                    break;
                }

                let mut running = true;
                while running && accumulator >= step {
                    accumulator -= step;
                    running = state.advance();
                }
                if !running {
                    room.refresh(&state);
                    break;
                }
            }
        }
    }

    debug!("Room {}: tick loop {} stopped", room.id, generation);
}
