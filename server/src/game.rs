//! Authoritative simulation of a single match.
//!
//! A [`Simulation`] knows nothing about timers or sockets. Its owner feeds it
//! one fixed step at a time through [`Simulation::tick`], handing over the
//! currently held paddle intents, and reads the result back through
//! [`Simulation::snapshot`].

use crate::physics::{Ball, Paddle};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    ConnectionId, Direction, GameSnapshot, GameStatus, Players, RoomId, Score, Side, TICK_RATE,
    WINNING_SCORE,
};
use std::collections::HashMap;

/// Per-room tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    /// Simulation steps per second.
    pub tick_rate: u32,
    /// Score that ends the match.
    pub winning_score: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            winning_score: WINNING_SCORE,
        }
    }
}

/// What a single step did to the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Scored(Side),
    Finished { winner: Side },
}

#[derive(Debug, Clone)]
pub struct Simulation {
    room_id: RoomId,
    ball: Ball,
    left: Option<Paddle>,
    right: Option<Paddle>,
    score: Score,
    status: GameStatus,
    winning_score: u32,
    rng: StdRng,
}

impl Simulation {
    pub fn new(room_id: RoomId, config: &GameConfig) -> Self {
        Self::with_rng(room_id, config, StdRng::from_entropy())
    }

    /// Deterministic serves, for tests and replays.
    pub fn with_seed(room_id: RoomId, config: &GameConfig, seed: u64) -> Self {
        Self::with_rng(room_id, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(room_id: RoomId, config: &GameConfig, mut rng: StdRng) -> Self {
        let ball = serve(&mut rng);
        Self {
            room_id,
            ball,
            left: None,
            right: None,
            score: Score::default(),
            status: GameStatus::Waiting,
            winning_score: config.winning_score,
            rng,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn paddle(&self, side: Side) -> Option<&Paddle> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }

    fn slot_mut(&mut self, side: Side) -> &mut Option<Paddle> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn player_count(&self) -> usize {
        usize::from(self.left.is_some()) + usize::from(self.right.is_some())
    }

    /// First free side, left before right.
    pub fn open_side(&self) -> Option<Side> {
        if self.left.is_none() {
            Some(Side::Left)
        } else if self.right.is_none() {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn side_of(&self, id: ConnectionId) -> Option<Side> {
        [Side::Left, Side::Right]
            .into_iter()
            .find(|side| self.paddle(*side).is_some_and(|p| p.owner == id))
    }

    /// Seats `id` in the first open slot. Does not start the match.
    pub fn add_player(&mut self, id: ConnectionId) -> Option<Side> {
        let side = self.open_side()?;
        *self.slot_mut(side) = Some(Paddle::new(id, side));
        info!("Room {}: player {} took the {} paddle", self.room_id, id, side);
        Some(side)
    }

    /// Clears `id`'s slot. A match in progress falls back to `Waiting`.
    pub fn remove_player(&mut self, id: ConnectionId) -> Option<Side> {
        let side = self.side_of(id)?;
        *self.slot_mut(side) = None;
        if self.status == GameStatus::Playing {
            self.status = GameStatus::Waiting;
        }
        info!("Room {}: player {} left the {} paddle", self.room_id, id, side);
        Some(side)
    }

    pub fn can_start(&self) -> bool {
        self.left.is_some() && self.right.is_some() && self.status == GameStatus::Waiting
    }

    /// Moves to `Playing` if both slots are filled. Returns whether it did.
    pub fn start(&mut self) -> bool {
        if !self.can_start() {
            return false;
        }
        self.status = GameStatus::Playing;
        info!("Room {}: match started", self.room_id);
        true
    }

    /// Abandons a match in progress: back to `Waiting` with a fresh serve.
    /// Score and seats are kept. Returns false unless the match was `Playing`.
    pub fn interrupt(&mut self) -> bool {
        if self.status != GameStatus::Playing {
            return false;
        }
        self.status = GameStatus::Waiting;
        self.ball = serve(&mut self.rng);
        true
    }

    /// Advances the match by one fixed step. A no-op unless `Playing`.
    ///
    /// Order: paddle intents, ball integration, wall then paddle collisions
    /// (left before right), scoring, win check.
    pub fn tick(&mut self, intents: &HashMap<ConnectionId, Direction>) -> TickOutcome {
        if self.status != GameStatus::Playing {
            return TickOutcome::Continue;
        }

        for paddle in [&mut self.left, &mut self.right].into_iter().flatten() {
            if let Some(direction) = intents.get(&paddle.owner) {
                paddle.apply(*direction);
            }
        }

        self.ball.integrate();
        self.ball.resolve_walls();
        for paddle in [&self.left, &self.right].into_iter().flatten() {
            self.ball.resolve_paddle(paddle);
        }

        let Some(scorer) = self.ball.exit_side() else {
            return TickOutcome::Continue;
        };

        match scorer {
            Side::Left => self.score.left += 1,
            Side::Right => self.score.right += 1,
        }
        self.ball = serve(&mut self.rng);
        debug!(
            "Room {}: {} scored ({}-{})",
            self.room_id, scorer, self.score.left, self.score.right
        );

        if self.score.of(scorer) >= self.winning_score {
            self.status = GameStatus::Finished;
            info!(
                "Room {}: {} wins {}-{}",
                self.room_id, scorer, self.score.left, self.score.right
            );
            return TickOutcome::Finished { winner: scorer };
        }
        TickOutcome::Scored(scorer)
    }

    /// Owned copy of the full state; nothing in it aliases the simulation.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            ball: self.ball.state(),
            players: Players {
                left: self.left.map(|p| p.state()),
                right: self.right.map(|p| p.state()),
            },
            score: self.score,
            game_status: self.status,
            room_id: self.room_id.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_ball(&mut self, ball: Ball) {
        self.ball = ball;
    }

    #[cfg(test)]
    pub(crate) fn set_score(&mut self, score: Score) {
        self.score = score;
    }
}

fn serve(rng: &mut StdRng) -> Ball {
    Ball::serve(rng.gen_bool(0.5), rng.gen::<f32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::Vector2;
    use assert_approx_eq::assert_approx_eq;
    use shared::{
        BALL_RADIUS, BALL_SPEED, PADDLE_HEIGHT, PADDLE_WIDTH, PLAYFIELD_HEIGHT, PLAYFIELD_WIDTH,
    };

    fn playing(config: &GameConfig) -> Simulation {
        let mut sim = Simulation::with_seed("room-test".to_string(), config, 7);
        sim.add_player(1);
        sim.add_player(2);
        assert!(sim.start());
        sim
    }

    fn ball_at(x: f32, y: f32, vx: f32, vy: f32) -> Ball {
        Ball {
            position: Vector2::new(x, y),
            velocity: Vector2::new(vx, vy),
            radius: BALL_RADIUS,
        }
    }

    fn no_intents() -> HashMap<ConnectionId, Direction> {
        HashMap::new()
    }

    #[test]
    fn test_slots_fill_left_then_right() {
        let mut sim = Simulation::with_seed("r".to_string(), &GameConfig::default(), 1);
        assert_eq!(sim.add_player(10), Some(Side::Left));
        assert!(!sim.can_start());
        assert_eq!(sim.add_player(11), Some(Side::Right));
        assert_eq!(sim.add_player(12), None);
        assert_eq!(sim.status(), GameStatus::Waiting);
        assert!(sim.can_start());
        assert_eq!(sim.side_of(11), Some(Side::Right));
        assert_eq!(sim.side_of(12), None);
    }

    #[test]
    fn test_vacated_left_slot_is_reused_first() {
        let mut sim = playing(&GameConfig::default());
        assert_eq!(sim.remove_player(1), Some(Side::Left));
        assert_eq!(sim.status(), GameStatus::Waiting);
        assert_eq!(sim.open_side(), Some(Side::Left));
        assert_eq!(sim.add_player(3), Some(Side::Left));
    }

    #[test]
    fn test_interrupt_only_applies_while_playing() {
        let mut sim = playing(&GameConfig::default());
        sim.set_score(Score { left: 2, right: 1 });
        sim.set_ball(ball_at(700.0, 30.0, 5.0, 2.0));

        assert!(sim.interrupt());
        assert_eq!(sim.status(), GameStatus::Waiting);
        assert_eq!(sim.score(), Score { left: 2, right: 1 });
        assert_eq!(sim.ball().position, Vector2::new(400.0, 200.0));
        assert_eq!(sim.player_count(), 2);
        assert!(!sim.interrupt());
    }

    #[test]
    fn test_remove_unknown_player_is_noop() {
        let mut sim = playing(&GameConfig::default());
        assert_eq!(sim.remove_player(99), None);
        assert_eq!(sim.status(), GameStatus::Playing);
    }

    #[test]
    fn test_tick_does_nothing_while_waiting() {
        let mut sim = Simulation::with_seed("r".to_string(), &GameConfig::default(), 1);
        sim.add_player(1);
        let before = sim.snapshot();
        assert_eq!(sim.tick(&no_intents()), TickOutcome::Continue);
        assert_eq!(sim.snapshot(), before);
    }

    #[test]
    fn test_intents_are_held_across_ticks() {
        let mut sim = playing(&GameConfig::default());
        sim.set_ball(ball_at(400.0, 200.0, 1.0, 0.0));
        let start = sim.paddle(Side::Left).unwrap().y;

        let intents = HashMap::from([(1, Direction::Up), (2, Direction::Stop)]);
        sim.tick(&intents);
        sim.tick(&intents);

        assert_eq!(sim.paddle(Side::Left).unwrap().y, start - 16.0);
        assert_eq!(sim.paddle(Side::Right).unwrap().y, start);
    }

    #[test]
    fn test_paddles_stay_in_bounds_under_held_intents() {
        let mut sim = playing(&GameConfig::default());
        let intents = HashMap::from([(1, Direction::Up), (2, Direction::Down)]);
        for _ in 0..200 {
            sim.set_ball(ball_at(400.0, 200.0, 0.0, 0.0));
            sim.tick(&intents);
            for side in [Side::Left, Side::Right] {
                let y = sim.paddle(side).unwrap().y;
                assert!((0.0..=PLAYFIELD_HEIGHT - PADDLE_HEIGHT).contains(&y));
            }
        }
        assert_eq!(sim.paddle(Side::Left).unwrap().y, 0.0);
        assert_eq!(
            sim.paddle(Side::Right).unwrap().y,
            PLAYFIELD_HEIGHT - PADDLE_HEIGHT
        );
    }

    #[test]
    fn test_wall_bounce_during_tick() {
        let mut sim = playing(&GameConfig::default());
        sim.set_ball(ball_at(400.0, 10.0, 5.0, -4.0));
        sim.tick(&no_intents());

        let ball = sim.ball();
        assert_eq!(ball.position.y, BALL_RADIUS);
        assert_eq!(ball.velocity.y, 4.0);
        assert_eq!(ball.position.x, 405.0);
    }

    #[test]
    fn test_paddle_hit_during_tick_pins_velocity() {
        let mut sim = playing(&GameConfig::default());
        let paddle_y = sim.paddle(Side::Left).unwrap().y;
        // Lands on y = paddle_y + 20, a quarter of the way down the paddle.
        sim.set_ball(ball_at(20.0, paddle_y + 20.0, -5.0, 0.0));
        sim.tick(&no_intents());

        let ball = sim.ball();
        assert_eq!(ball.velocity.x, BALL_SPEED);
        assert_approx_eq!(ball.velocity.y, -0.25 * BALL_SPEED, 1e-6);
        assert_eq!(ball.position.x, PADDLE_WIDTH + BALL_RADIUS);
    }

    #[test]
    fn test_right_exit_scores_left_and_reserves() {
        let mut sim = playing(&GameConfig::default());
        sim.set_ball(ball_at(PLAYFIELD_WIDTH - 2.0, 20.0, 5.0, 0.0));

        assert_eq!(sim.tick(&no_intents()), TickOutcome::Scored(Side::Left));
        assert_eq!(sim.score(), Score { left: 1, right: 0 });

        let ball = sim.ball();
        assert_eq!(
            ball.position,
            Vector2::new(PLAYFIELD_WIDTH / 2.0, PLAYFIELD_HEIGHT / 2.0)
        );
        assert_eq!(ball.velocity.x.abs(), BALL_SPEED);
        assert!(ball.velocity.y.abs() <= BALL_SPEED / 2.0);
    }

    #[test]
    fn test_left_exit_scores_right() {
        let mut sim = playing(&GameConfig::default());
        sim.set_ball(ball_at(2.0, 380.0, -5.0, 0.0));
        assert_eq!(sim.tick(&no_intents()), TickOutcome::Scored(Side::Right));
        assert_eq!(sim.score(), Score { left: 0, right: 1 });
    }

    #[test]
    fn test_match_ends_exactly_at_threshold() {
        let mut sim = playing(&GameConfig::default());
        sim.set_score(Score { left: 3, right: 3 });
        sim.set_ball(ball_at(PLAYFIELD_WIDTH - 2.0, 20.0, 5.0, 0.0));
        assert_eq!(sim.tick(&no_intents()), TickOutcome::Scored(Side::Left));
        assert_eq!(sim.status(), GameStatus::Playing);

        sim.set_ball(ball_at(PLAYFIELD_WIDTH - 2.0, 20.0, 5.0, 0.0));
        assert_eq!(
            sim.tick(&no_intents()),
            TickOutcome::Finished { winner: Side::Left }
        );
        assert_eq!(sim.status(), GameStatus::Finished);
        assert_eq!(sim.score(), Score { left: 5, right: 3 });

        // Finished is terminal for ticking.
        let frozen = sim.snapshot();
        assert_eq!(sim.tick(&no_intents()), TickOutcome::Continue);
        assert_eq!(sim.snapshot(), frozen);
    }

    #[test]
    fn test_custom_winning_score() {
        let config = GameConfig {
            winning_score: 1,
            ..GameConfig::default()
        };
        let mut sim = playing(&config);
        sim.set_ball(ball_at(2.0, 380.0, -5.0, 0.0));
        assert_eq!(
            sim.tick(&no_intents()),
            TickOutcome::Finished {
                winner: Side::Right
            }
        );
    }

    #[test]
    fn test_finished_match_stays_finished_when_player_leaves() {
        let config = GameConfig {
            winning_score: 1,
            ..GameConfig::default()
        };
        let mut sim = playing(&config);
        sim.set_ball(ball_at(2.0, 380.0, -5.0, 0.0));
        sim.tick(&no_intents());
        sim.remove_player(1);
        assert_eq!(sim.status(), GameStatus::Finished);
        assert!(!sim.start());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut sim = playing(&GameConfig::default());
        let mut snapshot = sim.snapshot();
        snapshot.score.left = 99;
        snapshot.ball.x = -1.0;
        snapshot.players.left = None;

        let fresh = sim.snapshot();
        assert_eq!(fresh.score.left, 0);
        assert!(fresh.players.left.is_some());
        assert_eq!(fresh.room_id, "room-test");
        assert_eq!(fresh.game_status, GameStatus::Playing);

        sim.tick(&no_intents());
        assert_ne!(sim.snapshot().ball, snapshot.ball);
    }

    #[test]
    fn test_seeded_serves_are_reproducible() {
        let config = GameConfig::default();
        let a = Simulation::with_seed("a".to_string(), &config, 42);
        let b = Simulation::with_seed("b".to_string(), &config, 42);
        assert_eq!(a.ball(), b.ball());
    }
}
