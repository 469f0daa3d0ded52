//! Performance benchmarks for critical game systems

use server::game::{GameConfig, Simulation, TickOutcome};
use server::physics::{Ball, Paddle, Vector2};
use server::registry::RoomRegistry;
use shared::{ClientMessage, ConnectionId, Direction, GameStatus, ServerMessage, Side, BALL_RADIUS};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::mpsc;

fn playing_simulation(seed: u64) -> Simulation {
    let config = GameConfig {
        winning_score: u32::MAX,
        ..GameConfig::default()
    };
    let mut simulation = Simulation::with_seed("room-bench".to_string(), &config, seed);
    simulation.add_player(1);
    simulation.add_player(2);
    assert!(simulation.start());
    simulation
}

/// Benchmarks a single room's tick function
#[test]
fn benchmark_simulation_ticks() {
    let mut simulation = playing_simulation(7);
    let mut intents: HashMap<ConnectionId, Direction> = HashMap::new();

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        // Flip intents now and then so paddles sweep the whole field.
        if i % 120 == 0 {
            let direction = if (i / 120) % 2 == 0 {
                Direction::Up
            } else {
                Direction::Down
            };
            intents.insert(1, direction);
            intents.insert(2, direction);
        }
        assert_ne!(
            simulation.tick(&intents),
            TickOutcome::Finished { winner: Side::Left }
        );
    }

    let duration = start.elapsed();
    println!(
        "Simulation ticks: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(simulation.status(), GameStatus::Playing);
    // ~28 minutes of match time in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks paddle collision checks
#[test]
fn benchmark_paddle_collision() {
    let paddle = Paddle::new(1, Side::Left);

    let iterations = 100_000;
    let start = Instant::now();
    let mut hits = 0;

    for i in 0..iterations {
        let mut ball = Ball {
            position: Vector2::new(15.0, (i % 400) as f32),
            velocity: Vector2::new(-5.0, 1.0),
            radius: BALL_RADIUS,
        };
        if ball.resolve_paddle(&paddle) {
            hits += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Paddle collision: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(hits > 0);
    // Should complete in under 100ms for 100k iterations
    assert!(duration.as_millis() < 100);
}

/// Benchmarks snapshot serialization, which runs once per tick per room
#[test]
fn benchmark_snapshot_serialization() {
    let simulation = playing_simulation(11);
    let message = ServerMessage::GameStateUpdate {
        state: simulation.snapshot(),
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let json = message.to_json().unwrap();
        let decoded = ServerMessage::from_json(&json).unwrap();
        assert!(matches!(decoded, ServerMessage::GameStateUpdate { .. }));
    }

    let duration = start.elapsed();
    println!(
        "Snapshot serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Stress tests inbound message decoding
#[test]
fn stress_test_message_decoding() {
    let frames = [
        r#"{"type":"paddleMove","direction":"up"}"#,
        r#"{"type":"paddleMove","direction":"down","playerId":4}"#,
        r#"{"type":"paddleMove","direction":"stop"}"#,
        r#"{"type":"join"}"#,
        r#"{"type":"paddleMove","direction":"sideways"}"#,
    ];

    let iterations = 50_000;
    let start = Instant::now();
    let mut rejected = 0;

    for i in 0..iterations {
        if ClientMessage::from_json(frames[i % frames.len()]).is_err() {
            rejected += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Message decoding: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(rejected, iterations / frames.len());
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks matchmaking under many sequential joins
#[tokio::test]
async fn benchmark_registry_joins() {
    let registry = RoomRegistry::new(GameConfig::default(), 1024);
    let mut receivers = Vec::new();

    let players: ConnectionId = 400;
    let start = Instant::now();

    for id in 1..=players {
        let (tx, rx) = mpsc::unbounded_channel();
        receivers.push(rx);
        registry.join_room(id, tx).await.unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Registry joins: {} players in {:?} ({:.2} μs/join)",
        players,
        duration,
        duration.as_micros() as f64 / players as f64
    );

    let stats = registry.stats().await;
    assert_eq!(stats.active_rooms, players as usize / 2);
    assert_eq!(stats.active_players, players as usize);

    for id in 1..=players {
        registry.leave_room(id).await;
    }
    assert_eq!(registry.stats().await.active_rooms, 0);

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
