//! Headless bot: joins a match and tracks the ball with its paddle until the match ends.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use shared::{ClientMessage, Direction, GameSnapshot, ServerMessage, Side, PADDLE_HEIGHT};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// WebSocket URL of the server
    #[clap(short, long, default_value = "ws://127.0.0.1:3001")]
    server: String,
    /// Distance from the paddle centre the bot tolerates before moving
    #[clap(short, long, default_value = "6.0")]
    dead_zone: f32,
}

/// Picks the intent that moves a paddle whose top edge is at `paddle_y` towards `ball_y`.
fn steer(paddle_y: f32, ball_y: f32, dead_zone: f32) -> Direction {
    let centre = paddle_y + PADDLE_HEIGHT / 2.0;
    if ball_y < centre - dead_zone {
        Direction::Up
    } else if ball_y > centre + dead_zone {
        Direction::Down
    } else {
        Direction::Stop
    }
}

fn own_paddle_y(state: &GameSnapshot, side: Side) -> Option<f32> {
    state.players.get(side).map(|player| player.y)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.server);
    let (ws_stream, _) = connect_async(args.server.as_str()).await?;
    let (mut ws_write, mut ws_read) = ws_stream.split();

    ws_write
        .send(Message::Text(ClientMessage::Join.to_json()?.into()))
        .await?;

    let mut my_id = None;
    let mut my_side = None;
    let mut last_intent = Direction::Stop;

    while let Some(frame) = ws_read.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let message = match ServerMessage::from_json(text.as_str()) {
            Ok(message) => message,
            Err(e) => {
                println!("Ignoring unreadable message: {}", e);
                continue;
            }
        };

        match message {
            ServerMessage::PlayerJoined { player_id, side } => {
                // The first announcement after our join is our own.
                if my_id.is_none() {
                    my_id = Some(player_id);
                    my_side = Some(side);
                    println!("Joined as player {} on the {} side", player_id, side);
                } else {
                    println!("Opponent {} joined on the {} side", player_id, side);
                }
            }
            ServerMessage::GameStarted => println!("Match started"),
            ServerMessage::GameStateUpdate { state } => {
                let Some(paddle_y) = my_side.and_then(|side| own_paddle_y(&state, side)) else {
                    continue;
                };
                let intent = steer(paddle_y, state.ball.y, args.dead_zone);
                if intent != last_intent {
                    let message = ClientMessage::PaddleMove { direction: intent };
                    ws_write.send(Message::Text(message.to_json()?.into())).await?;
                    last_intent = intent;
                }
            }
            ServerMessage::GameEnded { winner } => {
                let outcome = if Some(winner) == my_side { "won" } else { "lost" };
                println!("Match over: {} wins, we {}", winner, outcome);
                break;
            }
            ServerMessage::PlayerLeft { player_id } => {
                println!("Player {} left", player_id);
                if Some(player_id) != my_id {
                    break;
                }
            }
            ServerMessage::Error { message } => {
                println!("Server error: {}", message);
                break;
            }
        }
    }

    let _ = ws_write
        .send(Message::Text(ClientMessage::LeaveGame.to_json()?.into()))
        .await;
    let _ = ws_write.close().await;
    println!("Disconnected");
    Ok(())
}
