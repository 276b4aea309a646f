//! Manual smoke-test client: joins a running server, steers randomly and
//! prints every event it receives.

use bincode::{deserialize, serialize};
use clap::Parser;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Direction, GameEvent, Packet};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep_until, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name to join with
    #[arg(short, long)]
    name: Option<String>,

    /// Skin to select before joining
    #[arg(long, default_value = "classic")]
    skin: String,

    /// How long to play, in seconds
    #[arg(short, long, default_value = "30")]
    duration: u64,
}

const DIRECTIONS: [Direction; 4] = [
    Direction::Up,
    Direction::Down,
    Direction::Left,
    Direction::Right,
];

async fn send(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

fn describe(event: &GameEvent) -> String {
    match event {
        GameEvent::PlayerJoined { player_id, name, .. } => {
            format!("player {} ({}) joined", player_id, name)
        }
        GameEvent::PlayerKilled {
            killer_id,
            victim_id,
            score,
        } => format!("player {} killed {} (score {})", killer_id, victim_id, score),
        GameEvent::RoundOver {
            winner_name, score, ..
        } => format!(
            "round over, winner {} with {}",
            winner_name.as_deref().unwrap_or("nobody"),
            score
        ),
        other => format!("{:?}", other),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let server_addr: SocketAddr = args.server.parse()?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    send(&socket, &Packet::SelectSkin { skin: args.skin }, server_addr).await?;
    send(&socket, &Packet::Join { name: args.name }, server_addr).await?;

    let mut buffer = vec![0u8; 65536];
    let mut steer = interval(Duration::from_millis(400));
    let mut heartbeat = interval(Duration::from_secs(2));
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut player_id = None;
    let mut alive = false;
    let mut snapshots = 0u64;

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buffer) => {
                let (len, _) = result?;
                match deserialize::<Packet>(&buffer[..len]) {
                    Ok(Packet::Joined { player_id: id, grid_size, skins }) => {
                        println!("Joined as player {} on a {}x{} grid ({} skins)", id, grid_size, grid_size, skins.len());
                        player_id = Some(id);
                    }
                    Ok(Packet::Rejected { reason }) => {
                        println!("Rejected: {}", reason);
                        return Ok(());
                    }
                    Ok(Packet::Snapshot(snapshot)) => {
                        snapshots += 1;
                        alive = snapshot
                            .players
                            .iter()
                            .any(|player| Some(player.id) == player_id && player.alive);
                        if snapshots % 50 == 0 {
                            println!("Tick {}: {} players", snapshot.tick, snapshot.players.len());
                        }
                    }
                    Ok(Packet::Event(event)) => {
                        if matches!(event, GameEvent::PlayerDied { player_id: id } if Some(id) == player_id) {
                            alive = false;
                        }
                        println!("Event: {}", describe(&event));
                    }
                    Ok(other) => println!("Unexpected packet: {:?}", other),
                    Err(e) => println!("Failed to deserialize packet: {}", e),
                }
            }

            _ = steer.tick() => {
                if player_id.is_some() && !alive {
                    send(&socket, &Packet::Join { name: None }, server_addr).await?;
                    continue;
                }
                let (direction, shoot) = {
                    let mut rng = rand::thread_rng();
                    (DIRECTIONS.choose(&mut rng).copied(), rng.gen_bool(0.2))
                };
                if let Some(direction) = direction {
                    send(&socket, &Packet::SetDirection { direction }, server_addr).await?;
                }
                if shoot {
                    send(&socket, &Packet::Shoot, server_addr).await?;
                }
            }

            _ = heartbeat.tick() => {
                send(&socket, &Packet::Heartbeat, server_addr).await?;
            }

            _ = sleep_until(deadline) => break,
        }
    }

    send(&socket, &Packet::Disconnect, server_addr).await?;
    println!("Test client finished after {} snapshots", snapshots);
    Ok(())
}
