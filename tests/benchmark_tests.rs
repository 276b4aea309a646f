//! Performance benchmarks for critical game systems

use bincode::serialize;
use server::client_manager::CommandSlot;
use server::config::GameConfig;
use server::game::Game;
use server::grid::Grid;
use server::spawner::Spawner;
use shared::{Direction, Packet, Position};
use std::collections::HashSet;
use std::time::Instant;

fn crowded_game(players: u32) -> Game {
    let mut config = GameConfig::default();
    config.grid_size = 60;
    let mut game = Game::new(config, Some(7));
    let mut events = Vec::new();
    for id in 1..=players {
        game.add_player(id, None, "classic", 0, &mut events);
    }
    game
}

/// Benchmarks full ticks with many players, respawning the dead as it goes
#[test]
fn benchmark_tick_many_players() {
    let mut game = crowded_game(16);
    let directions = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    let iterations = 2_000u64;
    let start = Instant::now();

    for step in 1..=iterations {
        let now = step * 100;
        let mut events = Vec::new();
        let commands: Vec<(u32, CommandSlot)> = (1..=16u32)
            .map(|id| {
                (
                    id,
                    CommandSlot {
                        direction: Some(directions[((step / 7 + u64::from(id)) % 4) as usize]),
                        skin: None,
                        shoot: id % 3 == 0,
                    },
                )
            })
            .collect();
        game.apply_commands(commands);
        let _ = game.tick(now, &mut events);

        for id in 1..=16 {
            if game.store.player(id).map_or(false, |player| !player.alive) {
                game.add_player(id, None, "classic", now, &mut events);
            }
        }
    }

    let duration = start.elapsed();
    println!(
        "Tick with 16 players: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks food placement on a nearly full grid, including the fallback path
#[test]
fn benchmark_crowded_placement() {
    let grid = Grid::new(30);
    let mut spawner = Spawner::new(Some(3), 100);
    let occupied: HashSet<Position> = (0..30)
        .flat_map(|x| (0..30).map(move |y| Position::new(x, y)))
        .filter(|cell| (cell.x + cell.y) % 10 != 0)
        .collect();

    let iterations = 2_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let position = spawner.place(&grid, &occupied);
        assert!(grid.contains(position));
    }

    let duration = start.elapsed();
    println!(
        "Crowded placement: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks snapshot serialization, which runs once per tick
#[test]
fn benchmark_snapshot_serialization() {
    let game = crowded_game(16);
    let snapshot = game.snapshot();

    let iterations = 5_000;
    let start = Instant::now();
    let mut bytes = 0;

    for _ in 0..iterations {
        let data = serialize(&Packet::Snapshot(snapshot.clone())).unwrap();
        bytes = data.len();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot serialization: {} iterations in {:?}, {} bytes each",
        iterations, duration, bytes
    );

    // One snapshot must fit in a single UDP datagram
    assert!(bytes < 65_507);
    assert!(duration.as_millis() < 1000);
}
