//! Food and snake placement.
//!
//! Placement is best effort: a bounded number of uniformly random cells is
//! tried, and when every attempt lands on an occupied cell the last candidate
//! is accepted anyway so a crowded field can never stall a tick.

use crate::config::GameConfig;
use crate::entity::{EntityStore, Food, Snake};
use crate::grid::Grid;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Direction, FoodKind, Position};
use std::collections::HashSet;

/// Distance of the corner spawn points from the grid edges.
pub const SPAWN_MARGIN: i32 = 5;

pub struct Spawner {
    rng: StdRng,
    attempts: u32,
}

impl Spawner {
    /// Creates a spawner. A fixed `seed` makes every placement reproducible.
    pub fn new(seed: Option<u64>, attempts: u32) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            attempts: attempts.max(1),
        }
    }

    /// Picks a random cell outside `occupied`, or the last candidate if the
    /// retry budget runs out.
    pub fn place(&mut self, grid: &Grid, occupied: &HashSet<Position>) -> Position {
        let mut candidate = grid.random_cell(&mut self.rng);
        for _ in 1..self.attempts {
            if !occupied.contains(&candidate) {
                return candidate;
            }
            candidate = grid.random_cell(&mut self.rng);
        }
        if occupied.contains(&candidate) {
            debug!(
                "No free cell after {} attempts, accepting overlap at ({}, {})",
                self.attempts, candidate.x, candidate.y
            );
        }
        candidate
    }

    /// Places a fresh `kind` food, replacing any existing one of that kind.
    pub fn spawn_food(
        &mut self,
        store: &mut EntityStore,
        kind: FoodKind,
        grid: &Grid,
        config: &GameConfig,
        now: u64,
    ) -> Position {
        store.food.remove(&kind);
        let position = self.place(grid, &store.occupied_cells());
        store.food.insert(
            kind,
            Food {
                kind,
                position,
                spawned_at: now,
                duration: config.food.duration(kind),
            },
        );
        position
    }

    /// Rolls each absent power-up food once with its own probability.
    /// Returns the variants that spawned, in fixed variant order.
    pub fn reroll_power_ups(
        &mut self,
        store: &mut EntityStore,
        grid: &Grid,
        config: &GameConfig,
        now: u64,
    ) -> Vec<(FoodKind, Position)> {
        let mut spawned = Vec::new();
        for kind in FoodKind::POWER_UPS {
            if store.food.contains_key(&kind) {
                continue;
            }
            if self.rng.gen_bool(config.food.spawn_chance(kind)) {
                let position = self.spawn_food(store, kind, grid, config, now);
                spawned.push((kind, position));
            }
        }
        spawned
    }

    /// Removes every food whose lifetime has elapsed and returns its kind.
    pub fn check_expiries(store: &mut EntityStore, now: u64) -> Vec<FoodKind> {
        let expired: Vec<FoodKind> = store
            .food
            .values()
            .filter(|food| food.is_expired(now))
            .map(|food| food.kind)
            .collect();
        for kind in &expired {
            store.food.remove(kind);
        }
        expired
    }

    /// Lays out a new snake heading right on free cells.
    ///
    /// Corner spawn points are preferred; when all are blocked random cells are
    /// tried within the retry budget, then the last candidate is used.
    pub fn spawn_snake(
        &mut self,
        grid: &Grid,
        occupied: &HashSet<Position>,
        length: usize,
    ) -> Snake {
        let size = grid.size();
        let corners = [
            Position::new(SPAWN_MARGIN, SPAWN_MARGIN),
            Position::new(size - SPAWN_MARGIN, SPAWN_MARGIN),
            Position::new(SPAWN_MARGIN, size - SPAWN_MARGIN),
            Position::new(size - SPAWN_MARGIN, size - SPAWN_MARGIN),
        ];

        let fits = |snake: &Snake| {
            snake
                .segments()
                .all(|cell| grid.contains(*cell) && !occupied.contains(cell))
        };

        for corner in corners {
            let snake = Snake::straight(corner, Direction::Right, length);
            if fits(&snake) {
                return snake;
            }
        }

        let mut snake = Snake::straight(self.random_head(grid, length), Direction::Right, length);
        for _ in 1..self.attempts {
            if fits(&snake) {
                return snake;
            }
            snake = Snake::straight(self.random_head(grid, length), Direction::Right, length);
        }
        debug!("No free spawn found after {} attempts", self.attempts);
        snake
    }

    /// A head cell far enough from the left edge that a right-facing body of
    /// `length` stays on the grid.
    fn random_head(&mut self, grid: &Grid, length: usize) -> Position {
        let size = grid.size();
        let min_x = length.saturating_sub(1).min(size as usize - 1) as i32;
        Position::new(self.rng.gen_range(min_x..size), self.rng.gen_range(0..size))
    }
}
