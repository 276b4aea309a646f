//! Authoritative simulation loop.
//!
//! [`Game::tick`] is the only place game state changes between commands. Each
//! tick runs the same fixed sequence:
//!
//! 1. expire abilities and food whose time is up,
//! 2. fire pending shots and advance every living player's bullets,
//! 3. move every snake whose move interval has elapsed,
//! 4. end the round as soon as at most one of two or more players is left,
//! 5. hand back a snapshot while anyone is alive.
//!
//! Bullets therefore always resolve before head moves within a tick, and
//! events are emitted in exactly that order.

use crate::broadcast::EventSink;
use crate::client_manager::CommandSlot;
use crate::collision::{self, BulletOutcome, DeathCause, MoveOutcome};
use crate::config::GameConfig;
use crate::entity::{Bullet, EntityStore, Player};
use crate::grid::Grid;
use crate::spawner::Spawner;
use log::{debug, info};
use shared::{Ability, FoodKind, GameEvent, Snapshot};
use std::collections::{BTreeSet, HashSet};

/// Upper bound on moves a single player makes in one tick. Anything beyond it
/// is dropped so a stalled scheduler cannot teleport snakes.
const MAX_MOVES_PER_TICK: u64 = 2;
const MAX_NAME_LENGTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Running,
    /// Winner decided; everyone respawns at `reset_at`.
    Ended { reset_at: u64 },
}

pub struct Game {
    pub config: GameConfig,
    pub grid: Grid,
    pub store: EntityStore,
    pub spawner: Spawner,
    pub round: RoundState,
    pub tick: u64,
    /// Everyone who took part in the current round, including players who
    /// have since left.
    roster: BTreeSet<u32>,
}

impl Game {
    pub fn new(config: GameConfig, seed: Option<u64>) -> Self {
        let spawner = Spawner::new(seed, config.spawn_attempts);
        Self {
            grid: Grid::new(config.grid_size),
            store: EntityStore::new(),
            spawner,
            round: RoundState::Running,
            tick: 0,
            roster: BTreeSet::new(),
            config,
        }
    }

    pub fn is_running(&self) -> bool {
        self.round == RoundState::Running
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot(self.tick)
    }

    /// Adds a player at a fresh spawn point.
    ///
    /// Returns false if the player is already in the game and alive. A dead
    /// player joining again is recreated from scratch.
    pub fn add_player(
        &mut self,
        id: u32,
        name: Option<String>,
        skin: &str,
        now: u64,
        sink: &mut impl EventSink,
    ) -> bool {
        if self.store.player(id).map_or(false, |player| player.alive) {
            return false;
        }
        self.store.players.remove(&id);

        let name = name
            .as_deref()
            .and_then(sanitize_name)
            .unwrap_or_else(|| format!("Player {}", self.store.players.len() + 1));

        let snake = self.spawner.spawn_snake(
            &self.grid,
            &self.store.occupied_cells(),
            self.config.initial_snake_length,
        );
        info!(
            "Player {} ({}) joined at ({}, {})",
            id,
            name,
            snake.head().x,
            snake.head().y
        );
        self.store.players.insert(
            id,
            Player::new(id, name.clone(), skin.to_string(), snake, now),
        );
        self.roster.insert(id);

        if !self.store.food.contains_key(&FoodKind::Plain) {
            self.spawner
                .spawn_food(&mut self.store, FoodKind::Plain, &self.grid, &self.config, now);
        }

        sink.emit(GameEvent::PlayerJoined {
            player_id: id,
            name,
            skin: skin.to_string(),
        });
        true
    }

    /// Removes a player. Unknown ids are ignored.
    pub fn remove_player(&mut self, id: u32, now: u64, sink: &mut impl EventSink) -> bool {
        if self.store.players.remove(&id).is_none() {
            return false;
        }
        info!("Player {} left", id);
        sink.emit(GameEvent::PlayerLeft { player_id: id });

        if self.store.players.is_empty() {
            self.store.food.clear();
            self.roster.clear();
            self.round = RoundState::Running;
        } else {
            self.check_round_end(now, sink);
        }
        true
    }

    /// Copies buffered commands onto their players.
    ///
    /// Commands only touch the desired heading, the skin and the pending shot;
    /// body, score and abilities change inside [`Game::tick`] alone.
    pub fn apply_commands(&mut self, commands: Vec<(u32, CommandSlot)>) {
        for (id, slot) in commands {
            let Some(player) = self.store.player_mut(id) else {
                continue;
            };
            if let Some(skin) = slot.skin {
                player.skin = skin;
            }
            if !player.alive {
                continue;
            }
            if let Some(direction) = slot.direction {
                player.desired_direction = direction;
            }
            if slot.shoot {
                player.pending_shot = true;
            }
        }
    }

    /// Advances the simulation to `now` (milliseconds on the game clock).
    pub fn tick(&mut self, now: u64, sink: &mut impl EventSink) -> Option<Snapshot> {
        self.tick += 1;

        if let RoundState::Ended { reset_at } = self.round {
            if now >= reset_at {
                self.reset_round(now, sink);
            }
        }

        if self.is_running() {
            self.expire_timers(now, sink);
            self.advance_bullets(now, sink);
            self.advance_snakes(now, sink);
        }

        if self.store.alive_count() > 0 {
            Some(self.snapshot())
        } else {
            None
        }
    }

    fn expire_timers(&mut self, now: u64, sink: &mut impl EventSink) {
        for kind in Spawner::check_expiries(&mut self.store, now) {
            sink.emit(GameEvent::FoodExpired { kind });
        }

        for player in self.store.players.values_mut().filter(|player| player.alive) {
            for ability in player.abilities.expire(now) {
                debug!("Player {} lost {:?}", player.id, ability);
                sink.emit(GameEvent::AbilityExpired {
                    player_id: player.id,
                    ability,
                });
            }
        }
    }

    fn advance_bullets(&mut self, now: u64, sink: &mut impl EventSink) {
        let lifetime = self.config.bullets.lifetime_ms;

        for shooter_id in self.store.living_ids() {
            self.fire_pending_shot(shooter_id, now);

            let bullets = match self.store.player_mut(shooter_id) {
                Some(shooter) if shooter.alive => std::mem::take(&mut shooter.bullets),
                _ => continue,
            };

            let mut surviving = Vec::with_capacity(bullets.len());
            for mut bullet in bullets {
                if bullet.is_expired(now, lifetime) {
                    continue;
                }
                if !self.is_running() {
                    surviving.push(bullet);
                    continue;
                }
                match collision::resolve_bullet(&self.grid, &self.store, &bullet) {
                    BulletOutcome::Flying(position) => {
                        bullet.position = position;
                        surviving.push(bullet);
                    }
                    BulletOutcome::OutOfBounds => {}
                    BulletOutcome::Hit {
                        victim_id,
                        segment_index,
                        ..
                    } => self.apply_bullet_hit(shooter_id, victim_id, segment_index, now, sink),
                }
            }

            if let Some(shooter) = self.store.player_mut(shooter_id) {
                shooter.bullets = surviving;
            }
        }
    }

    /// Turns a pending shot into a bullet if the shooter holds ranged attack
    /// and is off cooldown. The request is consumed either way.
    fn fire_pending_shot(&mut self, id: u32, now: u64) {
        let bullets = &self.config.bullets;
        let Some(player) = self.store.player_mut(id) else {
            return;
        };
        if !std::mem::take(&mut player.pending_shot) || !player.alive {
            return;
        }
        if !player.abilities.is_active(Ability::RangedAttack) {
            debug!("Player {} shot without ranged attack", id);
            return;
        }
        if let Some(last) = player.last_shot_at {
            if now.saturating_sub(last) < bullets.cooldown_ms {
                debug!("Player {} shot during cooldown", id);
                return;
            }
        }

        player.last_shot_at = Some(now);
        let speed = if player.abilities.is_active(Ability::SpeedBoost) {
            bullets.boosted_speed
        } else {
            bullets.speed
        };
        player.bullets.push(Bullet {
            position: player.snake.head(),
            direction: player.direction,
            speed,
            owner_id: id,
            created_at: now,
        });
    }

    fn apply_bullet_hit(
        &mut self,
        shooter_id: u32,
        victim_id: u32,
        segment_index: usize,
        now: u64,
        sink: &mut impl EventSink,
    ) {
        sink.emit(GameEvent::BulletHit {
            shooter_id,
            victim_id,
            segment_index,
        });

        if segment_index == 0 {
            self.kill(victim_id, Some(shooter_id), now, sink);
        } else if let Some(victim) = self.store.player_mut(victim_id) {
            victim.snake.truncate(segment_index);
            victim.score = victim.score.saturating_sub(self.config.scoring.bullet_penalty);
        }
    }

    fn advance_snakes(&mut self, now: u64, sink: &mut impl EventSink) {
        let mut due = Vec::new();
        for player in self.store.players.values_mut().filter(|player| player.alive) {
            let interval = self
                .config
                .move_interval(player.abilities.is_active(Ability::SpeedBoost));
            let elapsed = now.saturating_sub(player.last_move_at);
            let moves = elapsed / interval;
            if moves == 0 {
                continue;
            }
            if moves > MAX_MOVES_PER_TICK {
                player.last_move_at = now;
            } else {
                player.last_move_at += moves * interval;
            }
            due.push((player.id, moves.min(MAX_MOVES_PER_TICK)));
        }

        // Every player's first move resolves before anyone's second.
        let passes = due.iter().map(|(_, moves)| *moves).max().unwrap_or(0);
        for pass in 0..passes {
            for &(id, moves) in &due {
                if pass >= moves {
                    continue;
                }
                if !self.is_running() {
                    return;
                }
                self.step_snake(id, now, sink);
            }
        }
    }

    fn step_snake(&mut self, id: u32, now: u64, sink: &mut impl EventSink) {
        let Some(player) = self.store.player_mut(id) else {
            return;
        };
        if !player.alive {
            return;
        }
        if player.desired_direction != player.direction.opposite() {
            player.direction = player.desired_direction;
        }
        let direction = player.direction;

        match collision::resolve_move(&self.grid, &self.store, id, direction) {
            None => {}
            Some(MoveOutcome::Fatal(cause)) => {
                debug!("Player {} died: {:?}", id, cause);
                let killer = match cause {
                    DeathCause::OtherSnake { killer_id } => Some(killer_id),
                    DeathCause::Wall | DeathCause::OwnBody => None,
                };
                self.kill(id, killer, now, sink);
            }
            Some(MoveOutcome::Advance { head, eats }) => {
                for kind in &eats {
                    self.store.food.remove(kind);
                }
                if let Some(player) = self.store.player_mut(id) {
                    player.snake.advance(head, !eats.is_empty());
                }
                for kind in eats {
                    self.apply_food(id, kind, now, sink);
                }
            }
        }
    }

    fn apply_food(&mut self, id: u32, kind: FoodKind, now: u64, sink: &mut impl EventSink) {
        let Some(player) = self.store.player_mut(id) else {
            return;
        };
        player.score += self.config.scoring.food_score(kind);
        if let Some(ability) = kind.ability() {
            player
                .abilities
                .grant(ability, now + self.config.abilities.duration(ability));
        }
        let score = player.score;

        if kind != FoodKind::Plain {
            sink.emit(GameEvent::PowerUpEaten {
                kind,
                player_id: id,
                score,
            });
            return;
        }

        let new_food =
            self.spawner
                .spawn_food(&mut self.store, FoodKind::Plain, &self.grid, &self.config, now);
        sink.emit(GameEvent::FoodEaten {
            player_id: id,
            score,
            new_food,
        });
        for (kind, position) in
            self.spawner
                .reroll_power_ups(&mut self.store, &self.grid, &self.config, now)
        {
            sink.emit(GameEvent::FoodSpawned { kind, position });
        }
    }

    fn kill(&mut self, victim_id: u32, killer_id: Option<u32>, now: u64, sink: &mut impl EventSink) {
        let Some(victim) = self.store.player_mut(victim_id) else {
            return;
        };
        if !victim.alive {
            return;
        }
        victim.alive = false;
        info!("Player {} died with score {}", victim_id, victim.score);

        if let Some(killer) = killer_id.and_then(|id| self.store.player_mut(id)) {
            killer.score += self.config.scoring.kill_bonus;
            sink.emit(GameEvent::PlayerKilled {
                killer_id: killer.id,
                victim_id,
                score: killer.score,
            });
        }
        sink.emit(GameEvent::PlayerDied {
            player_id: victim_id,
        });

        self.check_round_end(now, sink);
    }

    /// Ends the round once at most one of the two or more players who took
    /// part in it is alive. Players who left still count as participants.
    fn check_round_end(&mut self, now: u64, sink: &mut impl EventSink) {
        if !self.is_running() || self.roster.len() < 2 {
            return;
        }
        let living = self.store.living_ids();
        if living.len() > 1 {
            return;
        }

        let win_bonus = self.config.scoring.win_bonus;
        let event = match living.first().and_then(|id| self.store.player_mut(*id)) {
            Some(winner) => {
                winner.score += win_bonus;
                info!("Round won by player {} ({})", winner.id, winner.name);
                GameEvent::RoundOver {
                    winner_id: Some(winner.id),
                    winner_name: Some(winner.name.clone()),
                    score: winner.score,
                }
            }
            None => {
                info!("Round over without survivors");
                GameEvent::RoundOver {
                    winner_id: None,
                    winner_name: None,
                    score: 0,
                }
            }
        };
        sink.emit(event);
        self.round = RoundState::Ended {
            reset_at: now + self.config.round_reset_delay_ms,
        };
    }

    /// Respawns every player, clears scores and abilities, and replaces all food.
    fn reset_round(&mut self, now: u64, sink: &mut impl EventSink) {
        self.store.food.clear();

        let mut occupied = HashSet::new();
        let ids: Vec<u32> = self.store.players.keys().copied().collect();
        self.roster = ids.iter().copied().collect();
        for id in ids {
            let snake =
                self.spawner
                    .spawn_snake(&self.grid, &occupied, self.config.initial_snake_length);
            occupied.extend(snake.segments().copied());
            if let Some(player) = self.store.player_mut(id) {
                player.respawn(snake, now);
            }
        }

        if !self.store.players.is_empty() {
            self.spawner
                .spawn_food(&mut self.store, FoodKind::Plain, &self.grid, &self.config, now);
        }
        self.round = RoundState::Running;
        info!("Round reset with {} players", self.store.players.len());
        sink.emit(GameEvent::RoundReset);
    }
}

/// Trims a display name and caps its length. Blank names yield `None`.
fn sanitize_name(name: &str) -> Option<String> {
    let trimmed: String = name.trim().chars().take(MAX_NAME_LENGTH).collect();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
