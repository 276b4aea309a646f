//! Tunable game constants.
//!
//! Every value has a default matching the classic arena rules. A TOML file can
//! override any subset of them; the server reads it once at start-up and never
//! reloads it mid-round.

use crate::spawner::SPAWN_MARGIN;
use serde::{Deserialize, Serialize};
use shared::{Ability, FoodKind, GRID_SIZE, INITIAL_SNAKE_LENGTH, TICK_MS};
use std::path::Path;
use thiserror::Error;

/// Smallest grid that still fits the four corner spawn points.
pub const MIN_GRID_SIZE: i32 = 12;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GameConfig {
    /// Side length of the square grid, in tiles.
    pub grid_size: i32,
    /// Scheduler period.
    pub tick_ms: u64,
    pub move_interval_ms: u64,
    /// Move interval while speed boost is active.
    pub boosted_move_interval_ms: u64,
    pub initial_snake_length: usize,
    /// Random placement attempts before accepting an occupied cell.
    pub spawn_attempts: u32,
    /// Delay between the end of a round and the full reset.
    pub round_reset_delay_ms: u64,
    pub scoring: ScoringConfig,
    pub food: FoodConfig,
    pub abilities: AbilityConfig,
    pub bullets: BulletConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            tick_ms: TICK_MS,
            move_interval_ms: 100,
            boosted_move_interval_ms: 50,
            initial_snake_length: INITIAL_SNAKE_LENGTH,
            spawn_attempts: 100,
            round_reset_delay_ms: 5000,
            scoring: ScoringConfig::default(),
            food: FoodConfig::default(),
            abilities: AbilityConfig::default(),
            bullets: BulletConfig::default(),
        }
    }
}

impl GameConfig {
    /// Loads a config file, falling back to defaults for missing keys.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: GameConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size < MIN_GRID_SIZE {
            return Err(ConfigError::Invalid(format!(
                "grid_size must be at least {}, got {}",
                MIN_GRID_SIZE, self.grid_size
            )));
        }
        if self.tick_ms == 0 || self.move_interval_ms == 0 || self.boosted_move_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick and move intervals must be non-zero".to_string(),
            ));
        }
        let max_length = SPAWN_MARGIN as usize + 1;
        if self.initial_snake_length == 0 || self.initial_snake_length > max_length {
            return Err(ConfigError::Invalid(format!(
                "initial_snake_length must be within 1..={}, got {}",
                max_length, self.initial_snake_length
            )));
        }
        if self.spawn_attempts == 0 {
            return Err(ConfigError::Invalid(
                "spawn_attempts must be at least 1".to_string(),
            ));
        }
        for kind in FoodKind::POWER_UPS {
            let chance = self.food.spawn_chance(kind);
            if !(0.0..=1.0).contains(&chance) {
                return Err(ConfigError::Invalid(format!(
                    "spawn chance for {:?} must be within [0, 1], got {}",
                    kind, chance
                )));
            }
        }
        if self.bullets.speed == 0 || self.bullets.boosted_speed == 0 {
            return Err(ConfigError::Invalid(
                "bullet speeds must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Move interval for a player with or without speed boost.
    pub fn move_interval(&self, boosted: bool) -> u64 {
        if boosted {
            self.boosted_move_interval_ms
        } else {
            self.move_interval_ms
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub plain_food: u32,
    pub special_food: u32,
    pub attack_food: u32,
    pub speed_food: u32,
    pub kill_bonus: u32,
    pub win_bonus: u32,
    /// Deducted from a snake hit mid-body by a bullet.
    pub bullet_penalty: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            plain_food: 10,
            special_food: 50,
            attack_food: 30,
            speed_food: 25,
            kill_bonus: 20,
            win_bonus: 100,
            bullet_penalty: 20,
        }
    }
}

impl ScoringConfig {
    pub fn food_score(&self, kind: FoodKind) -> u32 {
        match kind {
            FoodKind::Plain => self.plain_food,
            FoodKind::Special => self.special_food,
            FoodKind::Attack => self.attack_food,
            FoodKind::Speed => self.speed_food,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FoodConfig {
    pub special_chance: f64,
    pub attack_chance: f64,
    pub speed_chance: f64,
    pub special_duration_ms: u64,
    pub attack_duration_ms: u64,
    pub speed_duration_ms: u64,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            special_chance: 0.15,
            attack_chance: 0.10,
            speed_chance: 0.12,
            special_duration_ms: 10_000,
            attack_duration_ms: 15_000,
            speed_duration_ms: 12_000,
        }
    }
}

impl FoodConfig {
    /// Probability of spawning `kind` after a plain food pickup.
    pub fn spawn_chance(&self, kind: FoodKind) -> f64 {
        match kind {
            FoodKind::Plain => 1.0,
            FoodKind::Special => self.special_chance,
            FoodKind::Attack => self.attack_chance,
            FoodKind::Speed => self.speed_chance,
        }
    }

    /// How long `kind` stays on the field. Plain food never expires.
    pub fn duration(&self, kind: FoodKind) -> Option<u64> {
        match kind {
            FoodKind::Plain => None,
            FoodKind::Special => Some(self.special_duration_ms),
            FoodKind::Attack => Some(self.attack_duration_ms),
            FoodKind::Speed => Some(self.speed_duration_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AbilityConfig {
    pub invincibility_ms: u64,
    pub ranged_attack_ms: u64,
    pub speed_boost_ms: u64,
}

impl Default for AbilityConfig {
    fn default() -> Self {
        Self {
            invincibility_ms: 10_000,
            ranged_attack_ms: 15_000,
            speed_boost_ms: 10_000,
        }
    }
}

impl AbilityConfig {
    pub fn duration(&self, ability: Ability) -> u64 {
        match ability {
            Ability::Invincibility => self.invincibility_ms,
            Ability::RangedAttack => self.ranged_attack_ms,
            Ability::SpeedBoost => self.speed_boost_ms,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BulletConfig {
    /// Cells advanced per tick.
    pub speed: u32,
    /// Cells advanced per tick when fired during speed boost.
    pub boosted_speed: u32,
    pub lifetime_ms: u64,
    /// Minimum time between two accepted shots of the same player.
    pub cooldown_ms: u64,
}

impl Default for BulletConfig {
    fn default() -> Self {
        Self {
            speed: 1,
            boosted_speed: 2,
            lifetime_ms: 5000,
            cooldown_ms: 500,
        }
    }
}
