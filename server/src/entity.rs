//! Entity store: players with their snakes, bullets and timed abilities, plus
//! the food currently on the field.
//!
//! The store is owned by [`crate::game::Game`]. Collaborators borrow it for
//! the duration of one call and never keep references across ticks.

use shared::{Ability, BulletView, Direction, FoodKind, PlayerView, Position, Snapshot};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Ordered snake body. Index 0 is the head; a snake is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Snake {
    body: VecDeque<Position>,
}

impl Snake {
    /// Builds a snake from explicit cells, head first.
    #[cfg(test)]
    pub fn from_cells(cells: Vec<Position>) -> Self {
        assert!(!cells.is_empty(), "a snake needs at least one segment");
        Self { body: cells.into() }
    }

    /// A straight snake with its head at `head`, trailing away from `heading`.
    pub fn straight(head: Position, heading: Direction, length: usize) -> Self {
        let tail_direction = heading.opposite();
        let mut body = VecDeque::with_capacity(length.max(1));
        let mut cell = head;
        for _ in 0..length.max(1) {
            body.push_back(cell);
            cell = cell.step(tail_direction);
        }
        Self { body }
    }

    pub fn head(&self) -> Position {
        self.body[0]
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn segments(&self) -> impl Iterator<Item = &Position> {
        self.body.iter()
    }

    pub fn contains(&self, position: Position) -> bool {
        self.body.contains(&position)
    }

    /// Index of the first segment on `position`, counting from the head.
    pub fn index_of(&self, position: Position) -> Option<usize> {
        self.body.iter().position(|segment| *segment == position)
    }

    /// Pushes a new head and drops the tail unless the snake grows.
    pub fn advance(&mut self, head: Position, grow: bool) {
        self.body.push_front(head);
        if !grow {
            self.body.pop_back();
        }
    }

    /// Removes every segment from `index` to the tail. The head always stays.
    pub fn truncate(&mut self, index: usize) {
        self.body.truncate(index.max(1));
    }

    pub fn cells(&self) -> Vec<Position> {
        self.body.iter().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub position: Position,
    pub direction: Direction,
    /// Cells advanced per tick.
    pub speed: u32,
    pub owner_id: u32,
    pub created_at: u64,
}

impl Bullet {
    pub fn is_expired(&self, now: u64, lifetime_ms: u64) -> bool {
        now.saturating_sub(self.created_at) >= lifetime_ms
    }

    fn view(&self) -> BulletView {
        BulletView {
            position: self.position,
            direction: self.direction,
            speed: self.speed,
            owner_id: self.owner_id,
        }
    }
}

/// Absolute expiry timestamps of a player's timed abilities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Abilities {
    invincible_until: Option<u64>,
    ranged_attack_until: Option<u64>,
    speed_boost_until: Option<u64>,
}

impl Abilities {
    fn slot(&mut self, ability: Ability) -> &mut Option<u64> {
        match ability {
            Ability::Invincibility => &mut self.invincible_until,
            Ability::RangedAttack => &mut self.ranged_attack_until,
            Ability::SpeedBoost => &mut self.speed_boost_until,
        }
    }

    pub fn expires_at(&self, ability: Ability) -> Option<u64> {
        match ability {
            Ability::Invincibility => self.invincible_until,
            Ability::RangedAttack => self.ranged_attack_until,
            Ability::SpeedBoost => self.speed_boost_until,
        }
    }

    /// Activates `ability` until `until`, replacing any earlier expiry.
    pub fn grant(&mut self, ability: Ability, until: u64) {
        *self.slot(ability) = Some(until);
    }

    pub fn is_active(&self, ability: Ability) -> bool {
        self.expires_at(ability).is_some()
    }

    /// Clears every ability whose expiry lies before `now` and returns them.
    /// An ability is reported once; later calls no longer see it.
    pub fn expire(&mut self, now: u64) -> Vec<Ability> {
        let mut expired = Vec::new();
        for ability in [
            Ability::Invincibility,
            Ability::RangedAttack,
            Ability::SpeedBoost,
        ] {
            let slot = self.slot(ability);
            if matches!(*slot, Some(until) if now > until) {
                *slot = None;
                expired.push(ability);
            }
        }
        expired
    }

    pub fn clear(&mut self) {
        *self = Abilities::default();
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub skin: String,
    pub alive: bool,
    pub score: u32,
    /// Heading the snake last moved in.
    pub direction: Direction,
    /// Latest requested heading, applied on the next move.
    pub desired_direction: Direction,
    pub snake: Snake,
    pub bullets: Vec<Bullet>,
    pub abilities: Abilities,
    pub last_move_at: u64,
    pub last_shot_at: Option<u64>,
    /// Set by a shoot command, consumed by the next tick.
    pub pending_shot: bool,
}

impl Player {
    pub fn new(id: u32, name: String, skin: String, snake: Snake, now: u64) -> Self {
        Self {
            id,
            name,
            skin,
            alive: true,
            score: 0,
            direction: Direction::Right,
            desired_direction: Direction::Right,
            snake,
            bullets: Vec::new(),
            abilities: Abilities::default(),
            last_move_at: now,
            last_shot_at: None,
            pending_shot: false,
        }
    }

    /// Puts the player back to fresh spawn state, keeping identity and skin.
    pub fn respawn(&mut self, snake: Snake, now: u64) {
        self.alive = true;
        self.score = 0;
        self.direction = Direction::Right;
        self.desired_direction = Direction::Right;
        self.snake = snake;
        self.bullets.clear();
        self.abilities.clear();
        self.last_move_at = now;
        self.last_shot_at = None;
        self.pending_shot = false;
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            skin: self.skin.clone(),
            alive: self.alive,
            score: self.score,
            direction: self.direction,
            snake: self.snake.cells(),
            bullets: self.bullets.iter().map(Bullet::view).collect(),
            invincible: self.abilities.is_active(Ability::Invincibility),
            ranged_attack: self.abilities.is_active(Ability::RangedAttack),
            speed_boost: self.abilities.is_active(Ability::SpeedBoost),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Food {
    pub kind: FoodKind,
    pub position: Position,
    pub spawned_at: u64,
    /// Lifetime in milliseconds; `None` for food that stays until eaten.
    pub duration: Option<u64>,
}

impl Food {
    pub fn is_expired(&self, now: u64) -> bool {
        self.duration
            .map_or(false, |duration| now.saturating_sub(self.spawned_at) > duration)
    }
}

/// Sole owner of all players, their bullets, and the food set.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    pub players: BTreeMap<u32, Player>,
    pub food: BTreeMap<FoodKind, Food>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|player| player.alive).count()
    }

    /// Ids of living players in ascending order.
    pub fn living_ids(&self) -> Vec<u32> {
        self.players
            .values()
            .filter(|player| player.alive)
            .map(|player| player.id)
            .collect()
    }

    pub fn food_position(&self, kind: FoodKind) -> Option<Position> {
        self.food.get(&kind).map(|food| food.position)
    }

    /// Cells covered by living snakes and by food.
    pub fn occupied_cells(&self) -> HashSet<Position> {
        let mut occupied: HashSet<Position> = self
            .players
            .values()
            .filter(|player| player.alive)
            .flat_map(|player| player.snake.segments().copied())
            .collect();
        occupied.extend(self.food.values().map(|food| food.position));
        occupied
    }

    pub fn snapshot(&self, tick: u64) -> Snapshot {
        Snapshot {
            tick,
            players: self.players.values().map(Player::view).collect(),
            food: self.food_position(FoodKind::Plain).into_iter().collect(),
            special_food: self.food_position(FoodKind::Special),
            attack_food: self.food_position(FoodKind::Attack),
            speed_food: self.food_position(FoodKind::Speed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_player(id: u32, head: Position) -> Player {
        Player::new(
            id,
            format!("Player {}", id),
            "classic".to_string(),
            Snake::straight(head, Direction::Right, 3),
            0,
        )
    }

    #[test]
    fn test_straight_snake_layout() {
        let snake = Snake::straight(Position::new(5, 5), Direction::Right, 3);
        assert_eq!(
            snake.cells(),
            vec![Position::new(5, 5), Position::new(4, 5), Position::new(3, 5)]
        );
        assert_eq!(snake.head(), Position::new(5, 5));

        let snake = Snake::straight(Position::new(5, 5), Direction::Up, 2);
        assert_eq!(snake.cells(), vec![Position::new(5, 5), Position::new(5, 6)]);
    }

    #[test]
    fn test_snake_advance_and_grow() {
        let mut snake = Snake::straight(Position::new(5, 5), Direction::Right, 3);

        snake.advance(Position::new(6, 5), false);
        assert_eq!(snake.len(), 3);
        assert_eq!(snake.head(), Position::new(6, 5));
        assert!(!snake.contains(Position::new(3, 5)));

        snake.advance(Position::new(7, 5), true);
        assert_eq!(snake.len(), 4);
        assert!(snake.contains(Position::new(4, 5)));
    }

    #[test]
    fn test_snake_truncate_keeps_head() {
        let mut snake = Snake::straight(Position::new(9, 5), Direction::Right, 5);
        assert_eq!(snake.index_of(Position::new(7, 5)), Some(2));

        snake.truncate(2);
        assert_eq!(snake.cells(), vec![Position::new(9, 5), Position::new(8, 5)]);

        snake.truncate(0);
        assert_eq!(snake.len(), 1);
    }

    #[test]
    fn test_ability_expiry_reports_once() {
        let mut abilities = Abilities::default();
        abilities.grant(Ability::SpeedBoost, 1000);
        abilities.grant(Ability::RangedAttack, 5000);

        assert!(abilities.expire(1000).is_empty());
        assert_eq!(abilities.expire(1001), vec![Ability::SpeedBoost]);
        assert!(abilities.expire(1002).is_empty());
        assert!(abilities.expire(4000).is_empty());
        assert!(!abilities.is_active(Ability::SpeedBoost));
        assert!(abilities.is_active(Ability::RangedAttack));
        assert_eq!(abilities.expires_at(Ability::RangedAttack), Some(5000));
    }

    #[test]
    fn test_food_expiry() {
        let plain = Food {
            kind: FoodKind::Plain,
            position: Position::new(1, 1),
            spawned_at: 0,
            duration: None,
        };
        assert!(!plain.is_expired(u64::MAX));

        let special = Food {
            kind: FoodKind::Special,
            position: Position::new(2, 2),
            spawned_at: 1000,
            duration: Some(10_000),
        };
        assert!(!special.is_expired(11_000));
        assert!(special.is_expired(11_001));
    }

    #[test]
    fn test_bullet_lifetime() {
        let bullet = Bullet {
            position: Position::new(0, 0),
            direction: Direction::Right,
            speed: 1,
            owner_id: 1,
            created_at: 100,
        };
        assert!(!bullet.is_expired(5099, 5000));
        assert!(bullet.is_expired(5100, 5000));
    }

    #[test]
    fn test_occupied_cells_skip_dead_snakes() {
        let mut store = EntityStore::new();
        store.players.insert(1, test_player(1, Position::new(5, 5)));
        let mut dead = test_player(2, Position::new(20, 20));
        dead.alive = false;
        store.players.insert(2, dead);
        store.food.insert(
            FoodKind::Plain,
            Food {
                kind: FoodKind::Plain,
                position: Position::new(10, 10),
                spawned_at: 0,
                duration: None,
            },
        );

        let occupied = store.occupied_cells();
        assert_eq!(occupied.len(), 4);
        assert!(occupied.contains(&Position::new(3, 5)));
        assert!(occupied.contains(&Position::new(10, 10)));
        assert!(!occupied.contains(&Position::new(20, 20)));
        assert_eq!(store.alive_count(), 1);
        assert_eq!(store.living_ids(), vec![1]);
    }

    #[test]
    fn test_snapshot_contents() {
        let mut store = EntityStore::new();
        let mut player = test_player(1, Position::new(5, 5));
        player.abilities.grant(Ability::Invincibility, 10_000);
        store.players.insert(1, player);
        store.food.insert(
            FoodKind::Speed,
            Food {
                kind: FoodKind::Speed,
                position: Position::new(3, 3),
                spawned_at: 0,
                duration: Some(12_000),
            },
        );

        let snapshot = store.snapshot(7);
        assert_eq!(snapshot.tick, 7);
        assert_eq!(snapshot.players.len(), 1);
        assert!(snapshot.players[0].invincible);
        assert!(!snapshot.players[0].ranged_attack);
        assert!(snapshot.food.is_empty());
        assert_eq!(snapshot.speed_food, Some(Position::new(3, 3)));
        assert_eq!(snapshot.special_food, None);
    }
}
