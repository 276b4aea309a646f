use serde::{Deserialize, Serialize};

/// Side length of the default square playing field, in tiles.
pub const GRID_SIZE: i32 = 30;
/// Default scheduler period in milliseconds.
pub const TICK_MS: u64 = 100;
/// Length of a freshly spawned snake.
pub const INITIAL_SNAKE_LENGTH: usize = 3;

pub const DEFAULT_SKIN: &str = "classic";
pub const SKINS: [&str; 8] = [
    "classic", "fire", "ice", "rainbow", "neon", "gold", "dark", "ocean",
];

/// Returns true if `skin` names one of the known cosmetic skins.
pub fn is_valid_skin(skin: &str) -> bool {
    SKINS.contains(&skin)
}

/// A single tile on the grid. Also used for snake segments.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring tile one step towards `direction`. Not bounds checked.
    pub fn step(self, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        Position {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit offset for this heading. `y` grows downwards.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// Food variants. At most one of each is on the field at any time.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FoodKind {
    Plain,
    Special,
    Attack,
    Speed,
}

impl FoodKind {
    pub const ALL: [FoodKind; 4] = [
        FoodKind::Plain,
        FoodKind::Special,
        FoodKind::Attack,
        FoodKind::Speed,
    ];

    /// Variants that are re-rolled after a plain food pickup.
    pub const POWER_UPS: [FoodKind; 3] = [FoodKind::Special, FoodKind::Attack, FoodKind::Speed];

    /// The ability granted when this food is eaten, if any.
    pub fn ability(self) -> Option<Ability> {
        match self {
            FoodKind::Plain => None,
            FoodKind::Special => Some(Ability::Invincibility),
            FoodKind::Attack => Some(Ability::RangedAttack),
            FoodKind::Speed => Some(Ability::SpeedBoost),
        }
    }
}

/// Timed abilities a player can hold.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ability {
    Invincibility,
    RangedAttack,
    SpeedBoost,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BulletView {
    pub position: Position,
    pub direction: Direction,
    pub speed: u32,
    pub owner_id: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerView {
    pub id: u32,
    pub name: String,
    pub skin: String,
    pub alive: bool,
    pub score: u32,
    pub direction: Direction,
    /// Body segments, head first.
    pub snake: Vec<Position>,
    pub bullets: Vec<BulletView>,
    pub invincible: bool,
    pub ranged_attack: bool,
    pub speed_boost: bool,
}

/// Full state of the match as seen by every client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Snapshot {
    pub tick: u64,
    pub players: Vec<PlayerView>,
    /// Plain food. Holds zero or one entry.
    pub food: Vec<Position>,
    pub special_food: Option<Position>,
    pub attack_food: Option<Position>,
    pub speed_food: Option<Position>,
}

/// Discrete state changes emitted by the simulation, in the order they happened.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum GameEvent {
    PlayerJoined {
        player_id: u32,
        name: String,
        skin: String,
    },
    PlayerLeft {
        player_id: u32,
    },
    FoodEaten {
        player_id: u32,
        score: u32,
        new_food: Position,
    },
    FoodSpawned {
        kind: FoodKind,
        position: Position,
    },
    FoodExpired {
        kind: FoodKind,
    },
    /// A non-plain food was eaten.
    PowerUpEaten {
        kind: FoodKind,
        player_id: u32,
        score: u32,
    },
    AbilityExpired {
        player_id: u32,
        ability: Ability,
    },
    PlayerDied {
        player_id: u32,
    },
    PlayerKilled {
        killer_id: u32,
        victim_id: u32,
        score: u32,
    },
    BulletHit {
        shooter_id: u32,
        victim_id: u32,
        segment_index: usize,
    },
    RoundOver {
        winner_id: Option<u32>,
        winner_name: Option<String>,
        score: u32,
    },
    RoundReset,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client -> server
    Join {
        name: Option<String>,
    },
    SetDirection {
        direction: Direction,
    },
    SelectSkin {
        skin: String,
    },
    Shoot,
    Heartbeat,
    Disconnect,

    // Server -> client
    Joined {
        player_id: u32,
        grid_size: i32,
        skins: Vec<String>,
    },
    Rejected {
        reason: String,
    },
    Snapshot(Snapshot),
    Event(GameEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_step() {
        let origin = Position::new(5, 5);
        assert_eq!(origin.step(Direction::Up), Position::new(5, 4));
        assert_eq!(origin.step(Direction::Down), Position::new(5, 6));
        assert_eq!(origin.step(Direction::Left), Position::new(4, 5));
        assert_eq!(origin.step(Direction::Right), Position::new(6, 5));
    }

    #[test]
    fn test_direction_opposite() {
        for direction in [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ] {
            assert_ne!(direction, direction.opposite());
            assert_eq!(direction, direction.opposite().opposite());
            let (dx, dy) = direction.delta();
            let (ox, oy) = direction.opposite().delta();
            assert_eq!((dx + ox, dy + oy), (0, 0));
        }
    }

    #[test]
    fn test_food_abilities() {
        assert_eq!(FoodKind::Plain.ability(), None);
        assert_eq!(FoodKind::Special.ability(), Some(Ability::Invincibility));
        assert_eq!(FoodKind::Attack.ability(), Some(Ability::RangedAttack));
        assert_eq!(FoodKind::Speed.ability(), Some(Ability::SpeedBoost));
        assert!(!FoodKind::POWER_UPS.contains(&FoodKind::Plain));
    }

    #[test]
    fn test_skin_validation() {
        assert!(is_valid_skin("classic"));
        assert!(is_valid_skin("ocean"));
        assert!(!is_valid_skin("Classic"));
        assert!(!is_valid_skin(""));
        assert!(is_valid_skin(DEFAULT_SKIN));
    }

    #[test]
    fn test_packet_serialization_set_direction() {
        let packet = Packet::SetDirection {
            direction: Direction::Left,
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::SetDirection { direction } => assert_eq!(direction, Direction::Left),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_unknown_direction_tag_is_rejected() {
        let mut serialized = bincode::serialize(&Packet::SetDirection {
            direction: Direction::Up,
        })
        .unwrap();
        // Variant tags are little-endian u32s; the direction tag follows the packet tag.
        serialized[4] = 9;
        let result: Result<Packet, _> = bincode::deserialize(&serialized);
        assert!(result.is_err());
    }

    #[test]
    fn test_packet_serialization_snapshot() {
        let snapshot = Snapshot {
            tick: 42,
            players: vec![PlayerView {
                id: 1,
                name: "Player 1".to_string(),
                skin: DEFAULT_SKIN.to_string(),
                alive: true,
                score: 30,
                direction: Direction::Right,
                snake: vec![Position::new(5, 5), Position::new(4, 5), Position::new(3, 5)],
                bullets: vec![BulletView {
                    position: Position::new(7, 5),
                    direction: Direction::Right,
                    speed: 1,
                    owner_id: 1,
                }],
                invincible: false,
                ranged_attack: true,
                speed_boost: false,
            }],
            food: vec![Position::new(10, 10)],
            special_food: None,
            attack_food: Some(Position::new(2, 2)),
            speed_food: None,
        };

        let serialized = bincode::serialize(&Packet::Snapshot(snapshot.clone())).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Snapshot(received) => assert_eq!(received, snapshot),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_round_over() {
        let event = GameEvent::RoundOver {
            winner_id: Some(2),
            winner_name: Some("Player 2".to_string()),
            score: 120,
        };
        let serialized = bincode::serialize(&Packet::Event(event.clone())).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Event(received) => assert_eq!(received, event),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }
}
