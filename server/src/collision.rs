//! Collision resolution for snake heads and bullets.
//!
//! Both resolvers only read the entity store and report what would happen;
//! applying the outcome is left to the simulation loop.

use crate::entity::{Bullet, EntityStore};
use crate::grid::Grid;
use shared::{Ability, Direction, FoodKind, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    Wall,
    OwnBody,
    /// Ran into another living snake, which gets the kill.
    OtherSnake { killer_id: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The head moves to `head`; `eats` lists the food found there in the
    /// order its effects apply.
    Advance { head: Position, eats: Vec<FoodKind> },
    Fatal(DeathCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulletOutcome {
    /// Still in flight at the given cell.
    Flying(Position),
    OutOfBounds,
    Hit {
        victim_id: u32,
        segment_index: usize,
        position: Position,
    },
}

/// Resolves one head step of `player_id` towards `direction`.
///
/// Checks run in a fixed order and the first match wins: walls, own body,
/// other snakes. Invincibility wraps walls and makes bodies passable but still
/// lets the snake eat. Own-body checks see the body before this step's
/// growth or tail pop. Returns `None` if the player no longer exists.
pub fn resolve_move(
    grid: &Grid,
    store: &EntityStore,
    player_id: u32,
    direction: Direction,
) -> Option<MoveOutcome> {
    let player = store.player(player_id)?;
    let invincible = player.abilities.is_active(Ability::Invincibility);

    let mut head = player.snake.head().step(direction);
    if !grid.contains(head) {
        if !invincible {
            return Some(MoveOutcome::Fatal(DeathCause::Wall));
        }
        head = grid.wrap(head);
    }

    if !invincible {
        if player.snake.contains(head) {
            return Some(MoveOutcome::Fatal(DeathCause::OwnBody));
        }

        let killer = store
            .players
            .values()
            .filter(|other| other.id != player_id && other.alive)
            .find(|other| other.snake.contains(head));
        if let Some(killer) = killer {
            return Some(MoveOutcome::Fatal(DeathCause::OtherSnake {
                killer_id: killer.id,
            }));
        }
    }

    Some(MoveOutcome::Advance {
        head,
        eats: foods_at(store, head),
    })
}

/// Food a head landing on `position` eats.
///
/// Attack food is independent of the rest; of the others only the first of
/// speed, special, plain applies. Food never shares a cell in normal play so
/// this ordering only matters after a placement fallback.
pub fn foods_at(store: &EntityStore, position: Position) -> Vec<FoodKind> {
    let here = |kind: FoodKind| store.food_position(kind) == Some(position);

    let mut eats = Vec::new();
    if here(FoodKind::Attack) {
        eats.push(FoodKind::Attack);
    }
    if let Some(kind) = [FoodKind::Speed, FoodKind::Special, FoodKind::Plain]
        .into_iter()
        .find(|kind| here(*kind))
    {
        eats.push(kind);
    }
    eats
}

/// Advances `bullet` up to `speed` cells, one cell at a time.
///
/// At each sub-step the bullet is lost if it leaves the grid and stops at the
/// first segment of a living snake other than its owner's.
pub fn resolve_bullet(grid: &Grid, store: &EntityStore, bullet: &Bullet) -> BulletOutcome {
    let mut position = bullet.position;
    for _ in 0..bullet.speed {
        position = position.step(bullet.direction);
        if !grid.contains(position) {
            return BulletOutcome::OutOfBounds;
        }

        let hit = store
            .players
            .values()
            .filter(|victim| victim.id != bullet.owner_id && victim.alive)
            .find_map(|victim| {
                victim
                    .snake
                    .index_of(position)
                    .map(|segment_index| (victim.id, segment_index))
            });
        if let Some((victim_id, segment_index)) = hit {
            return BulletOutcome::Hit {
                victim_id,
                segment_index,
                position,
            };
        }
    }
    BulletOutcome::Flying(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Food, Player, Snake};

    fn add_player(store: &mut EntityStore, id: u32, cells: Vec<Position>) {
        store.players.insert(
            id,
            Player::new(
                id,
                format!("Player {}", id),
                "classic".to_string(),
                Snake::from_cells(cells),
                0,
            ),
        );
    }

    fn add_food(store: &mut EntityStore, kind: FoodKind, position: Position) {
        store.food.insert(
            kind,
            Food {
                kind,
                position,
                spawned_at: 0,
                duration: None,
            },
        );
    }

    fn line(head: (i32, i32), heading: Direction, length: usize) -> Vec<Position> {
        Snake::straight(Position::new(head.0, head.1), heading, length).cells()
    }

    fn bullet(from: (i32, i32), direction: Direction, speed: u32, owner_id: u32) -> Bullet {
        Bullet {
            position: Position::new(from.0, from.1),
            direction,
            speed,
            owner_id,
            created_at: 0,
        }
    }

    #[test]
    fn test_plain_move() {
        let grid = Grid::new(30);
        let mut store = EntityStore::new();
        add_player(&mut store, 1, line((5, 5), Direction::Right, 3));

        let outcome = resolve_move(&grid, &store, 1, Direction::Right).unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::Advance {
                head: Position::new(6, 5),
                eats: vec![]
            }
        );
    }

    #[test]
    fn test_missing_player() {
        let grid = Grid::new(30);
        let store = EntityStore::new();
        assert_eq!(resolve_move(&grid, &store, 42, Direction::Up), None);
    }

    #[test]
    fn test_wall_collision() {
        let grid = Grid::new(30);
        let mut store = EntityStore::new();
        add_player(&mut store, 1, line((29, 5), Direction::Right, 3));

        assert_eq!(
            resolve_move(&grid, &store, 1, Direction::Right),
            Some(MoveOutcome::Fatal(DeathCause::Wall))
        );
    }

    #[test]
    fn test_invincible_wraps_walls() {
        let grid = Grid::new(30);
        let mut store = EntityStore::new();
        add_player(&mut store, 1, line((29, 5), Direction::Right, 3));
        store
            .player_mut(1)
            .unwrap()
            .abilities
            .grant(Ability::Invincibility, 10_000);

        assert_eq!(
            resolve_move(&grid, &store, 1, Direction::Right),
            Some(MoveOutcome::Advance {
                head: Position::new(0, 5),
                eats: vec![]
            })
        );
    }

    #[test]
    fn test_self_collision_checks_tail() {
        let grid = Grid::new(30);
        let mut store = EntityStore::new();
        // A tight loop where the next head cell is the current tail.
        add_player(
            &mut store,
            1,
            vec![
                Position::new(5, 5),
                Position::new(6, 5),
                Position::new(6, 6),
                Position::new(5, 6),
            ],
        );

        assert_eq!(
            resolve_move(&grid, &store, 1, Direction::Down),
            Some(MoveOutcome::Fatal(DeathCause::OwnBody))
        );
    }

    #[test]
    fn test_other_snake_collision_credits_killer() {
        let grid = Grid::new(30);
        let mut store = EntityStore::new();
        add_player(&mut store, 1, line((5, 5), Direction::Right, 3));
        add_player(&mut store, 2, line((6, 7), Direction::Up, 3));

        // Player 2 covers (6, 7), (6, 8), (6, 9); player 1 sits just above its head.
        store.player_mut(1).unwrap().snake = Snake::from_cells(line((6, 6), Direction::Up, 1));
        assert_eq!(
            resolve_move(&grid, &store, 1, Direction::Down),
            Some(MoveOutcome::Fatal(DeathCause::OtherSnake { killer_id: 2 }))
        );
    }

    #[test]
    fn test_dead_snakes_are_passable() {
        let grid = Grid::new(30);
        let mut store = EntityStore::new();
        add_player(&mut store, 1, line((5, 5), Direction::Right, 3));
        add_player(&mut store, 2, line((6, 5), Direction::Up, 3));
        store.player_mut(2).unwrap().alive = false;

        assert!(matches!(
            resolve_move(&grid, &store, 1, Direction::Right),
            Some(MoveOutcome::Advance { .. })
        ));
    }

    #[test]
    fn test_invincible_passes_through_bodies() {
        let grid = Grid::new(30);
        let mut store = EntityStore::new();
        add_player(&mut store, 1, line((5, 5), Direction::Right, 3));
        add_player(&mut store, 2, line((6, 4), Direction::Up, 3));
        store
            .player_mut(1)
            .unwrap()
            .abilities
            .grant(Ability::Invincibility, 10_000);

        assert_eq!(
            resolve_move(&grid, &store, 1, Direction::Right),
            Some(MoveOutcome::Advance {
                head: Position::new(6, 5),
                eats: vec![]
            })
        );
        assert!(matches!(
            resolve_move(&grid, &store, 1, Direction::Left),
            Some(MoveOutcome::Advance { .. })
        ));
    }

    #[test]
    fn test_food_pickup_and_priority() {
        let grid = Grid::new(30);
        let mut store = EntityStore::new();
        add_player(&mut store, 1, line((5, 5), Direction::Right, 3));
        let target = Position::new(6, 5);
        add_food(&mut store, FoodKind::Plain, target);

        assert_eq!(
            resolve_move(&grid, &store, 1, Direction::Right),
            Some(MoveOutcome::Advance {
                head: target,
                eats: vec![FoodKind::Plain]
            })
        );

        add_food(&mut store, FoodKind::Special, target);
        assert_eq!(foods_at(&store, target), vec![FoodKind::Special]);

        add_food(&mut store, FoodKind::Speed, target);
        assert_eq!(foods_at(&store, target), vec![FoodKind::Speed]);

        add_food(&mut store, FoodKind::Attack, target);
        assert_eq!(
            foods_at(&store, target),
            vec![FoodKind::Attack, FoodKind::Speed]
        );
        assert!(foods_at(&store, Position::new(0, 0)).is_empty());
    }

    #[test]
    fn test_bullet_flies() {
        let grid = Grid::new(30);
        let mut store = EntityStore::new();
        add_player(&mut store, 1, line((5, 5), Direction::Right, 3));

        let outcome = resolve_bullet(&grid, &store, &bullet((5, 5), Direction::Right, 2, 1));
        assert_eq!(outcome, BulletOutcome::Flying(Position::new(7, 5)));
    }

    #[test]
    fn test_bullet_leaves_grid() {
        let grid = Grid::new(30);
        let store = EntityStore::new();

        let outcome = resolve_bullet(&grid, &store, &bullet((0, 3), Direction::Left, 1, 1));
        assert_eq!(outcome, BulletOutcome::OutOfBounds);
    }

    #[test]
    fn test_bullet_hits_first_segment_on_path() {
        let grid = Grid::new(30);
        let mut store = EntityStore::new();
        add_player(&mut store, 1, line((2, 10), Direction::Right, 3));
        add_player(&mut store, 2, line((4, 8), Direction::Up, 5));

        // Speed 2 from (2, 10): first sub-step (3, 10) is empty, second hits (4, 10).
        let outcome = resolve_bullet(&grid, &store, &bullet((2, 10), Direction::Right, 2, 1));
        assert_eq!(
            outcome,
            BulletOutcome::Hit {
                victim_id: 2,
                segment_index: 2,
                position: Position::new(4, 10)
            }
        );
    }

    #[test]
    fn test_bullet_ignores_owner_and_dead() {
        let grid = Grid::new(30);
        let mut store = EntityStore::new();
        add_player(&mut store, 1, line((8, 5), Direction::Right, 5));
        add_player(&mut store, 2, line((9, 7), Direction::Up, 5));
        store.player_mut(2).unwrap().alive = false;

        let outcome = resolve_bullet(&grid, &store, &bullet((3, 5), Direction::Right, 3, 1));
        assert_eq!(outcome, BulletOutcome::Flying(Position::new(6, 5)));

        let outcome = resolve_bullet(&grid, &store, &bullet((8, 9), Direction::Right, 1, 1));
        assert_eq!(outcome, BulletOutcome::Flying(Position::new(9, 9)));
    }
}
