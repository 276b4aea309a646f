use rand::Rng;
use shared::Position;

/// Fixed square tile space. Valid coordinates are `0..size` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    size: i32,
}

impl Grid {
    pub fn new(size: i32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn contains(&self, position: Position) -> bool {
        (0..self.size).contains(&position.x) && (0..self.size).contains(&position.y)
    }

    /// Folds an out-of-bounds position back onto the opposite edge.
    pub fn wrap(&self, position: Position) -> Position {
        Position {
            x: position.x.rem_euclid(self.size),
            y: position.y.rem_euclid(self.size),
        }
    }

    /// Uniformly random tile.
    pub fn random_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> Position {
        Position {
            x: rng.gen_range(0..self.size),
            y: rng.gen_range(0..self.size),
        }
    }
}
