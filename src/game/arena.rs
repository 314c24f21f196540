//! Arena geometry: world bounds and spawn area

use rand::Rng;

use crate::ws::protocol::Position;

/// Axis-aligned rectangle, `min` inclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    #[cfg(test)]
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= self.min_x && pos.x <= self.max_x && pos.y >= self.min_y && pos.y <= self.max_y
    }
}

/// Player radius; positions are kept this far inside the world edge
pub const PLAYER_RADIUS: f64 = 15.0;

/// Full world size, independent of any client's viewport
pub const WORLD_WIDTH: f64 = 1920.0;
pub const WORLD_HEIGHT: f64 = 1080.0;

/// Where player centers may be
pub const WORLD_BOUNDS: Rect = Rect {
    min_x: PLAYER_RADIUS,
    min_y: PLAYER_RADIUS,
    max_x: WORLD_WIDTH - PLAYER_RADIUS,
    max_y: WORLD_HEIGHT - PLAYER_RADIUS,
};

/// Where players appear on join and respawn
pub const SPAWN_AREA: Rect = Rect {
    min_x: 100.0,
    min_y: 100.0,
    max_x: 900.0,
    max_y: 600.0,
};

/// Clamp a reported position into the world.
/// Returns `None` for non-finite coordinates.
pub fn clamp_to_world(x: f64, y: f64) -> Option<Position> {
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some(Position {
        x: x.clamp(WORLD_BOUNDS.min_x, WORLD_BOUNDS.max_x),
        y: y.clamp(WORLD_BOUNDS.min_y, WORLD_BOUNDS.max_y),
    })
}

/// Draw a spawn point uniformly from the spawn area
pub fn random_spawn<R: Rng + ?Sized>(rng: &mut R) -> Position {
    Position {
        x: rng.gen_range(SPAWN_AREA.min_x..SPAWN_AREA.max_x),
        y: rng.gen_range(SPAWN_AREA.min_y..SPAWN_AREA.max_y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn clamps_into_world_bounds() {
        assert_eq!(
            clamp_to_world(-40.0, 5000.0),
            Some(Position { x: 15.0, y: 1065.0 })
        );
        assert_eq!(
            clamp_to_world(3000.0, 2.0),
            Some(Position { x: 1905.0, y: 15.0 })
        );
        assert_eq!(
            clamp_to_world(400.5, 300.25),
            Some(Position { x: 400.5, y: 300.25 })
        );
    }

    #[test]
    fn rejects_non_finite_positions() {
        assert_eq!(clamp_to_world(f64::NAN, 10.0), None);
        assert_eq!(clamp_to_world(10.0, f64::INFINITY), None);
    }

    #[test]
    fn spawns_stay_inside_spawn_area() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..1_000 {
            let pos = random_spawn(&mut rng);
            assert!(SPAWN_AREA.contains(pos), "{pos:?} outside spawn area");
            assert!(pos.x < SPAWN_AREA.max_x && pos.y < SPAWN_AREA.max_y);
        }
    }
}
