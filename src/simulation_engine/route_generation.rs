// route_generation.rs
//
// Random route generation. A route starts on an unused street cell and follows
// the street directions; at every intersection it picks uniformly among the
// right turn, straight and left turn continuations that stay on the street
// network. Generation stops once a randomly drawn length is reached.

use crate::error::RouteError;
use crate::simulation_engine::grid::{Cell, CellKind, CityGrid, Direction};
use log::debug;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// An immutable sequence of moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Route {
    moves: Vec<Direction>,
}

impl Route {
    pub fn new(moves: Vec<Direction>) -> Self {
        Self { moves }
    }

    pub fn moves(&self) -> &[Direction] {
        &self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Direction> {
        self.moves.get(index).copied()
    }

    /// Cells visited after each move, starting from `start`.
    pub fn replay(&self, start: Cell) -> Vec<Cell> {
        self.moves
            .iter()
            .scan(start, |at, &direction| {
                *at = at.step(direction);
                Some(*at)
            })
            .collect()
    }

    /// The cell reached after the last move.
    pub fn end_from(&self, start: Cell) -> Cell {
        self.moves.iter().fold(start, |at, &direction| at.step(direction))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self.moves.iter().map(|d| d.to_string()).collect();
        write!(f, "[{}]", tokens.join(" "))
    }
}

/// A freshly generated route with its endpoints.
#[derive(Debug, Clone)]
pub struct GeneratedRoute {
    pub route: Route,
    pub start: Cell,
    pub end: Cell,
}

/// Inclusive bounds on the drawn route length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteBounds {
    pub min_len: usize,
    pub max_len: usize,
}

/// The three ways through an intersection for a car arriving with
/// `arrival` heading: right turn, straight on, left turn.
fn intersection_continuations(arrival: Direction) -> [Vec<Direction>; 3] {
    let right = arrival.turn_right();
    let left = arrival.turn_left();
    [
        vec![right],
        vec![arrival, arrival],
        vec![arrival, left, left],
    ]
}

fn stays_on_streets(grid: &CityGrid, from: Cell, moves: &[Direction]) -> bool {
    let mut at = from;
    moves.iter().all(|&direction| {
        at = at.step(direction);
        grid.kind_of(at).is_some_and(CellKind::is_passable)
    })
}

/// Generates one route. The chosen start is added to `used_starts` on success.
pub fn generate_route<R: Rng>(
    grid: &CityGrid,
    rng: &mut R,
    bounds: RouteBounds,
    used_starts: &mut HashSet<Cell>,
) -> Result<GeneratedRoute, RouteError> {
    let candidates: Vec<Cell> = grid
        .street_cells()
        .into_iter()
        .filter(|cell| !used_starts.contains(cell))
        .collect();
    let start = *candidates.choose(rng).ok_or(RouteError::NoFreeStart)?;
    let target_len = rng.random_range(bounds.min_len..=bounds.max_len);

    let mut moves: Vec<Direction> = Vec::with_capacity(target_len + 2);
    let mut at = start;

    // Intersection choices are appended whole, so the route may overshoot.
    while moves.len() < target_len {
        let steps = match grid.kind_of(at) {
            Some(CellKind::Street(direction)) => vec![direction],
            Some(CellKind::Intersection) => {
                let arrival = *moves.last().ok_or(RouteError::WalkedOffGrid { at })?;
                let options: Vec<Vec<Direction>> = intersection_continuations(arrival)
                    .into_iter()
                    .filter(|option| stays_on_streets(grid, at, option))
                    .collect();
                options
                    .choose(rng)
                    .cloned()
                    .ok_or(RouteError::NoValidContinuation {
                        at,
                        arrival: arrival.token(),
                    })?
            }
            _ => return Err(RouteError::WalkedOffGrid { at }),
        };

        for direction in steps {
            at = at.step(direction);
            if !grid.kind_of(at).is_some_and(CellKind::is_passable) {
                return Err(RouteError::WalkedOffGrid { at });
            }
            moves.push(direction);
        }
    }

    used_starts.insert(start);
    Ok(GeneratedRoute {
        route: Route::new(moves),
        start,
        end: at,
    })
}

/// Retries [`generate_route`] with a fresh start after dead ends.
pub fn generate_route_with_retry<R: Rng>(
    grid: &CityGrid,
    rng: &mut R,
    bounds: RouteBounds,
    used_starts: &mut HashSet<Cell>,
    max_attempts: usize,
) -> Result<GeneratedRoute, RouteError> {
    for attempt in 1..=max_attempts {
        match generate_route(grid, rng, bounds, used_starts) {
            Ok(generated) => return Ok(generated),
            Err(RouteError::NoFreeStart) => return Err(RouteError::NoFreeStart),
            Err(err) => debug!("Route attempt {} discarded: {}", attempt, err),
        }
    }
    Err(RouteError::Exhausted {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const BOUNDS: RouteBounds = RouteBounds {
        min_len: 25,
        max_len: 50,
    };

    #[test]
    fn generated_routes_replay_to_their_end_on_streets() {
        let grid = CityGrid::default_city().unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut used = HashSet::new();

        for _ in 0..30 {
            let generated = generate_route(&grid, &mut rng, BOUNDS, &mut used).unwrap();
            let visited = generated.route.replay(generated.start);
            assert_eq!(visited.last().copied(), Some(generated.end));
            assert_eq!(generated.route.end_from(generated.start), generated.end);
            for cell in visited {
                assert_ne!(grid.kind_of(cell), Some(CellKind::Building), "{cell}");
                assert!(grid.contains(cell));
            }
            let len = generated.route.len();
            assert!(len >= BOUNDS.min_len && len <= BOUNDS.max_len + 2, "len {len}");
        }
        assert_eq!(used.len(), 30);
    }

    #[test]
    fn starts_are_unique_street_cells() {
        let grid = CityGrid::default_city().unwrap();
        let mut rng = SmallRng::seed_from_u64(11);
        let mut used = HashSet::new();
        let mut starts = HashSet::new();
        for _ in 0..60 {
            let generated = generate_route(&grid, &mut rng, BOUNDS, &mut used).unwrap();
            assert!(matches!(grid.kind_of(generated.start), Some(CellKind::Street(_))));
            assert!(starts.insert(generated.start));
        }
    }

    #[test]
    fn dead_end_intersection_is_reported() {
        let grid = CityGrid::parse("B, B, B\nR, S, B\nB, B, B\n").unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        let mut used = HashSet::new();
        let bounds = RouteBounds {
            min_len: 3,
            max_len: 3,
        };
        let err = generate_route(&grid, &mut rng, bounds, &mut used).unwrap_err();
        assert_eq!(
            err,
            RouteError::NoValidContinuation {
                at: Cell::new(1, 1),
                arrival: 'R'
            }
        );
        assert!(used.is_empty());
    }

    #[test]
    fn retry_gives_up_without_panicking() {
        let grid = CityGrid::parse("B, B, B\nR, S, B\nB, B, B\n").unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        let mut used = HashSet::new();
        let bounds = RouteBounds {
            min_len: 3,
            max_len: 3,
        };
        let err = generate_route_with_retry(&grid, &mut rng, bounds, &mut used, 5).unwrap_err();
        assert_eq!(err, RouteError::Exhausted { attempts: 5 });
    }

    #[test]
    fn running_out_of_starts_is_reported() {
        let grid = CityGrid::parse("B, D, B\nB, D, B\nB, D, B\n").unwrap();
        let mut rng = SmallRng::seed_from_u64(3);
        let mut used: HashSet<Cell> = grid.street_cells().into_iter().collect();
        let bounds = RouteBounds {
            min_len: 1,
            max_len: 1,
        };
        assert_eq!(
            generate_route_with_retry(&grid, &mut rng, bounds, &mut used, 5).unwrap_err(),
            RouteError::NoFreeStart
        );
    }

    #[test]
    fn walking_off_the_grid_is_an_error() {
        let grid = CityGrid::parse("R, R\n").unwrap();
        let mut rng = SmallRng::seed_from_u64(5);
        let mut used = HashSet::new();
        let bounds = RouteBounds {
            min_len: 4,
            max_len: 4,
        };
        assert!(matches!(
            generate_route(&grid, &mut rng, bounds, &mut used),
            Err(RouteError::WalkedOffGrid { .. })
        ));
    }

    #[test]
    fn route_displays_like_a_token_list() {
        let route = Route::new(vec![Direction::Down, Direction::Right, Direction::Up]);
        assert_eq!(route.to_string(), "[D R U]");
        assert_eq!(route.end_from(Cell::new(0, 0)), Cell::new(1, 0));
    }
}
