// src/shared_data.rs
//
// Data published by the agents and read by observers: per-car views, the
// finished-car registry and the serialisable snapshot handed to renderers.

use crate::simulation_engine::grid::{Cell, Direction};
use crate::simulation_engine::occupancy::{CarId, Signal};
use crate::simulation_engine::route_generation::Route;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// What a car shows to the outside world after each tick.
#[derive(Debug, Clone, Serialize)]
pub struct CarView {
    pub id: CarId,
    /// Logical cell the car owns (or last owned, once finished).
    pub cell: Cell,
    /// Render position in sub-cell units.
    pub render_x: i32,
    pub render_y: i32,
    pub heading: Direction,
    pub delay_ms: u64,
    pub active: bool,
    pub crossing: bool,
    pub opacity: f32,
}

/// Light phase of one intersection.
#[derive(Debug, Clone, Serialize)]
pub struct LightView {
    pub id: usize,
    pub active_index: usize,
    pub cells: Vec<(Cell, Signal)>,
    pub free_cell: Option<Cell>,
}

/// A consistent read-only picture of the city for renderers.
#[derive(Debug, Clone, Serialize)]
pub struct CitySnapshot {
    pub substeps_per_cell: u32,
    pub cars: Vec<CarView>,
    pub lights: Vec<LightView>,
    pub finished: Vec<CarId>,
}

impl CitySnapshot {
    pub fn active_cars(&self) -> impl Iterator<Item = &CarView> {
        self.cars.iter().filter(|car| car.active)
    }
}

/// Registry entry for a car that consumed its whole route.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedCar {
    pub id: CarId,
    pub route: Route,
    pub start: Cell,
    pub end: Cell,
    pub original_delay_ms: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Latest view of every car, indexed by id. Each slot is written only by
/// the agent that drives that car.
#[derive(Debug, Default)]
pub struct CarBoard {
    views: Mutex<Vec<Option<CarView>>>,
}

impl CarBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, view: CarView) {
        let Some(slot) = (view.id as usize).checked_sub(1) else {
            return;
        };
        let mut views = lock(&self.views);
        if views.len() <= slot {
            views.resize(slot + 1, None);
        }
        views[slot] = Some(view);
    }

    pub fn view(&self, id: CarId) -> Option<CarView> {
        let slot = (id as usize).checked_sub(1)?;
        lock(&self.views).get(slot).cloned().flatten()
    }

    /// Current per-step delay of car `id`.
    pub fn delay_of(&self, id: CarId) -> Option<u64> {
        let slot = (id as usize).checked_sub(1)?;
        lock(&self.views)
            .get(slot)
            .and_then(|view| view.as_ref().map(|view| view.delay_ms))
    }

    pub fn views(&self) -> Vec<CarView> {
        lock(&self.views).iter().flatten().cloned().collect()
    }
}

/// Cars that reached the end of their route, keyed by id.
#[derive(Debug, Default)]
pub struct FinishedRegistry {
    cars: Mutex<BTreeMap<CarId, FinishedCar>>,
}

impl FinishedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, car: FinishedCar) {
        lock(&self.cars).insert(car.id, car);
    }

    pub fn get(&self, id: CarId) -> Option<FinishedCar> {
        lock(&self.cars).get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.cars).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<CarId> {
        lock(&self.cars).keys().copied().collect()
    }

    /// All entries in id order.
    pub fn all(&self) -> Vec<FinishedCar> {
        lock(&self.cars).values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(id: CarId, delay_ms: u64) -> CarView {
        CarView {
            id,
            cell: Cell::new(0, 0),
            render_x: 0,
            render_y: 0,
            heading: Direction::Down,
            delay_ms,
            active: true,
            crossing: false,
            opacity: 1.0,
        }
    }

    #[test]
    fn board_keeps_latest_view_per_car() {
        let board = CarBoard::new();
        board.publish(view(3, 10));
        board.publish(view(1, 20));
        board.publish(view(3, 25));
        assert_eq!(board.delay_of(3), Some(25));
        assert_eq!(board.delay_of(1), Some(20));
        assert_eq!(board.delay_of(2), None);
        assert_eq!(board.delay_of(0), None);
        let ids: Vec<CarId> = board.views().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn registry_is_keyed_by_id() {
        let registry = FinishedRegistry::new();
        assert!(registry.is_empty());
        registry.register(FinishedCar {
            id: 4,
            route: Route::new(vec![Direction::Down]),
            start: Cell::new(2, 0),
            end: Cell::new(2, 1),
            original_delay_ms: 12,
        });
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.ids(), vec![4]);
        assert_eq!(registry.get(4).map(|car| car.end), Some(Cell::new(2, 1)));
        assert!(registry.get(5).is_none());
    }

    #[test]
    fn snapshot_serialises_to_json() {
        let snapshot = CitySnapshot {
            substeps_per_cell: 22,
            cars: vec![view(1, 10)],
            lights: vec![LightView {
                id: 1,
                active_index: 0,
                cells: vec![(Cell::new(9, 9), Signal::Open)],
                free_cell: None,
            }],
            finished: vec![],
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["cars"][0]["heading"], "D");
        assert_eq!(json["lights"][0]["cells"][0][1], "Open");
        assert_eq!(snapshot.active_cars().count(), 1);
    }
}
