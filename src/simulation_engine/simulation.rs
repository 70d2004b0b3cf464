// simulation.rs
//
// The simulation context: owns the grid, the occupancy state, the published
// car views and the finished registry, builds the cars and light groups, and
// spawns one tokio task per agent.

use crate::config::SimulationConfig;
use crate::control_system::TrafficLightAgent;
use crate::error::{SimError, SimResult};
use crate::shared_data::{CarBoard, CitySnapshot, FinishedCar, FinishedRegistry, LightView};
use crate::simulation_engine::grid::{Cell, CityGrid};
use crate::simulation_engine::intersections::{default_light_groups, TrafficLightGroup};
use crate::simulation_engine::movement::{CarAgent, CarTiming};
use crate::simulation_engine::occupancy::{CarId, OccupancyState, Signal};
use crate::simulation_engine::route_generation::generate_route_with_retry;
use crate::simulation_engine::vehicles::Car;
use log::{info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// State shared by every agent.
#[derive(Debug)]
pub struct CityState {
    pub grid: CityGrid,
    pub occupancy: OccupancyState,
    pub cars: CarBoard,
    pub finished: FinishedRegistry,
    pub lights: Vec<Arc<TrafficLightGroup>>,
}

/// Sleeps for `duration` unless shutdown is signalled first.
/// Returns `false` when the caller should stop.
pub(crate) async fn wait_or_shutdown(
    duration: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = sleep(duration) => true,
        _ = shutdown.changed() => false,
    }
}

pub struct Simulation {
    config: SimulationConfig,
    city: Arc<CityState>,
    waiting: Vec<Car>,
    car_count: usize,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Simulation {
    /// Builds a simulation from `config`: loads the city, generates one route
    /// per car and sets up the first `config.lights` light groups.
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        let grid = match &config.grid_path {
            Some(path) => CityGrid::load(path)?,
            None => CityGrid::default_city()?,
        };
        let mut rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_rng(&mut rand::rng()),
        };

        let mut used_starts = HashSet::new();
        let mut cars = Vec::with_capacity(config.cars);
        for id in 1..=config.cars as CarId {
            let generated = generate_route_with_retry(
                &grid,
                &mut rng,
                config.route_bounds(),
                &mut used_starts,
                config.route_max_attempts,
            )?;
            let delay = rng.random_range(config.car_delay_min_ms..=config.car_delay_max_ms);
            info!(
                "Car {} starts at {} with {} moves, delay {} ms",
                id,
                generated.start,
                generated.route.len(),
                delay
            );
            cars.push(Car::new(id, generated, delay, config.substeps_per_cell));
        }

        let lights = default_light_groups(config.lights, config.light_period());
        Self::with_parts(config, grid, lights, cars)
    }

    /// Builds a simulation from hand-made parts. Cars must have distinct,
    /// non-zero ids and distinct start cells.
    pub fn with_parts(
        config: SimulationConfig,
        grid: CityGrid,
        lights: Vec<TrafficLightGroup>,
        cars: Vec<Car>,
    ) -> SimResult<Self> {
        for group in &lights {
            group.check_against(&grid)?;
        }

        let occupancy = OccupancyState::new(&grid);
        let board = CarBoard::new();
        let mut ids = HashSet::new();
        for car in &cars {
            if car.id == 0 || !ids.insert(car.id) {
                return Err(SimError::InvalidArgument(format!(
                    "Car id {} is zero or used twice",
                    car.id
                )));
            }
            if !occupancy.place(car.id, car.start) {
                return Err(SimError::InvalidArgument(format!(
                    "Car {} cannot start at {}",
                    car.id, car.start
                )));
            }
            board.publish(car.view());
        }

        let lights: Vec<Arc<TrafficLightGroup>> = lights.into_iter().map(Arc::new).collect();
        for group in &lights {
            let agent = TrafficLightAgent::new(Arc::clone(group));
            agent.open_free_cell(&occupancy);
            agent.apply(&occupancy);
        }

        let city = CityState {
            grid,
            occupancy,
            cars: board,
            finished: FinishedRegistry::new(),
            lights,
        };
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            config,
            city: Arc::new(city),
            car_count: cars.len(),
            waiting: cars,
            shutdown,
            handles: Vec::new(),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn city(&self) -> &Arc<CityState> {
        &self.city
    }

    pub fn car_count(&self) -> usize {
        self.car_count
    }

    /// Spawns every light and car agent on the current tokio runtime.
    pub fn start(&mut self) {
        let start_delay = self.config.start_delay();
        for group in &self.city.lights {
            let agent = TrafficLightAgent::new(Arc::clone(group));
            self.handles.push(tokio::spawn(agent.run(
                Arc::clone(&self.city),
                start_delay,
                self.shutdown.subscribe(),
            )));
        }

        let timing = CarTiming::from_config(&self.config);
        for car in self.waiting.drain(..) {
            let agent = CarAgent::new(car, timing);
            self.handles.push(tokio::spawn(
                agent.run(Arc::clone(&self.city), self.shutdown.subscribe()),
            ));
        }
        info!(
            "Simulation started with {} cars and {} traffic lights",
            self.car_count,
            self.city.lights.len()
        );
    }

    /// Tells every agent to stop at its next sleep.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Waits for every spawned agent to exit.
    pub async fn join(&mut self) {
        for handle in self.handles.drain(..) {
            if let Err(err) = handle.await {
                warn!("Agent task failed: {}", err);
            }
        }
    }

    pub fn finished_car(&self, id: CarId) -> Option<FinishedCar> {
        self.city.finished.get(id)
    }

    pub fn finished(&self) -> &FinishedRegistry {
        &self.city.finished
    }

    pub fn all_finished(&self) -> bool {
        self.city.finished.len() >= self.car_count
    }

    /// A read-only picture of the city. Car cells are taken from the
    /// occupancy grid, so no two active cars ever share one.
    pub fn snapshot(&self) -> CitySnapshot {
        let owned: HashMap<CarId, Cell> = self
            .city
            .occupancy
            .owned_cells()
            .into_iter()
            .map(|(cell, id)| (id, cell))
            .collect();
        let cars = self
            .city
            .cars
            .views()
            .into_iter()
            .map(|mut view| {
                match owned.get(&view.id) {
                    Some(&cell) => view.cell = cell,
                    None => view.active = false,
                }
                view
            })
            .collect();
        let lights = self
            .city
            .lights
            .iter()
            .map(|group| {
                // One read of the markers; the open cell is the active phase.
                let signals = self.city.occupancy.signals(group.cells());
                let active_index = signals
                    .iter()
                    .position(|&signal| signal == Signal::Open)
                    .unwrap_or_else(|| group.active_index());
                LightView {
                    id: group.id(),
                    active_index,
                    cells: group.cells().iter().copied().zip(signals).collect(),
                    free_cell: group.free_cell(),
                }
            })
            .collect();
        CitySnapshot {
            substeps_per_cell: self.config.substeps_per_cell,
            cars,
            lights,
            finished: self.city.finished.ids(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation_engine::grid::Direction;
    use crate::simulation_engine::route_generation::Route;

    fn quick_config(cars: usize, lights: usize) -> SimulationConfig {
        SimulationConfig {
            cars,
            lights,
            seed: Some(42),
            start_delay_ms: 0,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn new_places_every_car_on_its_own_street_cell() {
        let sim = Simulation::new(quick_config(30, 12)).unwrap();
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.cars.len(), 30);
        assert_eq!(snapshot.lights.len(), 12);
        let cells: HashSet<Cell> = snapshot.active_cars().map(|car| car.cell).collect();
        assert_eq!(cells.len(), 30);
        assert!(snapshot.finished.is_empty());
    }

    #[test]
    fn same_seed_gives_same_starts() {
        let a = Simulation::new(quick_config(5, 0)).unwrap().snapshot();
        let b = Simulation::new(quick_config(5, 0)).unwrap().snapshot();
        let starts = |s: &CitySnapshot| s.cars.iter().map(|c| c.cell).collect::<Vec<_>>();
        assert_eq!(starts(&a), starts(&b));
    }

    #[test]
    fn out_of_range_config_is_rejected_before_building() {
        assert!(matches!(
            Simulation::new(quick_config(31, 12)),
            Err(SimError::InvalidArgument(_))
        ));
    }

    #[test]
    fn shared_start_cells_are_rejected() {
        let grid = CityGrid::parse("B, D, B\nB, D, B\nB, D, B\n").unwrap();
        let route = Route::new(vec![Direction::Down]);
        let cars = vec![
            Car::with_route(1, Cell::new(1, 0), route.clone(), 5, 2),
            Car::with_route(2, Cell::new(1, 0), route, 5, 2),
        ];
        assert!(matches!(
            Simulation::with_parts(SimulationConfig::default(), grid, vec![], cars),
            Err(SimError::InvalidArgument(_))
        ));
    }

    #[test]
    fn initial_signals_open_the_first_cell_and_the_free_cell() {
        let sim = Simulation::new(quick_config(1, 1)).unwrap();
        let light = &sim.snapshot().lights[0];
        assert_eq!(light.active_index, 0);
        let open = light
            .cells
            .iter()
            .filter(|(_, signal)| *signal == Signal::Open)
            .count();
        assert_eq!(open, 1);
        let free = light.free_cell.unwrap();
        assert_eq!(sim.city().occupancy.signal(free), Signal::Open);
    }
}
