// movement.rs
//
// The car agent. Each car runs as its own tokio task: it decides on the next
// cell at cell boundaries, claims it through the occupancy grid, slides its
// render position one sub-step per tick and sleeps its current delay.

use crate::config::SimulationConfig;
use crate::shared_data::{CarBoard, FinishedRegistry};
use crate::simulation_engine::occupancy::{Claim, OccupancyState};
use crate::simulation_engine::simulation::{wait_or_shutdown, CityState};
use crate::simulation_engine::vehicles::{Car, CarPhase};
use log::debug;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Moving,
    Finished,
}

/// Timings that shape a car's life outside the movement loop.
#[derive(Debug, Clone, Copy)]
pub struct CarTiming {
    pub start_delay: Duration,
    pub fade_step: f32,
    pub fade_interval: Duration,
}

impl CarTiming {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            start_delay: config.start_delay(),
            fade_step: config.fade_step,
            fade_interval: config.fade_interval(),
        }
    }
}

pub struct CarAgent {
    car: Car,
    timing: CarTiming,
}

impl CarAgent {
    pub fn new(car: Car, timing: CarTiming) -> Self {
        Self { car, timing }
    }

    pub fn car(&self) -> &Car {
        &self.car
    }

    /// Runs one tick of the state machine and publishes the resulting view.
    pub fn step(&mut self, occupancy: &OccupancyState, board: &CarBoard) -> Step {
        let car = &mut self.car;
        match car.phase() {
            CarPhase::Finished => return Step::Finished,
            CarPhase::Positioning => {}
            CarPhase::Deciding => {
                let next_index = car.route_index.map_or(0, |index| index + 1);
                let Some(direction) = car.route.get(next_index) else {
                    return Step::Finished;
                };
                car.route_index = Some(next_index);
                car.pending = Some(car.cell.step(direction));

                if car.delay_ms != car.original_delay_ms {
                    let clear = car
                        .cell_ahead()
                        .map_or(true, |ahead| occupancy.owner(ahead).is_none());
                    if clear {
                        car.delay_ms = car.original_delay_ms;
                    }
                }
            }
        }

        if let Some(target) = car.pending {
            if let Claim::Granted { crossing } =
                occupancy.claim(car.id, car.cell, target, car.crossing)
            {
                car.cell = target;
                car.pending = None;
                car.crossing = crossing;
            }
        }

        // Never drive faster than a slower car one cell ahead.
        if let Some(ahead) = car.cell_ahead() {
            let slower = occupancy
                .owner(ahead)
                .filter(|&owner| owner != car.id)
                .and_then(|owner| board.delay_of(owner))
                .filter(|&delay| delay > car.delay_ms);
            if let Some(delay) = slower {
                debug!("Car {} slows down to {} ms behind {}", car.id, delay, ahead);
                car.delay_ms = delay;
            }
        }

        car.advance_render();
        board.publish(car.view());
        Step::Moving
    }

    /// Takes the car off the road and records it as finished.
    pub fn finish(
        &mut self,
        occupancy: &OccupancyState,
        board: &CarBoard,
        registry: &FinishedRegistry,
    ) {
        let car = &mut self.car;
        car.active = false;
        car.pending = None;
        board.publish(car.view());
        registry.register(car.finished_record());
        occupancy.release(car.id, car.cell);
        debug!("Car {} left the road at {}", car.id, car.cell);
    }

    /// Drives the car until it finishes its route or shutdown is signalled.
    pub async fn run(mut self, city: Arc<CityState>, mut shutdown: watch::Receiver<bool>) {
        debug!(
            "Car {} waiting at {} with route {}",
            self.car.id, self.car.start, self.car.route
        );
        if !wait_or_shutdown(self.timing.start_delay, &mut shutdown).await {
            return;
        }

        while self.step(&city.occupancy, &city.cars) == Step::Moving {
            if !wait_or_shutdown(self.car.delay(), &mut shutdown).await {
                return;
            }
        }
        self.finish(&city.occupancy, &city.cars, &city.finished);

        while self.car.fade(self.timing.fade_step) {
            city.cars.publish(self.car.view());
            if !wait_or_shutdown(self.timing.fade_interval, &mut shutdown).await {
                return;
            }
        }
        city.cars.publish(self.car.view());
    }
}
