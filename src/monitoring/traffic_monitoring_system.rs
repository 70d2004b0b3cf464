use crate::error::SimResult;
use crate::shared_data::{FinishedCar, FinishedRegistry};
use crate::simulation_engine::occupancy::CarId;
use crate::simulation_engine::simulation::CityState;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{stdin, BufRead};
use std::path::Path;
use std::sync::Arc;

/// One finished trip as a flat CSV row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRecord {
    pub car_id: CarId,
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
    pub moves: usize,
    pub route: String,
    pub delay_ms: u64,
}

impl From<&FinishedCar> for TripRecord {
    fn from(car: &FinishedCar) -> Self {
        Self {
            car_id: car.id,
            start_x: car.start.x,
            start_y: car.start.y,
            end_x: car.end.x,
            end_y: car.end.y,
            moves: car.route.len(),
            route: car.route.to_string(),
            delay_ms: car.original_delay_ms,
        }
    }
}

/// Writes every finished trip to `path`, replacing any previous file.
/// Returns the number of rows written.
pub fn write_trip_log(path: impl AsRef<Path>, registry: &FinishedRegistry) -> SimResult<usize> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(file);
    let trips = registry.all();
    for car in &trips {
        wtr.serialize(TripRecord::from(car))?;
    }
    wtr.flush()?;
    Ok(trips.len())
}

/// The log line for a car that just finished.
pub fn finished_line(car: &FinishedCar) -> String {
    format!("Car {} (Start: {} Finish: {})", car.id, car.start, car.end)
}

/// Answers one console query: a car id, looked up in the finished registry.
pub fn respond(registry: &FinishedRegistry, car_count: usize, line: &str) -> String {
    let id = match line.trim().parse::<CarId>() {
        Ok(id) if id >= 1 && (id as usize) <= car_count => id,
        _ => return "Please enter a valid ID".to_string(),
    };
    match registry.get(id) {
        Some(car) => format!("{} route {}", finished_line(&car), car.route),
        None => format!("Car {} has not finished its route", id),
    }
}

/// Reads car ids from stdin and prints the answer to each, until stdin closes.
/// Blocks the calling thread.
pub fn run_console(city: Arc<CityState>, car_count: usize) {
    println!("Enter a car ID to see its route");
    for line in stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        println!("{}", respond(&city.finished, car_count, &line));
    }
    debug!("Console input closed");
}
