// config.rs
//
// Simulation tunables. Defaults reproduce the reference city: 30 cars,
// 12 traffic lights, 28x28 grid.

use crate::error::{SimError, SimResult};
use crate::simulation_engine::route_generation::RouteBounds;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MAX_CARS: usize = 30;
pub const MAX_LIGHTS: usize = 12;

pub const DEFAULT_CARS: usize = MAX_CARS;
pub const DEFAULT_LIGHTS: usize = MAX_LIGHTS;

pub const ROUTE_MIN_LEN: usize = 25;
pub const ROUTE_MAX_LEN: usize = 50;
pub const ROUTE_MAX_ATTEMPTS: usize = 100;

// Per sub-step delay in milliseconds; larger is slower.
pub const CAR_DELAY_MIN_MS: u64 = 5;
pub const CAR_DELAY_MAX_MS: u64 = 30;

pub const LIGHT_PERIOD_MS: u64 = 3000;
pub const START_DELAY_MS: u64 = 4000;

// Render resolution of one cell.
pub const SUBSTEPS_PER_CELL: u32 = 22;

pub const FADE_STEP: f32 = 0.05;
pub const FADE_INTERVAL_MS: u64 = 100;

pub const OBSERVE_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Topology file; the built-in city is used when `None`.
    pub grid_path: Option<PathBuf>,
    pub cars: usize,
    pub lights: usize,
    pub route_min_len: usize,
    pub route_max_len: usize,
    pub route_max_attempts: usize,
    pub car_delay_min_ms: u64,
    pub car_delay_max_ms: u64,
    pub light_period_ms: u64,
    pub start_delay_ms: u64,
    pub substeps_per_cell: u32,
    pub fade_step: f32,
    pub fade_interval_ms: u64,
    pub observe_interval_ms: u64,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_path: None,
            cars: DEFAULT_CARS,
            lights: DEFAULT_LIGHTS,
            route_min_len: ROUTE_MIN_LEN,
            route_max_len: ROUTE_MAX_LEN,
            route_max_attempts: ROUTE_MAX_ATTEMPTS,
            car_delay_min_ms: CAR_DELAY_MIN_MS,
            car_delay_max_ms: CAR_DELAY_MAX_MS,
            light_period_ms: LIGHT_PERIOD_MS,
            start_delay_ms: START_DELAY_MS,
            substeps_per_cell: SUBSTEPS_PER_CELL,
            fade_step: FADE_STEP,
            fade_interval_ms: FADE_INTERVAL_MS,
            observe_interval_ms: OBSERVE_INTERVAL_MS,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(1..=MAX_CARS).contains(&self.cars) {
            return Err(SimError::InvalidArgument(format!(
                "Number of cars must be in range [1,{}], got {}",
                MAX_CARS, self.cars
            )));
        }
        if self.lights > MAX_LIGHTS {
            return Err(SimError::InvalidArgument(format!(
                "Number of traffic lights must be in range [0,{}], got {}",
                MAX_LIGHTS, self.lights
            )));
        }
        if self.route_min_len == 0 || self.route_min_len > self.route_max_len {
            return Err(SimError::InvalidArgument(format!(
                "Route length bounds [{}, {}] are empty",
                self.route_min_len, self.route_max_len
            )));
        }
        if self.car_delay_min_ms == 0 || self.car_delay_min_ms > self.car_delay_max_ms {
            return Err(SimError::InvalidArgument(format!(
                "Car delay range [{}, {}] ms is invalid",
                self.car_delay_min_ms, self.car_delay_max_ms
            )));
        }
        if self.light_period_ms == 0 || self.substeps_per_cell == 0 {
            return Err(SimError::InvalidArgument(
                "Light period and sub-steps per cell must be positive".to_string(),
            ));
        }
        if self.route_max_attempts == 0 {
            return Err(SimError::InvalidArgument(
                "At least one route attempt is required".to_string(),
            ));
        }
        if !(self.fade_step > 0.0 && self.fade_step <= 1.0) {
            return Err(SimError::InvalidArgument(format!(
                "Fade step must be in (0, 1], got {}",
                self.fade_step
            )));
        }
        Ok(())
    }

    pub fn route_bounds(&self) -> RouteBounds {
        RouteBounds {
            min_len: self.route_min_len,
            max_len: self.route_max_len,
        }
    }

    pub fn light_period(&self) -> Duration {
        Duration::from_millis(self.light_period_ms)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn fade_interval(&self) -> Duration {
        Duration::from_millis(self.fade_interval_ms)
    }

    pub fn observe_interval(&self) -> Duration {
        Duration::from_millis(self.observe_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cars, 30);
        assert_eq!(config.lights, 12);
    }

    #[test]
    fn car_and_light_counts_are_range_checked() {
        let mut config = SimulationConfig {
            cars: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(SimError::InvalidArgument(_))));
        config.cars = 31;
        assert!(matches!(config.validate(), Err(SimError::InvalidArgument(_))));
        config.cars = 1;
        config.lights = 13;
        assert!(matches!(config.validate(), Err(SimError::InvalidArgument(_))));
        config.lights = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{ "cars": 4, "seed": 9, "light_period_ms": 1000 }"#).unwrap();
        assert_eq!(config.cars, 4);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.light_period(), Duration::from_millis(1000));
        assert_eq!(config.lights, DEFAULT_LIGHTS);
        assert_eq!(config.substeps_per_cell, SUBSTEPS_PER_CELL);
    }

    #[test]
    fn reads_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");
        std::fs::write(&path, r#"{ "lights": 3 }"#).unwrap();
        let config = SimulationConfig::from_json_file(&path).unwrap();
        assert_eq!(config.lights, 3);
    }
}
