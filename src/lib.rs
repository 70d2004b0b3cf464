pub mod config;
pub mod control_system;
pub mod error;
pub mod monitoring;
pub mod shared_data;
pub mod simulation_engine;

pub use config::SimulationConfig;
pub use error::{SimError, SimResult};
pub use shared_data::{CitySnapshot, FinishedCar};
pub use simulation_engine::simulation::Simulation;
