use crate::simulation_engine::intersections::TrafficLightGroup;
use crate::simulation_engine::occupancy::{OccupancyState, Signal};
use crate::simulation_engine::simulation::{wait_or_shutdown, CityState};
use log::debug;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

/// Drives one light group: opens one cell at a time and rotates every period.
pub struct TrafficLightAgent {
    group: Arc<TrafficLightGroup>,
}

impl TrafficLightAgent {
    pub fn new(group: Arc<TrafficLightGroup>) -> Self {
        Self { group }
    }

    pub fn group(&self) -> &TrafficLightGroup {
        &self.group
    }

    /// Writes the current phase into the occupancy grid.
    pub fn apply(&self, occupancy: &OccupancyState) {
        occupancy.set_signals(&self.group.phase_markers());
    }

    /// Marks the group's free cell open. Done once, before any car moves.
    pub fn open_free_cell(&self, occupancy: &OccupancyState) {
        if let Some(cell) = self.group.free_cell() {
            occupancy.set_signals(&[(cell, Signal::Open)]);
        }
    }

    /// Moves to the next phase and publishes it.
    pub fn switch(&self, occupancy: &OccupancyState) {
        let active = self.group.advance();
        self.apply(occupancy);
        debug!(
            "Light group {} switched to {:?}",
            self.group.id(),
            self.group.cells().get(active)
        );
    }

    // Runs until shutdown, switching once per period.
    pub async fn run(
        self,
        city: Arc<CityState>,
        start_delay: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        if !wait_or_shutdown(start_delay, &mut shutdown).await {
            return;
        }
        self.apply(&city.occupancy);
        while wait_or_shutdown(self.group.period(), &mut shutdown).await {
            self.switch(&city.occupancy);
        }
    }
}
