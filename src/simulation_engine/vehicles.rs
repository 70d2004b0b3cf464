use crate::shared_data::{CarView, FinishedCar};
use crate::simulation_engine::grid::{Cell, Direction};
use crate::simulation_engine::occupancy::CarId;
use crate::simulation_engine::route_generation::{GeneratedRoute, Route};
use std::time::Duration;

/// Where a car is in its movement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarPhase {
    /// Render position is catching up with the owned cell.
    Positioning,
    /// At a cell boundary, about to consult the next route step.
    Deciding,
    Finished,
}

/// A car travelling through the city.
///
/// Owned exclusively by its agent; other units only ever see the id in the
/// occupancy grid and the published [`CarView`].
#[derive(Debug, Clone)]
pub struct Car {
    pub id: CarId,
    pub route: Route,
    pub start: Cell,
    pub end: Cell,
    /// Cell the car currently owns in the occupancy grid.
    pub cell: Cell,
    /// Next cell, chosen but not yet claimed.
    pub pending: Option<Cell>,
    /// Render position in sub-cell units.
    pub render: (i32, i32),
    /// `None` until the first move is taken.
    pub route_index: Option<usize>,
    pub delay_ms: u64,
    pub original_delay_ms: u64,
    pub active: bool,
    pub crossing: bool,
    pub opacity: f32,
    substeps: i32,
}

impl Car {
    pub fn new(id: CarId, generated: GeneratedRoute, delay_ms: u64, substeps_per_cell: u32) -> Self {
        let substeps = substeps_per_cell.max(1) as i32;
        let start = generated.start;
        Self {
            id,
            route: generated.route,
            start,
            end: generated.end,
            cell: start,
            pending: None,
            render: (start.x * substeps, start.y * substeps),
            route_index: None,
            delay_ms,
            original_delay_ms: delay_ms,
            active: true,
            crossing: false,
            opacity: 1.0,
            substeps,
        }
    }

    /// A car with a hand-written route; `end` is where the moves lead.
    pub fn with_route(
        id: CarId,
        start: Cell,
        route: Route,
        delay_ms: u64,
        substeps_per_cell: u32,
    ) -> Self {
        let end = route.end_from(start);
        Self::new(id, GeneratedRoute { route, start, end }, delay_ms, substeps_per_cell)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    fn cell_origin(&self, cell: Cell) -> (i32, i32) {
        (cell.x * self.substeps, cell.y * self.substeps)
    }

    pub fn render_caught_up(&self) -> bool {
        self.render == self.cell_origin(self.cell)
    }

    /// Moves the render position one sub-step toward the owned cell.
    pub fn advance_render(&mut self) {
        let (tx, ty) = self.cell_origin(self.cell);
        self.render.0 += (tx - self.render.0).signum();
        self.render.1 += (ty - self.render.1).signum();
    }

    pub fn phase(&self) -> CarPhase {
        if !self.active {
            CarPhase::Finished
        } else if self.pending.is_none() && self.render_caught_up() {
            CarPhase::Deciding
        } else {
            CarPhase::Positioning
        }
    }

    /// Direction of the current move, or of the first one before departure.
    pub fn heading(&self) -> Direction {
        let index = self.route_index.unwrap_or(0);
        self.route
            .get(index)
            .or_else(|| self.route.moves().last().copied())
            .unwrap_or(Direction::Down)
    }

    /// The cell after the one the car is heading into, if the route goes on.
    pub fn cell_ahead(&self) -> Option<Cell> {
        let next = self.route.get(self.route_index? + 1)?;
        Some(self.pending.unwrap_or(self.cell).step(next))
    }

    /// Lowers opacity by `step`. Returns `false` once fully faded.
    pub fn fade(&mut self, step: f32) -> bool {
        self.opacity = (self.opacity - step).max(0.0);
        self.opacity > 0.0
    }

    pub fn view(&self) -> CarView {
        CarView {
            id: self.id,
            cell: self.cell,
            render_x: self.render.0,
            render_y: self.render.1,
            heading: self.heading(),
            delay_ms: self.delay_ms,
            active: self.active,
            crossing: self.crossing,
            opacity: self.opacity,
        }
    }

    pub fn finished_record(&self) -> FinishedCar {
        FinishedCar {
            id: self.id,
            route: self.route.clone(),
            start: self.start,
            end: self.end,
            original_delay_ms: self.original_delay_ms,
        }
    }
}
