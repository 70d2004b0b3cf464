use crate::error::TopologyError;
use crate::simulation_engine::grid::{Cell, CellKind, CityGrid};
use crate::simulation_engine::occupancy::Signal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Light cells of the built-in city, one entry per intersection.
///
/// Each listed cell is where one approach enters the intersection. Groups with
/// three cells sit on T-junctions; their fourth cell is never entered from
/// outside and stays passable.
pub const DEFAULT_LIGHT_LAYOUT: [&[(i32, i32)]; 12] = [
    // Top edge
    &[(10, 1), (9, 2), (10, 2)],
    &[(18, 1), (17, 2), (18, 2)],
    // Upper middle row
    &[(1, 9), (2, 9), (2, 10)],
    &[(9, 9), (10, 9), (9, 10), (10, 10)],
    &[(17, 9), (18, 9), (17, 10), (18, 10)],
    &[(25, 9), (25, 10), (26, 10)],
    // Lower middle row
    &[(1, 17), (2, 17), (2, 18)],
    &[(9, 17), (10, 17), (9, 18), (10, 18)],
    &[(17, 17), (18, 17), (17, 18), (18, 18)],
    &[(25, 17), (25, 18), (26, 18)],
    // Bottom edge
    &[(9, 25), (10, 25), (9, 26)],
    &[(17, 25), (18, 25), (17, 26)],
];

/// One intersection's set of light cells.
///
/// Exactly one cell is open at a time. `active` is written only by the
/// group's traffic light agent and may be read by anyone.
#[derive(Debug)]
pub struct TrafficLightGroup {
    id: usize,
    cells: Vec<Cell>,
    free_cell: Option<Cell>,
    period: Duration,
    active: AtomicUsize,
}

impl TrafficLightGroup {
    pub fn new(id: usize, cells: Vec<Cell>, period: Duration) -> Self {
        let free_cell = missing_corner(&cells);
        Self {
            id,
            cells,
            free_cell,
            period,
            active: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// The unlit fourth cell of a three-cell group.
    pub fn free_cell(&self) -> Option<Cell> {
        self.free_cell
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn active_cell(&self) -> Option<Cell> {
        self.cells.get(self.active_index()).copied()
    }

    /// Moves the open phase to the next cell, wrapping around.
    pub(crate) fn advance(&self) -> usize {
        let next = (self.active_index() + 1) % self.cells.len().max(1);
        self.active.store(next, Ordering::Release);
        next
    }

    /// Markers for the current phase: Open on the active cell, Closed on
    /// every other light cell. The free cell is left alone.
    pub fn phase_markers(&self) -> Vec<(Cell, Signal)> {
        let active = self.active_index();
        self.cells
            .iter()
            .enumerate()
            .map(|(index, &cell)| {
                let signal = if index == active {
                    Signal::Open
                } else {
                    Signal::Closed
                };
                (cell, signal)
            })
            .collect()
    }

    /// Every cell of the group, free cell included, must be an intersection.
    pub fn check_against(&self, grid: &CityGrid) -> Result<(), TopologyError> {
        for &cell in self.cells.iter().chain(self.free_cell.iter()) {
            if grid.kind_of(cell) != Some(CellKind::Intersection) {
                return Err(TopologyError::LightOutsideIntersection {
                    group: self.id,
                    cell,
                });
            }
        }
        Ok(())
    }
}

/// For an L-shaped group of three cells, the cell completing the 2x2 square:
/// its x and y are the coordinates that occur only once among the group.
fn missing_corner(cells: &[Cell]) -> Option<Cell> {
    if cells.len() != 3 {
        return None;
    }
    let mut xs: HashMap<i32, usize> = HashMap::new();
    let mut ys: HashMap<i32, usize> = HashMap::new();
    for cell in cells {
        *xs.entry(cell.x).or_default() += 1;
        *ys.entry(cell.y).or_default() += 1;
    }
    let once = |counts: &HashMap<i32, usize>| {
        let singles: Vec<i32> = counts
            .iter()
            .filter(|&(_, &count)| count == 1)
            .map(|(&coord, _)| coord)
            .collect();
        (counts.len() == 2 && singles.len() == 1).then(|| singles[0])
    };
    Some(Cell::new(once(&xs)?, once(&ys)?))
}

/// The first `count` groups of the built-in layout, numbered from 1.
pub fn default_light_groups(count: usize, period: Duration) -> Vec<TrafficLightGroup> {
    DEFAULT_LIGHT_LAYOUT
        .iter()
        .take(count)
        .enumerate()
        .map(|(index, cells)| {
            let cells = cells.iter().map(|&(x, y)| Cell::new(x, y)).collect();
            TrafficLightGroup::new(index + 1, cells, period)
        })
        .collect()
}
