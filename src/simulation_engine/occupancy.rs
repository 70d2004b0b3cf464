use crate::simulation_engine::grid::{Cell, CityGrid};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Cars are numbered from 1.
pub type CarId = u32;

/// Light-phase marker of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Signal {
    /// Not governed by any active light group.
    Unsignalled,
    Open,
    Closed,
}

/// Outcome of [`OccupancyState::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The car now owns the target. `crossing` is its updated crossing flag.
    Granted { crossing: bool },
    /// The target is taken or closed; try again next tick.
    Blocked,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    owner: Option<CarId>,
    signal: Signal,
}

/// Shared per-cell state: which car owns a cell and its light phase.
///
/// Every mutation happens under one lock, so a claim is a single
/// check-and-set and two cars can never own the same cell.
#[derive(Debug)]
pub struct OccupancyState {
    width: usize,
    height: usize,
    slots: Mutex<Vec<Slot>>,
}

impl OccupancyState {
    pub fn new(grid: &CityGrid) -> Self {
        Self::with_size(grid.width(), grid.height())
    }

    pub fn with_size(width: usize, height: usize) -> Self {
        let free = Slot {
            owner: None,
            signal: Signal::Unsignalled,
        };
        Self {
            width,
            height,
            slots: Mutex::new(vec![free; width * height]),
        }
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        let x = usize::try_from(cell.x).ok()?;
        let y = usize::try_from(cell.y).ok()?;
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    fn slots(&self) -> MutexGuard<'_, Vec<Slot>> {
        // A panicking agent cannot leave a slot half-written.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Puts `car` on its start cell. Fails if the cell is owned or off-grid.
    pub fn place(&self, car: CarId, cell: Cell) -> bool {
        let Some(index) = self.index(cell) else {
            return false;
        };
        let mut slots = self.slots();
        match slots[index].owner {
            None => {
                slots[index].owner = Some(car);
                true
            }
            Some(owner) => owner == car,
        }
    }

    /// Atomically moves `car` from `from` into `to` if `to` is available.
    ///
    /// `to` is available when no other car owns it and its signal is not
    /// Closed, unless the car is already crossing an intersection.
    pub fn claim(&self, car: CarId, from: Cell, to: Cell, crossing: bool) -> Claim {
        let Some(target) = self.index(to) else {
            return Claim::Blocked;
        };
        let source = self.index(from);
        let mut slots = self.slots();

        let slot = slots[target];
        if slot.owner.is_some_and(|owner| owner != car) {
            return Claim::Blocked;
        }
        let crossing = match slot.signal {
            Signal::Open => true,
            Signal::Unsignalled => false,
            Signal::Closed if crossing => true,
            Signal::Closed => return Claim::Blocked,
        };

        if let Some(source) = source.filter(|&source| source != target) {
            if slots[source].owner == Some(car) {
                slots[source].owner = None;
            }
        }
        slots[target].owner = Some(car);
        Claim::Granted { crossing }
    }

    /// Frees `cell` if `car` owns it.
    pub fn release(&self, car: CarId, cell: Cell) {
        if let Some(index) = self.index(cell) {
            let mut slots = self.slots();
            if slots[index].owner == Some(car) {
                slots[index].owner = None;
            }
        }
    }

    pub fn owner(&self, cell: Cell) -> Option<CarId> {
        let index = self.index(cell)?;
        self.slots()[index].owner
    }

    pub fn signal(&self, cell: Cell) -> Signal {
        self.index(cell)
            .map(|index| self.slots()[index].signal)
            .unwrap_or(Signal::Unsignalled)
    }

    /// Reads the markers of `cells` in one critical section.
    pub fn signals(&self, cells: &[Cell]) -> Vec<Signal> {
        let slots = self.slots();
        cells
            .iter()
            .map(|&cell| {
                self.index(cell)
                    .map(|index| slots[index].signal)
                    .unwrap_or(Signal::Unsignalled)
            })
            .collect()
    }

    /// Writes a batch of light markers in one critical section.
    pub fn set_signals(&self, updates: &[(Cell, Signal)]) {
        let mut slots = self.slots();
        for &(cell, signal) in updates {
            if let Some(index) = self.index(cell) {
                slots[index].signal = signal;
            }
        }
    }

    /// Every owned cell with its owner, in row-major order.
    pub fn owned_cells(&self) -> Vec<(Cell, CarId)> {
        self.slots()
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let cell = Cell::new((index % self.width) as i32, (index / self.width) as i32);
                slot.owner.map(|owner| (cell, owner))
            })
            .collect()
    }
}
