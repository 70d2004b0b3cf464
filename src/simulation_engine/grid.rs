use crate::error::{SimResult, TopologyError};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// The built-in 28x28 city used when no topology file is given.
const DEFAULT_CITY: &str = include_str!("../../assets/grid.txt");

/// A grid coordinate. `x` grows to the right, `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell one step in `direction`.
    pub fn step(self, direction: Direction) -> Cell {
        let (dx, dy) = direction.delta();
        Cell::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// One of the four moves a car can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    #[serde(rename = "U")]
    Up,
    #[serde(rename = "D")]
    Down,
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "U" => Some(Direction::Up),
            "D" => Some(Direction::Down),
            "L" => Some(Direction::Left),
            "R" => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn token(self) -> char {
        match self {
            Direction::Up => 'U',
            Direction::Down => 'D',
            Direction::Left => 'L',
            Direction::Right => 'R',
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Heading after a right turn (clockwise on screen).
    pub fn turn_right(self) -> Self {
        match self {
            Direction::Up => Direction::Right,
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
        }
    }

    pub fn turn_left(self) -> Self {
        self.turn_right().opposite()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// What occupies a grid cell. Loaded once and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Building,
    /// One-directional street segment.
    Street(Direction),
    Intersection,
}

impl CellKind {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "B" => Some(CellKind::Building),
            "S" => Some(CellKind::Intersection),
            other => Direction::from_token(other).map(CellKind::Street),
        }
    }

    pub fn is_passable(self) -> bool {
        self != CellKind::Building
    }
}

/// Immutable city topology.
#[derive(Debug, Clone)]
pub struct CityGrid {
    width: usize,
    height: usize,
    cells: Vec<CellKind>,
}

impl CityGrid {
    /// Parses a topology description: one row per line, cells separated by
    /// commas. Whitespace around tokens and blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self, TopologyError> {
        let mut width = None;
        let mut cells = Vec::new();
        let mut height = 0;

        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            let tokens: Vec<&str> = line.split(',').map(str::trim).collect();
            let expected = *width.get_or_insert(tokens.len());
            if tokens.len() != expected {
                return Err(TopologyError::RaggedRow {
                    row: height,
                    expected,
                    found: tokens.len(),
                });
            }
            for (col, token) in tokens.iter().enumerate() {
                let kind = CellKind::from_token(token).ok_or_else(|| TopologyError::UnknownToken {
                    row: height,
                    col,
                    token: token.to_string(),
                })?;
                cells.push(kind);
            }
            height += 1;
        }

        match width {
            Some(width) if width > 0 => Ok(Self {
                width,
                height,
                cells,
            }),
            _ => Err(TopologyError::Empty),
        }
    }

    /// Reads and parses a topology file.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text)?)
    }

    /// The built-in 28x28 city.
    pub fn default_city() -> Result<Self, TopologyError> {
        Self::parse(DEFAULT_CITY)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.index_of(cell).is_some()
    }

    /// Row-major index of `cell`, or `None` when it lies outside the grid.
    pub fn index_of(&self, cell: Cell) -> Option<usize> {
        let x = usize::try_from(cell.x).ok()?;
        let y = usize::try_from(cell.y).ok()?;
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    pub fn kind_of(&self, cell: Cell) -> Option<CellKind> {
        self.index_of(cell).map(|index| self.cells[index])
    }

    /// All one-directional street cells, in row-major order.
    pub fn street_cells(&self) -> Vec<Cell> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, kind)| matches!(kind, CellKind::Street(_)))
            .map(|(index, _)| self.cell_at(index))
            .collect()
    }

    fn cell_at(&self, index: usize) -> Cell {
        Cell::new((index % self.width) as i32, (index / self.width) as i32)
    }
}
