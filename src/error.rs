// error.rs
//
// Error types for topology loading, route generation and simulation setup.

use thiserror::Error;

use crate::simulation_engine::grid::Cell;

/// Problems found while parsing a topology description.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("topology is empty")]
    Empty,

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unrecognised token {token:?} at row {row}, column {col}")]
    UnknownToken {
        row: usize,
        col: usize,
        token: String,
    },

    #[error("light group {group} uses cell {cell} which is not an intersection")]
    LightOutsideIntersection { group: usize, cell: Cell },
}

/// Failures of a single route generation attempt.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("no valid continuation at intersection {at} (arrived heading {arrival})")]
    NoValidContinuation { at: Cell, arrival: char },

    #[error("route walked off the street network at {at}")]
    WalkedOffGrid { at: Cell },

    #[error("no unused street cell left to start a route")]
    NoFreeStart,

    #[error("gave up after {attempts} attempts")]
    Exhausted { attempts: usize },
}

/// Top-level error for the simulation crate.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("malformed topology: {0}")]
    MalformedTopology(#[from] TopologyError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("route generation failed: {0}")]
    RouteGeneration(#[from] RouteError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type SimResult<T> = Result<T, SimError>;
