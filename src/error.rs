//! Error type shared by every stage of the pipeline.
//!
//! Configuration problems that only affect a single entity (a missing coefficient for one
//! segment, a missing transition entry for one person) are reported through these variants
//! but are caught, logged and counted by the caller. Taxonomy mismatches (`Unknown*`) and
//! worker failures are fatal to the step that raised them.

use thiserror::Error;

use crate::accident::{AccidentSeverity, AccidentType};
use crate::network::LinkId;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no coefficient '{covariate}' for {accident_type}/{severity}")]
    MissingCoefficient {
        accident_type: AccidentType,
        severity: AccidentSeverity,
        covariate: String,
    },

    #[error("no coefficient set for {accident_type}/{severity}")]
    MissingCoefficientSet {
        accident_type: AccidentType,
        severity: AccidentSeverity,
    },

    #[error("unknown mode '{0}'")]
    UnknownMode(String),

    #[error("unknown accident type '{0}'")]
    UnknownAccidentType(String),

    #[error("unknown accident severity '{0}'")]
    UnknownSeverity(String),

    #[error("unknown road type '{0}'")]
    UnknownRoadType(String),

    #[error("unknown disease '{0}'")]
    UnknownDisease(String),

    #[error("unknown gender '{0}'")]
    UnknownGender(String),

    #[error("unknown exposure category '{0}'")]
    UnknownExposureCategory(String),

    #[error("unknown pollutant '{0}'")]
    UnknownPollutant(String),

    #[error("unknown location kind '{0}'")]
    UnknownLocationKind(String),

    #[error("unknown day of week '{0}'")]
    UnknownDay(String),

    #[error("link {0} is not part of the network")]
    UnknownLink(LinkId),

    #[error("exposure partition {partition} failed: {source}")]
    WorkerFailed {
        partition: usize,
        #[source]
        source: Box<HealthError>,
    },

    #[error("logging setup failed: {0}")]
    Logging(String),
}

pub type HealthResult<T> = Result<T, HealthError>;
