use crate::accident::AccidentSeverity;
use crate::exposure::{LocationKey, Pollutant};
use crate::network::{LinkId, Mode};
use crate::week::DayOfWeek;
use crate::PersonId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct TripId(pub u64);

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub person: PersonId,
    pub mode: Mode,
    pub day: DayOfWeek,
    /// Seconds after midnight of `day`.
    pub departure_seconds: f64,
    pub origin: LocationKey,
    pub destination: LocationKey,
    /// The trip starts or ends at home; only these trips carry a destination activity.
    pub home_based: bool,
    pub activity_duration_seconds: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathLeg {
    pub link: LinkId,
    pub travel_seconds: f64,
}

/// A route through the network, in traversal order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripPath {
    pub legs: Vec<PathLeg>,
}

impl TripPath {
    #[must_use]
    pub fn new(legs: Vec<PathLeg>) -> Self {
        TripPath { legs }
    }

    #[must_use]
    pub fn travel_seconds(&self) -> f64 {
        self.legs.iter().map(|leg| leg.travel_seconds).sum()
    }
}

/// Finds the route of a trip. Implementations may keep mutable search state and are not
/// shared between workers.
pub trait TripRouter {
    /// `None` when no route exists.
    fn route(&mut self, trip: &Trip) -> Option<TripPath>;
}

/// Creates one router per worker.
pub trait RouterFactory: Sync {
    fn create_router(&self) -> Box<dyn TripRouter + '_>;
}

/// Paths computed ahead of time by the transport simulation.
#[derive(Clone, Debug, Default)]
pub struct PrecomputedPaths {
    paths: FxHashMap<TripId, TripPath>,
}

impl PrecomputedPaths {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, trip: TripId, path: TripPath) {
        self.paths.insert(trip, path);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

struct PrecomputedRouter<'a> {
    paths: &'a FxHashMap<TripId, TripPath>,
}

impl TripRouter for PrecomputedRouter<'_> {
    fn route(&mut self, trip: &Trip) -> Option<TripPath> {
        self.paths.get(&trip.id).filter(|path| !path.legs.is_empty()).cloned()
    }
}

impl RouterFactory for PrecomputedPaths {
    fn create_router(&self) -> Box<dyn TripRouter + '_> {
        Box::new(PrecomputedRouter { paths: &self.paths })
    }
}

/// What one trip exposed its traveller to.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TripExposure {
    pub trip: TripId,
    pub person: PersonId,
    pub mode: Mode,
    /// Metres.
    pub distance: f64,
    pub travel_seconds: f64,
    pub marginal_met_hours: f64,
    /// Per pollutant, indexed by [`Pollutant::index`].
    pub inhaled: [f64; Pollutant::COUNT],
    pub noise_energy: f64,
    pub ndvi_hours: f64,
    /// Per severity, indexed by [`AccidentSeverity::index`].
    pub injury_risk: [f64; AccidentSeverity::COUNT],
}

impl TripExposure {
    #[must_use]
    pub fn new(trip: &Trip) -> Self {
        TripExposure {
            trip: trip.id,
            person: trip.person,
            mode: trip.mode,
            distance: 0.0,
            travel_seconds: 0.0,
            marginal_met_hours: 0.0,
            inhaled: [0.0; Pollutant::COUNT],
            noise_energy: 0.0,
            ndvi_hours: 0.0,
            injury_risk: [0.0; AccidentSeverity::COUNT],
        }
    }

    #[must_use]
    pub fn inhaled(&self, pollutant: Pollutant) -> f64 {
        self.inhaled[pollutant.index()]
    }

    #[must_use]
    pub fn injury_risk(&self, severity: AccidentSeverity) -> f64 {
        self.injury_risk[severity.index()]
    }
}
