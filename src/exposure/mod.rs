/*!

Person-level exposure from travel and time spent at locations.

Each year the casualty table is first turned into per-traveller link risks
([`LinkRiskTable::from_casualties`]). The [`scheduler`] then walks every person's trips on a
worker pool, and the [`ExposureAccumulator`] adds injury risk, inhaled doses, noise, greenness
and physical activity into the person's 168 hour-of-week buckets.

*/

pub(crate) mod accumulator;
mod dose;
mod environment;
mod link_risk;
pub mod scheduler;
mod trip;

pub use accumulator::{ExposureAccumulator, PersonExposure};
pub use dose::{marginal_met, DoseModel, VentilationRates};
pub use environment::{
    ActivityLocation, ActivityLocationTable, EnvironmentProfile, LinkExposureTable, LocationKey,
    LocationKind, Pollutant,
};
pub use link_risk::{LinkRiskTable, ZeroDemandCounts};
pub use scheduler::{ExposureReport, ExposureRun};
pub use trip::{
    PathLeg, PrecomputedPaths, RouterFactory, Trip, TripExposure, TripId, TripPath, TripRouter,
};
