//! Transport health risk and exposure pipeline.
//!
//! Once per simulated year the pipeline turns a road network and its traffic into link
//! casualty rates, walks every person's trips to accumulate injury risk, air pollution,
//! noise, greenness and physical activity, normalises those into weekly exposures, and
//! draws the year's new diseases and deaths. Everything runs on a [`Context`]; see
//! [`pipeline::ContextHealthExt`] for the yearly entry points.

pub mod accident;
pub mod context;
pub mod disease;
pub mod error;
pub mod exposure;
pub mod hashing;
pub mod log;
pub mod network;
pub mod normalize;
pub mod params;
pub mod person;
pub mod pipeline;
pub mod random;
pub mod week;

use serde::{Deserialize, Serialize};
use std::fmt;

// All modules import `crate::TypeId` in case we want to change the underlying type of `TypeId`.
pub(crate) use std::any::TypeId;

// Replace with `typeid::of as type_of` if necessary.
#[inline(always)]
pub fn type_of<T: 'static>() -> TypeId {
    TypeId::of::<T>()
}

// Used by `define_rng!`.
pub use rand;

pub use context::Context;
pub use error::{HealthError, HealthResult};
pub use params::{ContextParametersExt, Params};
pub use person::ContextPopulationExt;
pub use pipeline::ContextHealthExt;
pub use random::ContextRandomExt;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct PersonId(pub usize);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
