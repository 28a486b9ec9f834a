/*!

Casualty rates per link, hour, accident type and severity.

The regression model ([`CasualtyRateModel`]) is evaluated once per OSM segment
([`segment::build_casualty_table`]) and the result is spread back over the member links into
a year-tagged [`LinkCasualtyTable`].

Every accident type belongs to exactly one victim mode and applies to a link only when the
link's covariates say such a collision can happen there (e.g. the major-road cycling model
only on arterial roads).

*/

mod coefficients;
pub(crate) mod model;
pub mod segment;
mod table;

pub use coefficients::{CoefficientSet, CoefficientTable};
pub use model::{CasualtyRateModel, RoadCovariates, TemporalExpansion, FLOW_OFFSET};
pub use segment::{AggregationReport, OsmSegment, SegmentKey};
pub use table::{CasualtyRateRow, LinkCasualtyTable};

use crate::error::HealthError;
use crate::network::Mode;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum AccidentType {
    #[serde(rename = "ped")]
    Pedestrian,
    #[serde(rename = "bike_minor")]
    BikeMinorRoad,
    #[serde(rename = "bike_major")]
    BikeMajorRoad,
    #[serde(rename = "car_oneway")]
    CarOneWay,
    #[serde(rename = "car_twoway")]
    CarTwoWay,
}

impl AccidentType {
    pub const ALL: [AccidentType; 5] = [
        AccidentType::Pedestrian,
        AccidentType::BikeMinorRoad,
        AccidentType::BikeMajorRoad,
        AccidentType::CarOneWay,
        AccidentType::CarTwoWay,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AccidentType::Pedestrian => "ped",
            AccidentType::BikeMinorRoad => "bike_minor",
            AccidentType::BikeMajorRoad => "bike_major",
            AccidentType::CarOneWay => "car_oneway",
            AccidentType::CarTwoWay => "car_twoway",
        }
    }

    /// The mode of the casualty; its traffic volume normalises the casualty rate.
    #[must_use]
    pub fn victim_mode(self) -> Mode {
        match self {
            AccidentType::Pedestrian => Mode::Walk,
            AccidentType::BikeMinorRoad | AccidentType::BikeMajorRoad => Mode::Bike,
            AccidentType::CarOneWay | AccidentType::CarTwoWay => Mode::Car,
        }
    }

    /// Accident types whose casualties travel by `mode`.
    #[must_use]
    pub fn for_mode(mode: Mode) -> &'static [AccidentType] {
        match mode {
            Mode::Walk => &[AccidentType::Pedestrian],
            Mode::Bike => &[AccidentType::BikeMinorRoad, AccidentType::BikeMajorRoad],
            Mode::Car => &[AccidentType::CarOneWay, AccidentType::CarTwoWay],
            Mode::PublicTransport => &[],
        }
    }

    /// Whether this kind of collision can occur on a road with these covariates.
    #[must_use]
    pub fn applies_to(self, road: &RoadCovariates) -> bool {
        if !road.allowed_modes.contains(self.victim_mode()) {
            return false;
        }
        match self {
            AccidentType::Pedestrian => true,
            AccidentType::BikeMinorRoad => !road.road_type.is_major(),
            AccidentType::BikeMajorRoad => road.road_type.is_major(),
            AccidentType::CarOneWay => !road.two_way,
            AccidentType::CarTwoWay => road.two_way,
        }
    }
}

impl fmt::Display for AccidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AccidentType {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        AccidentType::ALL
            .into_iter()
            .find(|accident_type| accident_type.name() == lower)
            .ok_or_else(|| HealthError::UnknownAccidentType(s.to_string()))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum AccidentSeverity {
    #[serde(rename = "light")]
    Light,
    #[serde(rename = "severe_fatal")]
    SevereFatal,
}

impl AccidentSeverity {
    pub const COUNT: usize = 2;
    pub const ALL: [AccidentSeverity; AccidentSeverity::COUNT] =
        [AccidentSeverity::Light, AccidentSeverity::SevereFatal];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AccidentSeverity::Light => "light",
            AccidentSeverity::SevereFatal => "severe_fatal",
        }
    }
}

impl fmt::Display for AccidentSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AccidentSeverity {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" | "slight" => Ok(AccidentSeverity::Light),
            "severe_fatal" | "severefatal" | "severe" | "fatal" => {
                Ok(AccidentSeverity::SevereFatal)
            }
            _ => Err(HealthError::UnknownSeverity(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ModeSet, RoadType};

    fn road(road_type: RoadType, two_way: bool, modes: &[Mode]) -> RoadCovariates {
        RoadCovariates {
            length: 100.0,
            road_type,
            speed_limit: 50.0,
            link_stress: 0.0,
            junction_stress: 0.0,
            width: 6.0,
            two_way,
            allowed_modes: modes.iter().copied().collect::<ModeSet>(),
        }
    }

    #[test]
    fn every_mode_maps_to_types_with_that_victim_mode() {
        for mode in Mode::ALL {
            for accident_type in AccidentType::for_mode(mode) {
                assert_eq!(accident_type.victim_mode(), mode);
            }
        }
        for accident_type in AccidentType::ALL {
            assert!(AccidentType::for_mode(accident_type.victim_mode()).contains(&accident_type));
        }
    }

    #[test]
    fn applicability_follows_road_class_and_direction() {
        let arterial = road(RoadType::Primary, true, &[Mode::Walk, Mode::Bike, Mode::Car]);
        assert!(AccidentType::BikeMajorRoad.applies_to(&arterial));
        assert!(!AccidentType::BikeMinorRoad.applies_to(&arterial));
        assert!(AccidentType::CarTwoWay.applies_to(&arterial));
        assert!(!AccidentType::CarOneWay.applies_to(&arterial));

        let motorway = road(RoadType::Motorway, false, &[Mode::Car]);
        assert!(!AccidentType::Pedestrian.applies_to(&motorway));
        assert!(AccidentType::CarOneWay.applies_to(&motorway));
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            "tram_derailment".parse::<AccidentType>(),
            Err(HealthError::UnknownAccidentType(_))
        ));
        assert!(matches!("mild".parse::<AccidentSeverity>(), Err(HealthError::UnknownSeverity(_))));
        assert_eq!("bike_major".parse::<AccidentType>().unwrap(), AccidentType::BikeMajorRoad);
        assert_eq!(
            "severefatal".parse::<AccidentSeverity>().unwrap(),
            AccidentSeverity::SevereFatal
        );
    }
}
