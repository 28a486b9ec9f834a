/*!

The road network as supplied by the transport simulation each year: links with their
physical attributes, and the hourly traffic volume on each link per mode.

*/

mod demand;

pub use demand::{HourlyFlows, TrafficDemand};

use crate::error::HealthError;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "walk")]
    Walk,
    #[serde(rename = "bike")]
    Bike,
    #[serde(rename = "car")]
    Car,
    #[serde(rename = "pt")]
    PublicTransport,
}

impl Mode {
    pub const COUNT: usize = 4;
    pub const ALL: [Mode; Mode::COUNT] = [Mode::Walk, Mode::Bike, Mode::Car, Mode::PublicTransport];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Mode::Walk => "walk",
            Mode::Bike => "bike",
            Mode::Car => "car",
            Mode::PublicTransport => "pt",
        }
    }

    /// Whether the traveller is exposed on the street rather than inside a vehicle.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Mode::Walk | Mode::Bike)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walk" | "ped" | "pedestrian" => Ok(Mode::Walk),
            "bike" | "bicycle" | "cycle" => Ok(Mode::Bike),
            "car" | "auto" | "autodriver" | "autopassenger" => Ok(Mode::Car),
            "pt" | "bus" | "train" | "tram" | "transit" => Ok(Mode::PublicTransport),
            _ => Err(HealthError::UnknownMode(s.to_string())),
        }
    }
}

/// A small set of modes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct ModeSet(u8);

impl ModeSet {
    #[must_use]
    pub fn empty() -> Self {
        ModeSet(0)
    }

    #[must_use]
    pub fn all() -> Self {
        Mode::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, mode: Mode) {
        self.0 |= 1 << mode.index();
    }

    #[must_use]
    pub fn contains(self, mode: Mode) -> bool {
        self.0 & (1 << mode.index()) != 0
    }

    #[must_use]
    pub fn union(self, other: ModeSet) -> ModeSet {
        ModeSet(self.0 | other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = Mode> {
        Mode::ALL.into_iter().filter(move |mode| self.contains(*mode))
    }
}

impl FromIterator<Mode> for ModeSet {
    fn from_iter<I: IntoIterator<Item = Mode>>(iter: I) -> Self {
        let mut set = ModeSet::empty();
        for mode in iter {
            set.insert(mode);
        }
        set
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadType {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Residential,
    Service,
    Cycleway,
    Footway,
    Other,
}

impl RoadType {
    pub const ALL: [RoadType; 10] = [
        RoadType::Motorway,
        RoadType::Trunk,
        RoadType::Primary,
        RoadType::Secondary,
        RoadType::Tertiary,
        RoadType::Residential,
        RoadType::Service,
        RoadType::Cycleway,
        RoadType::Footway,
        RoadType::Other,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            RoadType::Motorway => "motorway",
            RoadType::Trunk => "trunk",
            RoadType::Primary => "primary",
            RoadType::Secondary => "secondary",
            RoadType::Tertiary => "tertiary",
            RoadType::Residential => "residential",
            RoadType::Service => "service",
            RoadType::Cycleway => "cycleway",
            RoadType::Footway => "footway",
            RoadType::Other => "other",
        }
    }

    /// Arterial roads; cycling collisions on these use the major-road model.
    #[must_use]
    pub fn is_major(self) -> bool {
        matches!(
            self,
            RoadType::Motorway | RoadType::Trunk | RoadType::Primary | RoadType::Secondary
        )
    }
}

impl fmt::Display for RoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RoadType {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        // OSM `*_link` slip roads share the class of the road they join.
        let base = lower.strip_suffix("_link").unwrap_or(&lower);
        RoadType::ALL
            .into_iter()
            .find(|road_type| road_type.name() == base)
            .ok_or_else(|| HealthError::UnknownRoadType(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkLink {
    pub id: LinkId,
    /// The real-world road this link is part of, if known.
    pub osm_id: Option<u64>,
    /// Metres.
    pub length: f64,
    pub allowed_modes: ModeSet,
    pub road_type: RoadType,
    /// km/h
    pub speed_limit: f64,
    pub junction_stress: f64,
    pub link_stress: f64,
    /// Carriageway width in metres.
    pub width: f64,
    /// The road carries traffic in both directions (each direction usually being its own
    /// directed link).
    pub two_way: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Network {
    links: FxHashMap<LinkId, NetworkLink>,
}

impl Network {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_link(&mut self, link: NetworkLink) -> Option<NetworkLink> {
        self.links.insert(link.id, link)
    }

    #[must_use]
    pub fn link(&self, id: LinkId) -> Option<&NetworkLink> {
        self.links.get(&id)
    }

    pub fn links(&self) -> impl Iterator<Item = &NetworkLink> {
        self.links.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl FromIterator<NetworkLink> for Network {
    fn from_iter<I: IntoIterator<Item = NetworkLink>>(iter: I) -> Self {
        let mut network = Network::new();
        for link in iter {
            network.add_link(link);
        }
        network
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn link(id: u64, osm_id: Option<u64>, length: f64) -> NetworkLink {
        NetworkLink {
            id: LinkId(id),
            osm_id,
            length,
            allowed_modes: ModeSet::all(),
            road_type: RoadType::Residential,
            speed_limit: 50.0,
            junction_stress: 0.0,
            link_stress: 0.0,
            width: 6.0,
            two_way: false,
        }
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(mode.name().parse::<Mode>().unwrap(), mode);
        }
        assert!(matches!("hovercraft".parse::<Mode>(), Err(HealthError::UnknownMode(_))));
    }

    #[test]
    fn mode_set_membership() {
        let set: ModeSet = [Mode::Walk, Mode::Car].into_iter().collect();
        assert!(set.contains(Mode::Walk));
        assert!(!set.contains(Mode::Bike));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Mode::Walk, Mode::Car]);
        assert!(set.union(ModeSet::all()).contains(Mode::PublicTransport));
    }

    #[test]
    fn road_type_parsing() {
        assert_eq!("primary_link".parse::<RoadType>().unwrap(), RoadType::Primary);
        assert!(RoadType::Primary.is_major());
        assert!(!RoadType::Residential.is_major());
        assert!("lane".parse::<RoadType>().is_err());
    }

    #[test]
    fn network_lookup() {
        let network: Network = [link(1, Some(10), 100.0), link(2, None, 50.0)]
            .into_iter()
            .collect();
        assert_eq!(network.len(), 2);
        assert_eq!(network.link(LinkId(2)).map(|l| l.length), Some(50.0));
        assert!(network.link(LinkId(3)).is_none());
    }
}
