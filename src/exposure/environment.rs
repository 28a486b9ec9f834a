use crate::error::HealthError;
use crate::network::LinkId;
use crate::week::HOURS_PER_DAY;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    Pm25,
    No2,
}

impl Pollutant {
    pub const COUNT: usize = 2;
    pub const ALL: [Pollutant; Pollutant::COUNT] = [Pollutant::Pm25, Pollutant::No2];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::No2 => "no2",
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pollutant {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pm25" | "pm2.5" | "pm2_5" => Ok(Pollutant::Pm25),
            "no2" => Ok(Pollutant::No2),
            _ => Err(HealthError::UnknownPollutant(s.to_string())),
        }
    }
}

/// Hourly environmental conditions at a link or a location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    /// µg/m³ per pollutant and hour of day.
    pub concentrations: [[f64; HOURS_PER_DAY]; Pollutant::COUNT],
    /// Equivalent sound level in dB per hour of day.
    pub noise_db: [f64; HOURS_PER_DAY],
    pub ndvi: f64,
}

impl Default for EnvironmentProfile {
    fn default() -> Self {
        EnvironmentProfile {
            concentrations: [[0.0; HOURS_PER_DAY]; Pollutant::COUNT],
            noise_db: [0.0; HOURS_PER_DAY],
            ndvi: 0.0,
        }
    }
}

impl EnvironmentProfile {
    /// The same conditions at every hour.
    #[must_use]
    pub fn constant(pm25: f64, no2: f64, noise_db: f64, ndvi: f64) -> Self {
        let mut profile = EnvironmentProfile {
            noise_db: [noise_db; HOURS_PER_DAY],
            ndvi,
            ..EnvironmentProfile::default()
        };
        profile.set_concentrations(Pollutant::Pm25, [pm25; HOURS_PER_DAY]);
        profile.set_concentrations(Pollutant::No2, [no2; HOURS_PER_DAY]);
        profile
    }

    pub fn set_concentrations(&mut self, pollutant: Pollutant, hourly: [f64; HOURS_PER_DAY]) {
        self.concentrations[pollutant.index()] = hourly;
    }

    #[must_use]
    pub fn concentration(&self, pollutant: Pollutant, hour_of_day: usize) -> f64 {
        self.concentrations[pollutant.index()]
            .get(hour_of_day % HOURS_PER_DAY)
            .copied()
            .unwrap_or(0.0)
    }

    #[must_use]
    pub fn noise(&self, hour_of_day: usize) -> f64 {
        self.noise_db.get(hour_of_day % HOURS_PER_DAY).copied().unwrap_or(0.0)
    }

    /// Sound energy of one hour at the hour's level, `10^(L/10)`. Silence (0 dB or less)
    /// contributes nothing.
    #[must_use]
    pub fn noise_energy(&self, hour_of_day: usize) -> f64 {
        let level = self.noise(hour_of_day);
        if level > 0.0 { 10f64.powf(level / 10.0) } else { 0.0 }
    }
}

/// Environmental conditions along each link for one year.
#[derive(Clone, Debug, Default)]
pub struct LinkExposureTable {
    links: FxHashMap<LinkId, EnvironmentProfile>,
}

impl LinkExposureTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, link: LinkId, profile: EnvironmentProfile) {
        self.links.insert(link, profile);
    }

    #[must_use]
    pub fn get(&self, link: LinkId) -> Option<&EnvironmentProfile> {
        self.links.get(&link)
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

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Dwelling,
    Job,
    School,
    Poi,
    Zone,
}

impl FromStr for LocationKind {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dwelling" | "home" => Ok(LocationKind::Dwelling),
            "job" | "work" => Ok(LocationKind::Job),
            "school" => Ok(LocationKind::School),
            "poi" => Ok(LocationKind::Poi),
            "zone" => Ok(LocationKind::Zone),
            _ => Err(HealthError::UnknownLocationKind(s.to_string())),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct LocationKey {
    pub kind: LocationKind,
    pub id: u64,
}

impl LocationKey {
    #[must_use]
    pub fn new(kind: LocationKind, id: u64) -> Self {
        LocationKey { kind, id }
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.kind, self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityLocation {
    pub key: LocationKey,
    pub coordinate: (f64, f64),
    pub profile: EnvironmentProfile,
}

/// Environmental conditions at the places where people spend their time.
#[derive(Clone, Debug, Default)]
pub struct ActivityLocationTable {
    locations: FxHashMap<LocationKey, ActivityLocation>,
}

impl ActivityLocationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: ActivityLocation) {
        self.locations.insert(location.key, location);
    }

    #[must_use]
    pub fn get(&self, key: LocationKey) -> Option<&ActivityLocation> {
        self.locations.get(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_energy_is_linear_intensity() {
        let profile = EnvironmentProfile::constant(0.0, 0.0, 60.0, 0.0);
        assert!((profile.noise_energy(5) - 1e6).abs() < 1e-6);
        assert_eq!(EnvironmentProfile::default().noise_energy(5), 0.0);
    }

    #[test]
    fn lookups_by_hour_wrap_the_day() {
        let mut profile = EnvironmentProfile::default();
        let mut hourly = [0.0; HOURS_PER_DAY];
        hourly[2] = 12.0;
        profile.set_concentrations(Pollutant::No2, hourly);
        assert_eq!(profile.concentration(Pollutant::No2, 2), 12.0);
        assert_eq!(profile.concentration(Pollutant::No2, 26), 12.0);
        assert_eq!(profile.concentration(Pollutant::Pm25, 2), 0.0);
    }

    #[test]
    fn names_parse() {
        assert_eq!("PM2.5".parse::<Pollutant>().unwrap(), Pollutant::Pm25);
        assert!(matches!("ozone".parse::<Pollutant>(), Err(HealthError::UnknownPollutant(_))));
        assert_eq!("home".parse::<LocationKind>().unwrap(), LocationKind::Dwelling);
        assert!("castle".parse::<LocationKind>().is_err());
    }
}
