use crate::network::{LinkId, Mode};
use crate::week::HOURS_PER_DAY;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Hourly volumes for every mode on one link or segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HourlyFlows([[f64; HOURS_PER_DAY]; Mode::COUNT]);

impl Default for HourlyFlows {
    fn default() -> Self {
        HourlyFlows([[0.0; HOURS_PER_DAY]; Mode::COUNT])
    }
}

impl HourlyFlows {
    #[must_use]
    pub fn flow(&self, mode: Mode, hour: usize) -> f64 {
        self.0[mode.index()].get(hour).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn hourly(&self, mode: Mode) -> &[f64; HOURS_PER_DAY] {
        &self.0[mode.index()]
    }

    pub fn set_hourly(&mut self, mode: Mode, volumes: [f64; HOURS_PER_DAY]) {
        self.0[mode.index()] = volumes;
    }

    pub fn set(&mut self, mode: Mode, hour: usize, volume: f64) {
        if let Some(slot) = self.0[mode.index()].get_mut(hour) {
            *slot = volume;
        }
    }
}

/// Traffic volume by link, mode and hour of day, produced by the transport simulation.
/// Absent entries mean no recorded volume.
#[derive(Clone, Debug, Default)]
pub struct TrafficDemand {
    links: FxHashMap<LinkId, HourlyFlows>,
}

impl TrafficDemand {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_hourly(&mut self, link: LinkId, mode: Mode, volumes: [f64; HOURS_PER_DAY]) {
        self.links.entry(link).or_default().set_hourly(mode, volumes);
    }

    pub fn add_volume(&mut self, link: LinkId, mode: Mode, hour: usize, volume: f64) {
        let flows = self.links.entry(link).or_default();
        let current = flows.flow(mode, hour);
        flows.set(mode, hour, current + volume);
    }

    #[must_use]
    pub fn volume(&self, link: LinkId, mode: Mode, hour: usize) -> f64 {
        self.links
            .get(&link)
            .map_or(0.0, |flows| flows.flow(mode, hour))
    }

    #[must_use]
    pub fn flows(&self, link: LinkId) -> Option<&HourlyFlows> {
        self.links.get(&link)
    }
}
