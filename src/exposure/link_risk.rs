use crate::accident::{AccidentSeverity, LinkCasualtyTable};
use crate::log::debug;
use crate::network::{LinkId, Mode, TrafficDemand};
use crate::week::HOURS_PER_DAY;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

type HourlyRisks = [f64; HOURS_PER_DAY];

/// Number of (link, hour) pairs with casualty rates but no traffic of the victim mode, per
/// mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ZeroDemandCounts([usize; Mode::COUNT]);

impl ZeroDemandCounts {
    pub fn increment(&mut self, mode: Mode) {
        self.0[mode.index()] += 1;
    }

    #[must_use]
    pub fn get(&self, mode: Mode) -> usize {
        self.0[mode.index()]
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }
}

/// Injury risk per traveller, per link, mode, severity and hour of day, for one year.
///
/// The casualty table gives the probability of a casualty on a link in an hour; dividing by
/// the number of travellers of the victim mode in that hour turns it into an individual
/// risk.
#[derive(Clone, Debug, Default)]
pub struct LinkRiskTable {
    year: u32,
    risks: FxHashMap<LinkId, FxHashMap<(Mode, AccidentSeverity), HourlyRisks>>,
    zero_demand: ZeroDemandCounts,
}

impl LinkRiskTable {
    #[must_use]
    pub fn new(year: u32) -> Self {
        LinkRiskTable {
            year,
            ..LinkRiskTable::default()
        }
    }

    /// Normalises every casualty rate by the hourly volume of its victim mode. An hour with
    /// no volume gets risk 0 and is counted once per (link, mode, hour), however many accident
    /// types and severities share it. Accident types sharing a victim mode combine as
    /// independent hazards.
    #[must_use]
    pub fn from_casualties(casualties: &LinkCasualtyTable, demand: &TrafficDemand) -> Self {
        let mut table = LinkRiskTable::new(casualties.year());
        let mut unserved: FxHashSet<(LinkId, Mode, usize)> = FxHashSet::default();
        for (link, accident_type, severity, rates) in casualties.iter() {
            let mode = accident_type.victim_mode();
            let mut risks = [0.0; HOURS_PER_DAY];
            for (hour, (risk, rate)) in risks.iter_mut().zip(rates).enumerate() {
                let volume = demand.volume(link, mode, hour);
                if volume > 0.0 {
                    *risk = rate / volume.max(1.0);
                } else if unserved.insert((link, mode, hour)) {
                    table.zero_demand.increment(mode);
                }
            }
            table.combine(link, mode, severity, risks);
        }
        debug!(
            "link risks {}: {} links, {} zero-demand hours",
            table.year,
            table.len(),
            table.zero_demand.total()
        );
        table
    }

    /// Sets the risks for one entry, replacing what was there.
    pub fn insert(
        &mut self,
        link: LinkId,
        mode: Mode,
        severity: AccidentSeverity,
        risks: HourlyRisks,
    ) {
        self.risks
            .entry(link)
            .or_default()
            .insert((mode, severity), risks.map(clamp_probability));
    }

    /// Adds an independent hazard to an entry: `1 - (1 - a)(1 - b)` per hour.
    pub fn combine(
        &mut self,
        link: LinkId,
        mode: Mode,
        severity: AccidentSeverity,
        risks: HourlyRisks,
    ) {
        let entry = self
            .risks
            .entry(link)
            .or_default()
            .entry((mode, severity))
            .or_insert([0.0; HOURS_PER_DAY]);
        for (current, added) in entry.iter_mut().zip(risks) {
            *current = 1.0 - (1.0 - *current) * (1.0 - clamp_probability(added));
        }
    }

    #[must_use]
    pub fn year(&self) -> u32 {
        self.year
    }

    /// Risk for one traveller of `mode` entering `link` at `hour_of_day`; 0 where the link
    /// has no entry.
    #[must_use]
    pub fn risk(
        &self,
        link: LinkId,
        mode: Mode,
        severity: AccidentSeverity,
        hour_of_day: usize,
    ) -> f64 {
        self.risks
            .get(&link)
            .and_then(|entries| entries.get(&(mode, severity)))
            .and_then(|hourly| hourly.get(hour_of_day % HOURS_PER_DAY))
            .copied()
            .unwrap_or(0.0)
    }

    #[must_use]
    pub fn get(
        &self,
        link: LinkId,
        mode: Mode,
        severity: AccidentSeverity,
    ) -> Option<&HourlyRisks> {
        self.risks.get(&link)?.get(&(mode, severity))
    }

    #[must_use]
    pub fn zero_demand(&self) -> ZeroDemandCounts {
        self.zero_demand
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.risks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.risks.is_empty()
    }
}

fn clamp_probability(value: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accident::AccidentSeverity::{Light, SevereFatal};
    use crate::accident::AccidentType;

    #[test]
    fn zero_demand_gives_zero_risk_and_one_count() {
        let mut casualties = LinkCasualtyTable::new(2025);
        casualties.insert(LinkId(1), AccidentType::Pedestrian, Light, [0.02; HOURS_PER_DAY]);
        let mut demand = TrafficDemand::new();
        let mut volumes = [10.0; HOURS_PER_DAY];
        volumes[3] = 0.0;
        demand.set_hourly(LinkId(1), Mode::Walk, volumes);

        let risks = LinkRiskTable::from_casualties(&casualties, &demand);
        assert_eq!(risks.year(), 2025);
        assert_eq!(risks.risk(LinkId(1), Mode::Walk, Light, 3), 0.0);
        assert!((risks.risk(LinkId(1), Mode::Walk, Light, 4) - 0.002).abs() < 1e-12);
        assert_eq!(risks.zero_demand().get(Mode::Walk), 1);
        assert_eq!(risks.zero_demand().total(), 1);
    }

    #[test]
    fn zero_demand_counts_each_link_hour_once() {
        let mut casualties = LinkCasualtyTable::new(2025);
        for severity in [Light, SevereFatal] {
            casualties.insert(LinkId(1), AccidentType::Pedestrian, severity, [0.02; HOURS_PER_DAY]);
            casualties.insert(LinkId(2), AccidentType::CarOneWay, severity, [0.1; HOURS_PER_DAY]);
            casualties.insert(LinkId(2), AccidentType::CarTwoWay, severity, [0.1; HOURS_PER_DAY]);
        }
        let mut demand = TrafficDemand::new();
        let mut walk = [10.0; HOURS_PER_DAY];
        walk[3] = 0.0;
        demand.set_hourly(LinkId(1), Mode::Walk, walk);
        let mut car = [10.0; HOURS_PER_DAY];
        car[8] = 0.0;
        car[9] = 0.0;
        demand.set_hourly(LinkId(2), Mode::Car, car);

        let risks = LinkRiskTable::from_casualties(&casualties, &demand);
        assert_eq!(risks.zero_demand().get(Mode::Walk), 1);
        assert_eq!(risks.zero_demand().get(Mode::Car), 2);
        assert_eq!(risks.zero_demand().total(), 3);
        assert_eq!(risks.risk(LinkId(1), Mode::Walk, SevereFatal, 3), 0.0);
        assert_eq!(risks.risk(LinkId(2), Mode::Car, Light, 8), 0.0);
    }

    #[test]
    fn small_volumes_do_not_inflate_risk() {
        let mut casualties = LinkCasualtyTable::new(2025);
        casualties.insert(LinkId(1), AccidentType::CarTwoWay, Light, [0.3; HOURS_PER_DAY]);
        let mut demand = TrafficDemand::new();
        demand.set_hourly(LinkId(1), Mode::Car, [0.25; HOURS_PER_DAY]);

        let risks = LinkRiskTable::from_casualties(&casualties, &demand);
        assert!((risks.risk(LinkId(1), Mode::Car, Light, 0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn accident_types_of_one_mode_combine() {
        let mut casualties = LinkCasualtyTable::new(2025);
        casualties.insert(LinkId(1), AccidentType::CarOneWay, Light, [0.1; HOURS_PER_DAY]);
        casualties.insert(LinkId(1), AccidentType::CarTwoWay, Light, [0.2; HOURS_PER_DAY]);
        let mut demand = TrafficDemand::new();
        demand.set_hourly(LinkId(1), Mode::Car, [1.0; HOURS_PER_DAY]);

        let risks = LinkRiskTable::from_casualties(&casualties, &demand);
        assert!((risks.risk(LinkId(1), Mode::Car, Light, 12) - 0.28).abs() < 1e-12);
        assert_eq!(risks.risk(LinkId(1), Mode::Bike, Light, 12), 0.0);
        assert_eq!(risks.risk(LinkId(9), Mode::Car, Light, 12), 0.0);
    }
}
