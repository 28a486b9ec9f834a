use crate::accident::{AccidentSeverity, AccidentType};
use crate::network::LinkId;
use crate::week::HOURS_PER_DAY;
use rustc_hash::FxHashMap;
use serde::Serialize;

type HourlyRates = [f64; HOURS_PER_DAY];

/// Casualty rates for one simulated year, per link, (accident type, severity) and hour of
/// day. A link without an entry for some type is one where that collision does not apply.
#[derive(Clone, Debug, Default)]
pub struct LinkCasualtyTable {
    year: u32,
    rates: FxHashMap<LinkId, FxHashMap<(AccidentType, AccidentSeverity), HourlyRates>>,
}

/// One row of a casualty table in long format, for writers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CasualtyRateRow {
    pub year: u32,
    pub link: LinkId,
    pub accident_type: AccidentType,
    pub severity: AccidentSeverity,
    pub hour: usize,
    pub rate: f64,
}

impl LinkCasualtyTable {
    #[must_use]
    pub fn new(year: u32) -> Self {
        LinkCasualtyTable {
            year,
            rates: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn year(&self) -> u32 {
        self.year
    }

    /// Stores the rates for one entry. Values are clamped to `[0, 1]`; non-finite values
    /// become 0.
    pub fn insert(
        &mut self,
        link: LinkId,
        accident_type: AccidentType,
        severity: AccidentSeverity,
        mut rates: HourlyRates,
    ) {
        for rate in &mut rates {
            *rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
        }
        self.rates
            .entry(link)
            .or_default()
            .insert((accident_type, severity), rates);
    }

    #[must_use]
    pub fn get(
        &self,
        link: LinkId,
        accident_type: AccidentType,
        severity: AccidentSeverity,
    ) -> Option<&HourlyRates> {
        self.rates.get(&link)?.get(&(accident_type, severity))
    }

    #[must_use]
    pub fn rate(
        &self,
        link: LinkId,
        accident_type: AccidentType,
        severity: AccidentSeverity,
        hour: usize,
    ) -> Option<f64> {
        self.get(link, accident_type, severity)?.get(hour).copied()
    }

    /// All entries, in no particular order.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (LinkId, AccidentType, AccidentSeverity, &HourlyRates)> {
        self.rates.iter().flat_map(|(link, entries)| {
            entries.iter().map(move |((accident_type, severity), rates)| {
                (*link, *accident_type, *severity, rates)
            })
        })
    }

    /// Long-format rows sorted by link, type, severity and hour.
    #[must_use]
    pub fn rows(&self) -> Vec<CasualtyRateRow> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by_key(|(link, accident_type, severity, _)| {
            (*link, *accident_type, *severity)
        });
        entries
            .into_iter()
            .flat_map(|(link, accident_type, severity, rates)| {
                rates.iter().enumerate().map(move |(hour, rate)| CasualtyRateRow {
                    year: self.year,
                    link,
                    accident_type,
                    severity,
                    hour,
                    rate: *rate,
                })
            })
            .collect()
    }

    /// Number of links with at least one entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
