/*!

Accumulation of one person's week of exposure.

Travel is walked link by link. Each leg's interval is split at hour boundaries and every slice
adds its dose to the trip and to the person's hour-of-week bucket; slices past the end of the
week count for the trip only. Injury risk is taken at the hour the link is entered.

*/

use crate::accident::AccidentSeverity;
use crate::error::{HealthError, HealthResult};
use crate::exposure::dose::marginal_met;
use crate::exposure::{
    ActivityLocationTable, DoseModel, EnvironmentProfile, LinkExposureTable, LinkRiskTable,
    LocationKey, Pollutant, Trip, TripExposure, TripPath,
};
use crate::network::{Mode, Network};
use crate::week::{
    split_by_hour, HourSlice, WeeklyBuckets, HOURS_PER_DAY, HOURS_PER_WEEK, SECONDS_PER_HOUR,
};
use serde::Serialize;

/// A person's exposure for one simulated year, built up from an empty value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PersonExposure {
    /// Fraction of each hour accounted for.
    pub occupancy: WeeklyBuckets,
    pub dose: [WeeklyBuckets; Pollutant::COUNT],
    pub noise_energy: WeeklyBuckets,
    pub ndvi_hours: f64,
    pub hours: f64,
    /// Composed over all trips, per mode and severity.
    pub injury_risk: [[f64; AccidentSeverity::COUNT]; Mode::COUNT],
    pub marginal_met_hours: [f64; Mode::COUNT],
}

impl Default for PersonExposure {
    fn default() -> Self {
        PersonExposure {
            occupancy: WeeklyBuckets::new(),
            dose: [WeeklyBuckets::new(), WeeklyBuckets::new()],
            noise_energy: WeeklyBuckets::new(),
            ndvi_hours: 0.0,
            hours: 0.0,
            injury_risk: [[0.0; AccidentSeverity::COUNT]; Mode::COUNT],
            marginal_met_hours: [0.0; Mode::COUNT],
        }
    }
}

impl PersonExposure {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dose(&self, pollutant: Pollutant) -> &WeeklyBuckets {
        &self.dose[pollutant.index()]
    }

    #[must_use]
    pub fn injury_risk(&self, mode: Mode, severity: AccidentSeverity) -> f64 {
        self.injury_risk[mode.index()][severity.index()]
    }

    /// Folds in the risk of another trip: `1 - (1 - current)(1 - risk)`.
    pub fn add_injury_risk(&mut self, mode: Mode, severity: AccidentSeverity, risk: f64) {
        let current = &mut self.injury_risk[mode.index()][severity.index()];
        *current = 1.0 - (1.0 - *current) * (1.0 - risk.clamp(0.0, 1.0));
    }

    #[must_use]
    pub fn marginal_met_hours(&self, mode: Mode) -> f64 {
        self.marginal_met_hours[mode.index()]
    }

    #[must_use]
    pub fn total_marginal_met_hours(&self) -> f64 {
        self.marginal_met_hours.iter().sum()
    }

    /// Adds the conditions of `profile` for one slice. `dose_of` turns a concentration into
    /// an inhaled dose for the slice. Returns whether the slice fell inside the week.
    fn add_slice(
        &mut self,
        slice: HourSlice,
        profile: &EnvironmentProfile,
        mut dose_of: impl FnMut(f64) -> f64,
    ) -> bool {
        let Some(bucket) = slice.bucket() else {
            return false;
        };
        self.occupancy.add(bucket, slice.hours);
        for pollutant in Pollutant::ALL {
            let dose = dose_of(profile.concentration(pollutant, slice.hour_of_day));
            self.dose[pollutant.index()].add(bucket, dose);
        }
        self.noise_energy
            .add(bucket, profile.noise_energy(slice.hour_of_day) * slice.hours);
        self.ndvi_hours += profile.ndvi * slice.hours;
        self.hours += slice.hours;
        true
    }
}

/// Read-only view of the year's tables used to accumulate exposure. Cheap to copy into each
/// worker.
#[derive(Clone, Copy)]
pub struct ExposureAccumulator<'a> {
    network: &'a Network,
    risks: &'a LinkRiskTable,
    link_environment: &'a LinkExposureTable,
    locations: &'a ActivityLocationTable,
    dose: DoseModel,
}

impl<'a> ExposureAccumulator<'a> {
    #[must_use]
    pub fn new(
        network: &'a Network,
        risks: &'a LinkRiskTable,
        link_environment: &'a LinkExposureTable,
        locations: &'a ActivityLocationTable,
        dose: DoseModel,
    ) -> Self {
        ExposureAccumulator {
            network,
            risks,
            link_environment,
            locations,
            dose,
        }
    }

    #[must_use]
    pub fn dose_model(&self) -> &DoseModel {
        &self.dose
    }

    /// Walks `path` from the trip's departure, adding to `person` and returning the trip's
    /// own record. Fails if the path uses a link that is not in the network.
    pub fn accumulate_trip(
        &self,
        trip: &Trip,
        path: &TripPath,
        person: &mut PersonExposure,
    ) -> HealthResult<TripExposure> {
        let mut record = TripExposure::new(trip);
        let mut survival = [1.0; AccidentSeverity::COUNT];
        let mut clock = trip.day.week_seconds(trip.departure_seconds);

        for leg in &path.legs {
            let link = self
                .network
                .link(leg.link)
                .ok_or(HealthError::UnknownLink(leg.link))?;
            let travel_seconds = if leg.travel_seconds.is_finite() {
                leg.travel_seconds.max(0.0)
            } else {
                0.0
            };
            let hours = travel_seconds / SECONDS_PER_HOUR;

            let entry_hour = (clock / SECONDS_PER_HOUR).floor() as usize % HOURS_PER_DAY;
            for severity in AccidentSeverity::ALL {
                let risk = self.risks.risk(leg.link, trip.mode, severity, entry_hour);
                survival[severity.index()] *= 1.0 - risk;
            }

            let speed_kmh = if travel_seconds > 0.0 {
                link.length / travel_seconds * 3.6
            } else {
                0.0
            };
            let effort = marginal_met(trip.mode, speed_kmh);

            if let Some(profile) = self.link_environment.get(leg.link) {
                for slice in split_by_hour(clock, travel_seconds) {
                    let dose_of = |concentration: f64| {
                        self.dose
                            .travel_dose(concentration, trip.mode, effort, slice.hours)
                    };
                    for pollutant in Pollutant::ALL {
                        let concentration = profile.concentration(pollutant, slice.hour_of_day);
                        record.inhaled[pollutant.index()] += dose_of(concentration);
                    }
                    record.noise_energy += profile.noise_energy(slice.hour_of_day) * slice.hours;
                    record.ndvi_hours += profile.ndvi * slice.hours;
                    person.add_slice(slice, profile, dose_of);
                }
            } else {
                for slice in split_by_hour(clock, travel_seconds) {
                    if let Some(bucket) = slice.bucket() {
                        person.occupancy.add(bucket, slice.hours);
                        person.hours += slice.hours;
                    }
                }
            }

            record.marginal_met_hours += effort * hours;
            record.distance += link.length;
            record.travel_seconds += travel_seconds;
            clock += travel_seconds;
        }

        person.marginal_met_hours[trip.mode.index()] += record.marginal_met_hours;
        for severity in AccidentSeverity::ALL {
            let risk = 1.0 - survival[severity.index()];
            record.injury_risk[severity.index()] = risk;
            person.add_injury_risk(trip.mode, severity, risk);
        }
        Ok(record)
    }

    /// Time spent at the trip's destination, from arrival for the activity's duration.
    /// Returns `false` if the destination is not in the location table.
    pub fn accumulate_activity(
        &self,
        trip: &Trip,
        arrival_week_seconds: f64,
        person: &mut PersonExposure,
    ) -> bool {
        self.accumulate_stay(
            trip.destination,
            arrival_week_seconds,
            trip.activity_duration_seconds,
            person,
        )
    }

    /// Time at `location` over `[start, start + duration)`, breathing at rest.
    pub fn accumulate_stay(
        &self,
        location: LocationKey,
        start_week_seconds: f64,
        duration_seconds: f64,
        person: &mut PersonExposure,
    ) -> bool {
        let Some(location) = self.locations.get(location) else {
            return false;
        };
        for slice in split_by_hour(start_week_seconds, duration_seconds) {
            let dose_of = |concentration: f64| {
                self.dose
                    .resting_dose(concentration, slice.hour_of_day, slice.hours)
            };
            person.add_slice(slice, &location.profile, dose_of);
        }
        true
    }

    /// Fills every hour not yet accounted for with time at home. Returns `false` if the home
    /// is not in the location table.
    pub fn accumulate_home(&self, home: LocationKey, person: &mut PersonExposure) -> bool {
        let Some(location) = self.locations.get(home) else {
            return false;
        };
        for bucket in 0..HOURS_PER_WEEK {
            let remainder = 1.0 - person.occupancy.get(bucket);
            if remainder <= 0.0 {
                continue;
            }
            let slice = HourSlice {
                hour_of_week: bucket,
                hour_of_day: bucket % HOURS_PER_DAY,
                hours: remainder,
            };
            let dose_of = |concentration: f64| {
                self.dose
                    .resting_dose(concentration, slice.hour_of_day, slice.hours)
            };
            person.add_slice(slice, &location.profile, dose_of);
        }
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::exposure::{ActivityLocation, LocationKind, PathLeg, TripId, VentilationRates};
    use crate::network::tests::link;
    use crate::network::LinkId;
    use crate::params::ModeValues;
    use crate::week::DayOfWeek;
    use crate::PersonId;

    pub(crate) fn home() -> LocationKey {
        LocationKey::new(LocationKind::Dwelling, 1)
    }

    pub(crate) fn trip(
        id: u64,
        person: usize,
        mode: Mode,
        day: DayOfWeek,
        departure_hour: f64,
    ) -> Trip {
        Trip {
            id: TripId(id),
            person: PersonId(person),
            mode,
            day,
            departure_seconds: departure_hour * SECONDS_PER_HOUR,
            origin: home(),
            destination: LocationKey::new(LocationKind::Job, 9),
            home_based: true,
            activity_duration_seconds: 0.0,
        }
    }

    fn unit_dose() -> DoseModel {
        DoseModel::new(
            VentilationRates {
                rest_day: 1.0,
                rest_night: 1.0,
                ..VentilationRates::default()
            },
            ModeValues::uniform(1.0),
        )
    }

    fn network(ids: &[u64]) -> Network {
        ids.iter().map(|id| link(*id, None, 1000.0)).collect()
    }

    #[test]
    fn injury_risk_composes_along_the_path() {
        let network = network(&[1, 2, 3]);
        let mut risks = LinkRiskTable::new(2020);
        for (id, risk) in [(1, 0.1), (2, 0.2), (3, 0.05)] {
            let hourly = [risk; HOURS_PER_DAY];
            risks.insert(LinkId(id), Mode::Bike, AccidentSeverity::SevereFatal, hourly);
        }
        let environment = LinkExposureTable::new();
        let locations = ActivityLocationTable::new();
        let accumulator =
            ExposureAccumulator::new(&network, &risks, &environment, &locations, unit_dose());

        let path = TripPath::new(
            [1, 2, 3]
                .into_iter()
                .map(|id| PathLeg {
                    link: LinkId(id),
                    travel_seconds: 120.0,
                })
                .collect(),
        );
        let mut person = PersonExposure::new();
        let record = accumulator
            .accumulate_trip(&trip(1, 0, Mode::Bike, DayOfWeek::Monday, 7.0), &path, &mut person)
            .unwrap();

        assert!((record.injury_risk(AccidentSeverity::SevereFatal) - 0.316).abs() < 1e-12);
        assert_eq!(record.injury_risk(AccidentSeverity::Light), 0.0);
        let severe = person.injury_risk(Mode::Bike, AccidentSeverity::SevereFatal);
        assert!((severe - 0.316).abs() < 1e-12);
        assert_eq!(record.distance, 3000.0);
        // 3 km in 6 minutes is 30 km/h.
        assert!((record.marginal_met_hours - 9.0 * 0.1).abs() < 1e-12);
    }

    #[test]
    fn thursday_car_trip() {
        let network = network(&[1, 2]);
        let mut risks = LinkRiskTable::new(2020);
        let mut environment = LinkExposureTable::new();
        let mut hourly = [0.0; HOURS_PER_DAY];
        hourly[8] = 0.01;
        for (id, pm25) in [(1, 10.0), (2, 40.0)] {
            risks.insert(LinkId(id), Mode::Car, AccidentSeverity::SevereFatal, hourly);
            environment.insert(LinkId(id), EnvironmentProfile::constant(pm25, 0.0, 0.0, 0.0));
        }
        let locations = ActivityLocationTable::new();
        let accumulator =
            ExposureAccumulator::new(&network, &risks, &environment, &locations, unit_dose());

        let path = TripPath::new(vec![
            PathLeg {
                link: LinkId(1),
                travel_seconds: 600.0,
            },
            PathLeg {
                link: LinkId(2),
                travel_seconds: 600.0,
            },
        ]);
        let mut person = PersonExposure::new();
        let record = accumulator
            .accumulate_trip(&trip(1, 0, Mode::Car, DayOfWeek::Thursday, 8.0), &path, &mut person)
            .unwrap();

        let severe = person.injury_risk(Mode::Car, AccidentSeverity::SevereFatal);
        assert!((severe - 0.0199).abs() < 1e-12);
        let bucket = 3 * 24 + 8;
        let expected = 10.0 / 6.0 + 40.0 / 6.0;
        assert!((person.dose(Pollutant::Pm25).get(bucket) - expected).abs() < 1e-12);
        assert!((record.inhaled(Pollutant::Pm25) - expected).abs() < 1e-12);
        assert!((person.occupancy.get(bucket) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(person.dose(Pollutant::Pm25).sum(), person.dose(Pollutant::Pm25).get(bucket));
    }

    #[test]
    fn end_of_week_slices_reach_only_the_trip() {
        let network = network(&[1]);
        let risks = LinkRiskTable::new(2020);
        let mut environment = LinkExposureTable::new();
        environment.insert(LinkId(1), EnvironmentProfile::constant(6.0, 0.0, 0.0, 0.0));
        let locations = ActivityLocationTable::new();
        let accumulator =
            ExposureAccumulator::new(&network, &risks, &environment, &locations, unit_dose());

        let path = TripPath::new(vec![PathLeg {
            link: LinkId(1),
            travel_seconds: 5400.0,
        }]);
        let mut person = PersonExposure::new();
        let record = accumulator
            .accumulate_trip(&trip(1, 0, Mode::Walk, DayOfWeek::Sunday, 23.0), &path, &mut person)
            .unwrap();

        // A slow walk doubles the resting ventilation.
        assert!((record.inhaled(Pollutant::Pm25) - 6.0 * 2.0 * 1.5).abs() < 1e-9);
        let dose = person.dose(Pollutant::Pm25);
        assert!((dose.get(HOURS_PER_WEEK - 1) - 6.0 * 2.0).abs() < 1e-9);
        assert!((dose.sum() - 6.0 * 2.0).abs() < 1e-9);
        assert_eq!(person.occupancy.get(0), 0.0);
    }

    #[test]
    fn unknown_links_fail_the_trip() {
        let network = network(&[1]);
        let risks = LinkRiskTable::new(2020);
        let environment = LinkExposureTable::new();
        let locations = ActivityLocationTable::new();
        let accumulator =
            ExposureAccumulator::new(&network, &risks, &environment, &locations, unit_dose());
        let path = TripPath::new(vec![PathLeg {
            link: LinkId(5),
            travel_seconds: 60.0,
        }]);
        let result = accumulator.accumulate_trip(
            &trip(1, 0, Mode::Car, DayOfWeek::Monday, 9.0),
            &path,
            &mut PersonExposure::new(),
        );
        assert!(matches!(result, Err(HealthError::UnknownLink(LinkId(5)))));
    }

    #[test]
    fn home_fills_the_rest_of_the_week() {
        let network = Network::new();
        let risks = LinkRiskTable::new(2020);
        let environment = LinkExposureTable::new();
        let mut locations = ActivityLocationTable::new();
        locations.insert(ActivityLocation {
            key: home(),
            coordinate: (0.0, 0.0),
            profile: EnvironmentProfile::constant(5.0, 20.0, 50.0, 0.4),
        });
        let job = LocationKey::new(LocationKind::Job, 9);
        locations.insert(ActivityLocation {
            key: job,
            coordinate: (1.0, 1.0),
            profile: EnvironmentProfile::constant(15.0, 20.0, 50.0, 0.0),
        });
        let accumulator =
            ExposureAccumulator::new(&network, &risks, &environment, &locations, unit_dose());

        let mut person = PersonExposure::new();
        let start = 9.5 * SECONDS_PER_HOUR;
        assert!(accumulator.accumulate_stay(job, start, SECONDS_PER_HOUR, &mut person));
        assert!(accumulator.accumulate_home(home(), &mut person));
        let unknown_home = LocationKey::new(LocationKind::Dwelling, 2);
        assert!(!accumulator.accumulate_home(unknown_home, &mut person));

        assert!(person.occupancy.iter().all(|occupancy| (occupancy - 1.0).abs() < 1e-12));
        assert!((person.hours - HOURS_PER_WEEK as f64).abs() < 1e-9);
        // Hour 9 is half at work, half at home.
        assert!((person.dose(Pollutant::Pm25).get(9) - 10.0).abs() < 1e-12);
        assert!((person.dose(Pollutant::Pm25).get(40) - 5.0).abs() < 1e-12);
    }
}
