/*!

Runs the five stages once per simulated year on a [`Context`].

```text
build_year_snapshot   casualty model per segment -> LinkCasualtyTable -> LinkRiskTable
run_exposure_year     trips on the worker pool -> PersonExposure -> WeeklyExposure
run_disease_year      relative risks -> probabilities -> new cases and deaths
```

The year's casualty and risk tables form an immutable [`YearSnapshot`] that is replaced, never
edited, when the next year is built. Exposure must be run against the snapshot of the same
year.

*/

use crate::accident::segment::build_casualty_table;
use crate::accident::{AggregationReport, CasualtyRateModel, CoefficientTable, LinkCasualtyTable};
use crate::context::Context;
use crate::disease::{Disease, DiseaseModel, DiseaseRng, DoseResponseTable, TransitionTable};
use crate::error::{HealthError, HealthResult};
use crate::exposure::{
    scheduler, ActivityLocationTable, DoseModel, ExposureAccumulator, LinkExposureTable,
    LinkRiskTable, RouterFactory, Trip, TripExposure, ZeroDemandCounts,
};
use crate::log::{debug, info, warn};
use crate::network::{Mode, Network, TrafficDemand};
use crate::normalize::normalize;
use crate::params::ContextParametersExt;
use crate::person::{ContextPopulationExt, Population};
use crate::random::{derive_rng, ContextRandomExt};
use crate::PersonId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// The configuration tables shared by every year.
#[derive(Clone, Debug, Default)]
pub struct HealthTables {
    pub coefficients: CoefficientTable,
    pub transitions: TransitionTable,
    pub dose_response: DoseResponseTable,
}

struct HealthTablesPlugin {
    tables: Option<Arc<HealthTables>>,
}

crate::define_data_plugin!(HealthTablesPlugin, HealthTablesPlugin { tables: None });

/// Casualty rates and per-traveller risks for one year.
#[derive(Debug)]
pub struct YearSnapshot {
    pub year: u32,
    pub casualties: LinkCasualtyTable,
    pub risks: LinkRiskTable,
    pub aggregation: AggregationReport,
}

struct SnapshotPlugin {
    current: Option<Arc<YearSnapshot>>,
}

crate::define_data_plugin!(SnapshotPlugin, SnapshotPlugin { current: None });

/// What the transport and environment collaborators provide for one exposure year.
pub struct YearInputs<'a> {
    pub year: u32,
    pub network: &'a Network,
    pub link_environment: &'a LinkExposureTable,
    pub locations: &'a ActivityLocationTable,
    pub trips: Vec<Trip>,
    pub router: &'a dyn RouterFactory,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExposureYearSummary {
    pub year: u32,
    pub persons: usize,
    pub processed_trips: usize,
    pub no_path_trips: usize,
    /// Trips of persons who are not alive.
    pub dropped_trips: usize,
    pub missing_locations: usize,
    pub zero_demand: ZeroDemandCounts,
    pub skipped_segments: usize,
    pub missing_coefficients: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiseaseYearSummary {
    pub year: u32,
    pub persons: usize,
    pub new_cases: BTreeMap<Disease, usize>,
    pub deaths: usize,
    pub causes_of_death: BTreeMap<Disease, usize>,
    pub missing_transitions: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct YearSummary {
    pub exposure: ExposureYearSummary,
    pub disease: DiseaseYearSummary,
}

pub trait ContextHealthExt {
    /// Reads the coefficient, transition and dose-response tables.
    fn load_health_tables(
        &mut self,
        coefficients: &Path,
        transitions: &Path,
        dose_response: &Path,
    ) -> HealthResult<()>;

    fn set_health_tables(&mut self, tables: HealthTables);

    fn get_health_tables(&self) -> Option<Arc<HealthTables>>;

    /// Evaluates the casualty model for `year` and normalises it by `demand` into per-traveller
    /// risks. The result replaces the current snapshot.
    fn build_year_snapshot(
        &mut self,
        year: u32,
        network: &Network,
        demand: &TrafficDemand,
    ) -> HealthResult<Arc<YearSnapshot>>;

    fn get_year_snapshot(&self) -> Option<Arc<YearSnapshot>>;

    /// Accumulates the year's exposure for the live population and stores each person's
    /// fresh `PersonExposure` and its weekly normalisation. Returns the per-trip records.
    fn run_exposure_year(
        &mut self,
        inputs: YearInputs<'_>,
    ) -> HealthResult<(Vec<TripExposure>, ExposureYearSummary)>;

    /// Updates relative risks, probabilities and disease states of every live person and
    /// archives those who died.
    fn run_disease_year(&mut self, year: u32) -> HealthResult<DiseaseYearSummary>;

    /// All three steps for one year.
    fn run_year(
        &mut self,
        demand: &TrafficDemand,
        inputs: YearInputs<'_>,
    ) -> HealthResult<(Vec<TripExposure>, YearSummary)>;
}

fn tables(context: &Context) -> HealthResult<Arc<HealthTables>> {
    context
        .get_health_tables()
        .ok_or_else(|| HealthError::Config("health tables have not been loaded".to_string()))
}

impl ContextHealthExt for Context {
    fn load_health_tables(
        &mut self,
        coefficients: &Path,
        transitions: &Path,
        dose_response: &Path,
    ) -> HealthResult<()> {
        info!("loading health tables");
        let tables = HealthTables {
            coefficients: CoefficientTable::from_path(coefficients)?,
            transitions: TransitionTable::from_path(transitions)?,
            dose_response: DoseResponseTable::from_path(dose_response)?,
        };
        debug!(
            "{} coefficient sets, {} transition entries, {} dose-response curves",
            tables.coefficients.len(),
            tables.transitions.len(),
            tables.dose_response.len()
        );
        self.set_health_tables(tables);
        Ok(())
    }

    fn set_health_tables(&mut self, tables: HealthTables) {
        self.get_data_container_mut::<HealthTablesPlugin>().tables = Some(Arc::new(tables));
    }

    fn get_health_tables(&self) -> Option<Arc<HealthTables>> {
        self.get_data_container::<HealthTablesPlugin>()?.tables.clone()
    }

    fn build_year_snapshot(
        &mut self,
        year: u32,
        network: &Network,
        demand: &TrafficDemand,
    ) -> HealthResult<Arc<YearSnapshot>> {
        let tables = tables(self)?;
        let expansion = self.get_params().temporal_expansion;
        let model = CasualtyRateModel::new(&tables.coefficients, expansion);
        let (casualties, aggregation) = build_casualty_table(network, demand, &model, year)?;
        let risks = LinkRiskTable::from_casualties(&casualties, demand);

        let zero_demand = risks.zero_demand();
        if zero_demand.total() > 0 {
            warn!(
                "{} link-hours had casualty rates but no traffic of the victim mode in {year} \
                 (walk {}, bike {}, car {})",
                zero_demand.total(),
                zero_demand.get(Mode::Walk),
                zero_demand.get(Mode::Bike),
                zero_demand.get(Mode::Car)
            );
        }
        info!("{year} snapshot: {} casualty entries, {} risk links", casualties.len(), risks.len());

        let snapshot = Arc::new(YearSnapshot {
            year,
            casualties,
            risks,
            aggregation,
        });
        self.get_data_container_mut::<SnapshotPlugin>().current = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    fn get_year_snapshot(&self) -> Option<Arc<YearSnapshot>> {
        self.get_data_container::<SnapshotPlugin>()?.current.clone()
    }

    fn run_exposure_year(
        &mut self,
        inputs: YearInputs<'_>,
    ) -> HealthResult<(Vec<TripExposure>, ExposureYearSummary)> {
        let year = inputs.year;
        let snapshot = self
            .get_year_snapshot()
            .filter(|snapshot| snapshot.year == year)
            .ok_or_else(|| HealthError::Config(format!("no casualty snapshot for {year}")))?;
        let params = self.get_params().clone();

        let mut trips = inputs.trips;
        let trip_count = trips.len();
        trips.retain(|trip| self.get_person(trip.person).is_some());
        let dropped_trips = trip_count - trips.len();
        if dropped_trips > 0 {
            debug!("dropping {dropped_trips} trips of persons who are not alive");
        }

        let accumulator = ExposureAccumulator::new(
            inputs.network,
            &snapshot.risks,
            inputs.link_environment,
            inputs.locations,
            DoseModel::new(params.ventilation, params.infiltration),
        );
        let homes = self.get_homes();
        let workers = scheduler::worker_count(params.worker_threads);
        let mut run = scheduler::run(&accumulator, inputs.router, &homes, trips, workers)?;

        let population = self.get_data_container_mut::<Population>();
        let mut persons = 0;
        for (person_id, person) in population.live_mut() {
            person.exposure = run.persons.remove(&person_id).unwrap_or_default();
            person.weekly = normalize(&person.exposure, &params.ventilation);
            persons += 1;
        }

        let summary = ExposureYearSummary {
            year,
            persons,
            processed_trips: run.report.processed_trips,
            no_path_trips: run.report.no_path_trips,
            dropped_trips,
            missing_locations: run.report.missing_locations,
            zero_demand: snapshot.risks.zero_demand(),
            skipped_segments: snapshot.aggregation.skipped_segments,
            missing_coefficients: snapshot.aggregation.missing_coefficients,
        };
        info!(
            "{year} exposure: {persons} persons, {} trips processed, {} without path",
            summary.processed_trips, summary.no_path_trips
        );
        Ok((run.trips, summary))
    }

    fn run_disease_year(&mut self, year: u32) -> HealthResult<DiseaseYearSummary> {
        let tables = tables(self)?;
        let settings = self.get_params().disease.clone();
        let seed = self.get_base_random_seed();
        let model = DiseaseModel::new(&tables.transitions, &tables.dose_response, &settings);

        let mut summary = DiseaseYearSummary {
            year,
            ..DiseaseYearSummary::default()
        };
        let mut dead: Vec<PersonId> = Vec::new();
        let population = self.get_data_container_mut::<Population>();
        for (person_id, person) in population.live_mut() {
            model.update_relative_risks(person);
            summary.missing_transitions += model.update_probabilities(person).missing_transitions;
            let mut rng = derive_rng::<DiseaseRng>(seed, year, person_id);
            let outcome = model.update_states(person, year, &mut rng);

            for disease in outcome.new_cases {
                *summary.new_cases.entry(disease).or_default() += 1;
            }
            if let Some(cause) = outcome.death {
                *summary.causes_of_death.entry(cause).or_default() += 1;
                dead.push(person_id);
            }
            summary.persons += 1;
        }

        for person_id in &dead {
            population.archive(*person_id);
        }
        summary.deaths = dead.len();

        if summary.missing_transitions > 0 {
            warn!(
                "{} disease transitions had no baseline entry in {year}",
                summary.missing_transitions
            );
        }
        info!(
            "{year} disease update: {} persons, {} new cases, {} deaths",
            summary.persons,
            summary.new_cases.values().sum::<usize>(),
            summary.deaths
        );
        Ok(summary)
    }

    fn run_year(
        &mut self,
        demand: &TrafficDemand,
        inputs: YearInputs<'_>,
    ) -> HealthResult<(Vec<TripExposure>, YearSummary)> {
        let year = inputs.year;
        self.build_year_snapshot(year, inputs.network, demand)?;
        let (trips, exposure) = self.run_exposure_year(inputs)?;
        let disease = self.run_disease_year(year)?;
        Ok((trips, YearSummary { exposure, disease }))
    }
}
