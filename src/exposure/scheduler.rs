/*!

Runs exposure accumulation for the whole population on a fixed-size worker pool.

Work is partitioned by person: each partition holds complete persons with all of their trips,
so every `PersonExposure` is built by exactly one worker and no accumulator is shared. The
partitions are joined before anything downstream (normalisation) may read the results; a
failing partition fails the whole run.

*/

use crate::error::{HealthError, HealthResult};
use crate::exposure::{
    ExposureAccumulator, LocationKey, PersonExposure, RouterFactory, Trip, TripExposure,
};
use crate::log::{debug, info, warn};
use crate::PersonId;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One person's share of the work.
#[derive(Clone, Debug)]
pub struct PersonWork {
    pub person: PersonId,
    pub home: Option<LocationKey>,
    /// Sorted by day, departure time and id.
    pub trips: Vec<Trip>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExposureReport {
    pub partitions: usize,
    pub processed_trips: usize,
    pub no_path_trips: usize,
    pub missing_locations: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ExposureRun {
    pub persons: BTreeMap<PersonId, PersonExposure>,
    pub trips: Vec<TripExposure>,
    pub report: ExposureReport,
}

#[derive(Default)]
struct PartitionResult {
    persons: Vec<(PersonId, PersonExposure)>,
    trips: Vec<TripExposure>,
    processed_trips: usize,
    no_path_trips: usize,
    missing_locations: usize,
}

/// The pool size: `requested` if given and positive, otherwise the available parallelism.
#[must_use]
pub fn worker_count(requested: Option<usize>) -> usize {
    match requested {
        Some(workers) if workers > 0 => workers,
        _ => std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
    }
}

/// Groups trips by person and splits the persons, in id order, into `ceil(P / workers)`-sized
/// chunks. Persons listed in `homes` get a work item even without trips.
#[must_use]
pub fn partition_by_person(
    homes: &BTreeMap<PersonId, LocationKey>,
    trips: Vec<Trip>,
    workers: usize,
) -> Vec<Vec<PersonWork>> {
    let mut by_person: BTreeMap<PersonId, Vec<Trip>> =
        homes.keys().map(|person| (*person, Vec::new())).collect();
    for trip in trips {
        by_person.entry(trip.person).or_default().push(trip);
    }
    if by_person.is_empty() {
        return Vec::new();
    }

    let chunk_size = by_person.len().div_ceil(workers.max(1));
    let mut partitions: Vec<Vec<PersonWork>> = Vec::new();
    for (person, mut trips) in by_person {
        trips.sort_by(|a, b| {
            a.day
                .cmp(&b.day)
                .then(a.departure_seconds.total_cmp(&b.departure_seconds))
                .then(a.id.cmp(&b.id))
        });
        let work = PersonWork {
            person,
            home: homes.get(&person).copied(),
            trips,
        };
        match partitions.last_mut() {
            Some(partition) if partition.len() < chunk_size => partition.push(work),
            _ => partitions.push(vec![work]),
        }
    }
    partitions
}

fn run_partition(
    accumulator: &ExposureAccumulator<'_>,
    router_factory: &dyn RouterFactory,
    partition: Vec<PersonWork>,
    no_path_total: &AtomicUsize,
) -> HealthResult<PartitionResult> {
    let mut router = router_factory.create_router();
    let mut result = PartitionResult::default();

    for work in partition {
        let mut exposure = PersonExposure::new();
        for trip in &work.trips {
            let Some(path) = router.route(trip) else {
                result.no_path_trips += 1;
                let total = no_path_total.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    "no path for trip {} of person {}; {total} trips without a path so far",
                    trip.id, trip.person
                );
                continue;
            };
            let record = accumulator.accumulate_trip(trip, &path, &mut exposure)?;
            if trip.home_based && trip.activity_duration_seconds > 0.0 {
                let arrival = trip.day.week_seconds(trip.departure_seconds) + record.travel_seconds;
                if !accumulator.accumulate_activity(trip, arrival, &mut exposure) {
                    result.missing_locations += 1;
                }
            }
            result.processed_trips += 1;
            result.trips.push(record);
        }
        if let Some(home) = work.home {
            if !accumulator.accumulate_home(home, &mut exposure) {
                result.missing_locations += 1;
            }
        }
        result.persons.push((work.person, exposure));
    }
    Ok(result)
}

/// Accumulates the exposure of every person on a pool of `workers` threads. Each worker
/// creates its own router.
pub fn run(
    accumulator: &ExposureAccumulator<'_>,
    router_factory: &dyn RouterFactory,
    homes: &BTreeMap<PersonId, LocationKey>,
    trips: Vec<Trip>,
    workers: usize,
) -> HealthResult<ExposureRun> {
    let workers = workers.max(1);
    let trip_count = trips.len();
    let partitions = partition_by_person(homes, trips, workers);
    info!(
        "accumulating exposure for {trip_count} trips in {} partitions on {workers} workers",
        partitions.len()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|error| HealthError::Config(format!("cannot build worker pool: {error}")))?;

    let no_path_total = AtomicUsize::new(0);
    let partition_count = partitions.len();
    let results: Vec<PartitionResult> = pool.install(|| {
        partitions
            .into_par_iter()
            .enumerate()
            .map(|(partition, work)| {
                run_partition(accumulator, router_factory, work, &no_path_total).map_err(|source| {
                    HealthError::WorkerFailed {
                        partition,
                        source: Box::new(source),
                    }
                })
            })
            .collect::<HealthResult<Vec<_>>>()
    })?;

    let mut run = ExposureRun {
        report: ExposureReport {
            partitions: partition_count,
            ..ExposureReport::default()
        },
        ..ExposureRun::default()
    };
    for result in results {
        run.persons.extend(result.persons);
        run.trips.extend(result.trips);
        run.report.processed_trips += result.processed_trips;
        run.report.no_path_trips += result.no_path_trips;
        run.report.missing_locations += result.missing_locations;
    }

    if run.report.no_path_trips > 0 {
        warn!("{} trips had no path and were skipped", run.report.no_path_trips);
    }
    if run.report.missing_locations > 0 {
        warn!("{} activities at locations without environment data", run.report.missing_locations);
    }
    debug!("exposure run: {:?}", run.report);
    Ok(run)
}
