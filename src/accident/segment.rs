/*!

Evaluation of the casualty model at the granularity of real-world roads.

The simulation network splits one OSM way into many directed links. Each way is treated as
one [`OsmSegment`]: its covariates and demand are aggregated over the member links, the model
is evaluated once, and the segment's rate is shared out to the members in proportion to their
length. Links with no OSM id form a segment of their own.

*/

use crate::accident::{
    AccidentSeverity, AccidentType, CasualtyRateModel, LinkCasualtyTable, RoadCovariates,
};
use crate::error::{HealthError, HealthResult};
use crate::log::{debug, info, warn};
use crate::network::{
    HourlyFlows, LinkId, Mode, ModeSet, Network, NetworkLink, RoadType, TrafficDemand,
};
use crate::week::HOURS_PER_DAY;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub enum SegmentKey {
    Osm(u64),
    Link(LinkId),
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKey::Osm(id) => write!(f, "osm:{id}"),
            SegmentKey::Link(id) => write!(f, "link:{id}"),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct OsmSegment {
    pub key: SegmentKey,
    /// Member links sorted by id, with their lengths.
    pub links: Vec<(LinkId, f64)>,
    pub covariates: RoadCovariates,
    /// Sum of member lengths, the denominator of the redistribution.
    pub total_length: f64,
    pub average_length: f64,
    pub flows: HourlyFlows,
}

/// Counters from one run of [`build_casualty_table`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AggregationReport {
    pub segments: usize,
    pub skipped_segments: usize,
    pub missing_coefficients: usize,
}

/// Picks the value with the most votes. Ties go to the smallest value so the result does
/// not depend on link order.
fn majority<T: Ord + Copy>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut votes: BTreeMap<T, usize> = BTreeMap::new();
    for value in values {
        *votes.entry(value).or_default() += 1;
    }
    let mut winner: Option<(T, usize)> = None;
    for (value, count) in votes {
        if winner.is_none_or(|(_, best)| count > best) {
            winner = Some((value, count));
        }
    }
    winner.map(|(value, _)| value)
}

/// Segment-level covariates. Returns `None` for an empty member list.
///
/// Categorical attributes (road type, speed limit, direction) are decided by majority vote,
/// mid-link stress is length-weighted, junction stress is the worst junction, width is the
/// plain mean. The length is the total member length, halved for two-way roads whose
/// opposing carriageways are separate links.
#[must_use]
pub fn segment_covariates(links: &[&NetworkLink]) -> Option<RoadCovariates> {
    if links.is_empty() {
        return None;
    }
    let count = links.len() as f64;
    let total_length: f64 = links.iter().map(|link| link.length).sum();

    let road_type = majority(links.iter().map(|link| link.road_type)).unwrap_or(RoadType::Other);
    // Speed limits are voted on in tenths of km/h.
    let speed_limit = majority(links.iter().map(|link| (link.speed_limit * 10.0).round() as i64))
        .map_or(0.0, |tenths| tenths as f64 / 10.0);
    let two_way_votes = links.iter().filter(|link| link.two_way).count();
    let two_way = two_way_votes * 2 > links.len();

    let link_stress = if total_length > 0.0 {
        links.iter().map(|link| link.link_stress * link.length).sum::<f64>() / total_length
    } else {
        links.iter().map(|link| link.link_stress).sum::<f64>() / count
    };
    let junction_stress = links
        .iter()
        .map(|link| link.junction_stress)
        .fold(f64::NEG_INFINITY, f64::max);
    let width = links.iter().map(|link| link.width).sum::<f64>() / count;
    let allowed_modes = links
        .iter()
        .fold(ModeSet::empty(), |modes, link| modes.union(link.allowed_modes));

    Some(RoadCovariates {
        length: if two_way { total_length / 2.0 } else { total_length },
        road_type,
        speed_limit,
        link_stress,
        junction_stress,
        width,
        two_way,
        allowed_modes,
    })
}

/// Mean hourly flow per mode across the member links. Links without recorded demand count
/// as zero.
#[must_use]
pub fn segment_demand(links: &[&NetworkLink], demand: &TrafficDemand) -> HourlyFlows {
    let mut flows = HourlyFlows::default();
    if links.is_empty() {
        return flows;
    }
    let count = links.len() as f64;
    for mode in Mode::ALL {
        let mut hourly = [0.0; HOURS_PER_DAY];
        for (hour, mean) in hourly.iter_mut().enumerate() {
            *mean = links
                .iter()
                .map(|link| demand.volume(link.id, mode, hour))
                .sum::<f64>()
                / count;
        }
        flows.set_hourly(mode, hourly);
    }
    flows
}

/// Groups the network into segments, ordered by key.
#[must_use]
pub fn aggregate(network: &Network, demand: &TrafficDemand) -> Vec<OsmSegment> {
    let mut groups: BTreeMap<SegmentKey, Vec<&NetworkLink>> = BTreeMap::new();
    for link in network.links() {
        let key = link.osm_id.map_or(SegmentKey::Link(link.id), SegmentKey::Osm);
        groups.entry(key).or_default().push(link);
    }

    let mut segments = Vec::with_capacity(groups.len());
    for (key, mut members) in groups {
        members.sort_by_key(|link| link.id);
        let Some(covariates) = segment_covariates(&members) else {
            continue;
        };
        let total_length: f64 = members.iter().map(|link| link.length).sum();
        segments.push(OsmSegment {
            key,
            links: members.iter().map(|link| (link.id, link.length)).collect(),
            covariates,
            total_length,
            average_length: total_length / members.len() as f64,
            flows: segment_demand(&members, demand),
        });
    }
    segments
}

/// Evaluates the model for every segment and applicable (type, severity), and spreads each
/// result over the member links by length share.
///
/// Segments of zero total length are skipped. A missing coefficient skips only the affected
/// (segment, type, severity). Both are logged and counted in the report; any other model
/// error is returned.
pub fn build_casualty_table(
    network: &Network,
    demand: &TrafficDemand,
    model: &CasualtyRateModel<'_>,
    year: u32,
) -> HealthResult<(LinkCasualtyTable, AggregationReport)> {
    let segments = aggregate(network, demand);
    info!(
        "evaluating casualty model for {} segments ({} links) in {year}",
        segments.len(),
        network.len()
    );

    let mut table = LinkCasualtyTable::new(year);
    let mut report = AggregationReport {
        segments: segments.len(),
        ..AggregationReport::default()
    };

    for segment in &segments {
        if segment.total_length <= 0.0 || !segment.total_length.is_finite() {
            warn!("segment {} has no length, skipping", segment.key);
            report.skipped_segments += 1;
            continue;
        }

        for accident_type in AccidentType::ALL {
            if !accident_type.applies_to(&segment.covariates) {
                continue;
            }
            for severity in AccidentSeverity::ALL {
                let computed = model.compute_hourly(
                    &segment.covariates,
                    &segment.flows,
                    accident_type,
                    severity,
                );
                let rates = match computed {
                    Ok(rates) => rates,
                    Err(
                        error @ (HealthError::MissingCoefficient { .. }
                        | HealthError::MissingCoefficientSet { .. }),
                    ) => {
                        warn!("segment {}: {error}, skipping", segment.key);
                        report.missing_coefficients += 1;
                        continue;
                    }
                    Err(error) => return Err(error),
                };

                for (link_id, length) in &segment.links {
                    let victim_mode = accident_type.victim_mode();
                    let allowed = network
                        .link(*link_id)
                        .is_some_and(|link| link.allowed_modes.contains(victim_mode));
                    if !allowed {
                        continue;
                    }
                    let share = length / segment.total_length;
                    table.insert(*link_id, accident_type, severity, rates.map(|rate| rate * share));
                }
            }
        }
    }

    debug!(
        "casualty table {year}: {} links, {} segments skipped, {} missing coefficients",
        table.len(),
        report.skipped_segments,
        report.missing_coefficients
    );
    Ok((table, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accident::model::tests::full_coefficients;
    use crate::accident::{CoefficientTable, TemporalExpansion};
    use crate::network::tests::link;

    fn unit_model(table: &CoefficientTable) -> CasualtyRateModel<'_> {
        CasualtyRateModel::new(
            table,
            TemporalExpansion {
                light: 1.0,
                severe_fatal: 1.0,
            },
        )
    }

    fn busy_demand(links: &[u64]) -> TrafficDemand {
        let mut demand = TrafficDemand::new();
        for id in links {
            for mode in Mode::ALL {
                demand.set_hourly(LinkId(*id), mode, [100.0; HOURS_PER_DAY]);
            }
        }
        demand
    }

    #[test]
    fn covariates_use_votes_weights_and_maxima() {
        let mut a = link(1, Some(7), 100.0);
        a.road_type = RoadType::Primary;
        a.link_stress = 1.0;
        a.junction_stress = 0.2;
        a.width = 4.0;
        a.two_way = true;
        let mut b = link(2, Some(7), 300.0);
        b.road_type = RoadType::Primary;
        b.link_stress = 0.0;
        b.junction_stress = 0.9;
        b.width = 8.0;
        b.two_way = true;
        let mut c = link(3, Some(7), 0.0);
        c.road_type = RoadType::Service;
        c.speed_limit = 30.0;
        c.width = 6.0;

        let covariates = segment_covariates(&[&a, &b, &c]).unwrap();
        assert_eq!(covariates.road_type, RoadType::Primary);
        assert_eq!(covariates.speed_limit, 50.0);
        assert!(covariates.two_way);
        assert!((covariates.length - 200.0).abs() < 1e-12);
        assert!((covariates.link_stress - 0.25).abs() < 1e-12);
        assert!((covariates.junction_stress - 0.9).abs() < 1e-12);
        assert!((covariates.width - 6.0).abs() < 1e-12);
        assert!(segment_covariates(&[]).is_none());
    }

    #[test]
    fn demand_is_the_member_mean() {
        let a = link(1, Some(7), 100.0);
        let b = link(2, Some(7), 100.0);
        let mut demand = TrafficDemand::new();
        demand.add_volume(LinkId(1), Mode::Bike, 9, 30.0);
        let flows = segment_demand(&[&a, &b], &demand);
        assert_eq!(flows.flow(Mode::Bike, 9), 15.0);
        assert_eq!(flows.flow(Mode::Car, 9), 0.0);
    }

    #[test]
    fn links_group_by_osm_id() {
        let network: Network = [link(1, Some(7), 10.0), link(2, Some(7), 20.0), link(3, None, 5.0)]
            .into_iter()
            .collect();
        let segments = aggregate(&network, &TrafficDemand::new());
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].key, SegmentKey::Osm(7));
        assert_eq!(segments[0].links, vec![(LinkId(1), 10.0), (LinkId(2), 20.0)]);
        assert_eq!(segments[0].average_length, 15.0);
        assert_eq!(segments[1].key, SegmentKey::Link(LinkId(3)));
    }

    fn pedestrian_light() -> CoefficientTable {
        let mut coefficients = CoefficientTable::new();
        coefficients.insert(
            AccidentType::Pedestrian,
            AccidentSeverity::Light,
            full_coefficients(0.0),
        );
        coefficients
    }

    #[test]
    fn rates_are_redistributed_by_length_share() {
        let network: Network = [link(1, Some(7), 100.0), link(2, Some(7), 300.0)]
            .into_iter()
            .collect();
        let coefficients = pedestrian_light();
        let model = unit_model(&coefficients);

        let (table, report) =
            build_casualty_table(&network, &busy_demand(&[1, 2]), &model, 2022).unwrap();
        let rate = |id| {
            table
                .rate(LinkId(id), AccidentType::Pedestrian, AccidentSeverity::Light, 8)
                .unwrap()
        };
        let (first, second) = (rate(1), rate(2));
        assert!((first - 0.125).abs() < 1e-12);
        assert!((second - 0.375).abs() < 1e-12);
        assert_eq!(table.year(), 2022);

        // Minor-road cycling and one-way car collisions apply too but have no coefficients,
        // nor do severe pedestrian casualties.
        assert_eq!(report.missing_coefficients, 5);
        assert_eq!(report.skipped_segments, 0);
    }

    #[test]
    fn zero_length_segments_are_skipped() {
        let network: Network = [link(1, Some(7), 0.0), link(2, Some(7), 0.0)].into_iter().collect();
        let coefficients = pedestrian_light();
        let model = unit_model(&coefficients);

        let (table, report) =
            build_casualty_table(&network, &busy_demand(&[1, 2]), &model, 2022).unwrap();
        assert!(table.is_empty());
        assert_eq!(report.skipped_segments, 1);
        assert_eq!(report.missing_coefficients, 0);
    }

    #[test]
    fn links_closed_to_the_victim_mode_get_no_entry() {
        let mut car_only = link(2, Some(7), 100.0);
        car_only.allowed_modes = [Mode::Car].into_iter().collect();
        let network: Network = [link(1, Some(7), 100.0), car_only].into_iter().collect();
        let coefficients = pedestrian_light();
        let model = unit_model(&coefficients);

        let (table, _) =
            build_casualty_table(&network, &busy_demand(&[1, 2]), &model, 2022).unwrap();
        assert!(table.get(LinkId(1), AccidentType::Pedestrian, AccidentSeverity::Light).is_some());
        assert!(table.get(LinkId(2), AccidentType::Pedestrian, AccidentSeverity::Light).is_none());
    }
}
