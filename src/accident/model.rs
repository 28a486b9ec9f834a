use crate::accident::{AccidentSeverity, AccidentType, CoefficientSet, CoefficientTable};
use crate::error::{HealthError, HealthResult};
use crate::network::{HourlyFlows, Mode, ModeSet, NetworkLink, RoadType};
use crate::week::HOURS_PER_DAY;
use serde::{Deserialize, Serialize};

/// Added to every flow before taking its logarithm.
pub const FLOW_OFFSET: f64 = 1.0;

const INTERCEPT: &str = "intercept";
const LOG_CAR_FLOW: &str = "log_car_flow";
const LOG_BIKE_FLOW: &str = "log_bike_flow";
const LOG_PED_FLOW: &str = "log_ped_flow";
const LOG_LENGTH: &str = "log_length";
const LINK_STRESS: &str = "link_stress";
const JUNCTION_STRESS: &str = "junction_stress";
const WIDTH: &str = "width";

/// Converts model output to the rate basis of the casualty tables, e.g. crashes observed
/// over several years to a per-day probability.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalExpansion {
    pub light: f64,
    pub severe_fatal: f64,
}

impl Default for TemporalExpansion {
    fn default() -> Self {
        TemporalExpansion {
            light: 365.0,
            severe_fatal: 365.0,
        }
    }
}

impl TemporalExpansion {
    #[must_use]
    pub fn factor(&self, severity: AccidentSeverity) -> f64 {
        match severity {
            AccidentSeverity::Light => self.light,
            AccidentSeverity::SevereFatal => self.severe_fatal,
        }
    }
}

/// The static covariates of a link or an OSM segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadCovariates {
    pub length: f64,
    pub road_type: RoadType,
    pub speed_limit: f64,
    pub link_stress: f64,
    pub junction_stress: f64,
    pub width: f64,
    pub two_way: bool,
    pub allowed_modes: ModeSet,
}

impl From<&NetworkLink> for RoadCovariates {
    fn from(link: &NetworkLink) -> Self {
        RoadCovariates {
            length: link.length,
            road_type: link.road_type,
            speed_limit: link.speed_limit,
            link_stress: link.link_stress,
            junction_stress: link.junction_stress,
            width: link.width,
            two_way: link.two_way,
            allowed_modes: link.allowed_modes,
        }
    }
}

/// Speed limit category used for the `speed:<band>` dummy.
#[must_use]
pub fn speed_band(speed_limit: f64) -> &'static str {
    if speed_limit <= 30.0 {
        "30"
    } else if speed_limit <= 50.0 {
        "50"
    } else if speed_limit <= 70.0 {
        "70"
    } else {
        "high"
    }
}

fn sigmoid(utility: f64) -> f64 {
    if utility >= 0.0 {
        1.0 / (1.0 + (-utility).exp())
    } else {
        let e = utility.exp();
        e / (1.0 + e)
    }
}

fn log_flow(flows: &HourlyFlows, mode: Mode, hour: usize) -> f64 {
    (flows.flow(mode, hour) + FLOW_OFFSET).ln()
}

/// The value of a named continuous covariate; `None` for names the model does not know.
fn covariate_value(
    name: &str,
    road: &RoadCovariates,
    flows: &HourlyFlows,
    hour: usize,
) -> Option<f64> {
    let value = match name {
        INTERCEPT => 1.0,
        LOG_CAR_FLOW => log_flow(flows, Mode::Car, hour),
        LOG_BIKE_FLOW => log_flow(flows, Mode::Bike, hour),
        LOG_PED_FLOW => log_flow(flows, Mode::Walk, hour),
        // Sub-metre lengths are treated as one metre.
        LOG_LENGTH => road.length.max(1.0).ln(),
        LINK_STRESS => road.link_stress,
        JUNCTION_STRESS => road.junction_stress,
        WIDTH => road.width,
        _ => {
            let road_type = name.strip_prefix("road_type:");
            let speed = name.strip_prefix("speed:");
            let indicator = |matches: bool| if matches { 1.0 } else { 0.0 };
            return match (road_type, speed) {
                (Some(road_type), _) => Some(indicator(road_type == road.road_type.name())),
                (_, Some(band)) => Some(indicator(band == speed_band(road.speed_limit))),
                _ => None,
            };
        }
    };
    Some(value)
}

/// Logistic casualty-rate model evaluated against the loaded coefficient table.
#[derive(Clone, Copy, Debug)]
pub struct CasualtyRateModel<'a> {
    coefficients: &'a CoefficientTable,
    expansion: TemporalExpansion,
}

impl<'a> CasualtyRateModel<'a> {
    #[must_use]
    pub fn new(coefficients: &'a CoefficientTable, expansion: TemporalExpansion) -> Self {
        CasualtyRateModel {
            coefficients,
            expansion,
        }
    }

    /// `U = Σ β_i x_i` over the full covariate vector. Every present covariate needs a
    /// coefficient, including the dummies for the road's type and speed band.
    fn utility(
        &self,
        set: &CoefficientSet,
        road: &RoadCovariates,
        flows: &HourlyFlows,
        hour: usize,
        accident_type: AccidentType,
        severity: AccidentSeverity,
    ) -> HealthResult<f64> {
        let road_type_term = format!("road_type:{}", road.road_type.name());
        let speed_term = format!("speed:{}", speed_band(road.speed_limit));
        let terms = [
            INTERCEPT,
            LOG_CAR_FLOW,
            LOG_BIKE_FLOW,
            LOG_PED_FLOW,
            LOG_LENGTH,
            LINK_STRESS,
            JUNCTION_STRESS,
            WIDTH,
            road_type_term.as_str(),
            speed_term.as_str(),
        ];

        let mut utility = 0.0;
        for term in terms {
            let coefficient = set.get(term).ok_or_else(|| HealthError::MissingCoefficient {
                accident_type,
                severity,
                covariate: term.to_string(),
            })?;
            let value = covariate_value(term, road, flows, hour).unwrap_or(0.0);
            utility += coefficient * value;
        }
        Ok(utility)
    }

    /// Probability of a structural zero, from the terms listed in the zero-inflation part.
    fn zero_probability(
        &self,
        zero_inflation: &rustc_hash::FxHashMap<String, f64>,
        road: &RoadCovariates,
        flows: &HourlyFlows,
        hour: usize,
    ) -> HealthResult<f64> {
        let mut utility = 0.0;
        for (term, coefficient) in zero_inflation {
            let value = covariate_value(term, road, flows, hour).ok_or_else(|| {
                HealthError::Config(format!("unknown zero-inflation covariate '{term}'"))
            })?;
            utility += coefficient * value;
        }
        Ok(sigmoid(utility))
    }

    /// Casualty probability for one hour of the day, in `[0, 1]`.
    pub fn compute_rate(
        &self,
        road: &RoadCovariates,
        flows: &HourlyFlows,
        accident_type: AccidentType,
        severity: AccidentSeverity,
        hour: usize,
    ) -> HealthResult<f64> {
        let set = self
            .coefficients
            .get(accident_type, severity)
            .ok_or(HealthError::MissingCoefficientSet {
                accident_type,
                severity,
            })?;

        // Nobody of the victim mode is on the road; only a zero-inflated model has an
        // answer for that situation.
        let victim_flow = flows.flow(accident_type.victim_mode(), hour);
        if victim_flow == 0.0 && !set.has_zero_inflation() {
            return Ok(0.0);
        }

        let utility = self.utility(set, road, flows, hour, accident_type, severity)?;
        let mut probability = sigmoid(utility);
        if let Some(zero_inflation) = set.zero_inflation() {
            probability *= 1.0 - self.zero_probability(zero_inflation, road, flows, hour)?;
        }

        let rate = probability / self.expansion.factor(severity);
        Ok(if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 })
    }

    /// Rates for all 24 hours of the day.
    pub fn compute_hourly(
        &self,
        road: &RoadCovariates,
        flows: &HourlyFlows,
        accident_type: AccidentType,
        severity: AccidentSeverity,
    ) -> HealthResult<[f64; HOURS_PER_DAY]> {
        let mut rates = [0.0; HOURS_PER_DAY];
        for (hour, rate) in rates.iter_mut().enumerate() {
            *rate = self.compute_rate(road, flows, accident_type, severity, hour)?;
        }
        Ok(rates)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::accident::AccidentSeverity::{Light, SevereFatal};

    pub(crate) fn full_coefficients(intercept: f64) -> CoefficientSet {
        let mut set = CoefficientSet::new()
            .with(INTERCEPT, intercept)
            .with(LOG_CAR_FLOW, 0.0)
            .with(LOG_BIKE_FLOW, 0.0)
            .with(LOG_PED_FLOW, 0.0)
            .with(LOG_LENGTH, 0.0)
            .with(LINK_STRESS, 0.0)
            .with(JUNCTION_STRESS, 0.0)
            .with(WIDTH, 0.0);
        for road_type in RoadType::ALL {
            set.insert(&format!("road_type:{}", road_type.name()), 0.0);
        }
        for band in ["30", "50", "70", "high"] {
            set.insert(&format!("speed:{band}"), 0.0);
        }
        set
    }

    pub(crate) fn road() -> RoadCovariates {
        RoadCovariates {
            length: 100.0,
            road_type: RoadType::Residential,
            speed_limit: 50.0,
            link_stress: 0.5,
            junction_stress: 0.2,
            width: 6.0,
            two_way: true,
            allowed_modes: ModeSet::all(),
        }
    }

    fn flows(car: f64, walk: f64) -> HourlyFlows {
        let mut flows = HourlyFlows::default();
        flows.set_hourly(Mode::Car, [car; HOURS_PER_DAY]);
        flows.set_hourly(Mode::Walk, [walk; HOURS_PER_DAY]);
        flows
    }

    fn unit_expansion() -> TemporalExpansion {
        TemporalExpansion {
            light: 1.0,
            severe_fatal: 1.0,
        }
    }

    #[test]
    fn logistic_of_linear_utility() {
        let set = full_coefficients(-2.0)
            .with(LOG_CAR_FLOW, 0.5)
            .with("road_type:residential", 0.25);
        let mut table = CoefficientTable::new();
        table.insert(AccidentType::Pedestrian, AccidentSeverity::SevereFatal, set);
        let model = CasualtyRateModel::new(&table, unit_expansion());

        let rate = model
            .compute_rate(
                &road(),
                &flows(99.0, 10.0),
                AccidentType::Pedestrian,
                AccidentSeverity::SevereFatal,
                8,
            )
            .unwrap();
        let utility: f64 = -2.0 + 0.5 * 100f64.ln() + 0.25;
        let expected = 1.0 / (1.0 + (-utility).exp());
        assert!((rate - expected).abs() < 1e-12);
    }

    #[test]
    fn expansion_factor_divides_the_probability() {
        let mut table = CoefficientTable::new();
        table.insert(AccidentType::Pedestrian, AccidentSeverity::Light, full_coefficients(0.0));
        let expansion = TemporalExpansion {
            light: 4.0,
            severe_fatal: 1.0,
        };
        let model = CasualtyRateModel::new(&table, expansion);
        let rate = model
            .compute_rate(&road(), &flows(1.0, 1.0), AccidentType::Pedestrian, Light, 0)
            .unwrap();
        assert!((rate - 0.125).abs() < 1e-12);
    }

    #[test]
    fn zero_victim_demand_forces_zero() {
        let mut table = CoefficientTable::new();
        table.insert(AccidentType::Pedestrian, AccidentSeverity::Light, full_coefficients(3.0));
        let model = CasualtyRateModel::new(&table, unit_expansion());
        let rate = model
            .compute_rate(&road(), &flows(500.0, 0.0), AccidentType::Pedestrian, Light, 12)
            .unwrap();
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn zero_inflated_model_answers_for_zero_demand() {
        let set = full_coefficients(0.0).with("zi:intercept", 0.0);
        let mut table = CoefficientTable::new();
        table.insert(AccidentType::Pedestrian, AccidentSeverity::Light, set);
        let model = CasualtyRateModel::new(&table, unit_expansion());
        let rate = model
            .compute_rate(&road(), &flows(0.0, 0.0), AccidentType::Pedestrian, Light, 3)
            .unwrap();
        // (1 - σ(0)) * σ(0)
        assert!((rate - 0.25).abs() < 1e-12);
    }

    #[test]
    fn missing_coefficient_for_present_covariate() {
        let mut set = CoefficientSet::new().with(INTERCEPT, -1.0).with(LOG_CAR_FLOW, 0.1);
        set.insert(LOG_PED_FLOW, 0.1);
        let mut table = CoefficientTable::new();
        table.insert(AccidentType::Pedestrian, AccidentSeverity::Light, set);
        let model = CasualtyRateModel::new(&table, unit_expansion());
        let result =
            model.compute_rate(&road(), &flows(10.0, 10.0), AccidentType::Pedestrian, Light, 3);
        assert!(matches!(
            result,
            Err(HealthError::MissingCoefficient { covariate, .. }) if covariate == LOG_BIKE_FLOW
        ));
    }

    #[test]
    fn missing_set_is_reported() {
        let table = CoefficientTable::new();
        let model = CasualtyRateModel::new(&table, unit_expansion());
        let result =
            model.compute_rate(&road(), &flows(1.0, 1.0), AccidentType::CarTwoWay, Light, 0);
        assert!(matches!(result, Err(HealthError::MissingCoefficientSet { .. })));
    }

    #[test]
    fn hourly_rates_are_probabilities() {
        let set = full_coefficients(5.0).with(LOG_CAR_FLOW, 3.0).with(WIDTH, 2.0);
        let mut table = CoefficientTable::new();
        table.insert(AccidentType::CarTwoWay, AccidentSeverity::SevereFatal, set);
        let expansion = TemporalExpansion {
            light: 0.5,
            severe_fatal: 0.5,
        };
        let model = CasualtyRateModel::new(&table, expansion);

        let mut hourly = HourlyFlows::default();
        let mut volumes = [0.0; HOURS_PER_DAY];
        for (hour, volume) in volumes.iter_mut().enumerate() {
            *volume = (hour * 150) as f64;
        }
        hourly.set_hourly(Mode::Car, volumes);

        let rates = model
            .compute_hourly(&road(), &hourly, AccidentType::CarTwoWay, SevereFatal)
            .unwrap();
        assert_eq!(rates[0], 0.0);
        assert!(rates.iter().all(|rate| (0.0..=1.0).contains(rate)));
    }

    #[test]
    fn speed_bands() {
        assert_eq!(speed_band(30.0), "30");
        assert_eq!(speed_band(40.0), "50");
        assert_eq!(speed_band(70.0), "70");
        assert_eq!(speed_band(100.0), "high");
    }
}
