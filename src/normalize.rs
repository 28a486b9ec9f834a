/*!

Turns a person's hour-bucketed accumulators into weekly scalars comparable across people:

- pollutants: the mean concentration breathed, `Σ_h dose[h] / max(1, occupancy[h]) /
  resting_ventilation(h) / 168`;
- noise: Lden (evening +5 dB, night +10 dB) and Lnight, each `10·log10` of the mean hourly
  sound energy over the occupied hours;
- greenness: NDVI weighted by time;
- physical activity: marginal MET-hours per week.

*/

use crate::disease::ExposureCategory;
use crate::exposure::{PersonExposure, Pollutant, VentilationRates};
use crate::week::{is_in_window, HOURS_PER_DAY, HOURS_PER_WEEK};
use serde::{Deserialize, Serialize};

const EVENING_START: usize = 19;
const EVENING_PENALTY_DB: f64 = 5.0;
const NIGHT_PENALTY_DB: f64 = 10.0;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyExposure {
    /// Mean concentration per pollutant, indexed by [`Pollutant::index`].
    pub pollutants: [f64; Pollutant::COUNT],
    pub noise_lden: f64,
    pub noise_lnight: f64,
    pub greenness: f64,
    pub marginal_met_hours: f64,
}

impl WeeklyExposure {
    #[must_use]
    pub fn pollutant(&self, pollutant: Pollutant) -> f64 {
        self.pollutants[pollutant.index()]
    }

    /// The level used to look up relative risks for `category`.
    #[must_use]
    pub fn level(&self, category: ExposureCategory) -> f64 {
        match category {
            ExposureCategory::PhysicalActivity => self.marginal_met_hours,
            ExposureCategory::Pm25 => self.pollutant(Pollutant::Pm25),
            ExposureCategory::No2 => self.pollutant(Pollutant::No2),
            ExposureCategory::Noise => self.noise_lden,
            ExposureCategory::Greenness => self.greenness,
        }
    }
}

fn decibels(energy_sum: f64, hours: usize) -> f64 {
    if hours == 0 || energy_sum <= 0.0 {
        return 0.0;
    }
    10.0 * (energy_sum / hours as f64).log10()
}

#[must_use]
pub fn normalize(exposure: &PersonExposure, ventilation: &VentilationRates) -> WeeklyExposure {
    let mut weekly = WeeklyExposure::default();

    for pollutant in Pollutant::ALL {
        let dose = exposure.dose(pollutant);
        let total: f64 = (0..HOURS_PER_WEEK)
            .map(|bucket| {
                let occupancy = exposure.occupancy.get(bucket).max(1.0);
                dose.get(bucket) / occupancy / ventilation.resting(bucket % HOURS_PER_DAY)
            })
            .sum();
        weekly.pollutants[pollutant.index()] = total / HOURS_PER_WEEK as f64;
    }

    let evening_factor = 10f64.powf(EVENING_PENALTY_DB / 10.0);
    let night_factor = 10f64.powf(NIGHT_PENALTY_DB / 10.0);
    let (mut lden_sum, mut lden_hours) = (0.0, 0);
    let (mut night_sum, mut night_hours) = (0.0, 0);
    for bucket in 0..HOURS_PER_WEEK {
        let occupancy = exposure.occupancy.get(bucket);
        if occupancy <= 0.0 {
            continue;
        }
        let energy = exposure.noise_energy.get(bucket) / occupancy.max(1.0);
        let hour_of_day = bucket % HOURS_PER_DAY;
        if ventilation.is_night(hour_of_day) {
            lden_sum += energy * night_factor;
            night_sum += energy;
            night_hours += 1;
        } else if is_in_window(hour_of_day, EVENING_START, ventilation.night_start) {
            lden_sum += energy * evening_factor;
        } else {
            lden_sum += energy;
        }
        lden_hours += 1;
    }
    weekly.noise_lden = decibels(lden_sum, lden_hours);
    weekly.noise_lnight = decibels(night_sum, night_hours);

    weekly.greenness = if exposure.hours > 0.0 {
        exposure.ndvi_hours / exposure.hours
    } else {
        0.0
    };
    weekly.marginal_met_hours = exposure.total_marginal_met_hours();
    weekly
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Mode;

    fn full_week() -> PersonExposure {
        let mut exposure = PersonExposure::new();
        for bucket in 0..HOURS_PER_WEEK {
            exposure.occupancy.add(bucket, 1.0);
        }
        exposure.hours = HOURS_PER_WEEK as f64;
        exposure
    }

    #[test]
    fn constant_intensity_round_trips() {
        let ventilation = VentilationRates::default();
        let c = 17.5;
        let mut exposure = full_week();
        for bucket in 0..HOURS_PER_WEEK {
            let dose = c * ventilation.resting(bucket % HOURS_PER_DAY);
            exposure.dose[Pollutant::Pm25.index()].add(bucket, dose);
        }
        let weekly = normalize(&exposure, &ventilation);
        assert!((weekly.pollutant(Pollutant::Pm25) - c).abs() < 1e-9);
        assert_eq!(weekly.pollutant(Pollutant::No2), 0.0);
    }

    #[test]
    fn constant_noise_gives_penalised_lden_and_plain_lnight() {
        let ventilation = VentilationRates::default();
        let mut exposure = full_week();
        for bucket in 0..HOURS_PER_WEEK {
            exposure.noise_energy.add(bucket, 10f64.powf(5.5));
        }
        let weekly = normalize(&exposure, &ventilation);
        assert!((weekly.noise_lnight - 55.0).abs() < 1e-9);

        // 12 day hours, 4 evening hours (+5 dB), 8 night hours (+10 dB).
        let weighted_hours = 12.0 + 4.0 * 10f64.powf(0.5) + 8.0 * 10.0;
        let expected = 10.0 * (weighted_hours / 24.0 * 10f64.powf(5.5)).log10();
        assert!((weekly.noise_lden - expected).abs() < 1e-9);
    }

    #[test]
    fn empty_week_is_all_zero() {
        let weekly = normalize(&PersonExposure::new(), &VentilationRates::default());
        assert_eq!(weekly, WeeklyExposure::default());
    }

    #[test]
    fn greenness_and_activity() {
        let mut exposure = full_week();
        exposure.ndvi_hours = 0.3 * HOURS_PER_WEEK as f64;
        exposure.marginal_met_hours[Mode::Walk.index()] = 2.0;
        exposure.marginal_met_hours[Mode::Bike.index()] = 4.5;
        let weekly = normalize(&exposure, &VentilationRates::default());
        assert!((weekly.greenness - 0.3).abs() < 1e-12);
        assert_eq!(weekly.marginal_met_hours, 6.5);
        assert_eq!(weekly.level(ExposureCategory::PhysicalActivity), 6.5);
        assert_eq!(weekly.level(ExposureCategory::Greenness), weekly.greenness);
    }
}
