use crate::network::Mode;
use crate::params::ModeValues;
use crate::week::is_in_window;
use serde::{Deserialize, Serialize};

/// Resting minute ventilation in m³/h. Night hours use the sleeping rate.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VentilationRates {
    pub rest_day: f64,
    pub rest_night: f64,
    /// First hour of the night regime.
    pub night_start: usize,
    /// First hour after the night regime.
    pub night_end: usize,
}

impl Default for VentilationRates {
    fn default() -> Self {
        VentilationRates {
            rest_day: 0.61,
            rest_night: 0.27,
            night_start: 23,
            night_end: 7,
        }
    }
}

impl VentilationRates {
    #[must_use]
    pub fn is_night(&self, hour_of_day: usize) -> bool {
        is_in_window(hour_of_day, self.night_start, self.night_end)
    }

    /// The minimum ventilation at this hour, used both for time at rest and to normalise
    /// accumulated doses back to concentrations.
    #[must_use]
    pub fn resting(&self, hour_of_day: usize) -> f64 {
        if self.is_night(hour_of_day) {
            self.rest_night
        } else {
            self.rest_day
        }
    }
}

/// Marginal MET (above rest) of travelling by `mode` at `speed_kmh`.
#[must_use]
pub fn marginal_met(mode: Mode, speed_kmh: f64) -> f64 {
    let met = match mode {
        Mode::Walk => {
            if speed_kmh < 3.2 {
                2.0
            } else if speed_kmh < 4.8 {
                3.0
            } else if speed_kmh < 6.4 {
                3.5
            } else {
                5.0
            }
        }
        Mode::Bike => {
            if speed_kmh < 16.0 {
                4.0
            } else if speed_kmh < 19.3 {
                6.8
            } else if speed_kmh < 22.5 {
                8.0
            } else {
                10.0
            }
        }
        Mode::Car | Mode::PublicTransport => return 0.0,
    };
    met - 1.0
}

/// Converts concentrations and time into inhaled doses.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DoseModel {
    pub ventilation: VentilationRates,
    pub infiltration: ModeValues,
}

impl DoseModel {
    #[must_use]
    pub fn new(ventilation: VentilationRates, infiltration: ModeValues) -> Self {
        DoseModel {
            ventilation,
            infiltration,
        }
    }

    /// Ventilation while travelling: the daytime resting rate scaled by the effort.
    #[must_use]
    pub fn travel_ventilation(&self, marginal_met: f64) -> f64 {
        self.ventilation.rest_day * (1.0 + marginal_met)
    }

    /// Dose inhaled while travelling through `concentration` for `hours`.
    #[must_use]
    pub fn travel_dose(
        &self,
        concentration: f64,
        mode: Mode,
        marginal_met: f64,
        hours: f64,
    ) -> f64 {
        concentration * self.infiltration.get(mode) * self.travel_ventilation(marginal_met) * hours
    }

    /// Dose inhaled at rest in a building during `hour_of_day`.
    #[must_use]
    pub fn resting_dose(&self, concentration: f64, hour_of_day: usize, hours: f64) -> f64 {
        concentration * self.ventilation.resting(hour_of_day) * hours
    }
}

impl Default for DoseModel {
    fn default() -> Self {
        DoseModel::new(VentilationRates::default(), ModeValues::uniform(1.0))
    }
}
