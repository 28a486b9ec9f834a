/*!

Yearly disease transitions.

Chronic diseases start from a baseline rate for the person's age, gender and location, scaled
by the relative risks of their normalised exposures and by interactions with diseases they
already have. Injuries come straight from the year's accumulated injury risk. All-cause
mortality is decided last. There is no recovery: once acquired, a disease stays.

*/

mod dose_response;
mod engine;
mod transition;

pub use dose_response::{DoseResponseCurve, DoseResponseTable};
pub use engine::{DiseaseModel, ProbabilityReport, TransitionOutcome};
pub(crate) use engine::DiseaseRng;
pub use transition::{TransitionTable, MAX_AGE};

use crate::error::HealthError;
use crate::network::Mode;
use crate::person::Gender;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fmt, str::FromStr};

/// Diseases in the order their outcomes are drawn each year. All-cause mortality comes last.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disease {
    #[serde(rename = "ihd")]
    IschemicHeartDisease,
    Stroke,
    Diabetes,
    BreastCancer,
    ColonCancer,
    LungCancer,
    Copd,
    Depression,
    Dementia,
    SeverelyInjuredWalk,
    SeverelyInjuredBike,
    SeverelyInjuredCar,
    KilledWalk,
    KilledBike,
    KilledCar,
    AllCauseMortality,
}

impl Disease {
    pub const ALL: [Disease; 16] = [
        Disease::IschemicHeartDisease,
        Disease::Stroke,
        Disease::Diabetes,
        Disease::BreastCancer,
        Disease::ColonCancer,
        Disease::LungCancer,
        Disease::Copd,
        Disease::Depression,
        Disease::Dementia,
        Disease::SeverelyInjuredWalk,
        Disease::SeverelyInjuredBike,
        Disease::SeverelyInjuredCar,
        Disease::KilledWalk,
        Disease::KilledBike,
        Disease::KilledCar,
        Disease::AllCauseMortality,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Disease::IschemicHeartDisease => "ihd",
            Disease::Stroke => "stroke",
            Disease::Diabetes => "diabetes",
            Disease::BreastCancer => "breast_cancer",
            Disease::ColonCancer => "colon_cancer",
            Disease::LungCancer => "lung_cancer",
            Disease::Copd => "copd",
            Disease::Depression => "depression",
            Disease::Dementia => "dementia",
            Disease::SeverelyInjuredWalk => "severely_injured_walk",
            Disease::SeverelyInjuredBike => "severely_injured_bike",
            Disease::SeverelyInjuredCar => "severely_injured_car",
            Disease::KilledWalk => "killed_walk",
            Disease::KilledBike => "killed_bike",
            Disease::KilledCar => "killed_car",
            Disease::AllCauseMortality => "all_cause_mortality",
        }
    }

    /// The travel mode of an injury, `None` for every other disease.
    #[must_use]
    pub fn injury_mode(self) -> Option<Mode> {
        match self {
            Disease::SeverelyInjuredWalk | Disease::KilledWalk => Some(Mode::Walk),
            Disease::SeverelyInjuredBike | Disease::KilledBike => Some(Mode::Bike),
            Disease::SeverelyInjuredCar | Disease::KilledCar => Some(Mode::Car),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            Disease::KilledWalk
                | Disease::KilledBike
                | Disease::KilledCar
                | Disease::AllCauseMortality
        )
    }

    /// Everything but injuries and all-cause mortality.
    #[must_use]
    pub fn is_chronic(self) -> bool {
        self.injury_mode().is_none() && self != Disease::AllCauseMortality
    }

    #[must_use]
    pub fn applies_to(self, gender: Gender) -> bool {
        match self {
            Disease::BreastCancer => gender == Gender::Female,
            _ => true,
        }
    }
}

impl fmt::Display for Disease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Disease {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "ischemic_heart_disease" | "coronary_heart_disease" => {
                Ok(Disease::IschemicHeartDisease)
            }
            "all_cause" | "mortality" | "dead" => Ok(Disease::AllCauseMortality),
            _ => Disease::ALL
                .into_iter()
                .find(|disease| disease.name() == lower)
                .ok_or_else(|| HealthError::UnknownDisease(s.to_string())),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureCategory {
    PhysicalActivity,
    Pm25,
    No2,
    Noise,
    Greenness,
}

impl ExposureCategory {
    pub const ALL: [ExposureCategory; 5] = [
        ExposureCategory::PhysicalActivity,
        ExposureCategory::Pm25,
        ExposureCategory::No2,
        ExposureCategory::Noise,
        ExposureCategory::Greenness,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ExposureCategory::PhysicalActivity => "physical_activity",
            ExposureCategory::Pm25 => "pm25",
            ExposureCategory::No2 => "no2",
            ExposureCategory::Noise => "noise",
            ExposureCategory::Greenness => "greenness",
        }
    }
}

impl fmt::Display for ExposureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExposureCategory {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "physical_activity" | "pa" | "mmet" => Ok(ExposureCategory::PhysicalActivity),
            "pm25" | "pm2.5" => Ok(ExposureCategory::Pm25),
            "no2" => Ok(ExposureCategory::No2),
            "noise" | "lden" => Ok(ExposureCategory::Noise),
            "greenness" | "ndvi" => Ok(ExposureCategory::Greenness),
            _ => Err(HealthError::UnknownExposureCategory(s.to_string())),
        }
    }
}

/// Relative risk per disease and exposure category; absent pairs are 1.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RelativeRisks(BTreeMap<Disease, BTreeMap<ExposureCategory, f64>>);

impl RelativeRisks {
    pub fn set(&mut self, category: ExposureCategory, disease: Disease, relative_risk: f64) {
        self.0.entry(disease).or_default().insert(category, relative_risk);
    }

    #[must_use]
    pub fn get(&self, category: ExposureCategory, disease: Disease) -> f64 {
        self.0
            .get(&disease)
            .and_then(|risks| risks.get(&category))
            .copied()
            .unwrap_or(1.0)
    }

    /// Product over all categories for `disease`.
    #[must_use]
    pub fn combined(&self, disease: Disease) -> f64 {
        self.0
            .get(&disease)
            .map_or(1.0, |risks| risks.values().product())
    }
}
