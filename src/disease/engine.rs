use crate::accident::AccidentSeverity;
use crate::disease::{Disease, DoseResponseTable, TransitionTable, MAX_AGE};
use crate::log::{trace, warn};
use crate::params::DiseaseSettings;
use crate::person::{HealthRecord, PersonHealth};
use rand::Rng;
use serde::Serialize;

crate::define_rng!(DiseaseRng);

/// Counters from one call to [`DiseaseModel::update_probabilities`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProbabilityReport {
    pub missing_transitions: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub new_cases: Vec<Disease>,
    /// Set when the person died this year.
    pub death: Option<Disease>,
}

/// The yearly disease update for one person at a time.
#[derive(Clone, Copy)]
pub struct DiseaseModel<'a> {
    transitions: &'a TransitionTable,
    dose_response: &'a DoseResponseTable,
    settings: &'a DiseaseSettings,
}

impl<'a> DiseaseModel<'a> {
    #[must_use]
    pub fn new(
        transitions: &'a TransitionTable,
        dose_response: &'a DoseResponseTable,
        settings: &'a DiseaseSettings,
    ) -> Self {
        DiseaseModel {
            transitions,
            dose_response,
            settings,
        }
    }

    /// Recomputes the person's relative risks from their weekly exposure.
    pub fn update_relative_risks(&self, person: &mut PersonHealth) {
        person.relative_risks = self.dose_response.relative_risks(&person.weekly);
    }

    fn baseline(
        &self,
        person: &PersonHealth,
        disease: Disease,
        report: &mut ProbabilityReport,
    ) -> Option<f64> {
        let demographics = &person.demographics;
        let value = self
            .transitions
            .get(disease, demographics.age, demographics.gender, &demographics.location);
        if value.is_none() {
            warn!(
                "no {disease} transition for age {}, {}, {}; skipping",
                demographics.age.min(MAX_AGE),
                demographics.gender,
                demographics.location
            );
            report.missing_transitions += 1;
        }
        value
    }

    fn risk_multiplier(&self, person: &PersonHealth, disease: Disease) -> f64 {
        if self.settings.risk_adjustment {
            person.relative_risks.combined(disease)
        } else {
            1.0
        }
    }

    fn interaction_multiplier(&self, person: &PersonHealth, disease: Disease) -> f64 {
        self.settings
            .interactions
            .iter()
            .filter(|interaction| interaction.target == disease)
            .filter(|interaction| {
                interaction
                    .gender
                    .is_none_or(|gender| gender == person.demographics.gender)
            })
            .filter(|interaction| person.has_disease(interaction.given))
            .map(|interaction| interaction.multiplier)
            .product()
    }

    /// Annual probability of a severe-or-fatal injury while travelling by the injury's mode,
    /// split into its fatal and non-fatal share.
    fn injury_probability(&self, person: &PersonHealth, disease: Disease) -> f64 {
        let Some(mode) = disease.injury_mode() else {
            return 0.0;
        };
        let weekly = person.exposure.injury_risk(mode, AccidentSeverity::SevereFatal);
        let annual = 1.0 - (1.0 - weekly).powf(self.settings.weeks_per_year);
        let fatal_ratio = self.settings.fatal_ratio.get(mode).clamp(0.0, 1.0);
        if disease.is_fatal() {
            annual * fatal_ratio
        } else {
            annual * (1.0 - fatal_ratio)
        }
    }

    /// Fills `person.probabilities` for this year. Diseases with no transition entry, diseases
    /// that do not apply to the person's gender, and all chronic diseases for persons below
    /// the minimum age get no probability.
    pub fn update_probabilities(&self, person: &mut PersonHealth) -> ProbabilityReport {
        let mut report = ProbabilityReport::default();
        person.probabilities.clear();
        let age = person.demographics.age;

        for disease in Disease::ALL {
            let probability = if disease == Disease::AllCauseMortality {
                if age >= MAX_AGE {
                    Some(1.0)
                } else {
                    self.baseline(person, disease, &mut report)
                        .map(|baseline| (baseline * self.risk_multiplier(person, disease)).min(1.0))
                }
            } else if disease.injury_mode().is_some() {
                Some(self.injury_probability(person, disease))
            } else {
                if !disease.applies_to(person.demographics.gender) || age < self.settings.min_age {
                    continue;
                }
                self.baseline(person, disease, &mut report).map(|baseline| {
                    let rate = baseline
                        * self.risk_multiplier(person, disease)
                        * self.interaction_multiplier(person, disease);
                    1.0 - (-rate).exp()
                })
            };
            if let Some(probability) = probability {
                person.probabilities.insert(disease, probability.clamp(0.0, 1.0));
            }
        }
        report
    }

    /// Draws this year's outcomes. One uniform number is drawn for every disease in taxonomy
    /// order whether or not it can happen, so the stream stays aligned across persons and
    /// repeated calls. Mortality is decided last; a fatal injury also counts as death.
    pub fn update_states<R: Rng>(
        &self,
        person: &mut PersonHealth,
        year: u32,
        rng: &mut R,
    ) -> TransitionOutcome {
        let mut outcome = TransitionOutcome::default();

        for disease in Disease::ALL {
            let draw: f64 = rng.random();
            if disease == Disease::AllCauseMortality {
                continue;
            }
            let probability = person.probabilities.get(&disease).copied().unwrap_or(0.0);
            if draw < probability && person.add_disease(disease) {
                trace!("new case of {disease} in {year}");
                outcome.new_cases.push(disease);
            }
        }
        person.history.insert(year, person.current_record());

        let mortality_draw: f64 = rng.random();
        let mortality = person
            .probabilities
            .get(&Disease::AllCauseMortality)
            .copied()
            .unwrap_or(0.0);
        outcome.death = if mortality_draw < mortality {
            Some(Disease::AllCauseMortality)
        } else {
            outcome.new_cases.iter().copied().find(|disease| disease.is_fatal())
        };
        if let Some(cause) = outcome.death {
            let diseases = person.diseases.clone();
            person.history.insert(year, HealthRecord::Dead { cause, diseases });
        }
        outcome
    }
}
