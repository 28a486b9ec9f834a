/*!

The simulated population as seen by the health model.

Demographics come from outside and are only read here. Everything the pipeline computes for
a person (the year's exposure, its normalised form, relative risks, disease probabilities and
the disease history) lives in that person's [`PersonHealth`]. When a person dies their
history moves from the live population to the deceased archive.

*/

use crate::context::Context;
use crate::disease::{Disease, RelativeRisks};
use crate::error::HealthError;
use crate::exposure::{LocationKey, PersonExposure};
use crate::log::trace;
use crate::normalize::WeeklyExposure;
use crate::PersonId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fmt, str::FromStr};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => f.write_str("male"),
            Gender::Female => f.write_str("female"),
        }
    }
}

impl FromStr for Gender {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "1" => Ok(Gender::Male),
            "female" | "f" | "2" => Ok(Gender::Female),
            _ => Err(HealthError::UnknownGender(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: u32,
    pub gender: Gender,
    /// Location code used to look up baseline transition rates.
    pub location: String,
    pub home: Option<LocationKey>,
}

/// A person's state in one year.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthRecord {
    Healthy,
    Sick(Vec<Disease>),
    /// Died of `cause` while `diseases` were active.
    Dead {
        cause: Disease,
        diseases: Vec<Disease>,
    },
}

pub type HealthHistory = BTreeMap<u32, HealthRecord>;

#[derive(Clone, Debug, Serialize)]
pub struct PersonHealth {
    pub demographics: Demographics,
    pub exposure: PersonExposure,
    pub weekly: WeeklyExposure,
    pub relative_risks: RelativeRisks,
    /// Active diseases in the order they were acquired.
    pub diseases: Vec<Disease>,
    pub probabilities: BTreeMap<Disease, f64>,
    pub history: HealthHistory,
}

impl PersonHealth {
    #[must_use]
    pub fn new(demographics: Demographics) -> Self {
        PersonHealth {
            demographics,
            exposure: PersonExposure::default(),
            weekly: WeeklyExposure::default(),
            relative_risks: RelativeRisks::default(),
            diseases: Vec::new(),
            probabilities: BTreeMap::new(),
            history: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn has_disease(&self, disease: Disease) -> bool {
        self.diseases.contains(&disease)
    }

    /// Adds `disease` unless it is already active. Returns whether it was added.
    pub fn add_disease(&mut self, disease: Disease) -> bool {
        if self.has_disease(disease) {
            return false;
        }
        self.diseases.push(disease);
        true
    }

    /// The record for `year` derived from the active diseases.
    #[must_use]
    pub fn current_record(&self) -> HealthRecord {
        if self.diseases.is_empty() {
            HealthRecord::Healthy
        } else {
            HealthRecord::Sick(self.diseases.clone())
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DeceasedPerson {
    pub demographics: Demographics,
    pub history: HealthHistory,
}

/// Live persons and the archive of the deceased, both in id order.
pub struct Population {
    next_id: usize,
    live: BTreeMap<PersonId, PersonHealth>,
    deceased: BTreeMap<PersonId, DeceasedPerson>,
}

crate::define_data_plugin!(
    Population,
    Population {
        next_id: 0,
        live: BTreeMap::new(),
        deceased: BTreeMap::new(),
    }
);

impl Population {
    fn add_person(&mut self, demographics: Demographics) -> PersonId {
        let person_id = PersonId(self.next_id);
        self.next_id += 1;
        self.live.insert(person_id, PersonHealth::new(demographics));
        person_id
    }

    pub fn live(&self) -> impl Iterator<Item = (PersonId, &PersonHealth)> {
        self.live.iter().map(|(id, person)| (*id, person))
    }

    pub fn live_mut(&mut self) -> impl Iterator<Item = (PersonId, &mut PersonHealth)> {
        self.live.iter_mut().map(|(id, person)| (*id, person))
    }

    /// Moves a person to the deceased archive, keeping their history.
    pub fn archive(&mut self, person_id: PersonId) -> bool {
        let Some(person) = self.live.remove(&person_id) else {
            return false;
        };
        trace!("archiving person {person_id}");
        self.deceased.insert(
            person_id,
            DeceasedPerson {
                demographics: person.demographics,
                history: person.history,
            },
        );
        true
    }
}

pub trait ContextPopulationExt {
    fn get_current_population(&self) -> usize;

    fn add_person(&mut self, demographics: Demographics) -> PersonId;

    fn get_person(&self, person_id: PersonId) -> Option<&PersonHealth>;

    fn get_person_mut(&mut self, person_id: PersonId) -> Option<&mut PersonHealth>;

    /// Ids of the live population, ascending.
    fn get_live_people(&self) -> Vec<PersonId>;

    /// The home of every live person that has one.
    fn get_homes(&self) -> BTreeMap<PersonId, LocationKey>;

    fn is_deceased(&self, person_id: PersonId) -> bool;

    fn deceased_history(&self, person_id: PersonId) -> Option<&HealthHistory>;

    fn get_deceased_count(&self) -> usize;
}

impl ContextPopulationExt for Context {
    fn get_current_population(&self) -> usize {
        self.get_data_container::<Population>()
            .map_or(0, |population| population.live.len())
    }

    fn add_person(&mut self, demographics: Demographics) -> PersonId {
        self.get_data_container_mut::<Population>()
            .add_person(demographics)
    }

    fn get_person(&self, person_id: PersonId) -> Option<&PersonHealth> {
        self.get_data_container::<Population>()?.live.get(&person_id)
    }

    fn get_person_mut(&mut self, person_id: PersonId) -> Option<&mut PersonHealth> {
        self.get_data_container_mut::<Population>()
            .live
            .get_mut(&person_id)
    }

    fn get_live_people(&self) -> Vec<PersonId> {
        self.get_data_container::<Population>()
            .map(|population| population.live.keys().copied().collect())
            .unwrap_or_default()
    }

    fn get_homes(&self) -> BTreeMap<PersonId, LocationKey> {
        self.get_data_container::<Population>()
            .map(|population| {
                population
                    .live
                    .iter()
                    .filter_map(|(id, person)| person.demographics.home.map(|home| (*id, home)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_deceased(&self, person_id: PersonId) -> bool {
        self.get_data_container::<Population>()
            .is_some_and(|population| population.deceased.contains_key(&person_id))
    }

    fn deceased_history(&self, person_id: PersonId) -> Option<&HealthHistory> {
        self.get_data_container::<Population>()?
            .deceased
            .get(&person_id)
            .map(|deceased| &deceased.history)
    }

    fn get_deceased_count(&self) -> usize {
        self.get_data_container::<Population>()
            .map_or(0, |population| population.deceased.len())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::exposure::LocationKind;

    pub(crate) fn adult(age: u32, gender: Gender) -> Demographics {
        Demographics {
            age,
            gender,
            location: "urban".to_string(),
            home: Some(LocationKey::new(LocationKind::Dwelling, 1)),
        }
    }

    #[test]
    fn people_get_sequential_ids() {
        let mut context = Context::new();
        assert_eq!(context.get_current_population(), 0);
        let first = context.add_person(adult(30, Gender::Female));
        let second = context.add_person(adult(40, Gender::Male));
        assert_eq!(first, PersonId(0));
        assert_eq!(second, PersonId(1));
        assert_eq!(context.get_current_population(), 2);
        assert_eq!(context.get_person(second).map(|p| p.demographics.age), Some(40));
        assert_eq!(context.get_homes().len(), 2);
    }

    #[test]
    fn diseases_are_added_once() {
        let mut person = PersonHealth::new(adult(50, Gender::Male));
        assert_eq!(person.current_record(), HealthRecord::Healthy);
        assert!(person.add_disease(Disease::Stroke));
        assert!(!person.add_disease(Disease::Stroke));
        assert_eq!(person.current_record(), HealthRecord::Sick(vec![Disease::Stroke]));
    }

    #[test]
    fn archived_people_keep_their_history() {
        let mut context = Context::new();
        let person_id = context.add_person(adult(70, Gender::Female));
        if let Some(person) = context.get_person_mut(person_id) {
            person.history.insert(2020, HealthRecord::Healthy);
            person.history.insert(
                2021,
                HealthRecord::Dead {
                    cause: Disease::AllCauseMortality,
                    diseases: vec![Disease::Stroke],
                },
            );
        }

        assert!(context.get_data_container_mut::<Population>().archive(person_id));
        assert!(!context.get_data_container_mut::<Population>().archive(person_id));
        assert!(context.get_person(person_id).is_none());
        assert!(context.is_deceased(person_id));
        assert_eq!(context.get_deceased_count(), 1);
        let history = context.deceased_history(person_id).unwrap();
        assert_eq!(
            history.get(&2021),
            Some(&HealthRecord::Dead {
                cause: Disease::AllCauseMortality,
                diseases: vec![Disease::Stroke],
            })
        );
        assert!(context.get_live_people().is_empty());
    }

    #[test]
    fn gender_codes() {
        assert_eq!("F".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!("1".parse::<Gender>().unwrap(), Gender::Male);
        assert!(matches!("x".parse::<Gender>(), Err(HealthError::UnknownGender(_))));
    }
}
