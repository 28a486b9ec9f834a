use crate::disease::Disease;
use crate::error::HealthResult;
use crate::log::debug;
use crate::person::Gender;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::{fs::File, io::Read, path::Path};

/// Ages above this share the rates of this age.
pub const MAX_AGE: u32 = 100;

#[derive(Debug, Deserialize)]
struct TransitionRow {
    disease: String,
    age: u32,
    gender: String,
    location: String,
    value: f64,
}

/// Baseline annual probability (all-cause mortality) or annual rate (everything else) by
/// disease, age, gender and location, read from
///
/// ```text
/// disease,age,gender,location,value
/// stroke,65,male,urban,0.004
/// ```
#[derive(Clone, Debug, Default)]
pub struct TransitionTable {
    values: FxHashMap<(Disease, u32, Gender, String), f64>,
}

impl TransitionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        disease: Disease,
        age: u32,
        gender: Gender,
        location: &str,
        value: f64,
    ) {
        self.values
            .insert((disease, age.min(MAX_AGE), gender, location.to_string()), value);
    }

    #[must_use]
    pub fn get(&self, disease: Disease, age: u32, gender: Gender, location: &str) -> Option<f64> {
        self.values
            .get(&(disease, age.min(MAX_AGE), gender, location.to_string()))
            .copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn from_path(path: &Path) -> HealthResult<Self> {
        debug!("reading transition table from {}", path.display());
        Self::from_reader(File::open(path)?)
    }

    /// Unknown diseases or genders are errors.
    pub fn from_reader<R: Read>(reader: R) -> HealthResult<Self> {
        let mut table = TransitionTable::new();
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        for row in csv_reader.deserialize::<TransitionRow>() {
            let row = row?;
            table.insert(
                row.disease.parse()?,
                row.age,
                row.gender.parse()?,
                &row.location,
                row.value,
            );
        }
        debug!("read {} transition entries", table.len());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HealthError;
    use std::io::Write;

    const CSV: &str = "\
disease,age,gender,location,value
stroke,65,male,urban,0.004
all_cause_mortality,100,female,urban,0.35
";

    #[test]
    fn ages_are_capped() {
        let table = TransitionTable::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(table.get(Disease::Stroke, 65, Gender::Male, "urban"), Some(0.004));
        assert_eq!(table.get(Disease::Stroke, 65, Gender::Female, "urban"), None);
        assert_eq!(table.get(Disease::Stroke, 65, Gender::Male, "rural"), None);
        assert_eq!(table.get(Disease::AllCauseMortality, 104, Gender::Female, "urban"), Some(0.35));
    }

    #[test]
    fn unknown_disease_is_fatal() {
        let csv = "disease,age,gender,location,value\nscurvy,30,male,urban,0.1\n";
        assert!(matches!(
            TransitionTable::from_reader(csv.as_bytes()),
            Err(HealthError::UnknownDisease(_))
        ));
    }

    #[test]
    fn reads_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();
        assert_eq!(TransitionTable::from_path(file.path()).unwrap().len(), 2);
    }
}
