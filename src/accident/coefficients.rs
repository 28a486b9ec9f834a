/*!

Regression coefficients per (accident type, severity), read from a long-format CSV:

```text
accident_type,severity,variable,value
ped,severe_fatal,intercept,-9.2
ped,severe_fatal,log_ped_flow,0.41
ped,severe_fatal,road_type:primary,0.3
ped,severe_fatal,zi:intercept,1.5
```

Variables prefixed with `zi:` belong to the zero-inflation part of the model.

*/

use crate::accident::{AccidentSeverity, AccidentType};
use crate::error::{HealthError, HealthResult};
use crate::log::debug;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::{fs::File, io::Read, path::Path};

const ZERO_INFLATION_PREFIX: &str = "zi:";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoefficientSet {
    terms: FxHashMap<String, f64>,
    zero_inflation: Option<FxHashMap<String, f64>>,
}

impl CoefficientSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, variable: &str, value: f64) -> Self {
        self.insert(variable, value);
        self
    }

    pub fn insert(&mut self, variable: &str, value: f64) {
        match variable.strip_prefix(ZERO_INFLATION_PREFIX) {
            Some(zi_variable) => {
                self.zero_inflation
                    .get_or_insert_with(FxHashMap::default)
                    .insert(zi_variable.to_string(), value);
            }
            None => {
                self.terms.insert(variable.to_string(), value);
            }
        }
    }

    #[must_use]
    pub fn get(&self, variable: &str) -> Option<f64> {
        self.terms.get(variable).copied()
    }

    #[must_use]
    pub fn zero_inflation(&self) -> Option<&FxHashMap<String, f64>> {
        self.zero_inflation.as_ref()
    }

    #[must_use]
    pub fn has_zero_inflation(&self) -> bool {
        self.zero_inflation.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct CoefficientRow {
    accident_type: String,
    severity: String,
    variable: String,
    value: f64,
}

#[derive(Clone, Debug, Default)]
pub struct CoefficientTable {
    sets: FxHashMap<(AccidentType, AccidentSeverity), CoefficientSet>,
}

impl CoefficientTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        accident_type: AccidentType,
        severity: AccidentSeverity,
        set: CoefficientSet,
    ) {
        self.sets.insert((accident_type, severity), set);
    }

    #[must_use]
    pub fn get(
        &self,
        accident_type: AccidentType,
        severity: AccidentSeverity,
    ) -> Option<&CoefficientSet> {
        self.sets.get(&(accident_type, severity))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn from_path(path: &Path) -> HealthResult<Self> {
        debug!("reading casualty model coefficients from {}", path.display());
        Self::from_reader(File::open(path)?)
    }

    /// Parses the long-format coefficient CSV. Unknown accident types or severities are
    /// fatal; every set must define an intercept.
    pub fn from_reader<R: Read>(reader: R) -> HealthResult<Self> {
        let mut table = CoefficientTable::new();
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        for row in csv_reader.deserialize::<CoefficientRow>() {
            let row = row?;
            let accident_type: AccidentType = row.accident_type.parse()?;
            let severity: AccidentSeverity = row.severity.parse()?;
            table
                .sets
                .entry((accident_type, severity))
                .or_default()
                .insert(&row.variable, row.value);
        }

        for ((accident_type, severity), set) in &table.sets {
            if set.get("intercept").is_none() {
                return Err(HealthError::Config(format!(
                    "coefficients for {accident_type}/{severity} have no intercept"
                )));
            }
            if let Some(zero_inflation) = set.zero_inflation() {
                if !zero_inflation.contains_key("intercept") {
                    return Err(HealthError::Config(format!(
                        "zero-inflation terms for {accident_type}/{severity} have no intercept"
                    )));
                }
            }
        }
        debug!("read {} coefficient sets", table.len());
        Ok(table)
    }
}
