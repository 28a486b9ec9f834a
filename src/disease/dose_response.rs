use crate::disease::{Disease, ExposureCategory, RelativeRisks};
use crate::error::{HealthError, HealthResult};
use crate::log::debug;
use crate::normalize::WeeklyExposure;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::{fs::File, io::Read, path::Path};

/// Piecewise-linear relative risk as a function of dose. Outside the tabulated range the
/// nearest end point applies.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DoseResponseCurve {
    points: Vec<(f64, f64)>,
}

impl DoseResponseCurve {
    /// Points may come in any order.
    #[must_use]
    pub fn new(mut points: Vec<(f64, f64)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        DoseResponseCurve { points }
    }

    fn push(&mut self, dose: f64, relative_risk: f64) {
        let position = self.points.partition_point(|(x, _)| *x <= dose);
        self.points.insert(position, (dose, relative_risk));
    }

    /// 1 for an empty curve or a NaN dose.
    #[must_use]
    pub fn relative_risk(&self, dose: f64) -> f64 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return 1.0;
        };
        if dose.is_nan() {
            return 1.0;
        }
        if dose <= first.0 {
            return first.1;
        }
        if dose >= last.0 {
            return last.1;
        }
        let upper = self.points.partition_point(|(x, _)| *x <= dose);
        let (Some(&(x0, y0)), Some(&(x1, y1))) =
            (self.points.get(upper.wrapping_sub(1)), self.points.get(upper))
        else {
            return 1.0;
        };
        if x1 == x0 {
            return y1;
        }
        y0 + (y1 - y0) * (dose - x0) / (x1 - x0)
    }
}

#[derive(Debug, Deserialize)]
struct DoseResponseRow {
    category: String,
    disease: String,
    dose: f64,
    rr: f64,
}

/// Dose-response curves per (exposure category, disease), read from
///
/// ```text
/// category,disease,dose,rr
/// pm25,stroke,0,1.0
/// pm25,stroke,10,1.1
/// ```
#[derive(Clone, Debug, Default)]
pub struct DoseResponseTable {
    curves: FxHashMap<(ExposureCategory, Disease), DoseResponseCurve>,
}

impl DoseResponseTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        category: ExposureCategory,
        disease: Disease,
        curve: DoseResponseCurve,
    ) {
        self.curves.insert((category, disease), curve);
    }

    #[must_use]
    pub fn get(&self, category: ExposureCategory, disease: Disease) -> Option<&DoseResponseCurve> {
        self.curves.get(&(category, disease))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.curves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Evaluates every curve at the person's weekly level of its category.
    #[must_use]
    pub fn relative_risks(&self, weekly: &WeeklyExposure) -> RelativeRisks {
        let mut risks = RelativeRisks::default();
        for ((category, disease), curve) in &self.curves {
            risks.set(*category, *disease, curve.relative_risk(weekly.level(*category)));
        }
        risks
    }

    pub fn from_path(path: &Path) -> HealthResult<Self> {
        debug!("reading dose-response table from {}", path.display());
        Self::from_reader(File::open(path)?)
    }

    /// Negative relative risks are rejected.
    pub fn from_reader<R: Read>(reader: R) -> HealthResult<Self> {
        let mut table = DoseResponseTable::new();
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        for row in csv_reader.deserialize::<DoseResponseRow>() {
            let row = row?;
            let category: ExposureCategory = row.category.parse()?;
            let disease: Disease = row.disease.parse()?;
            if row.rr < 0.0 || !row.rr.is_finite() {
                return Err(HealthError::Config(format!(
                    "relative risk {} for {category}/{disease} at dose {}",
                    row.rr, row.dose
                )));
            }
            table
                .curves
                .entry((category, disease))
                .or_default()
                .push(row.dose, row.rr);
        }
        debug!("read {} dose-response curves", table.len());
        Ok(table)
    }
}
