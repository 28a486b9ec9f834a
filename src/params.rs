/*!

Run parameters, loaded from a JSON file. Every field has a default, so a parameters file only
needs to name what it changes:

```json
{
  "seed": 42,
  "worker_threads": 8,
  "disease": { "min_age": 18 }
}
```

*/

use crate::accident::TemporalExpansion;
use crate::context::Context;
use crate::disease::Disease;
use crate::error::HealthResult;
use crate::exposure::VentilationRates;
use crate::log::{info, trace};
use crate::network::Mode;
use crate::person::Gender;
use crate::random::ContextRandomExt;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, sync::LazyLock};

/// One value per transport mode.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModeValues {
    pub walk: f64,
    pub bike: f64,
    pub car: f64,
    pub pt: f64,
}

impl ModeValues {
    #[must_use]
    pub fn uniform(value: f64) -> Self {
        ModeValues {
            walk: value,
            bike: value,
            car: value,
            pt: value,
        }
    }

    #[must_use]
    pub fn get(&self, mode: Mode) -> f64 {
        match mode {
            Mode::Walk => self.walk,
            Mode::Bike => self.bike,
            Mode::Car => self.car,
            Mode::PublicTransport => self.pt,
        }
    }
}

/// A pre-existing disease multiplies the rate of a related one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiseaseInteraction {
    pub given: Disease,
    pub target: Disease,
    /// `None` applies to everyone.
    #[serde(default)]
    pub gender: Option<Gender>,
    pub multiplier: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiseaseSettings {
    /// Persons younger than this get no chronic disease risk.
    pub min_age: u32,
    /// Multiply baseline rates by the exposure relative risks.
    pub risk_adjustment: bool,
    /// Share of severe-or-fatal injuries that are fatal, per mode.
    pub fatal_ratio: ModeValues,
    pub weeks_per_year: f64,
    pub interactions: Vec<DiseaseInteraction>,
}

impl Default for DiseaseSettings {
    fn default() -> Self {
        DiseaseSettings {
            min_age: 18,
            risk_adjustment: true,
            fatal_ratio: ModeValues {
                walk: 0.1,
                bike: 0.05,
                car: 0.06,
                pt: 0.0,
            },
            weeks_per_year: 52.0,
            interactions: default_interactions(),
        }
    }
}

fn default_interactions() -> Vec<DiseaseInteraction> {
    let interaction = |given, target, gender, multiplier| DiseaseInteraction {
        given,
        target,
        gender,
        multiplier,
    };
    vec![
        interaction(Disease::Diabetes, Disease::IschemicHeartDisease, Some(Gender::Male), 2.0),
        interaction(Disease::Diabetes, Disease::IschemicHeartDisease, Some(Gender::Female), 2.8),
        interaction(Disease::Diabetes, Disease::Stroke, Some(Gender::Male), 1.8),
        interaction(Disease::Diabetes, Disease::Stroke, Some(Gender::Female), 2.3),
        interaction(Disease::Depression, Disease::Dementia, None, 1.9),
    ]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub seed: u64,
    /// Size of the exposure worker pool; all available cores when unset.
    pub worker_threads: Option<usize>,
    pub temporal_expansion: TemporalExpansion,
    pub ventilation: VentilationRates,
    /// Share of the outdoor concentration that reaches the traveller, per mode.
    pub infiltration: ModeValues,
    pub disease: DiseaseSettings,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            seed: 0,
            worker_threads: None,
            temporal_expansion: TemporalExpansion::default(),
            ventilation: VentilationRates::default(),
            infiltration: ModeValues {
                walk: 1.0,
                bike: 1.0,
                car: 0.55,
                pt: 0.7,
            },
            disease: DiseaseSettings::default(),
        }
    }
}

impl Params {
    pub fn from_path(path: &Path) -> HealthResult<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

static DEFAULT_PARAMS: LazyLock<Params> = LazyLock::new(Params::default);

struct ParamsPlugin {
    params: Option<Params>,
}

crate::define_data_plugin!(ParamsPlugin, ParamsPlugin { params: None });

pub trait ContextParametersExt {
    /// Reads parameters from a JSON file and installs them.
    fn init_parameters(&mut self, path: &Path) -> HealthResult<()>;

    /// Installs `params` and reseeds the random module with `params.seed`.
    fn set_params(&mut self, params: Params);

    /// The installed parameters, or the defaults if none were installed.
    fn get_params(&self) -> &Params;
}

impl ContextParametersExt for Context {
    fn init_parameters(&mut self, path: &Path) -> HealthResult<()> {
        info!("loading parameters from {}", path.display());
        let params = Params::from_path(path)?;
        self.set_params(params);
        Ok(())
    }

    fn set_params(&mut self, params: Params) {
        trace!("installing parameters: {params:?}");
        self.init_random(params.seed);
        self.get_data_container_mut::<ParamsPlugin>().params = Some(params);
    }

    fn get_params(&self) -> &Params {
        self.get_data_container::<ParamsPlugin>()
            .and_then(|plugin| plugin.params.as_ref())
            .unwrap_or(&*DEFAULT_PARAMS)
    }
}
