use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::name::normalize;
use crate::{VdsError, VdsResult, TIMESTEPS_PER_YEAR};

/// One year of 15-minute samples for a single load.
///
/// The sample count is checked on construction, so a `LoadProfile` always
/// covers exactly [`TIMESTEPS_PER_YEAR`] steps.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProfile {
    load: String,
    values: Vec<f64>,
}

impl LoadProfile {
    pub fn new(load: impl Into<String>, values: Vec<f64>) -> VdsResult<Self> {
        let load = load.into();
        if values.len() != TIMESTEPS_PER_YEAR {
            return Err(VdsError::SampleCount {
                load,
                expected: TIMESTEPS_PER_YEAR,
                actual: values.len(),
            });
        }
        if let Some(step) = values.iter().position(|v| !v.is_finite()) {
            return Err(VdsError::Parse(format!(
                "profile for load '{load}' has a non-finite sample at timestep {step}"
            )));
        }
        Ok(Self { load, values })
    }

    pub fn load(&self) -> &str {
        &self.load
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value_at(&self, step: usize) -> f64 {
        self.values[step]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Profiles keyed by case-folded load identifier, iterated in key order.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    profiles: BTreeMap<String, LoadProfile>,
}

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a profile, rejecting a second definition of the same load.
    pub fn insert(&mut self, profile: LoadProfile) -> VdsResult<()> {
        let key = normalize(profile.load());
        if self.profiles.contains_key(&key) {
            return Err(VdsError::DuplicateProfile {
                load: profile.load().to_string(),
            });
        }
        self.profiles.insert(key, profile);
        Ok(())
    }

    pub fn get(&self, load: &str) -> Option<&LoadProfile> {
        self.profiles.get(&normalize(load))
    }

    pub fn contains(&self, load: &str) -> bool {
        self.profiles.contains_key(&normalize(load))
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// How profile samples translate into a load's kW setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileUnits {
    /// Samples are absolute kW.
    #[default]
    Kw,
    /// Samples multiply the load's nominal kW from the circuit definition.
    Multiplier,
}

impl ProfileUnits {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileUnits::Kw => "kw",
            ProfileUnits::Multiplier => "multiplier",
        }
    }

    pub fn to_kw(&self, sample: f64, nominal_kw: f64) -> f64 {
        match self {
            ProfileUnits::Kw => sample,
            ProfileUnits::Multiplier => sample * nominal_kw,
        }
    }
}

impl fmt::Display for ProfileUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileUnits {
    type Err = VdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kw" => Ok(ProfileUnits::Kw),
            "multiplier" | "mult" => Ok(ProfileUnits::Multiplier),
            other => Err(VdsError::Config(format!(
                "unsupported profile units '{other}'; use kw or multiplier"
            ))),
        }
    }
}
