//! Dataset run configuration.
//!
//! Read from `vds.toml` in the working directory (or `--config`). Every
//! section is optional; missing values fall back to the built-in plan that
//! generates the `ckt5` and `lvna` datasets.
//!
//! ```toml
//! [engine]
//! binary = "/opt/opendss/opendsscmd"
//!
//! [output]
//! dir = "data"
//! format = "parquet"
//!
//! [[circuits]]
//! name = "ckt5"
//! master = "src/ckt5/Master_ckt5.dss"
//! transformers = ["MDV_SUB_1"]
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use vds_core::ProfileUnits;
use vds_engine::DEFAULT_PROMPT;
use vds_io::OutputFormat;
use vds_sim::CircuitPlan;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "vds.toml";

/// Root of the per-circuit profile directories.
pub const DEFAULT_PROFILE_ROOT: &str = "profiles";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub engine: EngineConfig,
    pub output: OutputConfig,
    pub circuits: Vec<CircuitConfig>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            output: OutputConfig::default(),
            circuits: vec![
                CircuitConfig::new("ckt5", "src/ckt5/Master_ckt5.dss", &["MDV_SUB_1"]),
                CircuitConfig::new("lvna", "src/LVTestCaseNorthAmerican/Master.dss", &["1", "2"]),
            ],
        }
    }
}

/// How the OpenDSS console is started.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Console executable; searched in ~/.vds/bin and on PATH when unset.
    pub binary: Option<PathBuf>,

    /// Prompt the console prints before reading each command.
    pub prompt: String,

    /// Control iteration limit of each snapshot solve.
    pub max_control_iter: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: None,
            prompt: DEFAULT_PROMPT.to_string(),
            max_control_iter: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            format: OutputFormat::Arrow,
        }
    }
}

/// One circuit to simulate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    pub name: String,
    pub master: PathBuf,

    /// Profile directory; `profiles/<name>` when unset.
    #[serde(default)]
    pub profiles: Option<PathBuf>,

    #[serde(default)]
    pub transformers: Vec<String>,

    #[serde(default)]
    pub units: ProfileUnits,
}

impl CircuitConfig {
    fn new(name: &str, master: &str, transformers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            master: PathBuf::from(master),
            profiles: None,
            transformers: transformers.iter().map(|t| t.to_string()).collect(),
            units: ProfileUnits::Kw,
        }
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.profiles
            .clone()
            .unwrap_or_else(|| Path::new(DEFAULT_PROFILE_ROOT).join(&self.name))
    }
}

impl DatasetConfig {
    /// Load `explicit`, or `./vds.toml` if it exists, or the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load_from(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file '{}'", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing config file '{}'", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("writing config file '{}'", path.display()))?;
        Ok(())
    }

    /// Reject configurations that cannot produce distinct datasets.
    pub fn validate(&self) -> Result<()> {
        if self.circuits.is_empty() {
            bail!("no circuits configured");
        }
        if self.engine.prompt.is_empty() {
            bail!("[engine] prompt must not be empty");
        }
        let mut names = BTreeSet::new();
        for circuit in &self.circuits {
            if circuit.name.trim().is_empty() {
                bail!("circuit with master '{}' has no name", circuit.master.display());
            }
            if !names.insert(circuit.name.to_lowercase()) {
                bail!("circuit '{}' is configured twice", circuit.name);
            }
        }
        Ok(())
    }

    /// Run plans in configuration order.
    pub fn plans(&self) -> Vec<CircuitPlan> {
        self.circuits
            .iter()
            .map(|circuit| CircuitPlan {
                name: circuit.name.clone(),
                master: circuit.master.clone(),
                profiles: circuit.profile_dir(),
                transformers: circuit.transformers.clone(),
                units: circuit.units,
                out_dir: self.output.dir.clone(),
                format: self.output.format,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_plan() {
        let config = DatasetConfig::default();
        config.validate().unwrap();
        let plans = config.plans();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].name, "ckt5");
        assert_eq!(plans[0].master, PathBuf::from("src/ckt5/Master_ckt5.dss"));
        assert_eq!(plans[0].profiles, PathBuf::from("profiles/ckt5"));
        assert_eq!(plans[0].transformers, vec!["MDV_SUB_1"]);
        assert_eq!(plans[1].name, "lvna");
        assert_eq!(plans[1].transformers, vec!["1", "2"]);
        assert_eq!(plans[1].out_dir, PathBuf::from("data"));
        assert_eq!(plans[1].format, OutputFormat::Arrow);
    }

    #[test]
    fn test_partial_config_parsing() {
        let toml = r#"
            [output]
            format = "parquet"

            [[circuits]]
            name = "feeder"
            master = "feeder/Master.dss"
            profiles = "shapes"
            units = "multiplier"
        "#;
        let config: DatasetConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.output.format, OutputFormat::Parquet);
        assert_eq!(config.output.dir, PathBuf::from("data"));
        assert_eq!(config.engine.prompt, ">>");
        assert_eq!(config.circuits.len(), 1);

        let plan = &config.plans()[0];
        assert_eq!(plan.profiles, PathBuf::from("shapes"));
        assert_eq!(plan.units, ProfileUnits::Multiplier);
        assert!(plan.transformers.is_empty());
    }

    #[test]
    fn test_duplicate_circuits_rejected() {
        let mut config = DatasetConfig::default();
        config.circuits[1].name = "CKT5".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("configured twice"));

        config.circuits.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let mut config = DatasetConfig::default();
        config.engine.binary = Some(PathBuf::from("/opt/opendss/opendsscmd"));
        config.save_to(file.path()).unwrap();

        let loaded = DatasetConfig::load_from(file.path()).unwrap();
        assert_eq!(loaded.engine.binary, config.engine.binary);
        assert_eq!(loaded.circuits.len(), 2);
        assert_eq!(loaded.circuits[0].transformers, vec!["MDV_SUB_1"]);
    }

    #[test]
    fn test_bad_format_names_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[output]\nformat = \"csv\"\n").unwrap();
        let err = DatasetConfig::load_from(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config file"));
    }
}
