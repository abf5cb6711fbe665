//! Runtime configuration.
//!
//! Loaded from a JSON file (`SIGUTI_CONFIG`, or `siguti.json` in the working
//! directory). Missing fields take their defaults and `SIGUTI_DATA` overrides
//! the data file.

use crate::errors::RegulationResult;
use crate::priority::RuleSet;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "SIGUTI_CONFIG";
pub const DATA_ENV: &str = "SIGUTI_DATA";
pub const DEFAULT_CONFIG_FILE: &str = "siguti.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    /// Where the store is persisted; `null` keeps it in memory only.
    pub data_file: Option<PathBuf>,
    pub rule_set: RuleSet,
    pub regulator_label: String,
    pub nursing_label: String,
    pub nir_label: String,
    pub min_justification_len: usize,
    pub min_refusal_len: usize,
    pub min_observation_len: usize,
    pub min_unit_name_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_file: Some(PathBuf::from("siguti-data.json")),
            rule_set: RuleSet::Standard,
            regulator_label: "Regulating physician".to_string(),
            nursing_label: "Nursing/Administrative".to_string(),
            nir_label: "NIR".to_string(),
            min_justification_len: 10,
            min_refusal_len: 10,
            min_observation_len: 5,
            min_unit_name_len: 2,
        }
    }
}

impl Config {
    /// Read a config file; a missing file yields the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> RegulationResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Config::default());
        }
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Resolve the config from the environment.
    pub fn load() -> RegulationResult<Self> {
        let path = env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = Config::from_file(path)?;
        if let Some(data) = env::var_os(DATA_ENV) {
            config.data_file = Some(PathBuf::from(data));
        }
        Ok(config)
    }

    pub fn settings(&self) -> Settings {
        Settings {
            rule_set: self.rule_set,
            regulator_label: self.regulator_label.clone(),
            nursing_label: self.nursing_label.clone(),
            nir_label: self.nir_label.clone(),
            min_justification_len: self.min_justification_len,
            min_refusal_len: self.min_refusal_len,
            min_observation_len: self.min_observation_len,
            min_unit_name_len: self.min_unit_name_len,
        }
    }
}

/// The part of the configuration the regulation desk consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub rule_set: RuleSet,
    pub regulator_label: String,
    pub nursing_label: String,
    pub nir_label: String,
    pub min_justification_len: usize,
    pub min_refusal_len: usize,
    pub min_observation_len: usize,
    pub min_unit_name_len: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().settings()
    }
}
