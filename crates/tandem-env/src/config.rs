//! Configuration loading and typed config structures for the simulation.
//!
//! The canonical configuration is a YAML document mirroring [`SimConfig`].
//! All fields have defaults reproducing the standard five-agent team (two
//! engineers, two scientists, one manager), so an empty document is a
//! valid, complete configuration.

use std::path::Path;

use serde::Deserialize;
use tandem_types::{SupplyKind, SupplyQuality};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but fails a sanity check.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What the sanity check found.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimConfig {
    /// Human-readable simulation name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Master random seed; agent seeds are derived from it.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of cycles to run.
    #[serde(default = "default_cycles")]
    pub cycles: u32,

    /// Emit a progress report every this many cycles.
    #[serde(default = "default_report_every")]
    pub report_every: u32,

    /// Demands published before the first cycle.
    #[serde(default = "default_initial_demands")]
    pub initial_demands: u32,

    /// Percent chance (0..=100) of one new demand per cycle.
    #[serde(default = "default_new_demand_percent")]
    pub new_demand_percent: u32,

    /// Upper bound on the effort of generated demands.
    #[serde(default = "default_max_demand_effort")]
    pub max_demand_effort: u32,

    /// The population, as archetypes instantiated `count` times each.
    #[serde(default = "AgentArchetypeConfig::standard_team")]
    pub agents: Vec<AgentArchetypeConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            seed: default_seed(),
            cycles: default_cycles(),
            report_every: default_report_every(),
            initial_demands: default_initial_demands(),
            new_demand_percent: default_new_demand_percent(),
            max_demand_effort: default_max_demand_effort(),
            agents: AgentArchetypeConfig::standard_team(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a sanity check fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a sanity check fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Sanity-check the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first failing check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.report_every == 0 {
            return Err(ConfigError::Invalid {
                reason: "report_every must be at least 1".to_owned(),
            });
        }
        if self.new_demand_percent > 100 {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "new_demand_percent must be 0..=100, got {}",
                    self.new_demand_percent
                ),
            });
        }
        if self.max_demand_effort == 0 {
            return Err(ConfigError::Invalid {
                reason: "max_demand_effort must be at least 1".to_owned(),
            });
        }
        if self.agents.iter().all(|archetype| archetype.count == 0) {
            return Err(ConfigError::Invalid {
                reason: "at least one agent is required".to_owned(),
            });
        }
        Ok(())
    }
}

/// One population archetype: a named template instantiated `count` times.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentArchetypeConfig {
    /// Base name; instances are numbered `name-0`, `name-1`, ...
    pub name: String,

    /// How many agents to instantiate from this archetype.
    #[serde(default = "default_count")]
    pub count: u32,

    /// Unproductive cycles tolerated in `Waiting` before giving up.
    #[serde(default = "default_max_wait_cycles")]
    pub max_wait_cycles: u32,

    /// Productive fraction of effort, in percent.
    #[serde(default = "default_efficiency")]
    pub efficiency: u32,

    /// The supplies each instance owns exclusively.
    #[serde(default)]
    pub supplies: Vec<SupplySpec>,
}

impl AgentArchetypeConfig {
    /// The standard team: two engineers, two scientists, one manager,
    /// loosely covering the five work categories between them.
    #[must_use]
    pub fn standard_team() -> Vec<Self> {
        vec![
            Self {
                name: "engineer".to_owned(),
                count: 2,
                max_wait_cycles: 2,
                efficiency: default_efficiency(),
                supplies: vec![
                    SupplySpec::new(SupplyKind::Modeling, SupplyQuality::Medium),
                    SupplySpec::new(SupplyKind::Communication, SupplyQuality::Medium),
                ],
            },
            Self {
                name: "scientist".to_owned(),
                count: 2,
                max_wait_cycles: 5,
                efficiency: default_efficiency(),
                supplies: vec![
                    SupplySpec::new(SupplyKind::Development, SupplyQuality::Medium),
                    SupplySpec::new(SupplyKind::Analysis, SupplyQuality::High),
                    SupplySpec::new(SupplyKind::Communication, SupplyQuality::Medium),
                ],
            },
            Self {
                name: "manager".to_owned(),
                count: 1,
                max_wait_cycles: 3,
                efficiency: default_efficiency(),
                supplies: vec![
                    SupplySpec::new(SupplyKind::Communication, SupplyQuality::Medium),
                    SupplySpec::new(SupplyKind::Management, SupplyQuality::High),
                ],
            },
        ]
    }
}

/// One supply owned by every instance of an archetype.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SupplySpec {
    /// The supply kind.
    pub kind: SupplyKind,

    /// The supply quality tier.
    pub quality: SupplyQuality,

    /// Fixed capacity; `None` draws a capacity from the environment's
    /// random source per instance.
    #[serde(default)]
    pub capacity: Option<u32>,
}

impl SupplySpec {
    /// A spec with randomized capacity.
    #[must_use]
    pub const fn new(kind: SupplyKind, quality: SupplyQuality) -> Self {
        Self {
            kind,
            quality,
            capacity: None,
        }
    }
}

fn default_name() -> String {
    "tandem".to_owned()
}

const fn default_seed() -> u64 {
    43
}

const fn default_cycles() -> u32 {
    300
}

const fn default_report_every() -> u32 {
    25
}

const fn default_initial_demands() -> u32 {
    10
}

const fn default_new_demand_percent() -> u32 {
    20
}

const fn default_max_demand_effort() -> u32 {
    50
}

const fn default_count() -> u32 {
    1
}

const fn default_max_wait_cycles() -> u32 {
    5
}

const fn default_efficiency() -> u32 {
    85
}
