//! Basecaller configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! [model]
//! alphabet = "NACGT"
//! state_len = 5
//!
//! [scheduler]
//! slots = 4
//! ```

use std::path::Path;
use crate::crf::TransitionIndex;
use crate::error::{ConfigError, Result};

/// Configuration of the whole basecaller.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct BasecallerConfig {
    #[serde(default)]
    pub model: CrfConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Shape of the CRF output layer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CrfConfig {
    /// Edge labels, blank first (e.g. `"NACGT"`). Every other symbol is a base.
    pub alphabet: String,
    /// Number of trailing bases a state remembers.
    pub state_len: usize,
}

/// Settings of the batch scheduler.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct SchedulerConfig {
    /// Number of concurrent inference slots (defaults to the number of online CPU cores).
    pub slots: Option<usize>,
}

impl BasecallerConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Parse(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| ConfigError::Parse(format!("TOML parse error: {e}")))?;
        config.model.index()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(format!("TOML serialise error: {e}")))?)
    }
}

impl CrfConfig {
    /// Number of bases, the alphabet without its blank.
    pub fn n_base(&self) -> usize {
        self.alphabet.chars().count().saturating_sub(1)
    }

    /// Number of CRF states, `n_base^state_len`.
    pub fn n_states(&self) -> Result<usize> {
        Ok(self.index()?.n_states())
    }

    /// Build and validate the transition index of this model.
    pub fn index(&self) -> Result<TransitionIndex> {
        TransitionIndex::new(self.n_base(), self.state_len)
    }
}

impl Default for CrfConfig {
    fn default() -> Self {
        Self {
            alphabet: "NACGT".to_string(),
            state_len: 5,
        }
    }
}

impl SchedulerConfig {
    /// Resolves the number of inference slots.
    pub fn resolve_slots(&self) -> usize {
        self.slots.filter(|&n| n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}
