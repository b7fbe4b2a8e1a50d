//! Checker configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid checker configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("max_diagnostics must be greater than 0")]
    ZeroDiagnosticBudget,
}

/// Configuration for a checking run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Stop scheduling further declarations once this many diagnostics
    /// have been reported
    pub max_diagnostics: Option<usize>,

    /// Check independent binding groups on the rayon pool
    pub parallel: bool,

    /// Attach "a similar name exists" help to naming errors
    pub suggest_similar_names: bool,

    /// Maximum edit distance for a name suggestion
    pub max_suggestion_distance: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            max_diagnostics: None,
            parallel: true,
            suggest_similar_names: true,
            max_suggestion_distance: 2,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks every binding group on the calling thread.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Default::default()
        }
    }

    /// Parses a JSON configuration. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CheckerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_diagnostics == Some(0) {
            return Err(ConfigError::ZeroDiagnosticBudget);
        }
        Ok(())
    }

    pub fn with_max_diagnostics(mut self, max: usize) -> Self {
        self.max_diagnostics = Some(max);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_suggestions(mut self, enabled: bool) -> Self {
        self.suggest_similar_names = enabled;
        self
    }
}
