//! Population configuration.

use serde::Deserialize;

use crate::error::Error;

/// Default maximum nesting depth of populate specs.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Settings applied to every populate call of a [`crate::Populator`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PopulateConfig {
    /// Maximum nesting depth of populate specs. The top level is depth 1.
    pub max_depth: usize,

    /// Return plain records unless a spec says otherwise.
    pub lean: bool,

    /// Run the lookups of one level on scoped threads.
    pub concurrent_lookups: bool,

    /// Upper bound on lookup threads per level. Defaults to the available
    /// parallelism.
    pub lookup_threads: Option<usize>,
}

impl Default for PopulateConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            lean: false,
            concurrent_lookups: false,
            lookup_threads: None,
        }
    }
}

impl PopulateConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration, filling missing keys with defaults.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))?;
        if config.max_depth == 0 {
            return Err(Error::Configuration("max_depth must be at least 1".into()));
        }
        if config.lookup_threads == Some(0) {
            return Err(Error::Configuration("lookup_threads must be at least 1".into()));
        }
        Ok(config)
    }

    /// Set the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the default lean mode.
    pub fn with_lean(mut self, lean: bool) -> Self {
        self.lean = lean;
        self
    }

    /// Enable or disable concurrent lookups.
    pub fn with_concurrent_lookups(mut self, enabled: bool) -> Self {
        self.concurrent_lookups = enabled;
        self
    }

    /// Cap the number of lookup threads per level.
    pub fn with_lookup_threads(mut self, threads: usize) -> Self {
        self.lookup_threads = Some(threads);
        self
    }

    /// How many lookups of one level may run at once.
    pub fn lookup_workers(&self) -> usize {
        if !self.concurrent_lookups {
            return 1;
        }
        self.lookup_threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}
