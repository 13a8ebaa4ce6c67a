//! # Family Configuration
//!
//! Tunables for families, loaded from TOML once at startup.
//!
//! ```toml
//! name = "movement"
//! pool_capacity = 1024
//! track_changes = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FamilyError, FamilyResult};

/// Upper bound on pre-reserved node slots.
pub const MAX_POOL_CAPACITY: usize = 1 << 24;

/// Configuration for one [`ComponentMatchingFamily`](crate::ComponentMatchingFamily).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FamilyConfig {
    /// Label used in logs and errors. Defaults to the shape's type names.
    pub name: Option<String>,
    /// Node slots reserved up front by the default pool.
    pub pool_capacity: usize,
    /// Record node-list changes for [`NodeList::drain_changes`](crate::NodeList::drain_changes).
    pub track_changes: bool,
}

impl FamilyConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`FamilyError::InvalidConfig`] on malformed TOML, unknown keys,
    /// or out-of-range values.
    pub fn from_toml_str(source: &str) -> FamilyResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| FamilyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`FamilyError::ConfigRead`] if the file cannot be read, or any
    /// error from [`from_toml_str`](Self::from_toml_str).
    pub fn from_toml_file(path: impl AsRef<Path>) -> FamilyResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| FamilyError::ConfigRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`FamilyError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> FamilyResult<()> {
        if self.pool_capacity > MAX_POOL_CAPACITY {
            return Err(FamilyError::InvalidConfig(format!(
                "pool_capacity {} exceeds {}",
                self.pool_capacity, MAX_POOL_CAPACITY
            )));
        }
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(FamilyError::InvalidConfig(
                "name must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the family name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the reserved pool capacity.
    #[must_use]
    pub const fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Enables or disables change tracking.
    #[must_use]
    pub const fn with_change_tracking(mut self, enabled: bool) -> Self {
        self.track_changes = enabled;
        self
    }
}
