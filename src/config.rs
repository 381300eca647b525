//! Container configuration.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "config")]
use crate::error::{DiError, DiResult};

/// Default cap on nested resolution depth.
pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 1024;

/// Settings applied when a [`ServiceCollection`](crate::ServiceCollection)
/// is built.
///
/// # Examples
///
/// ```
/// use ferrous_host::{ContainerOptions, ServiceCollection};
///
/// let options = ContainerOptions {
///     max_resolution_depth: 64,
///     ..ContainerOptions::default()
/// };
/// let provider = ServiceCollection::new().build_with(options);
/// assert_eq!(provider.options().max_resolution_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerOptions {
    /// Deepest dependency chain a single resolution may build.
    pub max_resolution_depth: usize,
    /// Check at pipeline build time that every container-resolved component
    /// is registered.
    pub validate_pipeline_on_build: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
            validate_pipeline_on_build: true,
        }
    }
}

#[cfg(feature = "config")]
impl ContainerOptions {
    /// Parses options from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|err| DiError::construction::<ContainerOptions>(err))
    }
}
