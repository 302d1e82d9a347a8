//! The built-in `v1` policy.

use crate::definition::PolicyDefinition;
use crate::error::PolicyLoadError;
use crate::loader::{PolicyFormat, PolicyLoader};

/// Source text of the standard policy.
pub const STANDARD_POLICY_YAML: &str = include_str!("../policies/v1.yaml");

/// Load the standard `v1` policy.
pub fn standard_policy() -> Result<PolicyDefinition, PolicyLoadError> {
    PolicyLoader::new().load_str(STANDARD_POLICY_YAML, PolicyFormat::Yaml)
}
