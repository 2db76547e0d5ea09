//! Validation configuration.
//!
//! Defaults match production behavior. Override via environment variables
//! or a YAML document for staging and tests.

use serde::{Deserialize, Serialize};

/// Which structural validator the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralBackend {
    /// Evaluate `validate` tags directly.
    #[default]
    Tags,
    /// Compile the tags into a JSON Schema and validate with `jsonschema`.
    JsonSchema,
}

impl std::str::FromStr for StructuralBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tags" => Ok(Self::Tags),
            "json_schema" | "jsonschema" => Ok(Self::JsonSchema),
            other => Err(ConfigError::InvalidBackend(other.to_string())),
        }
    }
}

/// Settings consumed by the validation engine and by semantic checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Channel groups a version-catalog entry may use.
    pub allowed_channel_groups: Vec<String>,
    pub structural_backend: StructuralBackend,
    /// Message on the wrapping error when more than one detail is reported.
    pub multiple_errors_message: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            allowed_channel_groups: vec!["stable".to_string()],
            structural_backend: StructuralBackend::Tags,
            multiple_errors_message: "Content validation failed on multiple fields".to_string(),
        }
    }
}

impl ValidationConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `RESMODEL_ALLOWED_CHANNEL_GROUPS`: comma list (default: `stable`)
    /// - `RESMODEL_STRUCTURAL_BACKEND`: `tags` or `json_schema` (default: `tags`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("RESMODEL_ALLOWED_CHANNEL_GROUPS") {
            let groups: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if groups.is_empty() {
                return Err(ConfigError::EmptyChannelGroups);
            }
            config.allowed_channel_groups = groups;
        }

        if let Some(raw) = lookup("RESMODEL_STRUCTURAL_BACKEND") {
            config.structural_backend = raw.parse()?;
        }

        Ok(config)
    }

    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        if config.allowed_channel_groups.is_empty() {
            return Err(ConfigError::EmptyChannelGroups);
        }
        Ok(config)
    }

    pub fn is_channel_group_allowed(&self, group: &str) -> bool {
        self.allowed_channel_groups.iter().any(|g| g == group)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown structural backend {0:?} (expected \"tags\" or \"json_schema\")")]
    InvalidBackend(String),
    #[error("allowed channel groups must not be empty")]
    EmptyChannelGroups,
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = ValidationConfig::default();
        assert_eq!(cfg.allowed_channel_groups, vec!["stable"]);
        assert_eq!(cfg.structural_backend, StructuralBackend::Tags);
        assert_eq!(
            cfg.multiple_errors_message,
            "Content validation failed on multiple fields"
        );
        assert!(cfg.is_channel_group_allowed("stable"));
        assert!(!cfg.is_channel_group_allowed("beta"));
    }

    #[test]
    fn test_lookup_overrides() {
        let cfg = ValidationConfig::from_lookup(lookup_from(&[
            ("RESMODEL_ALLOWED_CHANNEL_GROUPS", "stable, candidate ,"),
            ("RESMODEL_STRUCTURAL_BACKEND", "JSON_SCHEMA"),
        ]))
        .unwrap();
        assert_eq!(cfg.allowed_channel_groups, vec!["stable", "candidate"]);
        assert_eq!(cfg.structural_backend, StructuralBackend::JsonSchema);
    }

    #[test]
    fn test_lookup_rejects_bad_values() {
        assert!(matches!(
            ValidationConfig::from_lookup(lookup_from(&[("RESMODEL_STRUCTURAL_BACKEND", "xml")])),
            Err(ConfigError::InvalidBackend(b)) if b == "xml"
        ));
        assert!(matches!(
            ValidationConfig::from_lookup(lookup_from(&[("RESMODEL_ALLOWED_CHANNEL_GROUPS", " , ")])),
            Err(ConfigError::EmptyChannelGroups)
        ));
    }

    #[test]
    fn test_from_env_without_overrides_is_default() {
        // Only meaningful when the variables are unset, which is the case in CI.
        if std::env::var("RESMODEL_ALLOWED_CHANNEL_GROUPS").is_err()
            && std::env::var("RESMODEL_STRUCTURAL_BACKEND").is_err()
        {
            assert_eq!(ValidationConfig::from_env().unwrap(), ValidationConfig::default());
        }
    }

    #[test]
    fn test_from_yaml_partial() {
        let cfg = ValidationConfig::from_yaml_str(
            "allowed_channel_groups: [stable, fast]\nstructural_backend: json_schema\n",
        )
        .unwrap();
        assert_eq!(cfg.allowed_channel_groups, vec!["stable", "fast"]);
        assert_eq!(cfg.structural_backend, StructuralBackend::JsonSchema);
        assert_eq!(
            cfg.multiple_errors_message,
            ValidationConfig::default().multiple_errors_message
        );
    }

    #[test]
    fn test_from_yaml_errors() {
        assert!(matches!(
            ValidationConfig::from_yaml_str("allowed_channel_groups: []"),
            Err(ConfigError::EmptyChannelGroups)
        ));
        assert!(matches!(
            ValidationConfig::from_yaml_str("structural_backend: xml"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
