//! Sources file parsing
//!
//! ```yaml
//! sources:
//!   sales:
//!     type: csv
//!     description: Daily sales
//!     config:
//!       path: data/sales.csv
//! ```
//!
//! Entries are returned in file order. Parsing stops at the first bad entry.
//! An unreadable document is a load failure; a malformed entry is an invalid
//! configuration of the source it names.

use super::env_vars::interpolate_yaml;
use crate::datasource::{ConfigMap, SourceConfig, SourceType};
use quarry_core::{ConfigError, RegistrationError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SourcesDocument {
    #[serde(default)]
    sources: Option<serde_yaml::Mapping>,
}

/// Keys allowed on a source entry
const ENTRY_KEYS: [&str; 3] = ["type", "config", "description"];

/// Check the shape of one entry and build its definition
///
/// Problems found here belong to that source, so they are configuration
/// errors rather than load failures.
fn parse_entry(name: String, value: serde_yaml::Value) -> Result<SourceConfig, ConfigError> {
    let invalid = |field: &str, reason: &str| ConfigError::InvalidField {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let serde_yaml::Value::Mapping(entry) = value else {
        return Err(invalid("source", "entry must be a mapping with 'type' and 'config'"));
    };

    let declared = match entry.get("type") {
        None | Some(serde_yaml::Value::Null) => return Err(invalid("type", "is required")),
        Some(serde_yaml::Value::String(s)) => s.clone(),
        Some(_) => return Err(invalid("type", "must be a string")),
    };

    for key in entry.keys() {
        if !key.as_str().map_or(false, |k| ENTRY_KEYS.contains(&k)) {
            return Err(ConfigError::UnknownField {
                source_type: declared.clone(),
                field: key
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{:?}", key)),
            });
        }
    }

    let source_type = declared.parse::<SourceType>()?;

    let config = match entry.get("config") {
        None | Some(serde_yaml::Value::Null) => ConfigMap::new(),
        Some(value @ serde_yaml::Value::Mapping(_)) => serde_yaml::from_value(value.clone())
            .map_err(|e| invalid("config", &e.to_string()))?,
        Some(_) => return Err(invalid("config", "must be a mapping")),
    };

    let description = match entry.get("description") {
        None | Some(serde_yaml::Value::Null) => None,
        Some(serde_yaml::Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(invalid("description", "must be a string")),
    };

    Ok(SourceConfig {
        name,
        source_type,
        config,
        description,
    })
}

/// Parse a sources document into source definitions
pub(crate) fn parse_sources(
    content: &str,
    origin: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<Vec<SourceConfig>, RegistrationError> {
    let load_error = |reason: String| RegistrationError::Load {
        path: origin.to_string(),
        reason,
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document: SourcesDocument =
        serde_yaml::from_str(content).map_err(|e| load_error(e.to_string()))?;

    let Some(sources) = document.sources else {
        return Ok(Vec::new());
    };

    let mut configs = Vec::with_capacity(sources.len());
    for (key, mut value) in sources {
        let name = match key {
            serde_yaml::Value::String(name) => name,
            other => {
                return Err(load_error(format!(
                    "source names must be strings, found {:?}",
                    other
                )))
            }
        };

        interpolate_yaml(&mut value, lookup).map_err(|variable| {
            RegistrationError::UnresolvedVariable {
                name: name.clone(),
                variable,
            }
        })?;

        let config = parse_entry(name.clone(), value)
            .map_err(|source| RegistrationError::InvalidConfig { name, source })?;
        configs.push(config);
    }

    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_in_file_order() {
        let yaml = r#"
sources:
  zeta:
    type: csv
    config:
      path: z.csv
  alpha:
    type: rest_api
    description: Weather feed
    config:
      url: https://api.example.com/weather
"#;
        let configs = parse_sources(yaml, "sources.yaml", &no_env).unwrap();
        let names: Vec<&str> = configs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(configs[1].source_type, SourceType::RestApi);
        assert_eq!(configs[1].description.as_deref(), Some("Weather feed"));
    }

    #[test]
    fn test_missing_sources_key_is_empty() {
        assert!(parse_sources("other: 1\n", "s.yaml", &no_env).unwrap().is_empty());
        assert!(parse_sources("", "s.yaml", &no_env).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_type() {
        let yaml = "sources:\n  x:\n    type: ftp\n    config: {}\n";
        let err = parse_sources(yaml, "s.yaml", &no_env).unwrap_err();
        match err {
            RegistrationError::InvalidConfig { name, source } => {
                assert_eq!(name, "x");
                assert_eq!(source, ConfigError::UnsupportedType("ftp".to_string()));
            }
            other => panic!("Expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_variable_names_source() {
        let yaml = "sources:\n  db:\n    type: sql\n    config:\n      connection_string: ${QUARRY_TEST_UNSET_DSN}\n      table: t\n";
        let err = parse_sources(yaml, "s.yaml", &no_env).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::UnresolvedVariable { ref name, ref variable }
                if name == "db" && variable == "QUARRY_TEST_UNSET_DSN"
        ));
    }

    #[test]
    fn test_malformed_yaml_is_load_error() {
        let err = parse_sources("sources: [unclosed", "bad.yaml", &no_env).unwrap_err();
        assert!(matches!(err, RegistrationError::Load { ref path, .. } if path == "bad.yaml"));
    }

    fn invalid_entry(yaml: &str) -> (String, ConfigError) {
        match parse_sources(yaml, "s.yaml", &no_env).unwrap_err() {
            RegistrationError::InvalidConfig { name, source } => (name, source),
            other => panic!("Expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_misplaced_key_is_invalid_config() {
        let (name, source) = invalid_entry("sources:\n  x:\n    type: csv\n    path: a.csv\n");
        assert_eq!(name, "x");
        assert_eq!(
            source,
            ConfigError::UnknownField {
                source_type: "csv".to_string(),
                field: "path".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_entries_are_invalid_config() {
        let (name, source) = invalid_entry("sources:\n  x:\n    config:\n      path: a.csv\n");
        assert_eq!(name, "x");
        assert!(matches!(source, ConfigError::InvalidField { ref field, .. } if field == "type"));

        let (_, source) = invalid_entry("sources:\n  x:\n    type: csv\n    config: [a.csv]\n");
        assert!(matches!(source, ConfigError::InvalidField { ref field, .. } if field == "config"));

        let (_, source) = invalid_entry("sources:\n  x:\n    type: [csv]\n");
        assert!(matches!(source, ConfigError::InvalidField { ref field, .. } if field == "type"));

        let (_, source) = invalid_entry("sources:\n  x: sales.csv\n");
        assert!(matches!(source, ConfigError::InvalidField { .. }));
    }
}
