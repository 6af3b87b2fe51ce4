//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use metric_tags::{TagSearch, canonicalize};
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("director.lanes must be at least 1")]
    NoLanes,
    #[error("{blocks} [[lane]] blocks configured but director.lanes = {lanes}")]
    TooManyLaneBlocks { blocks: usize, lanes: usize },
    #[error("director.dedupe_window_secs must be at least 1")]
    ZeroDedupeWindow,
    #[error("input.max_line_len must be at least 1")]
    ZeroLineLength,
    #[error("lane {lane}: search {query:?} does not parse at offset {offset}: {reason}")]
    InvalidSearch {
        lane: usize,
        query: String,
        offset: usize,
        reason: String,
    },
    #[error("lane {lane}: metric name {name:?} is invalid: {reason}")]
    InvalidMetricName {
        lane: usize,
        name: String,
        reason: String,
    },
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.director.lanes == 0 {
        errors.push(ValidationError::NoLanes);
    }
    if config.lanes.len() > config.director.lanes {
        errors.push(ValidationError::TooManyLaneBlocks {
            blocks: config.lanes.len(),
            lanes: config.director.lanes,
        });
    }
    if config.director.dedupe && config.director.dedupe_window_secs == 0 {
        errors.push(ValidationError::ZeroDedupeWindow);
    }
    if config.input.max_line_len == 0 {
        errors.push(ValidationError::ZeroLineLength);
    }

    for (lane, block) in config.lanes.iter().enumerate() {
        for query in &block.searches {
            if let Err(e) = TagSearch::parse(query) {
                errors.push(ValidationError::InvalidSearch {
                    lane,
                    query: query.clone(),
                    offset: e.offset,
                    reason: e.kind.to_string(),
                });
            }
        }
        for interest in &block.metric {
            if let Err(e) = canonicalize(&interest.name) {
                errors.push(ValidationError::InvalidMetricName {
                    lane,
                    name: interest.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_passes() {
        let config: Config = toml::from_str("").unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_lanes_fails() {
        let toml = r#"
[director]
lanes = 0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::NoLanes)));
    }

    #[test]
    fn test_more_blocks_than_lanes_fails() {
        let toml = r#"
[director]
lanes = 1

[[lane]]
name = "a"

[[lane]]
name = "b"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::TooManyLaneBlocks { blocks: 2, lanes: 1 }
        )));
    }

    #[test]
    fn test_bad_search_reports_offset() {
        let toml = r#"
[[lane]]
searches = ["and(foo:bar", "and(env:prod)"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            ValidationError::InvalidSearch { lane, offset, .. } => {
                assert_eq!(*lane, 0);
                assert_eq!(*offset, 11);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bad_metric_name_fails() {
        let toml = r#"
[[lane]]

[[lane.metric]]
name = "foo|ST[bad"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidMetricName { .. })));
    }
}
