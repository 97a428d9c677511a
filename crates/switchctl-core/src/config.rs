//! switchctl configuration.
//!
//! The config is an ordered list of entries. Each entry maps a set of
//! application matchers and environments to `instances` hostnames built
//! from a template:
//!
//! ```yaml
//! - applications:
//!     - name: billing
//!     - name: api
//!       alias: api-v2
//!     - regexp: "worker-.*"
//!   environments: [staging, production]
//!   instances: 3
//!   reverseInstanceOrder: true
//!   template: "{{.Application}}-{{.Environment}}{{.InstanceNumber}}"
//! ```
//!
//! TOML files carry the same entries under `[[entries]]`.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::template::HostnameTemplate;

/// File names probed, in order, in each search directory.
const CONFIG_FILE_NAMES: &[&str] = &["config.yml", "config.yaml", "config.toml"];

/// One way of recognising an application in a config entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationMatcher {
    /// Exact application name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name used to render hostnames; also accepted as a requested name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Pattern that must match the whole requested name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regexp: Option<String>,
}

impl ApplicationMatcher {
    /// Matcher for an exact application name.
    pub fn name(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Matcher for names matching a pattern.
    pub fn regexp(pattern: &str) -> Self {
        Self {
            regexp: Some(pattern.to_string()),
            ..Default::default()
        }
    }

    /// Attach an alias to this matcher.
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// The pattern anchored for a full match, or `None` if no (or an
    /// empty) pattern is configured.
    pub fn full_match_regex(&self) -> Option<Result<Regex, regex::Error>> {
        let pattern = self.regexp.as_deref().filter(|p| !p.is_empty())?;
        Some(Regex::new(&format!("^(?:{pattern})$")))
    }
}

/// One config rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    pub applications: Vec<ApplicationMatcher>,
    pub environments: Vec<String>,
    /// Number of instances (numbered `1..=instances`).
    pub instances: u32,
    /// Produce instance numbers from `instances` down to 1.
    #[serde(default)]
    pub reverse_instance_order: bool,
    pub template: String,
}

impl ConfigEntry {
    /// Whether `environment` is one of this entry's environments.
    pub fn has_environment(&self, environment: &str) -> bool {
        self.environments.iter().any(|e| e == environment)
    }

    /// Instance numbers in production order.
    pub fn instance_numbers(&self) -> Vec<u32> {
        let n = self.instances;
        (1..=n)
            .map(|i| if self.reverse_instance_order { n - (i - 1) } else { i })
            .collect()
    }
}

/// Validated configuration: an ordered list of entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub entries: Vec<ConfigEntry>,
}

impl Config {
    /// Build a config from entries, validating every regexp and template.
    pub fn new(entries: Vec<ConfigEntry>) -> ConfigResult<Self> {
        let config = Self { entries };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the first existing file
    /// from [`Config::search_paths`] is used; if none exists an empty
    /// config is returned.
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::from_file(path);
        }

        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::from_file(&path),
            None => {
                warn!("no config file found, continuing with an empty config");
                Ok(Self::default())
            }
        }
    }

    /// Candidate config locations: the working directory, then the
    /// user's config directory.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut search_dirs = vec![PathBuf::from(".")];
        if let Some(config_dir) = dirs::config_dir() {
            search_dirs.push(config_dir.join("switchctl"));
        }

        search_dirs
            .iter()
            .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
            .collect()
    }

    /// Parse a config file, choosing the format by extension.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => Self::from_yaml_str(&content)?,
            Some("toml") => Self::from_toml_str(&content)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        debug!(path = %path.display(), entries = config.entries.len(), "config loaded");
        Ok(config)
    }

    /// Parse YAML: a top-level list of entries.
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        // An empty document deserializes to nothing rather than an empty list.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries: Vec<ConfigEntry> =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::new(entries)
    }

    /// Parse TOML: entries under `[[entries]]`.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every regexp compiles and every template parses.
    pub fn validate(&self) -> ConfigResult<()> {
        for (index, entry) in self.entries.iter().enumerate() {
            for matcher in &entry.applications {
                if let Some(Err(e)) = matcher.full_match_regex() {
                    return Err(ConfigError::InvalidRegex {
                        entry: index,
                        pattern: matcher.regexp.clone().unwrap_or_default(),
                        message: e.to_string(),
                    });
                }
            }
            HostnameTemplate::parse(&entry.template)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const YAML: &str = r#"
- applications:
    - name: foo
    - name: api
      alias: api-v2
    - regexp: "worker-.*"
  environments: [staging, production]
  instances: 3
  reverseInstanceOrder: true
  template: "{{.Application}}-{{.Environment}}{{.InstanceNumber}}"
- applications:
    - name: foo
  environments: [production]
  instances: 1
  template: "foo-lb.{{.Environment}}"
"#;

    #[test]
    fn parse_yaml_entries() {
        let config = Config::from_yaml_str(YAML).unwrap();
        assert_eq!(config.entries.len(), 2);

        let first = &config.entries[0];
        assert_eq!(first.applications.len(), 3);
        assert_eq!(first.applications[1].alias.as_deref(), Some("api-v2"));
        assert_eq!(first.applications[2].regexp.as_deref(), Some("worker-.*"));
        assert!(first.reverse_instance_order);
        assert!(first.has_environment("staging"));

        // reverseInstanceOrder defaults to false.
        assert!(!config.entries[1].reverse_instance_order);
    }

    #[test]
    fn parse_toml_entries() {
        let toml_str = r#"
[[entries]]
applications = [{ name = "foo" }]
environments = ["production"]
instances = 2
template = "foo-{{.Environment}}{{.InstanceNumber}}"
"#;
        let config = Config::from_toml_str(toml_str).unwrap();
        assert_eq!(config.entries.len(), 1);
        assert_eq!(config.entries[0].instances, 2);
    }

    #[test]
    fn empty_yaml_is_empty_config() {
        let config = Config::from_yaml_str("\n").unwrap();
        assert!(config.entries.is_empty());
    }

    #[test]
    fn instance_numbers_forward_and_reverse() {
        let mut entry = ConfigEntry {
            applications: vec![ApplicationMatcher::name("foo")],
            environments: vec!["production".to_string()],
            instances: 3,
            reverse_instance_order: false,
            template: "foo{{.InstanceNumber}}".to_string(),
        };
        assert_eq!(entry.instance_numbers(), vec![1, 2, 3]);

        entry.reverse_instance_order = true;
        assert_eq!(entry.instance_numbers(), vec![3, 2, 1]);

        entry.instances = 0;
        assert!(entry.instance_numbers().is_empty());
    }

    #[test]
    fn invalid_regexp_fails_validation() {
        let yaml = r#"
- applications: [{ regexp: "worker-(" }]
  environments: [production]
  instances: 1
  template: "{{.Application}}"
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { entry: 0, .. }));
    }

    #[test]
    fn invalid_template_fails_validation() {
        let yaml = r#"
- applications: [{ name: foo }]
  environments: [production]
  instances: 1
  template: "{{.Host}}"
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTemplate { .. }));
    }

    #[test]
    fn empty_regexp_is_not_a_pattern() {
        let m = ApplicationMatcher {
            name: Some("foo".to_string()),
            alias: None,
            regexp: Some(String::new()),
        };
        assert!(m.full_match_regex().is_none());
    }

    #[test]
    fn regexp_is_anchored() {
        let re = ApplicationMatcher::regexp("worker-.*")
            .full_match_regex()
            .unwrap()
            .unwrap();
        assert!(re.is_match("worker-eu"));
        assert!(!re.is_match("old-worker-eu"));
    }

    #[test]
    fn from_file_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("config.yml");
        std::fs::File::create(&yaml_path)
            .unwrap()
            .write_all(YAML.as_bytes())
            .unwrap();
        assert_eq!(Config::from_file(&yaml_path).unwrap().entries.len(), 2);

        let ini_path = dir.path().join("config.ini");
        std::fs::write(&ini_path, "x=1").unwrap();
        assert!(matches!(
            Config::from_file(&ini_path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn search_paths_start_in_working_directory() {
        let paths = Config::search_paths();
        assert_eq!(paths[0], PathBuf::from("./config.yml"));
        assert!(paths.len() >= CONFIG_FILE_NAMES.len());
    }
}
