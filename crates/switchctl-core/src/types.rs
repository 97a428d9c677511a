//! Request types shared across crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One requested `application:version` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationRequest {
    pub name: String,
    pub version: String,
}

impl ApplicationRequest {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    /// Parse a comma-separated list of `application:version` pairs.
    pub fn parse_list(value: &str) -> Result<Vec<Self>, ConfigError> {
        value
            .split(',')
            .filter(|item| !item.trim().is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for ApplicationRequest {
    type Err = ConfigError;

    /// Splits on the first `:`; the version may itself contain colons.
    /// Names are limited to `[A-Za-z0-9._-]`, versions additionally allow
    /// `:` and `+`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(':') {
            Some((name, version))
                if valid_word(name, &['.', '_', '-'])
                    && valid_word(version, &['.', '_', '-', ':', '+']) =>
            {
                Ok(Self::new(name, version))
            }
            _ => Err(ConfigError::InvalidRequest(s.to_string())),
        }
    }
}

fn valid_word(word: &str, extra: &[char]) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || extra.contains(&c))
}

impl fmt::Display for ApplicationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_version() {
        let req: ApplicationRequest = "foo:1.2.3".parse().unwrap();
        assert_eq!(req, ApplicationRequest::new("foo", "1.2.3"));
        assert_eq!(req.to_string(), "foo:1.2.3");
    }

    #[test]
    fn version_keeps_extra_colons() {
        let req: ApplicationRequest = "foo:build:42".parse().unwrap();
        assert_eq!(req.name, "foo");
        assert_eq!(req.version, "build:42");
    }

    #[test]
    fn missing_version_is_rejected() {
        assert!("foo".parse::<ApplicationRequest>().is_err());
        assert!("foo:".parse::<ApplicationRequest>().is_err());
        assert!(":1.0".parse::<ApplicationRequest>().is_err());
    }

    #[test]
    fn shell_metacharacters_are_rejected() {
        for bad in ["foo;reboot:1", "foo:1;reboot", "foo bar:1", "foo:$(id)", "a:b:c'd", "foo:1`x`"] {
            assert!(bad.parse::<ApplicationRequest>().is_err(), "{bad}");
        }
        let req: ApplicationRequest = "my_app-2.api:1.2.3+build.7".parse().unwrap();
        assert_eq!(req.version, "1.2.3+build.7");
    }

    #[test]
    fn parse_comma_separated_list() {
        let list = ApplicationRequest::parse_list("foo:1.0,bar:2.0").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1], ApplicationRequest::new("bar", "2.0"));

        assert!(ApplicationRequest::parse_list("foo:1.0,bar").is_err());
    }
}
