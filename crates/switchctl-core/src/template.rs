//! Hostname templates.
//!
//! Templates use the `{{.Field}}` action syntax operators already write
//! in their config files, e.g. `{{.Application}}-{{.Environment}}{{.InstanceNumber}}`.
//! Only three fields exist; anything else is rejected when the template
//! is parsed so a typo fails at config load instead of producing
//! unresolvable hostnames.

use std::fmt;

use crate::error::{ConfigError, ConfigResult};

/// A field that can be referenced from a hostname template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateField {
    Application,
    Environment,
    InstanceNumber,
}

impl TemplateField {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Application" => Some(Self::Application),
            "Environment" => Some(Self::Environment),
            "InstanceNumber" => Some(Self::InstanceNumber),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(TemplateField),
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    /// Application name after alias resolution.
    pub application: &'a str,
    pub environment: &'a str,
    pub instance_number: u32,
}

/// A parsed hostname template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostnameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl HostnameTemplate {
    /// Parse a template string.
    pub fn parse(source: &str) -> ConfigResult<Self> {
        let invalid = |message: String| ConfigError::InvalidTemplate {
            template: source.to_string(),
            message,
        };

        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find("}}") else {
                return Err(invalid("unterminated action".to_string()));
            };

            let action = after_open[..end].trim();
            let Some(name) = action.strip_prefix('.') else {
                return Err(invalid(format!("unsupported action {{{{{action}}}}}")));
            };
            let field = TemplateField::from_name(name)
                .ok_or_else(|| invalid(format!("unknown field .{name}")))?;
            segments.push(Segment::Field(field));

            rest = &after_open[end + 2..];
        }

        if rest.contains("}}") {
            return Err(invalid("unmatched closing braces".to_string()));
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        if segments.is_empty() {
            return Err(invalid("template is empty".to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Render the template with the given values.
    pub fn render(&self, vars: &TemplateVars<'_>) -> String {
        let mut out = String::with_capacity(self.source.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(TemplateField::Application) => out.push_str(vars.application),
                Segment::Field(TemplateField::Environment) => out.push_str(vars.environment),
                Segment::Field(TemplateField::InstanceNumber) => {
                    out.push_str(&vars.instance_number.to_string())
                }
            }
        }
        out
    }

    /// Whether the template references the given field.
    pub fn references(&self, field: TemplateField) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Field(f) if *f == field))
    }

    /// The original template text.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for HostnameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(application: &'a str, environment: &'a str, n: u32) -> TemplateVars<'a> {
        TemplateVars {
            application,
            environment,
            instance_number: n,
        }
    }

    #[test]
    fn renders_all_fields() {
        let t = HostnameTemplate::parse("{{.Application}}-{{.Environment}}{{.InstanceNumber}}")
            .unwrap();
        assert_eq!(t.render(&vars("foo", "production", 2)), "foo-production2");
    }

    #[test]
    fn tolerates_whitespace_inside_actions() {
        let t = HostnameTemplate::parse("{{ .Application }}.{{ .Environment }}.example.com")
            .unwrap();
        assert_eq!(t.render(&vars("api", "staging", 1)), "api.staging.example.com");
    }

    #[test]
    fn literal_only_template_is_allowed() {
        let t = HostnameTemplate::parse("bastion.example.com").unwrap();
        assert_eq!(t.render(&vars("x", "y", 1)), "bastion.example.com");
        assert!(!t.references(TemplateField::InstanceNumber));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = HostnameTemplate::parse("{{.Application}}-{{.Region}}").unwrap_err();
        assert!(err.to_string().contains("unknown field .Region"));
    }

    #[test]
    fn unterminated_action_is_rejected() {
        assert!(HostnameTemplate::parse("{{.Application").is_err());
        assert!(HostnameTemplate::parse("foo}}").is_err());
    }

    #[test]
    fn non_field_action_is_rejected() {
        assert!(HostnameTemplate::parse("{{printf \"%s\" .Application}}").is_err());
    }

    #[test]
    fn empty_template_is_rejected() {
        assert!(HostnameTemplate::parse("").is_err());
    }

    #[test]
    fn references_reports_used_fields() {
        let t = HostnameTemplate::parse("foo-{{.InstanceNumber}}").unwrap();
        assert!(t.references(TemplateField::InstanceNumber));
        assert!(!t.references(TemplateField::Application));
        assert_eq!(t.to_string(), "foo-{{.InstanceNumber}}");
    }
}
