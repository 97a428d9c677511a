//! Instance discovery.
//!
//! Every config entry is evaluated independently for a requested
//! application: an application matched by several entries receives the
//! instances of all of them, concatenated in entry order.

use std::sync::Arc;

use switchctl_core::{Config, ConfigEntry, HostnameTemplate, TemplateVars};
use tracing::{debug, warn};

use crate::dns::HostnameResolver;

/// Which matcher field recognised the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Name,
    Alias,
    Regexp,
}

/// Result of matching an application name against one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationMatch {
    pub kind: MatchKind,
    /// Name substituted for `.Application` in the template.
    pub rendering_name: String,
}

/// A rendered hostname before DNS validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub hostname: String,
    /// Index of the entry that produced this candidate.
    pub entry: usize,
    pub instance_number: u32,
}

/// Match `application` against an entry's matchers.
///
/// Matchers are tried in order and the first that matches wins. Within a
/// matcher the exact name is checked first, then the alias, then the
/// (non-empty, fully anchored) regexp. A name or alias match renders
/// hostnames with the matcher's alias when it has one; a regexp match
/// renders the requested name.
pub fn match_application(entry: &ConfigEntry, application: &str) -> Option<ApplicationMatch> {
    for matcher in &entry.applications {
        let kind = if matcher.name.as_deref() == Some(application) {
            Some(MatchKind::Name)
        } else if matcher.alias.as_deref() == Some(application) {
            Some(MatchKind::Alias)
        } else {
            match matcher.full_match_regex() {
                Some(Ok(re)) if re.is_match(application) => Some(MatchKind::Regexp),
                Some(Err(e)) => {
                    warn!(pattern = ?matcher.regexp, error = %e, "ignoring invalid regexp matcher");
                    None
                }
                _ => None,
            }
        };

        if let Some(kind) = kind {
            let rendering_name = match kind {
                MatchKind::Regexp => application,
                MatchKind::Name | MatchKind::Alias => {
                    matcher.alias.as_deref().unwrap_or(application)
                }
            }
            .to_string();
            return Some(ApplicationMatch {
                kind,
                rendering_name,
            });
        }
    }
    None
}

/// Discovers the hosts that run an application in an environment.
#[derive(Clone)]
pub struct ConfigResolver {
    config: Arc<Config>,
    dns: Arc<dyn HostnameResolver>,
}

impl ConfigResolver {
    pub fn new(config: Arc<Config>, dns: Arc<dyn HostnameResolver>) -> Self {
        Self { config, dns }
    }

    /// Rendered hostnames for every matching entry, before DNS checks.
    pub fn candidates(&self, application: &str, environment: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for (index, entry) in self.config.entries.iter().enumerate() {
            let Some(matched) = match_application(entry, application) else {
                continue;
            };
            if !entry.has_environment(environment) {
                continue;
            }

            let template = match HostnameTemplate::parse(&entry.template) {
                Ok(t) => t,
                Err(e) => {
                    warn!(entry = index, error = %e, "skipping entry with invalid template");
                    continue;
                }
            };

            debug!(
                %application,
                entry = index,
                kind = ?matched.kind,
                rendering_name = %matched.rendering_name,
                instances = entry.instances,
                reverse = entry.reverse_instance_order,
                "config entry matched"
            );

            for instance_number in entry.instance_numbers() {
                let hostname = template.render(&TemplateVars {
                    application: &matched.rendering_name,
                    environment,
                    instance_number,
                });
                candidates.push(Candidate {
                    hostname,
                    entry: index,
                    instance_number,
                });
            }
        }

        candidates
    }

    /// Hostnames that run `application` in `environment`, in production
    /// order. Candidates that do not resolve are dropped silently.
    pub async fn resolve(&self, application: &str, environment: &str) -> Vec<String> {
        let mut hostnames = Vec::new();

        for candidate in self.candidates(application, environment) {
            if self.dns.resolves(&candidate.hostname).await {
                hostnames.push(candidate.hostname);
            } else {
                debug!(
                    %application,
                    hostname = %candidate.hostname,
                    "candidate does not resolve, skipping"
                );
            }
        }

        if hostnames.is_empty() {
            debug!(%application, %environment, "no instances resolved");
        }
        hostnames
    }
}

#[cfg(test)]
mod tests {
    use switchctl_core::ApplicationMatcher;

    use super::*;
    use crate::dns::StaticResolver;

    fn entry(
        matchers: Vec<ApplicationMatcher>,
        environments: &[&str],
        instances: u32,
        reverse: bool,
        template: &str,
    ) -> ConfigEntry {
        ConfigEntry {
            applications: matchers,
            environments: environments.iter().map(|e| e.to_string()).collect(),
            instances,
            reverse_instance_order: reverse,
            template: template.to_string(),
        }
    }

    const TEMPLATE: &str = "{{.Application}}-{{.Environment}}{{.InstanceNumber}}";

    fn resolver(entries: Vec<ConfigEntry>, hosts: &[&str]) -> ConfigResolver {
        ConfigResolver::new(
            Arc::new(Config::new(entries).unwrap()),
            Arc::new(StaticResolver::new(hosts.iter().copied())),
        )
    }

    fn hostnames(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.hostname.as_str()).collect()
    }

    #[test]
    fn forward_order_numbers_one_to_n() {
        let r = resolver(
            vec![entry(vec![ApplicationMatcher::name("foo")], &["production"], 3, false, TEMPLATE)],
            &[],
        );
        let c = r.candidates("foo", "production");
        assert_eq!(
            c.iter().map(|c| c.instance_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn reverse_order_numbers_n_to_one() {
        let r = resolver(
            vec![entry(vec![ApplicationMatcher::name("foo")], &["production"], 3, true, TEMPLATE)],
            &[],
        );
        let c = r.candidates("foo", "production");
        assert_eq!(
            hostnames(&c),
            vec!["foo-production3", "foo-production2", "foo-production1"]
        );
    }

    #[test]
    fn alias_is_used_for_rendering() {
        let r = resolver(
            vec![entry(
                vec![ApplicationMatcher::name("app").with_alias("app-a")],
                &["production"],
                1,
                false,
                TEMPLATE,
            )],
            &[],
        );

        let by_name = r.candidates("app", "production");
        assert_eq!(hostnames(&by_name), vec!["app-a-production1"]);

        let by_alias = r.candidates("app-a", "production");
        assert_eq!(hostnames(&by_alias), vec!["app-a-production1"]);
    }

    #[test]
    fn match_kind_precedence_within_matcher() {
        let e = entry(
            vec![ApplicationMatcher {
                name: Some("app".to_string()),
                alias: Some("app-a".to_string()),
                regexp: Some("app.*".to_string()),
            }],
            &["production"],
            1,
            false,
            TEMPLATE,
        );
        assert_eq!(match_application(&e, "app").unwrap().kind, MatchKind::Name);
        assert_eq!(match_application(&e, "app-a").unwrap().kind, MatchKind::Alias);
        assert_eq!(match_application(&e, "app-b").unwrap().kind, MatchKind::Regexp);
        assert!(match_application(&e, "other").is_none());
    }

    #[test]
    fn first_matching_matcher_wins() {
        let e = entry(
            vec![
                ApplicationMatcher::regexp("api-.*").with_alias("api-pool"),
                ApplicationMatcher::name("api-eu"),
            ],
            &["production"],
            1,
            false,
            TEMPLATE,
        );
        let m = match_application(&e, "api-eu").unwrap();
        assert_eq!(m.kind, MatchKind::Regexp);
        assert_eq!(m.rendering_name, "api-eu");
    }

    #[test]
    fn regexp_match_renders_requested_name() {
        let r = resolver(
            vec![entry(
                vec![ApplicationMatcher::regexp("api-.*").with_alias("api-pool")],
                &["production"],
                1,
                false,
                TEMPLATE,
            )],
            &[],
        );
        let candidates = r.candidates("api-eu", "production");
        assert_eq!(hostnames(&candidates), vec!["api-eu-production1"]);
    }

    #[test]
    fn regexp_requires_full_match() {
        let e = entry(
            vec![ApplicationMatcher::regexp("worker")],
            &["production"],
            1,
            false,
            TEMPLATE,
        );
        assert!(match_application(&e, "worker").is_some());
        assert!(match_application(&e, "worker-eu").is_none());
    }

    #[test]
    fn environment_must_match_exactly() {
        let r = resolver(
            vec![entry(vec![ApplicationMatcher::name("foo")], &["production"], 2, false, TEMPLATE)],
            &[],
        );
        assert!(r.candidates("foo", "prod").is_empty());
        assert!(r.candidates("foo", "staging").is_empty());
    }

    #[test]
    fn matching_entries_are_concatenated_in_order() {
        let r = resolver(
            vec![
                entry(vec![ApplicationMatcher::name("foo")], &["production"], 2, false, TEMPLATE),
                entry(vec![ApplicationMatcher::name("bar")], &["production"], 1, false, TEMPLATE),
                entry(
                    vec![ApplicationMatcher::regexp("f.o")],
                    &["production"],
                    1,
                    false,
                    "{{.Application}}-lb.{{.Environment}}",
                ),
            ],
            &[],
        );
        let c = r.candidates("foo", "production");
        assert_eq!(
            hostnames(&c),
            vec!["foo-production1", "foo-production2", "foo-lb.production"]
        );
        assert_eq!(c[2].entry, 2);
    }

    #[tokio::test]
    async fn unresolvable_candidates_are_dropped() {
        let r = resolver(
            vec![entry(vec![ApplicationMatcher::name("foo")], &["production"], 3, false, TEMPLATE)],
            &["foo-production1", "foo-production3"],
        );
        let hosts = r.resolve("foo", "production").await;
        assert_eq!(hosts, vec!["foo-production1", "foo-production3"]);
    }

    #[tokio::test]
    async fn no_match_resolves_nothing() {
        let r = resolver(
            vec![entry(vec![ApplicationMatcher::name("foo")], &["production"], 3, false, TEMPLATE)],
            &["foo-production1"],
        );
        assert!(r.resolve("bar", "production").await.is_empty());
    }
}
