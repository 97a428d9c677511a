//! Operator-facing summaries.

use std::fmt::Write;

use colored::Colorize;
use switchctl_remote::{ErrorRecord, RemoteHost, describe_version};
use switchctl_rollout::{Application, Orchestrator};

fn error_list(errors: &[ErrorRecord]) -> String {
    let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
    format!("[{}]", messages.join(", "))
}

fn write_errors_with_output(out: &mut String, errors: &[ErrorRecord], indent: &str) {
    for record in errors {
        let _ = writeln!(out, "{indent}- {}", record.message);
        if let Some(command) = &record.command {
            let _ = writeln!(out, "{indent}  command: {}", command.command_line);
            for line in command.combined.lines() {
                let _ = writeln!(out, "{indent}  | {line}");
            }
        }
    }
}

fn write_skipped_instance(out: &mut String, host: &RemoteHost) {
    let _ = writeln!(
        out,
        "    - hostname: {} (skipping...)\n      current:  {}\n      errors:   {}",
        host.hostname().red(),
        describe_version(host.current_version()),
        error_list(host.errors())
    );
}

/// What is about to be switched and what is skipped.
pub fn render_plan(orchestrator: &Orchestrator) -> String {
    let ctx = orchestrator.context();
    let mut out = String::new();

    let ready = orchestrator.successful_applications();
    if !ready.is_empty() {
        let _ = writeln!(out, "Going to switch following applications:");
        if ctx.dryrun {
            let _ = writeln!(out, "{}", "(dry run, the agents only report what they would do)".cyan());
        }
        let _ = writeln!(out);

        for app in ready {
            let _ = writeln!(
                out,
                "  - name:       {}\n    version:    {}",
                app.name().yellow(),
                app.version().yellow()
            );
            for host in app.successful_instances() {
                if host.has_errors() {
                    write_skipped_instance(&mut out, host);
                } else {
                    let _ = writeln!(
                        out,
                        "    - hostname: {}\n      current:  {}",
                        host.hostname().yellow(),
                        describe_version(host.current_version())
                    );
                }
            }
            for host in app.failed_instances() {
                write_skipped_instance(&mut out, host);
            }
            let _ = writeln!(out);
        }
    }

    let skipped = orchestrator.failed_applications();
    if !skipped.is_empty() {
        let _ = writeln!(out, "Following applications are going to be skipped:");
        let _ = writeln!(out);

        for app in skipped {
            write_skipped_application(&mut out, app);
        }
    }

    out
}

fn write_skipped_application(out: &mut String, app: &Application) {
    let _ = writeln!(
        out,
        "  - name:       {}\n    version:    {}\n    errors:",
        app.name().red(),
        app.version().red()
    );
    write_errors_with_output(out, app.errors(), "      ");

    for host in app.failed_instances() {
        let _ = writeln!(
            out,
            "    - hostname: {}\n      current:  {}",
            host.hostname().red(),
            describe_version(host.current_version())
        );
    }
    for host in app
        .successful_instances()
        .iter()
        .chain(app.unattempted_instances())
    {
        let _ = writeln!(
            out,
            "    - hostname: {} {}",
            host.hostname().yellow(),
            describe_version(host.current_version())
        );
    }
    let _ = writeln!(out);
}

/// Outcome of the switch phase.
pub fn render_result(orchestrator: &Orchestrator) -> String {
    let mut out = String::new();

    for app in orchestrator.switched_applications() {
        let _ = writeln!(
            out,
            "{} {} switched to {}",
            "✓".green(),
            app.name(),
            app.version()
        );
    }

    for app in orchestrator.switch_failed_applications() {
        let _ = writeln!(
            out,
            "{} {} failed to switch to {}",
            "✗".red(),
            app.name(),
            app.version()
        );
        write_errors_with_output(&mut out, app.errors(), "    ");
    }

    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use switchctl_core::{ApplicationMatcher, ApplicationRequest, Config, ConfigEntry};
    use switchctl_remote::mock::{MockExecutor, MockResponse};
    use switchctl_resolve::{ConfigResolver, StaticResolver};
    use switchctl_rollout::RolloutContext;

    use super::*;

    fn orchestrator(exec: &MockExecutor, environment: &str) -> Orchestrator {
        colored::control::set_override(false);
        let entry = ConfigEntry {
            applications: vec![ApplicationMatcher::regexp("foo|bar")],
            environments: vec!["staging".to_string(), "production".to_string()],
            instances: 2,
            reverse_instance_order: false,
            template: "{{.Application}}-{{.Environment}}{{.InstanceNumber}}".to_string(),
        };
        let hosts = [
            "foo-staging1",
            "foo-staging2",
            "bar-staging1",
            "bar-staging2",
        ];
        let resolver = ConfigResolver::new(
            Arc::new(Config::new(vec![entry]).unwrap()),
            Arc::new(StaticResolver::new(hosts)),
        );
        Orchestrator::new(
            RolloutContext::new(resolver, Arc::new(exec.clone()), environment),
            2,
        )
    }

    #[tokio::test]
    async fn plan_lists_instances_and_skipped_applications() {
        let exec = MockExecutor::new()
            .with_version("foo-staging1", "1.0.0", "2020-05-01")
            .fail_connect("foo-staging2")
            .respond(
                "bar-staging1",
                "switch -a bar -v 2.0 --prefetch",
                MockResponse::exit(1, "artifact not found"),
            )
            .respond(
                "bar-staging2",
                "switch -a bar -v 2.0 --prefetch",
                MockResponse::exit(1, "artifact not found"),
            );
        let mut o = orchestrator(&exec, "staging");
        o.load_all(&[
            ApplicationRequest::new("foo", "2.0"),
            ApplicationRequest::new("bar", "2.0"),
        ])
        .await
        .unwrap();

        let plan = render_plan(&o);
        assert!(plan.contains("Going to switch following applications:"));
        assert!(plan.contains("    - hostname: foo-staging1\n      current:  1.0.0 [2020-05-01]"));
        assert!(plan.contains("    - hostname: foo-staging2 (skipping...)\n      current:  <error>"));
        assert!(plan.contains("Following applications are going to be skipped:"));
        assert!(plan.contains("bar-staging1: Failed to prefetch artifact bar (2.0)"));
        assert!(plan.contains("| artifact not found"));
        assert!(plan.contains("bar: no successful instance found"));
    }

    #[tokio::test]
    async fn result_reports_failed_switch_with_output() {
        let exec = MockExecutor::new().respond(
            "foo-production1",
            "switch -a foo -v 2.0 -y",
            MockResponse::exit(3, "cannot activate"),
        );
        let entry = ConfigEntry {
            applications: vec![ApplicationMatcher::name("foo")],
            environments: vec!["production".to_string()],
            instances: 1,
            reverse_instance_order: false,
            template: "{{.Application}}-{{.Environment}}{{.InstanceNumber}}".to_string(),
        };
        let resolver = ConfigResolver::new(
            Arc::new(Config::new(vec![entry]).unwrap()),
            Arc::new(StaticResolver::new(["foo-production1"])),
        );
        colored::control::set_override(false);
        let mut o = Orchestrator::new(
            RolloutContext::new(resolver, Arc::new(exec.clone()), "production"),
            1,
        );
        o.load_all(&[ApplicationRequest::new("foo", "2.0")]).await.unwrap();
        o.switch_all().await.unwrap();

        let result = render_result(&o);
        assert!(result.contains("✗ foo failed to switch to 2.0"));
        assert!(result.contains("foo-production1: Failed to switch foo to 2.0"));
        assert!(result.contains("command: switch -a foo -v 2.0 -y"));
        assert!(result.contains("| cannot activate"));
    }
}
