//! switchctl-core — configuration model, hostname templates, and
//! request types shared by every switchctl crate.
//!
//! # Components
//!
//! - **`config`** — ordered list of entries mapping application matchers
//!   and environments to hostname templates (YAML or TOML on disk)
//! - **`template`** — `{{.Application}}`-style hostname templates
//! - **`types`** — `name:version` application requests

pub mod config;
pub mod error;
pub mod template;
pub mod types;

pub use config::{ApplicationMatcher, Config, ConfigEntry};
pub use error::{ConfigError, ConfigResult};
pub use template::{HostnameTemplate, TemplateVars};
pub use types::ApplicationRequest;
