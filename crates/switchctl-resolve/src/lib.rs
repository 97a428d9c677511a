//! switchctl-resolve — turns an application name and environment into
//! the concrete hostnames that run it.
//!
//! # Resolution
//!
//! ```text
//! ConfigResolver
//!   ├── for each ConfigEntry (in order, all of them)
//!   │   ├── match application (name → alias → regexp)
//!   │   ├── match environment
//!   │   └── render template for each instance number
//!   └── HostnameResolver (drop candidates that do not resolve)
//! ```

pub mod dns;
pub mod resolver;

pub use dns::{HostnameResolver, ResolveFuture, StaticResolver, SystemResolver};
pub use resolver::{ApplicationMatch, Candidate, ConfigResolver, MatchKind, match_application};
