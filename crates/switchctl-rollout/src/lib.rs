//! switchctl-rollout — phased, bounded-concurrency version cutover.
//!
//! ```text
//!                 ┌──────────────┐
//!   requests ───► │ Orchestrator │── load gate ──► Application::load   (resolve → connect → version → prefetch)
//!                 │              │── switch gate ► Application::switch (sequential per application)
//!                 └──────┬───────┘
//!                        │ RolloutEvents (progress observer)
//!                        ▼
//!                     caller UI
//! ```
//!
//! # Components
//!
//! - **`application`** — per-application pipeline and state machine
//! - **`policy`** — staging-tolerant / strict partial-failure policy
//! - **`gate`** — FIFO counting semaphore bounding in-flight work
//! - **`orchestrator`** — Load and Switch over every application
//! - **`events`** — observer for per-instance outcomes
//! - **`context`** — collaborators shared by a run

pub mod application;
pub mod context;
pub mod error;
pub mod events;
pub mod gate;
pub mod orchestrator;
pub mod policy;

pub use application::{Application, ApplicationState};
pub use context::{DEFAULT_PORT, RolloutContext};
pub use error::{RolloutError, RolloutResult};
pub use events::{NoopEvents, Phase, RolloutEvents};
pub use gate::{ConcurrencyGate, GatePermit};
pub use orchestrator::{DEFAULT_WORKERS, Orchestrator};
pub use policy::{FailurePolicy, STAGING};
