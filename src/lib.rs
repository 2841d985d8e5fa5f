//! Visual Tap - vision-based UI tests for mobile apps.
//!
//! Each app is launched through an Appium session; on-screen elements are
//! found by template-image matching rather than accessibility ids, then
//! tapped or asserted. This crate provides:
//! - A retrying match engine around the `-image` locator strategy
//! - Tap-point calculation inside matched rectangles
//! - Step orchestration with fail-fast and diagnostic screenshots
//! - Per-app run control with guaranteed session teardown
//! - Descriptor discovery and validation
//!
//! # Example
//!
//! ```rust,no_run
//! use visual_tap::{AppRunner, ArtifactStore, WebDriverProvider, config, load_all, run_all};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = config::get();
//! let apps = load_all(&cfg.paths, None)?;
//! let provider = WebDriverProvider::from_settings(&cfg.server)?;
//! let runner = AppRunner::new(provider, cfg.device.clone(), ArtifactStore::new(&cfg.paths.artifacts_dir));
//! let summary = run_all(&runner, &apps).await;
//! println!("{}", summary.render());
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod artifacts;
pub mod config;
pub mod driver;
pub mod error;
pub mod matcher;
pub mod orchestrator;
pub mod runner;
pub mod summary;
pub mod template;
pub mod tuning;

// Re-export descriptor types and loading
pub use app::{AppConfig, StepKind, StepRejection, StepSpec, load_all, load_app_config};

// Re-export the driver seam
pub use driver::{Capabilities, DeviceSession, ElementRect, SessionProvider, WebDriverProvider};

// Re-export engine and orchestration
pub use matcher::{MatchError, MatchHit, MatchResult, TapPoint, locate_and_tap, locate_only, tap_point};
pub use orchestrator::{StepResult, run_steps};
pub use runner::{AppRunner, RunPhase, RunResult};
pub use summary::{RunSummary, run_all};

pub use artifacts::ArtifactStore;
pub use error::{ConfigError, DriverError, TemplateError};
pub use template::{TemplateImage, load_template};
pub use tuning::{TuningOverrides, TuningParams};
