//! Run an app's step list against an open session.
//!
//! Steps run strictly in order and the first failure ends the sequence:
//! each step assumes the UI state the previous one produced.

use serde::{Deserialize, Serialize};

use crate::app::{AppConfig, StepKind, StepSpec};
use crate::artifacts::ArtifactStore;
use crate::driver::DeviceSession;
use crate::matcher::{self, MatchResult};
use crate::template::load_template;

/// Outcome of a whole step list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepResult {
    /// Every step passed (`steps` may be zero)
    Passed { steps: usize },
    /// Step `step` (1-based) failed; later steps never ran
    Failed { step: usize, reason: String },
}

impl StepResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, StepResult::Passed { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            StepResult::Passed { .. } => None,
            StepResult::Failed { reason, .. } => Some(reason),
        }
    }
}

/// Execute `app.steps` in order.
pub async fn run_steps(
    session: &dyn DeviceSession,
    app: &AppConfig,
    artifacts: &ArtifactStore,
) -> StepResult {
    let total = app.steps.len();

    for (index, raw) in app.steps.iter().enumerate() {
        let step_no = index + 1;

        let step = match StepSpec::parse(step_no, raw, &app.asset_root) {
            Ok(step) => step,
            Err(rejection) => {
                tracing::error!(app = %app.name, "{}", rejection);
                return StepResult::Failed {
                    step: step_no,
                    reason: rejection.to_string(),
                };
            }
        };

        let tuning = app.tuning_for(&step.tuning);
        tracing::info!(
            "Step {}/{}: {} {} (thr {}, tapY% {})",
            step_no,
            total,
            step.kind,
            step.png,
            tuning.image_threshold,
            tuning.tap_y_percent
        );

        let outcome = match load_template(&step.template) {
            Ok(template) => {
                let result = match step.kind {
                    StepKind::TapImage => matcher::locate_and_tap(session, &template, &tuning).await,
                    StepKind::AssertImage => matcher::locate_only(session, &template, &tuning).await,
                };
                result.map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        let failure = match outcome {
            Ok(MatchResult::Matched { .. }) => None,
            Ok(MatchResult::Exhausted { error, .. }) => Some(error.to_string()),
            Err(reason) => Some(reason),
        };

        if let Some(message) = failure {
            save_screenshot(session, artifacts, &artifacts.failure_path(&app.name, step_no)).await;
            let reason = format!("Step {} failed ({}): {}", step_no, step.png, message);
            tracing::error!(app = %app.name, "{}", reason);
            return StepResult::Failed {
                step: step_no,
                reason,
            };
        }

        if step.screenshot_after {
            save_screenshot(session, artifacts, &artifacts.after_step_path(&app.name, step_no)).await;
        }
    }

    StepResult::Passed { steps: total }
}

/// Best-effort capture: a failure is logged and dropped here.
async fn save_screenshot(session: &dyn DeviceSession, artifacts: &ArtifactStore, path: &std::path::Path) {
    match artifacts.capture(session, path).await {
        Ok(()) => tracing::info!("Saved screenshot: {}", path.display()),
        Err(e) => tracing::warn!("Failed to save screenshot {}: {}", path.display(), e),
    }
}
