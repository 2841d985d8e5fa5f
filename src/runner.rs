//! End-to-end run of one app: open a session, tap the home icon, run the
//! steps, always tear the session down.
//!
//! Phases: init (home template) → session open → home match → steps →
//! succeeded/failed → torn down. Every failure becomes a [`RunResult`];
//! nothing escapes [`AppRunner::run`], panics included.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use crate::app::AppConfig;
use crate::artifacts::ArtifactStore;
use crate::config::DeviceSettings;
use crate::driver::{DeviceSession, SessionProvider};
use crate::matcher::{self, MatchResult};
use crate::orchestrator::{StepResult, run_steps};
use crate::template::{TemplateImage, load_template};

/// Where a failed run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    SessionOpen,
    HomeMatch,
    Steps,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Init => "init",
            RunPhase::SessionOpen => "session open",
            RunPhase::HomeMatch => "home match",
            RunPhase::Steps => "steps",
        };
        f.write_str(s)
    }
}

/// Result of a complete app run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// App name
    pub name: String,

    /// Home icon matched and every step passed
    pub ok: bool,

    /// Home-icon attempts consumed (0 when no attempt was possible)
    pub attempt: u32,

    /// Match threshold used for the home icon
    pub threshold: f64,

    /// Wall-clock time from session-open attempt to completion
    pub duration_ms: u64,

    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Phase the run failed in; `None` on success or for an unexpected fault
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_phase: Option<RunPhase>,
}

impl RunResult {
    fn passed(app: &AppConfig, attempt: u32, duration: Duration) -> Self {
        Self {
            name: app.name.clone(),
            ok: true,
            attempt,
            threshold: app.threshold(),
            duration_ms: duration.as_millis() as u64,
            error: None,
            failed_phase: None,
        }
    }

    fn failed(
        app: &AppConfig,
        attempt: u32,
        duration: Duration,
        phase: Option<RunPhase>,
        error: String,
    ) -> Self {
        Self {
            name: app.name.clone(),
            ok: false,
            attempt,
            threshold: app.threshold(),
            duration_ms: duration.as_millis() as u64,
            error: Some(error),
            failed_phase: phase,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

#[derive(Debug)]
struct RunFailure {
    attempt: u32,
    phase: RunPhase,
    reason: String,
}

/// Runs apps one at a time against a session provider
pub struct AppRunner<P> {
    provider: P,
    device: DeviceSettings,
    artifacts: ArtifactStore,
}

impl<P: SessionProvider> AppRunner<P> {
    pub fn new(provider: P, device: DeviceSettings, artifacts: ArtifactStore) -> Self {
        Self {
            provider,
            device,
            artifacts,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Run one app end to end.
    pub async fn run(&self, app: &AppConfig) -> RunResult {
        let home = match load_template(&app.home_icon) {
            Ok(home) => home,
            Err(e) => {
                tracing::error!(app = %app.name, phase = %RunPhase::Init, "{}", e);
                return RunResult::failed(app, 0, Duration::ZERO, Some(RunPhase::Init), e.to_string());
            }
        };

        let started = Instant::now();
        let capabilities = app.capabilities(&self.device);
        let session = match self.provider.open(&capabilities).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(app = %app.name, phase = %RunPhase::SessionOpen, "{}", e);
                return RunResult::failed(
                    app,
                    0,
                    started.elapsed(),
                    Some(RunPhase::SessionOpen),
                    e.to_string(),
                );
            }
        };

        let outcome = AssertUnwindSafe(self.drive(session.as_ref(), app, &home))
            .catch_unwind()
            .await;
        let duration = started.elapsed();

        teardown(session.as_ref(), &app.name).await;

        match outcome {
            Ok(Ok(attempt)) => {
                tracing::info!(app = %app.name, attempt, "Run succeeded");
                RunResult::passed(app, attempt, duration)
            }
            Ok(Err(failure)) => {
                tracing::warn!(app = %app.name, phase = %failure.phase, "Run failed: {}", failure.reason);
                RunResult::failed(app, failure.attempt, duration, Some(failure.phase), failure.reason)
            }
            Err(panic) => {
                let reason = format!("unexpected fault: {}", panic_message(panic.as_ref()));
                tracing::error!(app = %app.name, "{}", reason);
                RunResult::failed(app, 0, duration, None, reason)
            }
        }
    }

    /// Home-icon tap then the step list. Returns the home attempt count.
    async fn drive(
        &self,
        session: &dyn DeviceSession,
        app: &AppConfig,
        home: &TemplateImage,
    ) -> Result<u32, RunFailure> {
        tracing::debug!(app = %app.name, phase = %RunPhase::HomeMatch, "Entering phase");
        let home_result = matcher::locate_and_tap(session, home, &app.home_tuning())
            .await
            .map_err(|e| RunFailure {
                attempt: 0,
                phase: RunPhase::HomeMatch,
                reason: e.to_string(),
            })?;

        let attempt = match home_result {
            MatchResult::Matched { attempt, hit } => {
                tracing::info!(app = %app.name, attempt, ?hit, "Home icon tapped");
                attempt
            }
            MatchResult::Exhausted { attempts, error } => {
                return Err(RunFailure {
                    attempt: attempts,
                    phase: RunPhase::HomeMatch,
                    reason: error.to_string(),
                });
            }
        };

        tracing::debug!(app = %app.name, phase = %RunPhase::Steps, "Entering phase");
        match run_steps(session, app, &self.artifacts).await {
            StepResult::Passed { .. } => Ok(attempt),
            StepResult::Failed { reason, .. } => Err(RunFailure {
                attempt,
                phase: RunPhase::Steps,
                reason,
            }),
        }
    }
}

/// Close the session; errors and panics here are logged and dropped.
async fn teardown(session: &dyn DeviceSession, app: &str) {
    match AssertUnwindSafe(session.close()).catch_unwind().await {
        Ok(Ok(())) => tracing::debug!(app = %app, "Session torn down"),
        Ok(Err(e)) => tracing::warn!(app = %app, "Failed to close session: {}", e),
        Err(panic) => tracing::warn!(app = %app, "Session close panicked: {}", panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
