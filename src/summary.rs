//! Run every selected app and summarize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::app::AppConfig;
use crate::driver::SessionProvider;
use crate::runner::{AppRunner, RunResult};

/// Results of one invocation across all apps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub results: Vec<RunResult>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.ok).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.ok)
    }

    /// 0 when every run passed, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.all_passed() { 0 } else { 1 }
    }

    /// Human-readable summary table
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n=== Visual Click Summary ===");
        let _ = writeln!(
            out,
            "Total: {}  Passed: {}  Failed: {}\n",
            self.total(),
            self.passed(),
            self.failed()
        );

        for r in &self.results {
            let time = format_duration(r.duration_ms);
            if r.ok {
                let _ = writeln!(out, "{}  (attempt {}, thr {}, {})", r.name, r.attempt, r.threshold, time);
            } else {
                let _ = writeln!(out, "{}  (thr {}, {})", r.name, r.threshold, time);
                if let Some(error) = &r.error {
                    let _ = writeln!(out, "   ↳ {}", error);
                }
            }
        }
        out
    }
}

/// Seconds rounded to one decimal, e.g. `12.3s`
fn format_duration(ms: u64) -> String {
    let tenths = (ms as f64 / 100.0).round() / 10.0;
    format!("{}s", tenths)
}

/// Run each app in order.
///
/// Runs never overlap: they share one physical or emulated device, which
/// cannot host two sessions at once. Keep this loop sequential.
pub async fn run_all<P: SessionProvider>(runner: &AppRunner<P>, apps: &[AppConfig]) -> RunSummary {
    let started_at = Utc::now();
    let mut results = Vec::with_capacity(apps.len());

    for app in apps {
        tracing::info!("--- Running: {} ---", app.name);
        results.push(runner.run(app).await);
    }

    RunSummary {
        started_at,
        results,
    }
}
