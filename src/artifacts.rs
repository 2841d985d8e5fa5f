//! Artifact directory for diagnostic screenshots and run reports.
//!
//! File layout:
//! - `{app}-step{N}.png`: screen at the moment step N failed
//! - `{app}-step{N}-after.png`: confirmation screen after step N passed
//! - `summary.json`: the last run's results

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::driver::DeviceSession;
use crate::error::DriverError;

/// File name of the JSON run report
pub const REPORT_FILE: &str = "summary.json";

/// Why a screenshot could not be saved
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("screenshot failed: {0}")]
    Driver(#[from] DriverError),

    #[error("could not write screenshot: {0}")]
    Io(#[from] std::io::Error),
}

/// Where artifacts for a run are written
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    pub dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the directory if needed
    pub fn init(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Path for the screenshot taken when `step` fails
    pub fn failure_path(&self, app: &str, step: usize) -> PathBuf {
        self.dir.join(format!("{}-step{}.png", sanitize_name(app), step))
    }

    /// Path for the confirmation screenshot after `step` passes
    pub fn after_step_path(&self, app: &str, step: usize) -> PathBuf {
        self.dir.join(format!("{}-step{}-after.png", sanitize_name(app), step))
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(REPORT_FILE)
    }

    /// Write PNG bytes, creating the directory on first use
    pub fn save_png(&self, path: &Path, png: &[u8]) -> std::io::Result<()> {
        self.init()?;
        fs::write(path, png)?;

        match image::load_from_memory(png) {
            Ok(img) => tracing::debug!(
                path = %path.display(),
                width = img.width(),
                height = img.height(),
                "Saved screenshot"
            ),
            Err(_) => tracing::debug!(path = %path.display(), bytes = png.len(), "Saved screenshot"),
        }
        Ok(())
    }

    /// Capture the device screen into `path`.
    pub async fn capture(&self, session: &dyn DeviceSession, path: &Path) -> Result<(), CaptureError> {
        let png = session.screenshot().await?;
        self.save_png(path, &png)?;
        Ok(())
    }

    /// Write a JSON report next to the screenshots
    pub fn write_report<T: Serialize>(&self, report: &T) -> std::io::Result<PathBuf> {
        self.init()?;
        let path = self.report_path();
        fs::write(&path, serde_json::to_string_pretty(report)?)?;
        Ok(path)
    }

    /// List all PNG files in the artifact directory
    pub fn list_captures(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut captures = Vec::new();
        if self.dir.exists() {
            for entry in fs::read_dir(&self.dir)? {
                let path = entry?.path();
                if path.extension().map(|e| e == "png").unwrap_or(false) {
                    captures.push(path);
                }
            }
        }
        captures.sort();
        Ok(captures)
    }
}

/// Sanitize a name for use in filenames
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
