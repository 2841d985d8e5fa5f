use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::DeviceSettings;
use crate::driver::Capabilities;
use crate::template::resolve_asset_path;
use crate::tuning::{TuningOverrides, TuningParams};

/// The closed set of step kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    /// Locate the template and tap inside it
    TapImage,
    /// Locate the template only; never touches the screen
    AssertImage,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::TapImage => "tapImage",
            StepKind::AssertImage => "assertImage",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tapImage" => Some(StepKind::TapImage),
            "assertImage" => Some(StepKind::AssertImage),
            _ => None,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a step descriptor was refused. Step numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepRejection {
    #[error("Step {step} is not an object")]
    NotAnObject { step: usize },

    #[error("Step {step} unsupported type \"{kind}\" (supported: \"tapImage\", \"assertImage\")")]
    UnsupportedType { step: usize, kind: String },

    #[error("Step {step} missing \"png\"")]
    MissingPng { step: usize },

    #[error("Step {step} PNG not found: {}", .path.display())]
    PngNotFound { step: usize, path: PathBuf },

    #[error("Step {step} has invalid tuning: {message}")]
    InvalidTuning { step: usize, message: String },
}

/// One validated step
#[derive(Debug, Clone, PartialEq)]
pub struct StepSpec {
    pub kind: StepKind,
    /// Reference as written in the descriptor (used in messages)
    pub png: String,
    /// Resolved template path
    pub template: PathBuf,
    /// Capture a confirmation screenshot after the step succeeds
    pub screenshot_after: bool,
    pub tuning: TuningOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepFields {
    #[serde(default)]
    screenshot_after: bool,
    #[serde(flatten)]
    tuning: TuningOverrides,
}

impl StepSpec {
    /// Validate a raw step record.
    ///
    /// `step` is the 1-based position; `root` resolves relative `png` paths.
    pub fn parse(step: usize, raw: &serde_json::Value, root: &Path) -> Result<Self, StepRejection> {
        let object = raw.as_object().ok_or(StepRejection::NotAnObject { step })?;

        let kind_value = object.get("type").unwrap_or(&serde_json::Value::Null);
        let kind = kind_value
            .as_str()
            .and_then(StepKind::parse)
            .ok_or_else(|| StepRejection::UnsupportedType {
                step,
                kind: kind_value
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| kind_value.to_string()),
            })?;

        let png = object
            .get("png")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(StepRejection::MissingPng { step })?
            .to_string();

        let template = resolve_asset_path(root, &png);
        if !template.exists() {
            return Err(StepRejection::PngNotFound { step, path: template });
        }

        let fields: StepFields = serde_json::from_value(raw.clone())
            .map_err(|e| StepRejection::InvalidTuning { step, message: e.to_string() })?;
        fields
            .tuning
            .validate()
            .map_err(|message| StepRejection::InvalidTuning { step, message })?;

        Ok(Self {
            kind,
            png,
            template,
            screenshot_after: fields.screenshot_after,
            tuning: fields.tuning,
        })
    }
}

/// A validated app descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub name: String,
    /// Descriptor file this was loaded from
    pub source: PathBuf,
    /// Installable app artifact
    pub apk_path: PathBuf,
    /// Template tapped first to enter the app
    pub home_icon: PathBuf,
    /// Base for relative step `png` references
    pub asset_root: PathBuf,
    /// Server-side idle timeout (seconds)
    pub new_command_timeout: u64,
    /// App-level tuning defaults
    pub tuning: TuningOverrides,
    /// Step records as authored; validated one by one when run
    pub steps: Vec<serde_json::Value>,
}

impl AppConfig {
    /// Effective tuning for a step of this app.
    pub fn tuning_for(&self, step: &TuningOverrides) -> TuningParams {
        TuningParams::resolve(step, &self.tuning)
    }

    /// Effective tuning for the home-icon tap (app defaults only).
    pub fn home_tuning(&self) -> TuningParams {
        self.tuning_for(&TuningOverrides::default())
    }

    /// Match threshold reported in run results.
    pub fn threshold(&self) -> f64 {
        self.home_tuning().image_threshold
    }

    pub fn capabilities(&self, device: &DeviceSettings) -> Capabilities {
        Capabilities {
            platform_name: device.platform_name.clone(),
            automation_name: device.automation_name.clone(),
            device_name: device.device_name.clone(),
            app: self.apk_path.to_string_lossy().into_owned(),
            new_command_timeout: self.new_command_timeout,
            auto_grant_permissions: true,
        }
    }

    /// Validate every step without running anything.
    pub fn check_steps(&self) -> Vec<StepRejection> {
        self.steps
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| StepSpec::parse(i + 1, raw, &self.asset_root).err())
            .collect()
    }
}
