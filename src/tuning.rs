//! Match tuning and the step → app → constant default cascade.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default settle delay before the first locate attempt (milliseconds)
pub const DEFAULT_WAIT_BEFORE_SEARCH_MS: f64 = 2000.0;

/// Default minimum similarity for a template match
pub const DEFAULT_IMAGE_THRESHOLD: f64 = 0.4;

/// Default number of locate attempts
pub const DEFAULT_RETRIES: u32 = 3;

/// Default delay between locate attempts (milliseconds)
pub const DEFAULT_RETRY_DELAY_MS: f64 = 1200.0;

/// Default vertical tap position as a fraction of the matched height.
/// Biased low so taps land on the glyph rather than a label above it.
pub const DEFAULT_TAP_Y_PERCENT: f64 = 0.75;

/// Default horizontal/vertical tap offset (pixels)
pub const DEFAULT_TAP_OFFSET: f64 = 0.0;

/// Optional tuning values, as written in an app descriptor or a step.
///
/// The same record is used at both levels; unset fields fall through to
/// the next tier in [`TuningParams::resolve`]. Delays are milliseconds and
/// may be fractional; a negative delay means no delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuningOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_before_search_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap_y_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap_offset_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap_offset_y: Option<f64>,
}

impl TuningOverrides {
    /// Check ranges that would make a match attempt meaningless.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(t) = self.image_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(format!("\"imageThreshold\" must be between 0 and 1, got {}", t));
            }
        }
        if self.retries == Some(0) {
            return Err("\"retries\" must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Effective parameters for one locate (or locate-and-tap) operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningParams {
    pub wait_before_search: Duration,
    pub image_threshold: f64,
    pub retries: u32,
    pub retry_delay: Duration,
    pub tap_y_percent: f64,
    pub tap_offset_x: f64,
    pub tap_offset_y: f64,
}

impl TuningParams {
    /// Resolve each field from `step`, then `app`, then the built-in default.
    pub fn resolve(step: &TuningOverrides, app: &TuningOverrides) -> Self {
        Self {
            wait_before_search: delay_from_ms(
                step.wait_before_search_ms
                    .or(app.wait_before_search_ms)
                    .unwrap_or(DEFAULT_WAIT_BEFORE_SEARCH_MS),
            ),
            image_threshold: step
                .image_threshold
                .or(app.image_threshold)
                .unwrap_or(DEFAULT_IMAGE_THRESHOLD),
            retries: step.retries.or(app.retries).unwrap_or(DEFAULT_RETRIES),
            retry_delay: delay_from_ms(
                step.retry_delay_ms
                    .or(app.retry_delay_ms)
                    .unwrap_or(DEFAULT_RETRY_DELAY_MS),
            ),
            tap_y_percent: step
                .tap_y_percent
                .or(app.tap_y_percent)
                .unwrap_or(DEFAULT_TAP_Y_PERCENT),
            tap_offset_x: step
                .tap_offset_x
                .or(app.tap_offset_x)
                .unwrap_or(DEFAULT_TAP_OFFSET),
            tap_offset_y: step
                .tap_offset_y
                .or(app.tap_offset_y)
                .unwrap_or(DEFAULT_TAP_OFFSET),
        }
    }
}

/// Milliseconds to a delay; negatives clamp to zero.
fn delay_from_ms(ms: f64) -> Duration {
    Duration::from_nanos((ms.max(0.0) * 1_000_000.0).round() as u64)
}

impl Default for TuningParams {
    fn default() -> Self {
        Self::resolve(&TuningOverrides::default(), &TuningOverrides::default())
    }
}
