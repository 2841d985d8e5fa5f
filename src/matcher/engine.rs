//! Locate a template on screen with a bounded retry budget.
//!
//! Both entry points share one protocol: set the match threshold, wait for
//! the screen to settle, then try up to `retries` times with
//! `retry_delay` between attempts (never after the last one).

use serde_json::Value;
use thiserror::Error;

use super::tap::{TapPoint, TouchGesture, tap_point};
use crate::driver::{DeviceSession, ElementRect};
use crate::error::{DriverError, DriverResult};
use crate::template::TemplateImage;
use crate::tuning::TuningParams;

/// W3C element reference key
pub const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Keys probed, in order, for the id of a matched element
pub const ELEMENT_ID_KEYS: &[&str] = &[W3C_ELEMENT_KEY, "ELEMENT", "elementId"];

/// Why a single attempt (and, after the last one, the whole match) failed
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The locator answered but no known id field was present
    #[error("Image element returned without a valid element id. Got: {0}")]
    MalformedMatch(String),

    #[error("retry budget is zero, no locate attempt was made")]
    NoAttempts,
}

/// What a successful attempt produced
#[derive(Debug, Clone, PartialEq)]
pub enum MatchHit {
    Located {
        element_id: String,
    },
    Tapped {
        element_id: String,
        rect: ElementRect,
        tap: TapPoint,
    },
}

/// Outcome of one locate or locate-and-tap operation
#[derive(Debug)]
pub enum MatchResult {
    Matched { attempt: u32, hit: MatchHit },
    Exhausted { attempts: u32, error: MatchError },
}

impl MatchResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }

    /// Attempts consumed, counting the successful one.
    pub fn attempts(&self) -> u32 {
        match self {
            MatchResult::Matched { attempt, .. } => *attempt,
            MatchResult::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn error(&self) -> Option<&MatchError> {
        match self {
            MatchResult::Matched { .. } => None,
            MatchResult::Exhausted { error, .. } => Some(error),
        }
    }

    pub fn tap(&self) -> Option<TapPoint> {
        match self {
            MatchResult::Matched {
                hit: MatchHit::Tapped { tap, .. },
                ..
            } => Some(*tap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Tap,
    LocateOnly,
}

/// Pull an element id out of a locator response.
///
/// A bare non-empty string counts as the id. Otherwise the first key in
/// [`ELEMENT_ID_KEYS`] holding a non-empty string wins.
pub fn extract_element_id(element: &Value) -> Option<String> {
    if let Some(id) = element.as_str() {
        return (!id.is_empty()).then(|| id.to_string());
    }
    let object = element.as_object()?;
    ELEMENT_ID_KEYS
        .iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

/// Find the template and tap inside it.
///
/// `Err` is reserved for failures before the retry loop (threshold or
/// settle delay); misses inside the loop come back as
/// [`MatchResult::Exhausted`].
pub async fn locate_and_tap(
    session: &dyn DeviceSession,
    template: &TemplateImage,
    tuning: &TuningParams,
) -> DriverResult<MatchResult> {
    run(session, template, tuning, Mode::Tap).await
}

/// Find the template without touching the screen.
pub async fn locate_only(
    session: &dyn DeviceSession,
    template: &TemplateImage,
    tuning: &TuningParams,
) -> DriverResult<MatchResult> {
    run(session, template, tuning, Mode::LocateOnly).await
}

async fn run(
    session: &dyn DeviceSession,
    template: &TemplateImage,
    tuning: &TuningParams,
    mode: Mode,
) -> DriverResult<MatchResult> {
    session
        .set_image_match_threshold(tuning.image_threshold)
        .await?;

    if !tuning.wait_before_search.is_zero() {
        session.pause(tuning.wait_before_search).await?;
    }

    let mut last_error = MatchError::NoAttempts;
    for attempt in 1..=tuning.retries {
        match attempt_once(session, template, tuning, mode).await {
            Ok(hit) => {
                tracing::debug!(attempt, template = %template.path.display(), ?hit, "Template matched");
                return Ok(MatchResult::Matched { attempt, hit });
            }
            Err(e) => {
                tracing::debug!(
                    attempt,
                    retries = tuning.retries,
                    not_found = matches!(&e, MatchError::Driver(d) if d.is_not_found()),
                    error = %e,
                    "Locate attempt failed"
                );
                last_error = e;
                if attempt < tuning.retries {
                    session.pause(tuning.retry_delay).await?;
                }
            }
        }
    }

    Ok(MatchResult::Exhausted {
        attempts: tuning.retries,
        error: last_error,
    })
}

async fn attempt_once(
    session: &dyn DeviceSession,
    template: &TemplateImage,
    tuning: &TuningParams,
    mode: Mode,
) -> Result<MatchHit, MatchError> {
    let element = session.find_image_element(&template.encoded).await?;
    let element_id =
        extract_element_id(&element).ok_or_else(|| MatchError::MalformedMatch(element.to_string()))?;

    if mode == Mode::LocateOnly {
        return Ok(MatchHit::Located { element_id });
    }

    let rect = session.element_rect(&element_id).await?;
    let tap = tap_point(&rect, tuning);
    session.dispatch_touch(&TouchGesture::tap(tap)).await?;

    Ok(MatchHit::Tapped {
        element_id,
        rect,
        tap,
    })
}
