//! Tap-point calculation and the touch gesture sent to the device.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::driver::ElementRect;
use crate::tuning::TuningParams;

/// How long the finger stays down for a tap
pub const TAP_PRESS_DURATION: Duration = Duration::from_millis(80);

/// Absolute device coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapPoint {
    pub x: i64,
    pub y: i64,
}

/// Compute where to tap inside a matched rectangle.
///
/// Horizontally centred; vertically at `tap_y_percent` of the height from
/// the top edge. Offsets are added before rounding, and halves round up
/// toward +∞ (`-2.5` becomes `-2`).
pub fn tap_point(rect: &ElementRect, tuning: &TuningParams) -> TapPoint {
    let x = rect.x + rect.width / 2.0 + tuning.tap_offset_x;
    let y = rect.y + rect.height * tuning.tap_y_percent + tuning.tap_offset_y;
    TapPoint {
        x: round_half_up(x),
        y: round_half_up(y),
    }
}

fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

/// Single-finger tap: move, press, hold, release
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchGesture {
    pub point: TapPoint,
    pub press: Duration,
}

impl TouchGesture {
    pub fn tap(point: TapPoint) -> Self {
        Self {
            point,
            press: TAP_PRESS_DURATION,
        }
    }

    /// W3C actions body for `POST /session/{id}/actions`.
    pub fn to_w3c_actions(&self) -> serde_json::Value {
        serde_json::json!({
            "actions": [{
                "type": "pointer",
                "id": "finger1",
                "parameters": { "pointerType": "touch" },
                "actions": [
                    { "type": "pointerMove", "duration": 0, "x": self.point.x, "y": self.point.y },
                    { "type": "pointerDown", "button": 0 },
                    { "type": "pause", "duration": self.press.as_millis() as u64 },
                    { "type": "pointerUp", "button": 0 }
                ]
            }]
        })
    }
}
