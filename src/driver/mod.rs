//! Remote device session abstraction.
//!
//! The match engine, step orchestrator and run controller only talk to a
//! device through [`DeviceSession`]. [`webdriver`] provides the Appium
//! implementation; tests plug in scripted sessions.

pub mod webdriver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::DriverResult;
use crate::matcher::tap::TouchGesture;

pub use webdriver::{WebDriverProvider, WebDriverSession};

/// Axis-aligned rectangle of a matched element, in device pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Capability set used to open a session for one app
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capabilities {
    pub platform_name: String,
    pub automation_name: String,
    pub device_name: String,
    /// Installable app artifact; the server installs and launches it
    pub app: String,
    /// Server-side idle timeout (seconds)
    pub new_command_timeout: u64,
    pub auto_grant_permissions: bool,
}

impl Capabilities {
    /// W3C new-session body with Appium vendor prefixes.
    pub fn to_w3c(&self) -> serde_json::Value {
        serde_json::json!({
            "capabilities": {
                "alwaysMatch": {
                    "platformName": self.platform_name,
                    "appium:automationName": self.automation_name,
                    "appium:deviceName": self.device_name,
                    "appium:app": self.app,
                    "appium:newCommandTimeout": self.new_command_timeout,
                    "appium:autoGrantPermissions": self.auto_grant_permissions,
                },
                "firstMatch": [{}]
            }
        })
    }
}

/// Opens device sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self, capabilities: &Capabilities) -> DriverResult<Box<dyn DeviceSession>>;
}

/// One live automation context on a device.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Set the minimum similarity (0..1) for image-template matches.
    async fn set_image_match_threshold(&self, threshold: f64) -> DriverResult<()>;

    /// Suspend for the given duration.
    async fn pause(&self, duration: Duration) -> DriverResult<()>;

    /// Locate an element by base64 template image.
    ///
    /// Returns the raw element reference payload; its shape differs between
    /// servers, see [`crate::matcher::extract_element_id`].
    async fn find_image_element(&self, template_base64: &str) -> DriverResult<serde_json::Value>;

    async fn element_rect(&self, element_id: &str) -> DriverResult<ElementRect>;

    async fn dispatch_touch(&self, gesture: &TouchGesture) -> DriverResult<()>;

    /// Capture the screen as PNG bytes.
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;

    async fn close(&self) -> DriverResult<()>;
}
