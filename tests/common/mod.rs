//! Scripted in-memory device session for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use visual_tap::driver::{Capabilities, DeviceSession, ElementRect, SessionProvider};
use visual_tap::error::{DriverError, DriverResult};
use visual_tap::matcher::TouchGesture;
use visual_tap::{AppConfig, TuningOverrides};

/// A tiny valid PNG header, enough for a screenshot payload
pub const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// What the locator does on one attempt
#[derive(Debug, Clone)]
pub enum Find {
    Found(&'static str),
    NotFound,
    /// Success payload with no usable id
    Malformed,
    Panic,
}

/// Everything the session was asked to do
#[derive(Debug, Default)]
pub struct Calls {
    pub opens: Vec<Capabilities>,
    pub thresholds: Vec<f64>,
    pub pauses: Vec<Duration>,
    /// Encoded template per locate call
    pub finds: Vec<String>,
    pub rects: Vec<String>,
    pub touches: Vec<TouchGesture>,
    pub screenshots: usize,
    pub closes: usize,
}

impl Calls {
    pub fn finds_for(&self, encoded: &str) -> usize {
        self.finds.iter().filter(|f| f.as_str() == encoded).count()
    }
}

/// Locate replies keyed by encoded template. The last reply repeats.
#[derive(Debug, Clone, Default)]
pub struct Script {
    replies: HashMap<String, Vec<Find>>,
    pub open_error: Option<String>,
    pub screenshot_error: bool,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, encoded: &str, replies: Vec<Find>) -> Self {
        self.replies.insert(encoded.to_string(), replies);
        self
    }

    pub fn failing_open(mut self, message: &str) -> Self {
        self.open_error = Some(message.to_string());
        self
    }

    pub fn failing_screenshots(mut self) -> Self {
        self.screenshot_error = true;
        self
    }
}

#[derive(Clone)]
pub struct ScriptedProvider {
    pub calls: Arc<Mutex<Calls>>,
    script: Arc<Script>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Calls::default())),
            script: Arc::new(script),
        }
    }

    /// A session outside of any provider open call
    pub fn session(&self) -> ScriptedSession {
        ScriptedSession {
            calls: self.calls.clone(),
            script: self.script.clone(),
        }
    }

    pub fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().unwrap()
    }
}

#[async_trait]
impl SessionProvider for ScriptedProvider {
    async fn open(&self, capabilities: &Capabilities) -> DriverResult<Box<dyn DeviceSession>> {
        self.calls.lock().unwrap().opens.push(capabilities.clone());
        if let Some(message) = &self.script.open_error {
            return Err(DriverError::SessionNotCreated(message.clone()));
        }
        Ok(Box::new(self.session()))
    }
}

pub struct ScriptedSession {
    calls: Arc<Mutex<Calls>>,
    script: Arc<Script>,
}

fn not_found() -> DriverError {
    DriverError::WebDriver {
        status: 404,
        error: "no such element".to_string(),
        message: "An element could not be located on the page".to_string(),
    }
}

#[async_trait]
impl DeviceSession for ScriptedSession {
    async fn set_image_match_threshold(&self, threshold: f64) -> DriverResult<()> {
        self.calls.lock().unwrap().thresholds.push(threshold);
        Ok(())
    }

    async fn pause(&self, duration: Duration) -> DriverResult<()> {
        self.calls.lock().unwrap().pauses.push(duration);
        Ok(())
    }

    async fn find_image_element(&self, template_base64: &str) -> DriverResult<Value> {
        let reply = {
            let mut calls = self.calls.lock().unwrap();
            let seen = calls.finds_for(template_base64);
            calls.finds.push(template_base64.to_string());
            self.script
                .replies
                .get(template_base64)
                .and_then(|r| r.get(seen).or_else(|| r.last()))
                .cloned()
                .unwrap_or(Find::NotFound)
        };

        match reply {
            Find::Found(id) => Ok(json!({ "element-6066-11e4-a52e-4f735466cecf": id })),
            Find::NotFound => Err(not_found()),
            Find::Malformed => Ok(json!({ "unexpected": true })),
            Find::Panic => panic!("locator blew up"),
        }
    }

    async fn element_rect(&self, element_id: &str) -> DriverResult<ElementRect> {
        self.calls.lock().unwrap().rects.push(element_id.to_string());
        Ok(ElementRect {
            x: 100.0,
            y: 200.0,
            width: 50.0,
            height: 80.0,
        })
    }

    async fn dispatch_touch(&self, gesture: &TouchGesture) -> DriverResult<()> {
        self.calls.lock().unwrap().touches.push(*gesture);
        Ok(())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        self.calls.lock().unwrap().screenshots += 1;
        if self.script.screenshot_error {
            return Err(DriverError::InvalidResponse("screen capture unavailable".to_string()));
        }
        Ok(FAKE_PNG.to_vec())
    }

    async fn close(&self) -> DriverResult<()> {
        self.calls.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Write a template file and return its path and the encoded selector.
pub fn template(root: &Path, name: &str) -> (PathBuf, String) {
    let path = root.join(name);
    let content = format!("template:{}", name);
    fs::write(&path, &content).unwrap();
    (path, base64::engine::general_purpose::STANDARD.encode(content))
}

/// Fast tuning: no settle delay, no retry delay, given retry budget.
pub fn fast_tuning(retries: u32) -> TuningOverrides {
    TuningOverrides {
        wait_before_search_ms: Some(0.0),
        retry_delay_ms: Some(0.0),
        retries: Some(retries),
        ..Default::default()
    }
}

pub fn app(root: &Path, name: &str, home_icon: PathBuf, steps: Vec<Value>, tuning: TuningOverrides) -> AppConfig {
    AppConfig {
        name: name.to_string(),
        source: root.join(format!("configs/{}.json", name)),
        apk_path: root.join(format!("apps/{}.apk", name)),
        home_icon,
        asset_root: root.to_path_buf(),
        new_command_timeout: 300,
        tuning,
        steps,
    }
}
