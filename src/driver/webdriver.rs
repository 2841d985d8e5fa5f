//! W3C WebDriver client for an Appium server with the images plugin.
//!
//! Every response is an envelope `{"value": ...}`. Errors carry
//! `{"value": {"error": "...", "message": "..."}}` with a non-2xx status.

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::time::Duration;

use super::{Capabilities, DeviceSession, ElementRect, SessionProvider};
use crate::config::ServerSettings;
use crate::error::{DriverError, DriverResult};
use crate::matcher::tap::TouchGesture;

/// Locator strategy added by the Appium images plugin
pub const IMAGE_LOCATOR_STRATEGY: &str = "-image";

/// Opens sessions against an Appium endpoint
#[derive(Debug, Clone)]
pub struct WebDriverProvider {
    base_url: String,
    client: Client,
}

impl WebDriverProvider {
    /// Create a provider for an endpoint such as `http://127.0.0.1:4723/`.
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> DriverResult<Self> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_settings(settings: &ServerSettings) -> DriverResult<Self> {
        Self::new(
            settings.base_url(),
            Duration::from_secs(settings.connect_timeout),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SessionProvider for WebDriverProvider {
    async fn open(&self, capabilities: &Capabilities) -> DriverResult<Box<dyn DeviceSession>> {
        let url = format!("{}/session", self.base_url);
        tracing::debug!(url = %url, device = %capabilities.device_name, "Opening session");

        let body = send_raw(self.client.post(&url).json(&capabilities.to_w3c())).await?;

        // W3C puts the id inside `value`; older JSONWP servers put it at the top level.
        let session_id = body["value"]
            .get("sessionId")
            .or_else(|| body.get("sessionId"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DriverError::SessionNotCreated(format!("no sessionId in {}", body)))?;

        tracing::info!(session = %session_id, "Session opened");
        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            session_id,
        }))
    }
}

/// A live Appium session
#[derive(Debug, Clone)]
pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: String,
}

impl WebDriverSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.base_url, self.session_id, path)
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> DriverResult<Value> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        send(request).await
    }
}

#[async_trait]
impl DeviceSession for WebDriverSession {
    async fn set_image_match_threshold(&self, threshold: f64) -> DriverResult<()> {
        self.call(
            Method::POST,
            "/appium/settings",
            Some(json!({ "settings": { "imageMatchThreshold": threshold } })),
        )
        .await?;
        Ok(())
    }

    async fn pause(&self, duration: Duration) -> DriverResult<()> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn find_image_element(&self, template_base64: &str) -> DriverResult<Value> {
        self.call(
            Method::POST,
            "/element",
            Some(json!({ "using": IMAGE_LOCATOR_STRATEGY, "value": template_base64 })),
        )
        .await
    }

    async fn element_rect(&self, element_id: &str) -> DriverResult<ElementRect> {
        let value = self
            .call(Method::GET, &format!("/element/{}/rect", element_id), None)
            .await?;
        serde_json::from_value(value.clone())
            .map_err(|e| DriverError::InvalidResponse(format!("bad rect {}: {}", value, e)))
    }

    async fn dispatch_touch(&self, gesture: &TouchGesture) -> DriverResult<()> {
        self.call(Method::POST, "/actions", Some(gesture.to_w3c_actions()))
            .await?;
        self.call(Method::DELETE, "/actions", None).await?;
        Ok(())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let value = self.call(Method::GET, "/screenshot", None).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| DriverError::InvalidResponse("screenshot is not a string".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| DriverError::InvalidResponse(format!("screenshot is not base64: {}", e)))
    }

    async fn close(&self) -> DriverResult<()> {
        let url = format!("{}/session/{}", self.base_url, self.session_id);
        send(self.client.delete(&url)).await?;
        tracing::debug!(session = %self.session_id, "Session closed");
        Ok(())
    }
}

/// Send a request and unwrap the W3C `value` envelope.
async fn send(request: reqwest::RequestBuilder) -> DriverResult<Value> {
    let mut body = send_raw(request).await?;
    Ok(body.get_mut("value").map(Value::take).unwrap_or(Value::Null))
}

/// Send a request and return the whole response body; non-2xx becomes an error.
async fn send_raw(request: reqwest::RequestBuilder) -> DriverResult<Value> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    let parsed = if text.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(&text)
    };

    if !status.is_success() {
        let body = parsed.unwrap_or(Value::Null);
        let error = body["value"]["error"]
            .as_str()
            .unwrap_or("unknown error")
            .to_string();
        let message = body["value"]["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or(text);
        return Err(DriverError::WebDriver {
            status: status.as_u16(),
            error,
            message,
        });
    }

    parsed.map_err(|e| DriverError::InvalidResponse(format!("{} (status {}): {}", e, status, text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::tap::TapPoint;
    use httpmock::prelude::*;

    fn caps() -> Capabilities {
        Capabilities {
            platform_name: "Android".to_string(),
            automation_name: "UiAutomator2".to_string(),
            device_name: "emulator-5554".to_string(),
            app: "/apps/demo.apk".to_string(),
            new_command_timeout: 300,
            auto_grant_permissions: true,
        }
    }

    async fn open_session(server: &MockServer) -> Box<dyn DeviceSession> {
        server
            .mock_async(|when, then| {
                when.method(POST).path("/session");
                then.status(200)
                    .json_body(json!({ "value": { "sessionId": "abc", "capabilities": {} } }));
            })
            .await;
        let provider = WebDriverProvider::new(server.base_url(), Duration::from_secs(2)).unwrap();
        provider.open(&caps()).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_sends_w3c_capabilities() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/session").json_body(caps().to_w3c());
                then.status(200)
                    .json_body(json!({ "value": { "sessionId": "s-1", "capabilities": {} } }));
            })
            .await;

        let provider = WebDriverProvider::new(server.base_url(), Duration::from_secs(2)).unwrap();
        assert!(provider.open(&caps()).await.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_open_accepts_legacy_session_id() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/session");
                then.status(200)
                    .json_body(json!({ "sessionId": "legacy", "status": 0, "value": {} }));
            })
            .await;
        let close = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/session/legacy");
                then.status(200).json_body(json!({ "value": null }));
            })
            .await;

        let provider = WebDriverProvider::new(server.base_url(), Duration::from_secs(2)).unwrap();
        let session = provider.open(&caps()).await.unwrap();
        session.close().await.unwrap();
        close.assert_async().await;
    }

    #[tokio::test]
    async fn test_legacy_replies_keep_non_object_values() {
        let server = MockServer::start_async().await;
        let session = open_session(&server).await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/session/abc/screenshot");
                then.status(200)
                    .json_body(json!({ "sessionId": "abc", "status": 0, "value": "iVBORw0K" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/session/abc/element");
                then.status(200)
                    .json_body(json!({ "sessionId": "abc", "status": 0, "value": "el-7" }));
            })
            .await;

        let png = session.screenshot().await.unwrap();
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);

        let element = session.find_image_element("QUJD").await.unwrap();
        assert_eq!(element, json!("el-7"));
    }

    #[tokio::test]
    async fn test_open_failure_is_webdriver_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/session");
                then.status(500).json_body(json!({
                    "value": { "error": "session not created", "message": "device offline" }
                }));
            })
            .await;

        let provider = WebDriverProvider::new(server.base_url(), Duration::from_secs(2)).unwrap();
        let err = provider.open(&caps()).await.err().unwrap();
        assert_eq!(err.to_string(), "session not created (500): device offline");
    }

    #[tokio::test]
    async fn test_find_image_element_returns_raw_reference() {
        let server = MockServer::start_async().await;
        let session = open_session(&server).await;
        let find = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/session/abc/element")
                    .json_body(json!({ "using": "-image", "value": "QUJD" }));
                then.status(200).json_body(json!({
                    "value": { "element-6066-11e4-a52e-4f735466cecf": "el-9" }
                }));
            })
            .await;

        let element = session.find_image_element("QUJD").await.unwrap();
        assert_eq!(element["element-6066-11e4-a52e-4f735466cecf"], "el-9");
        find.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_maps_to_no_such_element() {
        let server = MockServer::start_async().await;
        let session = open_session(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/session/abc/element");
                then.status(404).json_body(json!({
                    "value": { "error": "no such element", "message": "template not on screen" }
                }));
            })
            .await;

        let err = session.find_image_element("QUJD").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rect_settings_actions_and_screenshot() {
        let server = MockServer::start_async().await;
        let session = open_session(&server).await;

        let settings = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/session/abc/appium/settings")
                    .json_body(json!({ "settings": { "imageMatchThreshold": 0.4 } }));
                then.status(200).json_body(json!({ "value": null }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/session/abc/element/el-1/rect");
                then.status(200).json_body(json!({
                    "value": { "x": 100, "y": 200, "width": 50, "height": 80 }
                }));
            })
            .await;
        let actions = server
            .mock_async(|when, then| {
                when.method(POST).path("/session/abc/actions");
                then.status(200).json_body(json!({ "value": null }));
            })
            .await;
        let release = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/session/abc/actions");
                then.status(200).json_body(json!({ "value": null }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/session/abc/screenshot");
                then.status(200).json_body(json!({ "value": "iVBORw0K" }));
            })
            .await;

        session.set_image_match_threshold(0.4).await.unwrap();
        settings.assert_async().await;

        let rect = session.element_rect("el-1").await.unwrap();
        assert_eq!(
            rect,
            ElementRect {
                x: 100.0,
                y: 200.0,
                width: 50.0,
                height: 80.0
            }
        );

        session
            .dispatch_touch(&TouchGesture::tap(TapPoint { x: 125, y: 260 }))
            .await
            .unwrap();
        actions.assert_async().await;
        release.assert_async().await;

        let png = session.screenshot().await.unwrap();
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
    }
}
