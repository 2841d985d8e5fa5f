//! Configuration management with environment variable support.
//!
//! Process-level settings: where the Appium server lives, which device to
//! drive, and where descriptors, app binaries and artifacts are found.
//! Per-app tuning lives in the app descriptors themselves (see [`crate::app`]).
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APPIUM_HOST` | Appium server host | `127.0.0.1` |
//! | `APPIUM_PORT` | Appium server port | `4723` |
//! | `APPIUM_BASE_PATH` | Base path of the WebDriver routes | `/` |
//! | `APPIUM_CONNECT_TIMEOUT` | HTTP connect timeout in seconds | `10` |
//! | `DEVICE_NAME` | Device or emulator identity | `emulator-5554` |
//! | `VISUAL_TAP_PLATFORM` | Platform name capability | `Android` |
//! | `VISUAL_TAP_AUTOMATION` | Automation engine capability | `UiAutomator2` |
//! | `VISUAL_TAP_ROOT` | Project root holding `configs/`, `apps/`, `artifacts/` | `.` |
//! | `APP` | Run a single app by descriptor name | unset |
//!
//! # Example
//!
//! ```bash
//! export APPIUM_HOST=10.0.0.5
//! export DEVICE_NAME=R58M123ABC
//! APP=ipswich visual-tap run
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default Appium host
pub const DEFAULT_APPIUM_HOST: &str = "127.0.0.1";

/// Default Appium port
pub const DEFAULT_APPIUM_PORT: u16 = 4723;

/// Default base path for WebDriver routes
pub const DEFAULT_APPIUM_BASE_PATH: &str = "/";

/// Default HTTP connect timeout (seconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

/// Default device identity
pub const DEFAULT_DEVICE_NAME: &str = "emulator-5554";

/// Default platform capability
pub const DEFAULT_PLATFORM_NAME: &str = "Android";

/// Default automation engine capability
pub const DEFAULT_AUTOMATION_NAME: &str = "UiAutomator2";

/// Default project root
pub const DEFAULT_ROOT: &str = ".";

/// Default server-side idle timeout for a session (seconds)
pub const DEFAULT_NEW_COMMAND_TIMEOUT: u64 = 300;

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_APPIUM_HOST: &str = "APPIUM_HOST";
pub const ENV_APPIUM_PORT: &str = "APPIUM_PORT";
pub const ENV_APPIUM_BASE_PATH: &str = "APPIUM_BASE_PATH";
pub const ENV_CONNECT_TIMEOUT: &str = "APPIUM_CONNECT_TIMEOUT";
pub const ENV_DEVICE_NAME: &str = "DEVICE_NAME";
pub const ENV_PLATFORM_NAME: &str = "VISUAL_TAP_PLATFORM";
pub const ENV_AUTOMATION_NAME: &str = "VISUAL_TAP_AUTOMATION";
pub const ENV_ROOT: &str = "VISUAL_TAP_ROOT";
pub const ENV_APP: &str = "APP";

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Process-level configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerSettings,
    pub device: DeviceSettings,
    pub paths: PathSettings,
}

/// Where the remote automation endpoint listens
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub base_path: String,
    /// Connect timeout (seconds)
    pub connect_timeout: u64,
}

/// Device identity and automation engine used in session capabilities
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSettings {
    pub device_name: String,
    pub platform_name: String,
    pub automation_name: String,
}

/// Project directory layout
#[derive(Debug, Clone, PartialEq)]
pub struct PathSettings {
    /// Base for relative `homeIcon` and step `png` references
    pub root: PathBuf,
    /// App descriptors (`*.json`)
    pub configs_dir: PathBuf,
    /// Base for relative `apk` references
    pub apps_dir: PathBuf,
    /// Diagnostic screenshots and reports
    pub artifacts_dir: PathBuf,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            server: ServerSettings::from_env(),
            device: DeviceSettings::from_env(),
            paths: PathSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            server: ServerSettings::defaults(),
            device: DeviceSettings::defaults(),
            paths: PathSettings::under(DEFAULT_ROOT),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ServerSettings {
    pub fn from_env() -> Self {
        Self {
            host: env::var(ENV_APPIUM_HOST).unwrap_or_else(|_| DEFAULT_APPIUM_HOST.to_string()),
            port: env::var(ENV_APPIUM_PORT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_APPIUM_PORT),
            base_path: env::var(ENV_APPIUM_BASE_PATH)
                .unwrap_or_else(|_| DEFAULT_APPIUM_BASE_PATH.to_string()),
            connect_timeout: env::var(ENV_CONNECT_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    pub fn defaults() -> Self {
        Self {
            host: DEFAULT_APPIUM_HOST.to_string(),
            port: DEFAULT_APPIUM_PORT,
            base_path: DEFAULT_APPIUM_BASE_PATH.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Endpoint URL without a trailing slash, e.g. `http://127.0.0.1:4723`
    pub fn base_url(&self) -> String {
        let path = self.base_path.trim_matches('/');
        if path.is_empty() {
            format!("http://{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}/{}", self.host, self.port, path)
        }
    }
}

impl DeviceSettings {
    pub fn from_env() -> Self {
        Self {
            device_name: env::var(ENV_DEVICE_NAME).unwrap_or_else(|_| DEFAULT_DEVICE_NAME.to_string()),
            platform_name: env::var(ENV_PLATFORM_NAME)
                .unwrap_or_else(|_| DEFAULT_PLATFORM_NAME.to_string()),
            automation_name: env::var(ENV_AUTOMATION_NAME)
                .unwrap_or_else(|_| DEFAULT_AUTOMATION_NAME.to_string()),
        }
    }

    pub fn defaults() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            platform_name: DEFAULT_PLATFORM_NAME.to_string(),
            automation_name: DEFAULT_AUTOMATION_NAME.to_string(),
        }
    }
}

impl PathSettings {
    pub fn from_env() -> Self {
        Self::under(env::var(ENV_ROOT).unwrap_or_else(|_| DEFAULT_ROOT.to_string()))
    }

    /// Standard layout below a project root
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            configs_dir: root.join("configs"),
            apps_dir: root.join("apps"),
            artifacts_dir: root.join("artifacts"),
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.server.port, 4723);
        assert_eq!(config.device.device_name, DEFAULT_DEVICE_NAME);
        assert_eq!(config.device.automation_name, "UiAutomator2");
        assert_eq!(config.paths.configs_dir, PathBuf::from("./configs"));
    }

    #[test]
    fn test_base_url() {
        let mut server = ServerSettings::defaults();
        assert_eq!(server.base_url(), "http://127.0.0.1:4723");

        server.base_path = "/wd/hub/".to_string();
        assert_eq!(server.base_url(), "http://127.0.0.1:4723/wd/hub");
    }

    #[test]
    fn test_paths_under_root() {
        let paths = PathSettings::under("/srv/visual");
        assert_eq!(paths.root, PathBuf::from("/srv/visual"));
        assert_eq!(paths.apps_dir, PathBuf::from("/srv/visual/apps"));
        assert_eq!(paths.artifacts_dir, PathBuf::from("/srv/visual/artifacts"));
    }
}
