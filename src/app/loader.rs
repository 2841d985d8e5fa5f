//! Discover and load app descriptors from the configs directory.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::types::AppConfig;
use crate::config::{DEFAULT_NEW_COMMAND_TIMEOUT, PathSettings};
use crate::error::{ConfigError, ConfigResult};
use crate::template::resolve_asset_path;
use crate::tuning::TuningOverrides;

/// Descriptor file as written on disk
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppFile {
    name: Option<String>,
    apk: Option<String>,
    home_icon: Option<String>,
    new_command_timeout: Option<u64>,
    steps: Option<serde_json::Value>,
    #[serde(flatten)]
    tuning: TuningOverrides,
}

/// List `*.json` descriptors (extension matched case-insensitively), sorted.
pub fn discover_configs(configs_dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    if !configs_dir.is_dir() {
        return Err(ConfigError::MissingDir(configs_dir.to_path_buf()));
    }

    let io_err = |source: std::io::Error| ConfigError::Io {
        path: configs_dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(configs_dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_json = path
            .extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Narrow discovered files to one app by descriptor name, if requested.
pub fn select_configs(
    files: Vec<PathBuf>,
    configs_dir: &Path,
    app: Option<&str>,
) -> ConfigResult<Vec<PathBuf>> {
    let Some(app) = app else {
        return Ok(files);
    };

    files
        .into_iter()
        .find(|f| f.file_stem().map(|s| s == app).unwrap_or(false))
        .map(|f| vec![f])
        .ok_or_else(|| ConfigError::AppNotFound {
            app: app.to_string(),
            expected: configs_dir.join(format!("{}.json", app)),
        })
}

/// Load, default and validate one descriptor.
pub fn load_app_config(path: &Path, paths: &PathSettings) -> ConfigResult<AppConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: AppFile = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let name = file
        .name
        .filter(|n| !n.is_empty())
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_default();

    let apk = file
        .apk
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingField {
            path: path.to_path_buf(),
            field: "apk",
            example: "app-ipswich.apk",
        })?;
    let apk_path = resolve_asset_path(&paths.apps_dir, &apk);
    if !apk_path.exists() {
        return Err(ConfigError::AssetNotFound {
            app: name,
            kind: "APK",
            path: apk_path,
        });
    }

    let home_icon = file
        .home_icon
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingField {
            path: path.to_path_buf(),
            field: "homeIcon",
            example: "icons/ipswich/home.png",
        })?;
    let home_icon = resolve_asset_path(&paths.root, &home_icon);
    if !home_icon.exists() {
        return Err(ConfigError::AssetNotFound {
            app: name,
            kind: "Icon PNG",
            path: home_icon,
        });
    }

    file.tuning
        .validate()
        .map_err(|message| ConfigError::InvalidField {
            path: path.to_path_buf(),
            message,
        })?;

    let steps = match file.steps {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(steps)) => steps,
        Some(_) => {
            return Err(ConfigError::InvalidField {
                path: path.to_path_buf(),
                message: "\"steps\" must be an array if provided".to_string(),
            });
        }
    };

    tracing::debug!(app = %name, steps = steps.len(), "Loaded app config");

    Ok(AppConfig {
        name,
        source: path.to_path_buf(),
        apk_path,
        home_icon,
        asset_root: paths.root.clone(),
        new_command_timeout: file.new_command_timeout.unwrap_or(DEFAULT_NEW_COMMAND_TIMEOUT),
        tuning: file.tuning,
        steps,
    })
}

/// Discover, select and load every descriptor. Stops at the first error.
pub fn load_all(paths: &PathSettings, app: Option<&str>) -> ConfigResult<Vec<AppConfig>> {
    let files = discover_configs(&paths.configs_dir)?;
    let selected = select_configs(files, &paths.configs_dir, app)?;
    selected
        .iter()
        .map(|f| load_app_config(f, paths))
        .collect()
}
