use std::path::Path;

use anyhow::{Context, Result};
use ini::Ini;
use serde::Serialize;

use crate::error::ExportError;

pub const CONFIG_FILENAME: &str = "config.ini";
pub const SNAPSHOT_FILENAME: &str = "config.json";

const APP_SECTION: &str = "app";

/// Site-wide settings carried over to the static site.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub site_name: String,
    pub site_description: String,
    pub host: String,
}

/// Read `[app] site_name`, `site_description` and `host` from a WriteFreely
/// `config.ini`. Every field must be present; an empty value is allowed.
pub fn load_site_config(config_path: &Path) -> Result<SiteConfig> {
    let ini = Ini::load_from_file(config_path).map_err(|error| missing(config_path, error))?;
    let app = ini
        .section(Some(APP_SECTION))
        .ok_or_else(|| missing(config_path, "missing [app] section"))?;

    let field = |key: &str| -> Result<String> {
        app.get(key)
            .map(|value| value.trim().to_string())
            .ok_or_else(|| missing(config_path, format!("missing [app] {key}")))
    };

    Ok(SiteConfig {
        site_name: field("site_name")?,
        site_description: field("site_description")?,
        host: field("host")?,
    })
}

pub fn render_snapshot(config: &SiteConfig) -> Result<String> {
    serde_json::to_string_pretty(config).context("failed to serialize site config snapshot")
}

fn missing(config_path: &Path, detail: impl ToString) -> anyhow::Error {
    ExportError::ConfigurationMissing {
        path: config_path.to_path_buf(),
        detail: detail.to_string(),
    }
    .into()
}
