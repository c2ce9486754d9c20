use std::path::Path;

use serde::Serialize;

use crate::api::ApiEndpoints;
use crate::config::{self, AppSettings};

#[derive(Serialize)]
struct EffectiveSettings<'a> {
    settings_file: Option<String>,
    #[serde(flatten)]
    settings: &'a AppSettings,
    endpoints: ApiEndpoints,
}

/// Prints the merged configuration and the endpoints derived from it.
pub fn show(settings: &AppSettings, config_path: Option<&Path>) -> Result<(), String> {
    let settings_file = config_path
        .map(Path::to_path_buf)
        .or_else(config::default_settings_path)
        .map(|p| p.display().to_string());
    let view = EffectiveSettings {
        settings_file,
        settings,
        endpoints: settings.endpoints(),
    };
    let json = serde_json::to_string_pretty(&view).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}
