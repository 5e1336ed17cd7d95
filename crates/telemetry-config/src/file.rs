//! Plant configuration file loading, following the same discover-then-load-
//! then-default resilience as the editor's own config loader: a missing or
//! unparseable file never fails startup, it just yields defaults.

use crate::tuning::{Tuning, TuningFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PlantFile {
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub plant: Option<String>,
    /// IANA timezone name used for all "local" computations (shift dates,
    /// week start). Defaults to `"UTC"` when absent.
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub tuning: TuningFile,
    #[serde(default)]
    pub plant: PlantFile,
}

#[derive(Debug, Clone)]
pub struct PlantConfig {
    pub tuning: Tuning,
    pub division: Option<String>,
    pub plant: Option<String>,
    pub timezone: chrono_tz::Tz,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self { tuning: Tuning::default(), division: None, plant: None, timezone: chrono_tz::UTC }
    }
}

fn parse_timezone(name: Option<String>) -> chrono_tz::Tz {
    name.and_then(|n| n.parse().ok()).unwrap_or(chrono_tz::UTC)
}

/// `TELEMETRY_CONFIG_PATH` env override, then local `telemetry.toml`, then
/// the platform config dir, matching the editor's `discover()` convention.
pub fn discover() -> PathBuf {
    if let Ok(path) = std::env::var("TELEMETRY_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    let local = PathBuf::from("telemetry.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("telemetry").join("telemetry.toml");
    }
    PathBuf::from("telemetry.toml")
}

pub fn load_from(path: Option<&Path>) -> PlantConfig {
    let path = path.map(Path::to_path_buf).unwrap_or_else(discover);
    let Ok(content) = std::fs::read_to_string(&path) else {
        return PlantConfig::default();
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => PlantConfig {
            tuning: Tuning::from_file(file.tuning),
            timezone: parse_timezone(file.plant.timezone.clone()),
            division: file.plant.division,
            plant: file.plant.plant,
        },
        Err(e) => {
            warn!(target: "telemetry_config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
            PlantConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_when_file_missing() {
        let cfg = load_from(Some(Path::new("__nonexistent_plant_config__.toml")));
        assert_eq!(cfg.tuning.max_top, 5);
        assert!(cfg.division.is_none());
    }

    #[test]
    fn parses_tuning_and_plant_sections() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[plant]\ndivision = \"NA\"\nplant = \"Plant12\"\n[tuning]\nmax_top = 3\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path()));
        assert_eq!(cfg.division.as_deref(), Some("NA"));
        assert_eq!(cfg.plant.as_deref(), Some("Plant12"));
        assert_eq!(cfg.tuning.max_top, 3);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "not valid toml [[[").unwrap();
        let cfg = load_from(Some(tmp.path()));
        assert_eq!(cfg.tuning.max_top, 5);
    }
}
