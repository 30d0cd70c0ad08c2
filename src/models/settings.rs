use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MIN_FLUSH_INTERVAL_MS: u64 = 1_000;
pub const MIN_MOUSE_THROTTLE_MS: u64 = 50;
pub const MAX_MOUSE_THROTTLE_MS: u64 = 1_000;
pub const MAX_RETENTION_DAYS: i32 = 3_650;
pub const MIN_UI_UPDATE_INTERVAL_MS: u64 = 50;
pub const MIN_APP_SAMPLE_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub flush_interval_ms: u64,
    pub mouse_move_throttle_ms: u64,
    /// 0 or negative keeps history forever.
    pub retention_days: i32,
    pub raw_event_logging: bool,
    /// Privacy gate: without it raw key events are stored without the key itself.
    pub log_keystroke_content: bool,
    pub ui_update_interval_ms: u64,
    pub mouse_sensitivity: f64,
    pub screen_dpi: f64,
    pub scroll_lines_per_notch: f64,
    pub scroll_line_height_cm: f64,
    pub app_sample_interval_ms: u64,
    pub app_save_interval_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub database_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            flush_interval_ms: 30_000,
            mouse_move_throttle_ms: 100,
            retention_days: 0,
            raw_event_logging: false,
            log_keystroke_content: false,
            ui_update_interval_ms: 200,
            mouse_sensitivity: 2.0,
            screen_dpi: 96.0,
            scroll_lines_per_notch: 3.0,
            scroll_line_height_cm: 0.8,
            app_sample_interval_ms: 1_000,
            app_save_interval_ms: 30_000,
            shutdown_timeout_ms: 5_000,
            database_path: PathBuf::from("./data/odometer.db"),
        }
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        self.flush_interval_ms = self.flush_interval_ms.max(MIN_FLUSH_INTERVAL_MS);
        self.mouse_move_throttle_ms = self
            .mouse_move_throttle_ms
            .clamp(MIN_MOUSE_THROTTLE_MS, MAX_MOUSE_THROTTLE_MS);
        self.retention_days = self.retention_days.min(MAX_RETENTION_DAYS);
        self.ui_update_interval_ms = self.ui_update_interval_ms.max(MIN_UI_UPDATE_INTERVAL_MS);
        self.mouse_sensitivity = positive_or(self.mouse_sensitivity, defaults.mouse_sensitivity);
        self.screen_dpi = positive_or(self.screen_dpi, defaults.screen_dpi);
        self.scroll_lines_per_notch =
            positive_or(self.scroll_lines_per_notch, defaults.scroll_lines_per_notch);
        self.scroll_line_height_cm =
            positive_or(self.scroll_line_height_cm, defaults.scroll_line_height_cm);
        self.app_sample_interval_ms = self.app_sample_interval_ms.max(MIN_APP_SAMPLE_INTERVAL_MS);
        self.app_save_interval_ms = self.app_save_interval_ms.max(MIN_FLUSH_INTERVAL_MS);
        if self.database_path.as_os_str().is_empty() {
            self.database_path = defaults.database_path;
        }
        self
    }

    pub fn retention_enabled(&self) -> bool {
        self.retention_days > 0
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn mouse_move_throttle(&self) -> Duration {
        Duration::from_millis(self.mouse_move_throttle_ms)
    }

    pub fn ui_update_interval(&self) -> Duration {
        Duration::from_millis(self.ui_update_interval_ms)
    }

    pub fn app_sample_interval(&self) -> Duration {
        Duration::from_millis(self.app_sample_interval_ms)
    }

    pub fn app_save_interval(&self) -> Duration {
        Duration::from_millis(self.app_save_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Missing file means defaults; the result is always normalized.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default().normalized());
        }
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        let settings: Settings = serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        Ok(settings.normalized())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        serde_json::to_writer_pretty(&mut file, self).context("Failed to serialize settings")?;
        file.write_all(b"\n")?;
        file.sync_all()?;

        let _ = fs::remove_file(path);
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move settings into {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_clamps_into_documented_ranges() {
        let settings = Settings {
            flush_interval_ms: 10,
            mouse_move_throttle_ms: 5_000,
            retention_days: 99_999,
            ui_update_interval_ms: 0,
            mouse_sensitivity: 0.0,
            screen_dpi: f64::NAN,
            ..Settings::default()
        }
        .normalized();

        assert_eq!(settings.flush_interval_ms, MIN_FLUSH_INTERVAL_MS);
        assert_eq!(settings.mouse_move_throttle_ms, MAX_MOUSE_THROTTLE_MS);
        assert_eq!(settings.retention_days, MAX_RETENTION_DAYS);
        assert_eq!(settings.ui_update_interval_ms, MIN_UI_UPDATE_INTERVAL_MS);
        assert_eq!(settings.mouse_sensitivity, 2.0);
        assert_eq!(settings.screen_dpi, 96.0);
    }

    #[test]
    fn negative_retention_survives_normalization_as_keep_forever() {
        let settings = Settings {
            retention_days: -5,
            ..Settings::default()
        }
        .normalized();
        assert_eq!(settings.retention_days, -5);
        assert!(!settings.retention_enabled());
        assert!(!Settings::default().retention_enabled());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"retentionDays":30,"rawEventLogging":true}"#).expect("parse");
        assert_eq!(settings.retention_days, 30);
        assert!(settings.raw_event_logging);
        assert!(!settings.log_keystroke_content);
        assert_eq!(settings.flush_interval_ms, 30_000);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            retention_days: 14,
            mouse_move_throttle_ms: 250,
            ..Settings::default()
        };
        settings.save(&path).expect("save");

        let loaded = Settings::load(&path).expect("load");
        assert_eq!(loaded.retention_days, 14);
        assert_eq!(loaded.mouse_move_throttle_ms, 250);
        assert_eq!(Settings::load(&dir.path().join("missing.json")).expect("load"), Settings::default());
    }
}
