// Application state shared by the screens
use std::path::PathBuf;
use tracing::warn;

use crate::settings::AppSettings;

pub struct AppState {
    pub settings: AppSettings,
    pub app_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(settings: AppSettings, app_dir: Option<PathBuf>) -> Self {
        Self { settings, app_dir }
    }

    /// Load settings from the per-user directory. A broken settings file is
    /// reported and replaced by defaults rather than stopping the app.
    pub fn load() -> Self {
        let app_dir = AppSettings::default_dir();
        let settings = match app_dir.as_deref() {
            Some(dir) => AppSettings::load(dir).unwrap_or_else(|e| {
                warn!("{:#}; using default settings", e);
                AppSettings::default()
            }),
            None => AppSettings::default(),
        };
        Self::new(settings, app_dir)
    }
}
