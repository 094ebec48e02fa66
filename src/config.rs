use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "abx-steward";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming a directory with replacement reference data.
pub const DATA_DIR_ENV: &str = "ABX_STEWARD_DATA_DIR";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "abx_steward=debug,warn"
    } else {
        "abx_steward=info,warn"
    }
}

/// Per-user configuration directory, e.g. ~/.config/abx-steward/.
/// `None` when the platform reports no config directory.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Directory to load reference data from: `ABX_STEWARD_DATA_DIR` if set,
/// else the per-user directory when it holds a drug catalog.
pub fn reference_data_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    app_data_dir()
        .map(|dir| dir.join("reference"))
        .filter(|dir| dir.join(crate::knowledge::reference::DRUGS_FILE).is_file())
}
