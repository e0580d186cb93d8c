//! Cross-platform directory utilities.

use std::path::PathBuf;

/// Get the application data directory.
///
/// - Linux: `~/.local/share/parley`
/// - Windows: `%LOCALAPPDATA%\parley`
/// - macOS: `~/Library/Application Support/parley`
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parley")
}

/// Get the configuration directory.
///
/// - Linux: `~/.config/parley`
/// - Windows: `%APPDATA%\parley`
/// - macOS: `~/Library/Application Support/parley`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parley")
}

/// Get the path to the main config file.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Get the path to the identity file (endpoint keypair).
pub fn identity_file_path() -> PathBuf {
    data_dir().join("identity.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_end_with_app_name() {
        assert!(data_dir().ends_with("parley"));
        assert!(config_dir().ends_with("parley"));
        assert_eq!(config_file_path().file_name().unwrap(), "config.json");
        assert_eq!(identity_file_path().file_name().unwrap(), "identity.json");
    }
}
