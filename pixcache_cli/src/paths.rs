//! Centralized path management for the pixcache CLI

use std::path::PathBuf;

/// The name of the application directory used across all platforms
const APP_DIR: &str = "pixcache";

/// The name of the configuration file
const CONFIG_FILE: &str = "config.toml";

/// Returns the configuration directory
///
/// `XDG_CONFIG_HOME` wins on Unix-like systems; otherwise the platform
/// configuration directory is used, falling back to `.pixcache`.
pub fn get_config_dir() -> PathBuf {
    #[cfg(not(target_os = "windows"))]
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return PathBuf::from(xdg_config).join(APP_DIR);
    }

    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".pixcache"))
}

/// Returns the path to the configuration file
pub fn get_config_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_has_correct_filename() {
        let path = get_config_path();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some(CONFIG_FILE)
        );
        assert!(path.starts_with(get_config_dir()));
    }

    #[test]
    fn test_dirs_contain_app_name() {
        assert!(get_config_dir().to_string_lossy().contains(APP_DIR));
    }
}
