use serde::{Deserialize, Serialize, Serializer};
use std::path::PathBuf;
use troupe_core::cache::{DEFAULT_MAX_BACKUPS, DEFAULT_QUOTA_BYTES};

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the REST/realtime backend (e.g. "https://xyz.example.co")
    pub url: Option<String>,
    /// Anonymous API key sent with every request
    #[serde(serialize_with = "redact")]
    pub api_key: Option<String>,
    /// Open push channels for mounted tables (default: true)
    #[serde(default = "default_realtime")]
    pub realtime: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            realtime: true,
        }
    }
}

impl BackendConfig {
    /// Returns the url and api_key if both are set and non-blank
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let url = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let key = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        Some((url, key))
    }

}

fn default_realtime() -> bool {
    true
}

fn redact<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(_) => serializer.serialize_some("********"),
        None => serializer.serialize_none(),
    }
}

/// Local cache limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backups kept per key
    pub max_backups: usize,
    /// Byte quota for the cache directory
    pub quota_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_backups: DEFAULT_MAX_BACKUPS,
            quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the local cache
    pub data_dir: ConfigValue<PathBuf>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub backend: BackendConfig,
    pub cache: CacheConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    backend: Option<BackendConfig>,
    cache: Option<CacheConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut config_file = None;
        let mut backend = BackendConfig::default();
        let mut cache = CacheConfig::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Relative paths are taken from the config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(backend_config) = file_config.backend {
                backend = backend_config;
            }
            if let Some(cache_config) = file_config.cache {
                cache = cache_config;
            }
        }

        if let Ok(dir) = std::env::var("TROUPE_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("TROUPE_BACKEND_URL") {
            backend.url = Some(url);
        }
        if let Ok(key) = std::env::var("TROUPE_API_KEY") {
            backend.api_key = Some(key);
        }

        Ok(Self {
            data_dir,
            config_file,
            backend,
            cache,
        })
    }

    /// Cache entries live under `<data_dir>/cache`
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.value.join("cache")
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/troupe/
    /// - macOS: ~/Library/Application Support/troupe/
    /// - Windows: %APPDATA%/troupe/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("troupe")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/troupe/
    /// - macOS: ~/Library/Application Support/troupe/
    /// - Windows: %APPDATA%/troupe/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("troupe")
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config.data_dir.value.to_string_lossy().contains("troupe"));
        assert_eq!(config.data_dir.source, ConfigSource::Default);
        assert!(config.config_file.is_none());
        assert!(config.backend.realtime);
        assert_eq!(config.cache.max_backups, 5);
        assert_eq!(config.cache.quota_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: /srv/troupe").unwrap();
        writeln!(file, "backend:").unwrap();
        writeln!(file, "  url: https://db.example.com").unwrap();
        writeln!(file, "  api_key: anon-key").unwrap();
        writeln!(file, "  realtime: false").unwrap();
        writeln!(file, "cache:").unwrap();
        writeln!(file, "  max_backups: 3").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(config.data_dir.value, PathBuf::from("/srv/troupe"));
        assert_eq!(config.data_dir.source, ConfigSource::File);
        assert_eq!(config.backend.url.as_deref(), Some("https://db.example.com"));
        assert!(config.backend.credentials().is_some());
        assert!(!config.backend.realtime);
        assert_eq!(config.cache.max_backups, 3);
        // Unset fields keep their defaults
        assert_eq!(config.cache.quota_bytes, DEFAULT_QUOTA_BYTES);
        assert_eq!(config.config_file, Some(config_path));
        assert_eq!(config.cache_dir(), PathBuf::from("/srv/troupe/cache"));
    }

    #[test]
    fn test_relative_data_dir_resolves_against_config_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: data").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir.value, temp_dir.path().join("data"));
    }

    #[test]
    fn test_api_key_is_redacted() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "backend:").unwrap();
        writeln!(file, "  api_key: secret-anon-key").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret-anon-key"));
        assert!(json.contains("********"));
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: /from/file").unwrap();

        std::env::set_var("TROUPE_DATA_DIR", "/from/env");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir.value, PathBuf::from("/from/env"));
        assert_eq!(config.data_dir.source, ConfigSource::Environment);

        std::env::remove_var("TROUPE_DATA_DIR");
    }

    #[test]
    fn test_blank_backend_values_are_not_configured() {
        let mut backend = BackendConfig {
            url: Some("https://db.example.com".to_string()),
            api_key: Some("  ".to_string()),
            ..BackendConfig::default()
        };
        assert!(backend.credentials().is_none());

        backend.api_key = Some(" key ".to_string());
        assert_eq!(
            backend.credentials(),
            Some(("https://db.example.com", "key"))
        );
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
