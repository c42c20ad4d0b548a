//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// File storage locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Directory where uploaded inputs are kept
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Directory where compressed outputs are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Encoding-related configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodingConfig {
    /// Audio bitrate in bits per second used for every encode
    #[serde(default = "default_audio_bitrate_bps")]
    pub audio_bitrate_bps: u64,
    /// Maximum concurrent compression jobs (0 = derive from core count)
    #[serde(default)]
    pub max_concurrent_jobs: u32,
    /// Name or path of the ffmpeg binary
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,
    /// Name or path of the ffprobe binary
    #[serde(default = "default_ffprobe_bin")]
    pub ffprobe_bin: String,
}

fn default_audio_bitrate_bps() -> u64 {
    128_000
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_bin() -> String {
    "ffprobe".to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            audio_bitrate_bps: default_audio_bitrate_bps(),
            max_concurrent_jobs: 0,
            ffmpeg_bin: default_ffmpeg_bin(),
            ffprobe_bin: default_ffprobe_bin(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub encoding: EncodingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - VIDPRESS_UPLOAD_DIR -> storage.upload_dir
    /// - VIDPRESS_OUTPUT_DIR -> storage.output_dir
    /// - VIDPRESS_BIND_ADDR -> server.bind_addr
    /// - VIDPRESS_AUDIO_BITRATE -> encoding.audio_bitrate_bps
    /// - VIDPRESS_MAX_CONCURRENT_JOBS -> encoding.max_concurrent_jobs
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("VIDPRESS_UPLOAD_DIR") {
            if !val.is_empty() {
                self.storage.upload_dir = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("VIDPRESS_OUTPUT_DIR") {
            if !val.is_empty() {
                self.storage.output_dir = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("VIDPRESS_BIND_ADDR") {
            if !val.is_empty() {
                self.server.bind_addr = val;
            }
        }

        if let Ok(val) = env::var("VIDPRESS_AUDIO_BITRATE") {
            if let Ok(bps) = val.parse::<u64>() {
                self.encoding.audio_bitrate_bps = bps;
            }
        }

        if let Ok(val) = env::var("VIDPRESS_MAX_CONCURRENT_JOBS") {
            if let Ok(jobs) = val.parse::<u32>() {
                self.encoding.max_concurrent_jobs = jobs;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    ///
    /// A missing config file is not an error; the service runs on defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = match fs::read_to_string(path) {
            Ok(content) => Self::parse_toml(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        config.apply_env_overrides();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests don't interfere with each other
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to clear all config-related env vars
    fn clear_env_vars() {
        env::remove_var("VIDPRESS_UPLOAD_DIR");
        env::remove_var("VIDPRESS_OUTPUT_DIR");
        env::remove_var("VIDPRESS_BIND_ADDR");
        env::remove_var("VIDPRESS_AUDIO_BITRATE");
        env::remove_var("VIDPRESS_MAX_CONCURRENT_JOBS");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_config_parses_all_sections(
            upload_dir in "[a-z]{1,12}",
            output_dir in "[a-z]{1,12}",
            bind_port in 1024u16..65535,
            audio_bitrate in 32_000u64..512_000,
            max_jobs in 0u32..16,
        ) {
            let toml_str = format!(
                r#"
[storage]
upload_dir = "{}"
output_dir = "{}"

[server]
bind_addr = "127.0.0.1:{}"

[encoding]
audio_bitrate_bps = {}
max_concurrent_jobs = {}
"#,
                upload_dir, output_dir, bind_port, audio_bitrate, max_jobs
            );

            let config = Config::parse_toml(&toml_str).expect("Valid TOML should parse");

            prop_assert_eq!(config.storage.upload_dir, PathBuf::from(upload_dir));
            prop_assert_eq!(config.storage.output_dir, PathBuf::from(output_dir));
            prop_assert_eq!(config.server.bind_addr, format!("127.0.0.1:{}", bind_port));
            prop_assert_eq!(config.encoding.audio_bitrate_bps, audio_bitrate);
            prop_assert_eq!(config.encoding.max_concurrent_jobs, max_jobs);
        }
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::parse_toml("").expect("empty TOML should parse");

        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.storage.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.server.bind_addr, "127.0.0.1:5000");
        assert_eq!(config.encoding.audio_bitrate_bps, 128_000);
        assert_eq!(config.encoding.max_concurrent_jobs, 0);
        assert_eq!(config.encoding.ffmpeg_bin, "ffmpeg");
        assert_eq!(config.encoding.ffprobe_bin, "ffprobe");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::parse_toml(
            r#"
[encoding]
audio_bitrate_bps = 96000
"#,
        )
        .expect("partial TOML should parse");

        assert_eq!(config.encoding.audio_bitrate_bps, 96_000);
        assert_eq!(config.encoding.ffmpeg_bin, "ffmpeg");
        assert_eq!(config.server.bind_addr, "127.0.0.1:5000");
    }

    #[test]
    fn test_env_overrides_applied() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        env::set_var("VIDPRESS_UPLOAD_DIR", "/srv/uploads");
        env::set_var("VIDPRESS_BIND_ADDR", "0.0.0.0:8080");
        env::set_var("VIDPRESS_AUDIO_BITRATE", "192000");
        env::set_var("VIDPRESS_MAX_CONCURRENT_JOBS", "3");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.storage.upload_dir, PathBuf::from("/srv/uploads"));
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.encoding.audio_bitrate_bps, 192_000);
        assert_eq!(config.encoding.max_concurrent_jobs, 3);

        clear_env_vars();
    }

    #[test]
    fn test_env_overrides_ignore_invalid_numbers() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        env::set_var("VIDPRESS_AUDIO_BITRATE", "not-a-number");
        env::set_var("VIDPRESS_MAX_CONCURRENT_JOBS", "-1");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.encoding.audio_bitrate_bps, 128_000);
        assert_eq!(config.encoding.max_concurrent_jobs, 0);

        clear_env_vars();
    }

    #[test]
    fn test_load_from_missing_file_is_io_error() {
        let result = Config::load_from_file("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let config = Config::load("/nonexistent/path/config.toml")
            .expect("missing file should fall back to defaults");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = Config::parse_toml("[storage\nupload_dir = ???");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
