use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use validator::Validate;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub server: ServerSettings,
    #[serde(default)]
    #[validate(nested)]
    pub gemini: GeminiSettings,
    #[serde(default)]
    #[validate(nested)]
    pub upload: UploadSettings,
    #[serde(default = "default_environment")]
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ServerSettings {
    #[validate(length(min = 1))]
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GeminiSettings {
    /// Provider credential. Absent until `GEMINI_API_KEY` is set.
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_endpoint")]
    #[validate(length(min = 1))]
    pub endpoint: String,
    #[serde(default = "default_gemini_model")]
    #[validate(length(min = 1))]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    #[validate(range(max = 5))]
    pub max_retries: u32,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_gemini_endpoint(),
            model: default_gemini_model(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            initial_retry_delay_ms: default_initial_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

impl GeminiSettings {
    /// Whether a usable credential is present
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

fn default_gemini_endpoint() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_gemini_model() -> String { "gemini-2.5-flash".to_string() }
fn default_timeout_secs() -> u64 { 60 }
fn default_max_retries() -> u32 { 2 }
fn default_initial_retry_delay_ms() -> u64 { 500 }
fn default_max_retry_delay_ms() -> u64 { 4_000 }

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UploadSettings {
    #[serde(default = "default_max_files")]
    #[validate(range(min = 1, max = 3))]
    pub max_files: usize,
    #[serde(default = "default_max_file_bytes")]
    #[validate(range(min = 1, max = 10485760))]
    pub max_file_bytes: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_max_files() -> usize { crate::core::DEFAULT_MAX_FILES }
fn default_max_file_bytes() -> u64 { crate::core::DEFAULT_MAX_FILE_BYTES }

fn default_environment() -> String { "production".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with FACELENS_)
    /// 4. Well-known variables: GEMINI_API_KEY, PORT, APP_ENV
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3001)?
            // Add default config file
            .add_source(File::with_name("config/default").required(false))
            // Add local config file (for development overrides)
            .add_source(File::with_name("config/local").required(false))
            // e.g., FACELENS__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("FACELENS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        let settings: Settings = settings.try_deserialize()?;
        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::Message(format!("invalid settings: {}", e)))
    }

    /// Verbose error details are only exposed outside production
    pub fn expose_error_details(&self) -> bool {
        !self.environment.eq_ignore_ascii_case("production")
    }
}

/// Apply the conventional unprefixed variables on top of the layered config
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(api_key) = env::var("GEMINI_API_KEY") {
        if !api_key.trim().is_empty() {
            builder = builder.set_override("gemini.api_key", api_key)?;
        }
    }
    if let Ok(port) = env::var("PORT") {
        let port: u16 = port
            .parse()
            .map_err(|_| ConfigError::Message(format!("PORT must be a port number, got '{}'", port)))?;
        builder = builder.set_override("server.port", i64::from(port))?;
    }
    if let Ok(environment) = env::var("APP_ENV") {
        builder = builder.set_override("environment", environment)?;
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Settings {
        Settings {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 3001,
                workers: None,
            },
            gemini: GeminiSettings::default(),
            upload: UploadSettings::default(),
            environment: default_environment(),
        }
    }

    #[test]
    fn test_default_upload_limits() {
        let upload = UploadSettings::default();
        assert_eq!(upload.max_files, 3);
        assert_eq!(upload.max_file_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_default_gemini_settings() {
        let gemini = GeminiSettings::default();
        assert_eq!(gemini.model, "gemini-2.5-flash");
        assert_eq!(gemini.timeout_secs, 60);
        assert_eq!(gemini.max_retries, 2);
        assert!(gemini.api_key.is_none());
    }

    #[test]
    fn test_api_key_presence() {
        let mut settings = base();
        assert!(!settings.gemini.has_api_key());
        settings.gemini.api_key = Some("  ".to_string());
        assert!(!settings.gemini.has_api_key());
        settings.gemini.api_key = Some("abc".to_string());
        assert!(settings.gemini.has_api_key());
    }

    #[test]
    fn test_error_details_gated_by_environment() {
        let mut settings = base();
        assert!(!settings.expose_error_details());
        settings.environment = "development".to_string();
        assert!(settings.expose_error_details());
        settings.environment = "PRODUCTION".to_string();
        assert!(!settings.expose_error_details());
    }

    #[test]
    fn test_validation_rejects_bad_limits() {
        let mut settings = base();
        assert!(settings.check().is_ok());

        settings.upload.max_files = 0;
        assert!(settings.check().is_err());

        let mut settings = base();
        settings.upload.max_file_bytes = 11 * 1024 * 1024;
        assert!(settings.check().is_err());

        let mut settings = base();
        settings.gemini.max_retries = 10;
        assert!(settings.check().is_err());
    }

    #[test]
    fn test_well_known_variables_override_layered_values() {
        let layered = Config::builder()
            .set_default("server.port", 3001)
            .unwrap()
            .set_default("environment", "production")
            .unwrap()
            .build()
            .unwrap();

        std::env::set_var("PORT", "8088");
        std::env::set_var("APP_ENV", "staging");
        std::env::set_var("GEMINI_API_KEY", "from-env");
        let merged = substitute_env_vars(layered);
        std::env::remove_var("PORT");
        std::env::remove_var("APP_ENV");
        std::env::remove_var("GEMINI_API_KEY");

        let merged = merged.unwrap();
        assert_eq!(merged.get_int("server.port").unwrap(), 8088);
        assert_eq!(merged.get_string("environment").unwrap(), "staging");
        assert_eq!(merged.get_string("gemini.api_key").unwrap(), "from-env");
    }
}
