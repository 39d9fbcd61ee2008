//! Configuration loading, validation, and management for CarnaticGuru.
//!
//! Loads configuration from `~/.carnaticguru/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.carnaticguru/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Application name, the first component of every session key
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub lessons: LessonsConfig,

    #[serde(default)]
    pub patterns: PatternsConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Known learners
    #[serde(default = "default_users")]
    pub users: Vec<UserProfile>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.0-flash-lite".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_app_name() -> String {
    "carnatic_guru".into()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("app_name", &self.app_name)
            .field("sessions", &self.sessions)
            .field("router", &self.router)
            .field("lessons", &self.lessons)
            .field("patterns", &self.patterns)
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .field("users", &self.users)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

/// Where sessions live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_sessions_backend")]
    pub backend: String,

    /// SQLite database file; `None` means `~/.carnaticguru/carnatic_guru.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_sessions_backend() -> String {
    "sqlite".into()
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: default_sessions_backend(),
            path: None,
        }
    }
}

impl SessionsConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("carnatic_guru.db"))
    }
}

/// Query routing: timeouts, tool-call depth and classifier keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on nested tool calls within one turn
    #[serde(default = "default_max_tool_hops")]
    pub max_tool_hops: usize,

    #[serde(default = "default_lesson_keywords")]
    pub lesson_keywords: Vec<String>,

    #[serde(default = "default_raga_keywords")]
    pub raga_keywords: Vec<String>,

    #[serde(default = "default_pattern_keywords")]
    pub pattern_keywords: Vec<String>,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_tool_hops() -> usize {
    2
}
fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
fn default_lesson_keywords() -> Vec<String> {
    strings(&[
        "lesson", "sarali", "janta", "dhattu", "taatu", "alankar", "geetham", "varisai",
    ])
}
fn default_raga_keywords() -> Vec<String> {
    strings(&[
        "raga", "ragam", "raagam", "arohanam", "avarohanam", "janya", "melakarta", "scale",
        "tell me about",
    ])
}
fn default_pattern_keywords() -> Vec<String> {
    strings(&["pattern", "practice", "sequence", "phrase", "random"])
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_tool_hops: default_max_tool_hops(),
            lesson_keywords: default_lesson_keywords(),
            raga_keywords: default_raga_keywords(),
            pattern_keywords: default_pattern_keywords(),
        }
    }
}

/// Lesson material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonsConfig {
    /// Pre-extracted lesson text; `None` means `~/.carnaticguru/carnatic_basics.txt`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<PathBuf>,

    #[serde(default = "default_max_excerpt_chars")]
    pub max_excerpt_chars: usize,

    #[serde(default = "default_fallback_excerpt_chars")]
    pub fallback_excerpt_chars: usize,

    /// Suggested when a lookup misses
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
}

fn default_max_excerpt_chars() -> usize {
    2000
}
fn default_fallback_excerpt_chars() -> usize {
    1500
}
fn default_topics() -> Vec<String> {
    strings(&["Sarali", "Janta", "Dhattu", "Taatu", "Alankar", "Geetham"])
}

impl Default for LessonsConfig {
    fn default() -> Self {
        Self {
            document: None,
            max_excerpt_chars: default_max_excerpt_chars(),
            fallback_excerpt_chars: default_fallback_excerpt_chars(),
            topics: default_topics(),
        }
    }
}

impl LessonsConfig {
    pub fn resolved_document(&self) -> PathBuf {
        self.document
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("carnatic_basics.txt"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternsConfig {
    #[serde(default = "default_pattern_lengths")]
    pub lengths: Vec<usize>,

    /// Fixed seed for reproducible patterns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_pattern_lengths() -> Vec<usize> {
    vec![5, 6, 7, 8]
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            lengths: default_pattern_lengths(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8001
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub color: String,
}

impl UserProfile {
    fn new(id: &str, name: &str, avatar: &str, color: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: avatar.into(),
            color: color.into(),
        }
    }
}

fn default_users() -> Vec<UserProfile> {
    vec![
        UserProfile::new("learner_1", "Sankar", "👨‍🎓", "#FF6B6B"),
        UserProfile::new("learner_2", "Vishnu", "👩‍🎓", "#4ECDC4"),
        UserProfile::new("learner_3", "Priya", "👨‍🎓", "#45B7D1"),
        UserProfile::new("admin", "Admin", "👨‍💼", "#95E1D3"),
    ]
}

/// Read-only view of the configured learners, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Vec<UserProfile>,
}

impl UserDirectory {
    pub fn new(users: Vec<UserProfile>) -> Self {
        Self { users }
    }

    pub fn get(&self, id: &str) -> Option<&UserProfile> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn all(&self) -> &[UserProfile] {
        &self.users
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.carnaticguru/config.toml).
    ///
    /// API key environment variables, first found wins, only consulted
    /// when the file sets none:
    /// - `CARNATICGURU_API_KEY`
    /// - `GEMINI_API_KEY`
    /// - `GOOGLE_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::default_path())
    }

    /// [`load_from`](Self::load_from) plus the environment overrides that
    /// [`load`](Self::load) applies.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// `~/.carnaticguru/config.toml`
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = ["CARNATICGURU_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY", "OPENAI_API_KEY"]
                .iter()
                .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()));
        }

        if let Ok(provider) = std::env::var("CARNATICGURU_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("CARNATICGURU_MODEL") {
            self.default_model = model;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".carnaticguru")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.patterns.lengths.is_empty() {
            return Err(ConfigError::ValidationError(
                "patterns.lengths must name at least one length".into(),
            ));
        }
        if self.patterns.lengths.contains(&0) {
            return Err(ConfigError::ValidationError(
                "patterns.lengths must all be >= 1".into(),
            ));
        }

        if self.router.max_tool_hops == 0 {
            return Err(ConfigError::ValidationError(
                "router.max_tool_hops must be >= 1".into(),
            ));
        }
        if self.router.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "router.timeout_secs must be >= 1".into(),
            ));
        }

        if !matches!(self.sessions.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "unknown sessions.backend '{}' (expected sqlite or memory)",
                self.sessions.backend
            )));
        }

        let mut seen = HashSet::new();
        for user in &self.users {
            if !seen.insert(user.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate user id '{}'",
                    user.id
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Snapshot of the configured learners.
    pub fn user_directory(&self) -> UserDirectory {
        UserDirectory::new(self.users.clone())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            app_name: default_app_name(),
            sessions: SessionsConfig::default(),
            router: RouterConfig::default(),
            lessons: LessonsConfig::default(),
            patterns: PatternsConfig::default(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
            users: default_users(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.default_model, "gemini-2.0-flash-lite");
        assert_eq!(config.gateway.port, 8001);
        assert_eq!(config.router.timeout_secs, 30);
        assert_eq!(config.router.max_tool_hops, 2);
        assert_eq!(config.patterns.lengths, vec![5, 6, 7, 8]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.app_name, config.app_name);
        assert_eq!(parsed.users, config.users);
        assert_eq!(parsed.lessons.topics, config.lessons.topics);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_pattern_length_rejected() {
        let mut config = AppConfig::default();
        config.patterns.lengths = vec![5, 0];
        assert!(config.validate().is_err());
        config.patterns.lengths.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_hops_and_timeout_rejected() {
        let mut config = AppConfig::default();
        config.router.max_tool_hops = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.router.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_user_ids_rejected() {
        let mut config = AppConfig::default();
        config.users.push(UserProfile::new("admin", "Other", "", ""));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("admin"));
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.sessions.backend = "postgres".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.users.len(), 4);
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
app_name = "guru_test"

[patterns]
lengths = [4, 8]
seed = 7

[sessions]
backend = "memory"

[[users]]
id = "learner_9"
name = "Meera"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.app_name, "guru_test");
        assert_eq!(config.patterns.lengths, vec![4, 8]);
        assert_eq!(config.patterns.seed, Some(7));
        assert_eq!(config.sessions.backend, "memory");
        assert_eq!(config.users.len(), 1);
        assert_eq!(config.router.timeout_secs, 30);
    }

    #[test]
    fn load_with_env_reads_the_given_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guru.toml");
        std::fs::write(&path, "api_key = \"from-file\"\n\n[patterns]\nlengths = [3]\n").unwrap();

        let config = AppConfig::load_with_env(&path).unwrap();
        assert_eq!(config.patterns.lengths, vec![3]);
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert!(AppConfig::default_path().ends_with(".carnaticguru/config.toml"));
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "patterns = 3").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn debug_redacts_keys() {
        let mut config = AppConfig {
            api_key: Some("AIza-secret".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "gemini".into(),
            ProviderConfig {
                api_key: Some("AIza-nested".into()),
                api_url: None,
                default_model: None,
            },
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("AIza"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn user_directory_lookup() {
        let directory = AppConfig::default().user_directory();
        assert_eq!(directory.get("learner_2").unwrap().name, "Vishnu");
        assert!(directory.contains("admin"));
        assert!(!directory.contains("learner_42"));
        assert_eq!(directory.all().len(), 4);
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini-2.0-flash-lite"));
        assert!(toml_str.contains("8001"));
        assert!(toml_str.contains("learner_1"));
    }
}
