// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_TABLE: &str = "assets";
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "info";
const GATEWAY_URL_ENV: &str = "REPAIRTRACK_GATEWAY_URL";
const GATEWAY_KEY_ENV: &str = "REPAIRTRACK_GATEWAY_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

impl BackendKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub gateway: Gateway,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub forms: Forms,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub scanner: Scanner,
    #[serde(default)]
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            gateway: Gateway::default(),
            storage: Storage::default(),
            ui: Ui::default(),
            forms: Forms::default(),
            stats: Stats::default(),
            scanner: Scanner::default(),
            logging: Logging::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Gateway {
    pub backend: Option<String>,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub table: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub dark_mode: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Forms {
    pub check_duplicates: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stats {
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scanner {
    pub command: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Logging {
    pub level: Option<String>,
    pub file: Option<String>,
}

/// Everything needed to build the HTTP gateway, after env overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub url: String,
    pub api_key: String,
    pub table: String,
    pub timeout: Duration,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("REPAIRTRACK_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!(
                "cannot resolve config directory; set REPAIRTRACK_CONFIG_PATH to the config file"
            )
        })?;

        let app_dir = config_root.join(repairtrack_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` at the top",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1. Regenerate it with --print-example-config",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(backend) = &self.gateway.backend
            && BackendKind::parse(backend).is_none()
        {
            bail!(
                "gateway.backend in {} must be \"local\" or \"remote\", got {backend:?}",
                path.display()
            );
        }

        if let Some(timeout) = &self.gateway.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "gateway.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(table) = &self.gateway.table
            && table.trim().is_empty()
        {
            bail!("gateway.table in {} must not be empty", path.display());
        }

        if let Some(db_path) = &self.storage.db_path {
            repairtrack_db::validate_db_path(db_path)?;
        }

        if let Some(year) = self.stats.year
            && !(1970..=9999).contains(&year)
        {
            bail!(
                "stats.year in {} must be between 1970 and 9999, got {year}",
                path.display()
            );
        }

        if let Some(command) = &self.scanner.command
            && command.trim().is_empty()
        {
            bail!(
                "scanner.command in {} is blank; remove it or name a program",
                path.display()
            );
        }

        if let Some(level) = &self.logging.level {
            EnvFilter::try_new(level).with_context(|| {
                format!(
                    "logging.level {level:?} in {} is not a valid filter; use error, warn, info, debug, or trace",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn backend(&self) -> BackendKind {
        self.gateway
            .backend
            .as_deref()
            .and_then(BackendKind::parse)
            .unwrap_or(BackendKind::Local)
    }

    /// Gateway URL and key may come from the environment so the key never has
    /// to live in the config file.
    pub fn remote_settings(&self) -> Result<RemoteSettings> {
        let url = env_or(GATEWAY_URL_ENV, self.gateway.url.as_deref()).ok_or_else(|| {
            anyhow!("gateway.url is not set -- add it under [gateway] or set {GATEWAY_URL_ENV}")
        })?;
        let api_key = env_or(GATEWAY_KEY_ENV, self.gateway.api_key.as_deref()).ok_or_else(|| {
            anyhow!("gateway.api_key is not set -- add it under [gateway] or set {GATEWAY_KEY_ENV}")
        })?;
        Ok(RemoteSettings {
            url: url.trim_end_matches('/').to_owned(),
            api_key,
            table: self
                .gateway
                .table
                .clone()
                .unwrap_or_else(|| DEFAULT_TABLE.to_owned()),
            timeout: self.gateway_timeout()?,
        })
    }

    pub fn gateway_timeout(&self) -> Result<Duration> {
        parse_duration(self.gateway.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => repairtrack_db::default_db_path(),
        }
    }

    /// Theme used until the operator toggles one and it is stored.
    pub fn dark_mode_default(&self) -> bool {
        self.ui.dark_mode.unwrap_or(false)
    }

    pub fn check_duplicates(&self) -> bool {
        self.forms.check_duplicates.unwrap_or(true)
    }

    pub fn stats_year(&self, current_year: i32) -> i32 {
        self.stats.year.unwrap_or(current_year)
    }

    pub fn scanner_command(&self) -> Option<&str> {
        self.scanner
            .command
            .as_deref()
            .map(str::trim)
            .filter(|command| !command.is_empty())
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(file) = &self.logging.file {
            return Ok(PathBuf::from(file));
        }
        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [logging].file to a writable path")
        })?;
        Ok(data_root
            .join(repairtrack_db::APP_NAME)
            .join("repairtrack.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# repairtrack config\n# Place this file at: {}\n\nversion = 1\n\n[gateway]\n# \"local\" keeps assets in SQLite; \"remote\" talks to a Supabase REST endpoint\nbackend = \"local\"\n# url = \"https://<project>.supabase.co\"\n# api_key = \"...\"  (or set {GATEWAY_KEY_ENV})\ntable = \"{DEFAULT_TABLE}\"\ntimeout = \"{DEFAULT_TIMEOUT}\"\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/repairtrack/repairtrack.db)\n# db_path = \"/absolute/path/to/repairtrack.db\"\n\n[ui]\ndark_mode = false\n\n[forms]\ncheck_duplicates = true\n\n[stats]\n# Optional. Defaults to the current year\n# year = 2026\n\n[scanner]\n# Program that prints the decoded QR text on stdout\n# command = \"zbarcam --oneshot --raw\"\n\n[logging]\nlevel = \"{DEFAULT_LOG_LEVEL}\"\n# file = \"/absolute/path/to/repairtrack.log\"\n",
            path.display(),
        )
    }
}

fn env_or(name: &str, fallback: Option<&str>) -> Option<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| fallback.map(str::to_owned))
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}

#[cfg(test)]
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendKind, Config, env_lock, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn clear_gateway_env() {
        // SAFETY: test-only process-local env mutation, serialized by env_lock.
        unsafe {
            std::env::remove_var("REPAIRTRACK_GATEWAY_URL");
            std::env::remove_var("REPAIRTRACK_GATEWAY_KEY");
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.backend(), BackendKind::Local);
        assert!(config.check_duplicates());
        assert!(!config.dark_mode_default());
        assert_eq!(config.stats_year(2026), 2026);
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.scanner_command(), None);
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[ui]\ndark_mode = true\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        assert!(error.to_string().contains("version = 1"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 3\n")?;
        let error = Config::load(&path).expect_err("v3 config should fail");
        assert!(error.to_string().contains("unsupported config version 3"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[gateway]\nbackend = \"remote\"\nurl = \"https://demo.supabase.co/\"\napi_key = \"anon\"\ntable = \"repairs\"\ntimeout = \"500ms\"\n[ui]\ndark_mode = true\n[forms]\ncheck_duplicates = false\n[stats]\nyear = 2024\n[scanner]\ncommand = \" zbarcam --raw \"\n[logging]\nlevel = \"debug\"\nfile = \"/tmp/rt.log\"\n",
        )?;
        let config = Config::load(&path)?;
        assert_eq!(config.backend(), BackendKind::Remote);
        assert!(config.dark_mode_default());
        assert!(!config.check_duplicates());
        assert_eq!(config.stats_year(2026), 2024);
        assert_eq!(config.scanner_command(), Some("zbarcam --raw"));
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_path()?, PathBuf::from("/tmp/rt.log"));
        assert_eq!(config.gateway_timeout()?, Duration::from_millis(500));
        Ok(())
    }

    #[test]
    fn remote_settings_trim_url_and_default_table() -> Result<()> {
        let _guard = env_lock();
        clear_gateway_env();
        let (_temp, path) = write_config(
            "version = 1\n[gateway]\nbackend = \"remote\"\nurl = \"https://demo.supabase.co//\"\napi_key = \"anon\"\n",
        )?;
        let settings = Config::load(&path)?.remote_settings()?;
        assert_eq!(settings.url, "https://demo.supabase.co");
        assert_eq!(settings.api_key, "anon");
        assert_eq!(settings.table, "assets");
        assert_eq!(settings.timeout, Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn remote_settings_prefer_env_key_and_url() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config(
            "version = 1\n[gateway]\nurl = \"https://file.example\"\napi_key = \"from-file\"\n",
        )?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("REPAIRTRACK_GATEWAY_URL", "https://env.example");
            std::env::set_var("REPAIRTRACK_GATEWAY_KEY", "from-env");
        }
        let settings = Config::load(&path)?.remote_settings();
        clear_gateway_env();
        let settings = settings?;
        assert_eq!(settings.url, "https://env.example");
        assert_eq!(settings.api_key, "from-env");
        Ok(())
    }

    #[test]
    fn remote_settings_name_the_missing_value() -> Result<()> {
        let _guard = env_lock();
        clear_gateway_env();
        let (_temp, path) = write_config("version = 1\n[gateway]\nbackend = \"remote\"\n")?;
        let error = Config::load(&path)?
            .remote_settings()
            .expect_err("missing url should fail");
        assert!(error.to_string().contains("REPAIRTRACK_GATEWAY_URL"));
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() -> Result<()> {
        for (content, needle) in [
            ("version = 1\n[gateway]\nbackend = \"cloud\"\n", "gateway.backend"),
            ("version = 1\n[gateway]\ntimeout = \"0s\"\n", "must be positive"),
            ("version = 1\n[stats]\nyear = 12\n", "stats.year"),
            ("version = 1\n[scanner]\ncommand = \"  \"\n", "scanner.command"),
            ("version = 1\n[logging]\nlevel = \"repairtrack=loud\"\n", "logging.level"),
            (
                "version = 1\n[storage]\ndb_path = \"https://evil.example/db\"\n",
                "looks like a URI",
            ),
        ] {
            let (_temp, path) = write_config(content)?;
            let error = Config::load(&path).expect_err(content);
            let message = format!("{error:#}");
            assert!(message.contains(needle), "{content}: {message}");
        }
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("REPAIRTRACK_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("REPAIRTRACK_CONFIG_PATH");
        }
        assert_eq!(resolved?, override_path);
        Ok(())
    }

    #[test]
    fn db_path_uses_env_override_when_storage_db_path_missing() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("REPAIRTRACK_DB_PATH", "/from/env-only.db");
        }
        let resolved = Config::load(&path).and_then(|config| config.db_path());
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("REPAIRTRACK_DB_PATH");
        }
        assert_eq!(resolved?, PathBuf::from("/from/env-only.db"));
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        assert!(parse_duration("soon").is_err());
        Ok(())
    }

    #[test]
    fn example_config_loads_cleanly() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, Config::example_config(&path))?;
        let config = Config::load(&path)?;
        assert_eq!(config.backend(), BackendKind::Local);
        for section in ["[gateway]", "[storage]", "[forms]", "[scanner]", "[logging]"] {
            assert!(Config::example_config(&path).contains(section));
        }
        Ok(())
    }
}
