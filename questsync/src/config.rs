//! Configuration file support.
//!
//! Settings live in an INI file, by default at
//! `<config dir>/questsync/config.ini`. Missing keys fall back to defaults.
//!
//! ```ini
//! [autosync]
//! preference = wifi
//! movement_threshold_m = 400
//!
//! [strategy.mobile]
//! radius_m = 600
//! quest_type_limit = 5
//! ```

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::executor::DEFAULT_MAX_CONCURRENT_JOBS;
use crate::schedule::DEFAULT_CLOSE_SESSIONS_AFTER;
use crate::session::{SessionConfig, DEFAULT_MAX_NOTES};
use crate::strategy::StrategyConfig;
use crate::trigger::{AutoSyncPreference, TriggerConfig, DEFAULT_MOVEMENT_THRESHOLD_M};

const SECTION_AUTOSYNC: &str = "autosync";
const SECTION_DOWNLOAD: &str = "download";
const SECTION_MOBILE: &str = "strategy.mobile";
const SECTION_WIFI: &str = "strategy.wifi";

/// Upper bound for `close_sessions_after_secs` (one week).
pub const MAX_CLOSE_SESSIONS_AFTER_SECS: u64 = 7 * 24 * 60 * 60;

/// Value of `quest_type_limit` meaning "no limit".
const UNLIMITED: &str = "none";

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render config: {0}")]
    Render(#[source] std::io::Error),

    #[error("invalid value for {section}.{key}: '{value}'")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

impl ConfigError {
    fn invalid(section: &str, key: &str, value: impl Display) -> Self {
        ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// `[autosync]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoSyncSettings {
    pub preference: AutoSyncPreference,
    pub movement_threshold_m: f64,
    pub close_sessions_after: Duration,
    pub max_concurrent_downloads: usize,
}

impl Default for AutoSyncSettings {
    fn default() -> Self {
        Self {
            preference: AutoSyncPreference::default(),
            movement_threshold_m: DEFAULT_MOVEMENT_THRESHOLD_M,
            close_sessions_after: DEFAULT_CLOSE_SESSIONS_AFTER,
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }
}

/// `[download]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Zero means downloads never count as fresh.
    pub quest_expiration: Duration,
    pub user_id: Option<u64>,
    pub max_notes: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            quest_expiration: Duration::ZERO,
            user_id: None,
            max_notes: DEFAULT_MAX_NOTES,
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub autosync: AutoSyncSettings,
    pub download: DownloadSettings,
    pub mobile: StrategyConfig,
    pub wifi: StrategyConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            autosync: AutoSyncSettings::default(),
            download: DownloadSettings::default(),
            mobile: StrategyConfig::mobile_data(),
            wifi: StrategyConfig::wifi(),
        }
    }
}

impl SyncConfig {
    /// `<config dir>/questsync/config.ini`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("questsync").join("config.ini"))
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_ini(&ini)
    }

    /// Load `path`, or defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_ini_str(content: &str) -> ConfigResult<Self> {
        let ini = Ini::load_from_str(content)?;
        Self::from_ini(&ini)
    }

    /// Write the configuration, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        self.to_ini().write_to_file(path).map_err(write_error)
    }

    /// Render as INI text.
    pub fn to_ini_string(&self) -> ConfigResult<String> {
        let mut buf = Vec::new();
        match self.to_ini().write_to(&mut buf) {
            Ok(()) => Ok(String::from_utf8_lossy(&buf).into_owned()),
            Err(e) => Err(ConfigError::Render(e)),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            quest_expiration: self.download.quest_expiration,
            user_id: self.download.user_id,
            max_notes: self.download.max_notes,
        }
    }

    pub fn trigger_config(&self) -> TriggerConfig {
        TriggerConfig {
            movement_threshold_m: self.autosync.movement_threshold_m,
            close_sessions_after: self.autosync.close_sessions_after,
        }
    }

    fn from_ini(ini: &Ini) -> ConfigResult<Self> {
        let defaults = Self::default();
        let reader = IniReader { ini };

        let autosync = AutoSyncSettings {
            preference: reader.parse(SECTION_AUTOSYNC, "preference", defaults.autosync.preference)?,
            movement_threshold_m: reader.non_negative(
                SECTION_AUTOSYNC,
                "movement_threshold_m",
                defaults.autosync.movement_threshold_m,
            )?,
            close_sessions_after: Duration::from_secs(reader.at_most(
                SECTION_AUTOSYNC,
                "close_sessions_after_secs",
                defaults.autosync.close_sessions_after.as_secs(),
                MAX_CLOSE_SESSIONS_AFTER_SECS,
            )?),
            max_concurrent_downloads: reader.positive(
                SECTION_AUTOSYNC,
                "max_concurrent_downloads",
                defaults.autosync.max_concurrent_downloads,
            )?,
        };

        let expiration_minutes: u64 = reader.parse(SECTION_DOWNLOAD, "quest_expiration_minutes", 0)?;
        let download = DownloadSettings {
            quest_expiration: Duration::from_secs(expiration_minutes.saturating_mul(60)),
            user_id: reader.optional(SECTION_DOWNLOAD, "user_id", None)?,
            max_notes: reader.positive(SECTION_DOWNLOAD, "max_notes", defaults.download.max_notes)?,
        };

        Ok(Self {
            autosync,
            download,
            mobile: reader.strategy(SECTION_MOBILE, defaults.mobile)?,
            wifi: reader.strategy(SECTION_WIFI, defaults.wifi)?,
        })
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some(SECTION_AUTOSYNC))
            .set("preference", self.autosync.preference.as_str())
            .set(
                "movement_threshold_m",
                self.autosync.movement_threshold_m.to_string(),
            )
            .set(
                "close_sessions_after_secs",
                self.autosync.close_sessions_after.as_secs().to_string(),
            )
            .set(
                "max_concurrent_downloads",
                self.autosync.max_concurrent_downloads.to_string(),
            );

        ini.with_section(Some(SECTION_DOWNLOAD))
            .set(
                "quest_expiration_minutes",
                (self.download.quest_expiration.as_secs() / 60).to_string(),
            )
            .set(
                "user_id",
                self.download
                    .user_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
            )
            .set("max_notes", self.download.max_notes.to_string());

        for (section, strategy) in [(SECTION_MOBILE, &self.mobile), (SECTION_WIFI, &self.wifi)] {
            ini.with_section(Some(section))
                .set("radius_m", strategy.radius_m.to_string())
                .set(
                    "quest_type_limit",
                    strategy
                        .work_type_limit
                        .map_or_else(|| UNLIMITED.to_string(), |limit| limit.to_string()),
                )
                .set("max_abs_latitude", strategy.max_abs_latitude.to_string());
        }

        ini
    }
}

struct IniReader<'a> {
    ini: &'a Ini,
}

impl IniReader<'_> {
    fn raw(&self, section: &str, key: &str) -> Option<&str> {
        self.ini.get_from(Some(section), key).map(str::trim)
    }

    fn parse<T: FromStr>(&self, section: &str, key: &str, default: T) -> ConfigResult<T> {
        match self.raw(section, key) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::invalid(section, key, value)),
        }
    }

    /// Empty or `none` means `None`.
    fn optional<T: FromStr>(
        &self,
        section: &str,
        key: &str,
        default: Option<T>,
    ) -> ConfigResult<Option<T>> {
        match self.raw(section, key) {
            None => Ok(default),
            Some(value) if value.is_empty() || value.eq_ignore_ascii_case(UNLIMITED) => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::invalid(section, key, value)),
        }
    }

    fn non_negative(&self, section: &str, key: &str, default: f64) -> ConfigResult<f64> {
        let value: f64 = self.parse(section, key, default)?;
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(ConfigError::invalid(section, key, value))
        }
    }

    fn at_most(&self, section: &str, key: &str, default: u64, max: u64) -> ConfigResult<u64> {
        let value: u64 = self.parse(section, key, default)?;
        if value <= max {
            Ok(value)
        } else {
            Err(ConfigError::invalid(section, key, value))
        }
    }

    fn positive(&self, section: &str, key: &str, default: usize) -> ConfigResult<usize> {
        match self.parse(section, key, default)? {
            0 => Err(ConfigError::invalid(section, key, 0)),
            value => Ok(value),
        }
    }

    fn strategy(&self, section: &str, default: StrategyConfig) -> ConfigResult<StrategyConfig> {
        let max_abs_latitude = self.non_negative(section, "max_abs_latitude", default.max_abs_latitude)?;
        if max_abs_latitude > 90.0 {
            return Err(ConfigError::invalid(section, "max_abs_latitude", max_abs_latitude));
        }

        Ok(StrategyConfig {
            radius_m: self.non_negative(section, "radius_m", default.radius_m)?,
            work_type_limit: self.optional(section, "quest_type_limit", default.work_type_limit)?,
            max_abs_latitude,
        })
    }
}
