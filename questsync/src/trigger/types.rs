//! Inputs the auto-sync trigger reads: user preference, connectivity and the
//! position sensor.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// User policy for automatic syncing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AutoSyncPreference {
    /// Sync on any connection.
    #[default]
    Always,
    /// Sync only on unmetered networks.
    WifiOnly,
    /// Never sync automatically.
    Never,
}

impl AutoSyncPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoSyncPreference::Always => "always",
            AutoSyncPreference::WifiOnly => "wifi",
            AutoSyncPreference::Never => "never",
        }
    }
}

impl fmt::Display for AutoSyncPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown autosync preference: {0}")]
pub struct ParsePreferenceError(pub String);

impl FromStr for AutoSyncPreference {
    type Err = ParsePreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" | "on" => Ok(AutoSyncPreference::Always),
            "wifi" | "wifi-only" | "wifi_only" => Ok(AutoSyncPreference::WifiOnly),
            "never" | "off" => Ok(AutoSyncPreference::Never),
            _ => Err(ParsePreferenceError(s.to_string())),
        }
    }
}

/// Where the trigger reads the preference from. Read on every gate check, so
/// changes take effect without restarting the trigger.
pub trait PreferenceSource: Send + Sync {
    fn autosync(&self) -> AutoSyncPreference;
}

impl PreferenceSource for AutoSyncPreference {
    fn autosync(&self) -> AutoSyncPreference {
        *self
    }
}

/// Class of the active network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkClass {
    /// Wifi or ethernet.
    Unmetered,
    /// Mobile data.
    Metered,
}

/// A connectivity event as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivitySnapshot {
    pub connected: bool,
    pub network: Option<NetworkClass>,
    /// Same-class reconnection, e.g. the platform failing over from one
    /// network to another without a disconnect in between.
    pub is_failover: bool,
}

impl ConnectivitySnapshot {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            network: None,
            is_failover: false,
        }
    }

    pub fn unmetered() -> Self {
        Self {
            connected: true,
            network: Some(NetworkClass::Unmetered),
            is_failover: false,
        }
    }

    pub fn metered() -> Self {
        Self {
            connected: true,
            network: Some(NetworkClass::Metered),
            is_failover: false,
        }
    }

    /// Mark this snapshot as a failover transition.
    pub fn failover(mut self) -> Self {
        self.is_failover = true;
        self
    }
}

/// The connectivity tuple the trigger keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub connected: bool,
    /// Connected to an unmetered network.
    pub unconstrained: bool,
}

impl From<&ConnectivitySnapshot> for ConnectionState {
    fn from(snapshot: &ConnectivitySnapshot) -> Self {
        Self {
            connected: snapshot.connected,
            unconstrained: snapshot.connected
                && snapshot.network == Some(NetworkClass::Unmetered),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.connected, self.unconstrained) {
            (false, _) => f.write_str("offline"),
            (true, true) => f.write_str("unmetered"),
            (true, false) => f.write_str("metered"),
        }
    }
}

/// Queries the current connectivity.
pub trait ConnectivityMonitor: Send + Sync {
    fn current(&self) -> ConnectivitySnapshot;
}

/// Errors from the position sensor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("position tracking is not running")]
    NotRunning,

    #[error("position sensor error: {0}")]
    Sensor(String),
}

/// Start/stop control over the position sensor.
pub trait PositionTracker: Send + Sync {
    fn start(&self);

    fn stop(&self) -> Result<(), TrackerError>;
}
