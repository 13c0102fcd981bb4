//! Server configuration module
//!
//! Parses and manages server configuration from YAML files.
//! The bootstrap layer hands us a bind address and a data directory; everything
//! else (session policy, lockout policy, sweep cadence) lives here.
//!
//! Uses serde_yaml for automatic parsing - just define the struct and serde handles
//! all the parsing, validation, and type conversion!

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the SQLite store inside the data directory.
pub const STORE_FILE: &str = "auth.db";

/// Main server configuration
///
/// This struct is automatically parsed from YAML by serde.
/// Just add a field here, and serde handles the rest!
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    // ============================================
    // Listener Configuration
    // ============================================
    /// Bind IP address for the HTTP listener
    pub bind_ip: String,

    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    // ============================================
    // Storage
    // ============================================
    /// Directory that holds the SQLite store (supplied by the bootstrap layer)
    pub data_dir: String,

    // ============================================
    // Session Policy
    // ============================================
    /// Idle timeout in seconds; a session not seen for this long is expired
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,

    /// Absolute session lifetime cap in seconds
    #[serde(default = "default_session_max_secs")]
    pub session_max_secs: u64,

    /// Extend expiry on each authenticated request (up to the absolute cap)
    #[serde(default = "default_sliding_expiry")]
    pub sliding_expiry: bool,

    /// Allow at most one live session per (account, origin)
    #[serde(default)]
    pub single_session: bool,

    // ============================================
    // Credential Policy
    // ============================================
    /// Minimum accepted secret length at registration / password change
    #[serde(default = "default_min_secret_len")]
    pub min_secret_len: usize,

    /// Failed logins per account before lockout kicks in
    #[serde(default = "default_lockout_threshold")]
    pub lockout_threshold: u32,

    /// Lockout window in seconds
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,

    // ============================================
    // Maintenance
    // ============================================
    /// Interval between expired-session sweeps, in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

// ============================================
// Default value functions
// These are called by serde when a field is missing
// ============================================

fn default_bind_port() -> u16 {
    8000
}

fn default_session_idle_secs() -> u64 {
    1800
}

fn default_session_max_secs() -> u64 {
    86_400
}

fn default_sliding_expiry() -> bool {
    true
}

fn default_min_secret_len() -> usize {
    6
}

fn default_lockout_threshold() -> u32 {
    5
}

fn default_lockout_secs() -> u64 {
    600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl ServerConfig {
    /// Load configuration from a YAML file
    ///
    /// # Example
    /// ```no_run
    /// use tanya::config::ServerConfig;
    ///
    /// let config = ServerConfig::from_file("conf/server.yaml")
    ///     .expect("Failed to load config");
    /// println!("data dir: {}", config.data_dir);
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Read file contents
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        // Parse YAML - serde does ALL the work!
        let config: ServerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML in {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a YAML string
    ///
    /// Useful for testing
    pub fn from_str(contents: &str) -> Result<Self> {
        let config: ServerConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Checks that required fields are set and values are reasonable
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.bind_ip.is_empty(), "bind_ip cannot be empty");
        anyhow::ensure!(!self.data_dir.is_empty(), "data_dir cannot be empty");

        anyhow::ensure!(
            self.session_idle_secs > 0,
            "session_idle_secs must be positive"
        );
        anyhow::ensure!(
            self.session_max_secs >= self.session_idle_secs,
            "session_max_secs ({}) must be >= session_idle_secs ({})",
            self.session_max_secs,
            self.session_idle_secs
        );

        anyhow::ensure!(
            self.min_secret_len >= 4,
            "min_secret_len too small: {} (min 4)",
            self.min_secret_len
        );

        anyhow::ensure!(
            self.lockout_threshold > 0,
            "lockout_threshold must be positive"
        );

        anyhow::ensure!(
            self.sweep_interval_secs > 0,
            "sweep_interval_secs must be positive"
        );

        Ok(())
    }

    /// Full path of the SQLite store inside the data directory.
    pub fn store_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(STORE_FILE)
    }

    /// `ip:port` string for the HTTP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_ip, self.bind_port)
    }
}
