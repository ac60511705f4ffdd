//! Configuration file support for dcpp-rs.
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:2501"
//! handshake_timeout_secs = 5
//! lock = "hubAutoReg"      # fixed challenge
//! random_lock = false      # true: fresh challenge per connection
//! random_lock_len = 16
//!
//! [register]
//! hublist = "hublist.example.org"
//! name = "My Hub"
//! host = "hub.example.org:411"
//! description = "Friendly hub"
//! users = 0
//! share = 0
//! timeout_secs = 5
//! ```
//!
//! CLI flags override values from the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dcpp_autoreg::handshake::DEFAULT_CHALLENGE;
use dcpp_autoreg::{HubInfo, LockChallenge, ServerConfig as AutoregServerConfig, DEFAULT_TIMEOUT};
use serde::Deserialize;

/// Default listen address of the registration server.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:2501";

/// Default length of randomized lock challenges.
pub const DEFAULT_RANDOM_LOCK_LEN: usize = 16;

// ============================================================================
// Configuration Structures
// ============================================================================

/// Top-level configuration file.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,
    pub register: Option<RegisterSection>,
}

/// Registration server settings (`[server]`).
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Fixed lock challenge. Ignored when `random_lock` is set.
    #[serde(default = "default_lock")]
    pub lock: String,
    #[serde(default)]
    pub random_lock: bool,
    #[serde(default = "default_random_lock_len")]
    pub random_lock_len: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            handshake_timeout_secs: default_timeout_secs(),
            lock: default_lock(),
            random_lock: false,
            random_lock_len: DEFAULT_RANDOM_LOCK_LEN,
        }
    }
}

/// Hub registration settings (`[register]`).
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegisterSection {
    #[serde(default)]
    pub hublist: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub users: u32,
    #[serde(default)]
    pub share: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RegisterSection {
    fn default() -> Self {
        Self {
            hublist: String::new(),
            name: String::new(),
            host: String::new(),
            description: String::new(),
            users: 0,
            share: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_lock() -> String {
    DEFAULT_CHALLENGE.to_string()
}

fn default_random_lock_len() -> usize {
    DEFAULT_RANDOM_LOCK_LEN
}

// ============================================================================
// Validation
// ============================================================================

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if self.listen.trim().is_empty() {
            anyhow::bail!("[server] 'listen' must not be empty");
        }
        if self.handshake_timeout_secs == 0 {
            anyhow::bail!("[server] 'handshake_timeout_secs' must be greater than 0");
        }
        if self.random_lock {
            if self.random_lock_len < 2 {
                anyhow::bail!("[server] 'random_lock_len' must be at least 2");
            }
        } else {
            validate_challenge(&self.lock)?;
        }
        Ok(())
    }

    /// Convert into the registration server's settings.
    pub fn to_server_config(&self) -> AutoregServerConfig {
        let lock = if self.random_lock {
            LockChallenge::Random {
                len: self.random_lock_len,
            }
        } else {
            LockChallenge::Fixed(self.lock.clone())
        };
        AutoregServerConfig {
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            lock,
            ..AutoregServerConfig::default()
        }
    }
}

impl RegisterSection {
    pub fn validate(&self) -> Result<()> {
        if self.hublist.trim().is_empty() {
            anyhow::bail!("[register] 'hublist' must not be empty");
        }
        if self.name.is_empty() {
            anyhow::bail!("[register] 'name' must not be empty");
        }
        if self.host.is_empty() {
            anyhow::bail!("[register] 'host' must not be empty");
        }
        if self.host.contains('|') {
            anyhow::bail!("[register] 'host' must not contain '|': {}", self.host);
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("[register] 'timeout_secs' must be greater than 0");
        }
        Ok(())
    }

    pub fn hub_info(&self) -> HubInfo {
        HubInfo {
            name: self.name.clone(),
            host: self.host.clone(),
            description: self.description.clone(),
            users: self.users,
            share: self.share,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn validate_challenge(challenge: &str) -> Result<()> {
    if challenge.len() < 2 {
        anyhow::bail!("[server] 'lock' must be at least 2 characters");
    }
    if let Some(c) = challenge
        .chars()
        .find(|c| matches!(c, ' ' | '|' | '$') || c.is_control())
    {
        anyhow::bail!("[server] 'lock' contains invalid character {:?}", c);
    }
    Ok(())
}

// ============================================================================
// Loading
// ============================================================================

pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(stripped) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    } else if path_str == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    path.to_path_buf()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("dcpp-rs").join("dcpp.toml"))
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).context("Failed to parse config")
}

/// Load the config file.
///
/// With no explicit path, a missing default file yields the default config.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(p) => expand_tilde(p),
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(Config::default()),
        },
    };
    let content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base_register() -> RegisterSection {
        RegisterSection {
            hublist: "hublist.example".to_string(),
            name: "TestHub".to_string(),
            host: "example.com:411".to_string(),
            description: "A|Test".to_string(),
            users: 5,
            share: 1_073_741_824,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.listen, DEFAULT_LISTEN);
        assert_eq!(config.server.handshake_timeout_secs, 5);
        assert_eq!(config.server.lock, "hubAutoReg");
        assert!(config.register.is_none());
        config.server.validate().unwrap();
    }

    #[test]
    fn test_parse_full_file() {
        let config = parse_config(
            r#"
            [server]
            listen = "127.0.0.1:4000"
            handshake_timeout_secs = 10
            random_lock = true
            random_lock_len = 24

            [register]
            hublist = "dchub://hublist.example:2501"
            name = "TestHub"
            host = "example.com:411"
            description = "A|Test"
            users = 5
            share = 1073741824
            "#,
        )
        .unwrap();

        let server = config.server.to_server_config();
        assert_eq!(server.handshake_timeout, Duration::from_secs(10));
        assert_eq!(server.lock, LockChallenge::Random { len: 24 });

        let register = config.register.unwrap();
        register.validate().unwrap();
        assert_eq!(register.hub_info().share, 1_073_741_824);
        assert_eq!(register.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_register_section() {
        let config = parse_config("[register]\nname = \"MyHub\"\nhost = \"h:411\"").unwrap();
        config.server.validate().unwrap();

        let mut register = config.register.unwrap();
        assert_eq!(register.timeout_secs, 5);
        assert!(register.validate().is_err());

        register.hublist = "hublist.example".to_string();
        register.validate().unwrap();
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(parse_config("[server]\nlisten_addr = \"x\"").is_err());
    }

    #[test]
    fn test_server_validation() {
        let mut server = ServerSection::default();
        server.lock = "has space".to_string();
        assert!(server.validate().is_err());

        let mut server = ServerSection::default();
        server.lock = "a|b".to_string();
        assert!(server.validate().is_err());

        let mut server = ServerSection::default();
        server.handshake_timeout_secs = 0;
        assert!(server.validate().is_err());

        let mut server = ServerSection::default();
        server.random_lock = true;
        server.random_lock_len = 1;
        assert!(server.validate().is_err());
    }

    #[test]
    fn test_register_validation() {
        base_register().validate().unwrap();

        let mut register = base_register();
        register.host = "bad|host".to_string();
        assert!(register.validate().is_err());

        let mut register = base_register();
        register.hublist = "  ".to_string();
        assert!(register.validate().is_err());

        let mut register = base_register();
        register.timeout_secs = 0;
        assert!(register.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nlisten = \"127.0.0.1:2501\"").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:2501");
    }

    #[test]
    fn test_load_config_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_config(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
