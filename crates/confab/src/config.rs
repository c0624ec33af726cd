//! Server and client settings.
//!
//! The session core reads from these structs but never reasons about
//! them: they are plain serde types with TOML load/save. `load_or_init`
//! mirrors the usual first-run behavior — if the file is missing, write
//! the defaults and return them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ConfabError;

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Settings for a Confab server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the accept loop binds to.
    pub bind_addr: String,

    /// Where the account database lives.
    pub database_path: PathBuf,

    /// Maximum number of established sessions. Further handshakes are
    /// answered with a server-full rejection before the account store is
    /// consulted.
    pub max_users: usize,

    /// Whether new registrations are gated behind an invite word.
    pub require_verification: bool,

    /// Room names. Configuration data only — the session core does not
    /// route messages between rooms.
    pub rooms: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9191".to_string(),
            database_path: PathBuf::from("confab.db"),
            max_users: 100,
            require_verification: true,
            rooms: vec!["guest".to_string(), "general".to_string()],
        }
    }
}

impl ServerConfig {
    /// Loads settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfabError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Saves settings to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfabError> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Loads the file if it exists; otherwise writes defaults and
    /// returns them.
    pub fn load_or_init(
        path: impl AsRef<Path>,
    ) -> Result<Self, ConfabError> {
        let path = path.as_ref();
        if path.is_file() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Settings for a Confab client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Display name attached to outgoing messages.
    pub nickname: String,

    /// Account name used at login.
    pub username: String,

    /// Account password. Digested at login time; stored here so the
    /// client can reconnect without prompting.
    pub password: String,

    /// Server host or IP.
    pub server_ip: String,

    /// Server port.
    pub port: u16,

    /// How many times `connect` retries before giving up.
    pub connect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nickname: "Jimmy".to_string(),
            username: String::new(),
            password: String::new(),
            server_ip: "localhost".to_string(),
            port: 9191,
            connect_attempts: 5,
        }
    }
}

impl ClientConfig {
    /// Loads settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfabError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Saves settings to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfabError> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Loads the file if it exists; otherwise writes defaults and
    /// returns them.
    pub fn load_or_init(
        path: impl AsRef<Path>,
    ) -> Result<Self, ConfabError> {
        let path = path.as_ref();
        if path.is_file() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_round_trips_through_toml() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:7000".into(),
            max_users: 3,
            ..ServerConfig::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.bind_addr, "127.0.0.1:7000");
        assert_eq!(parsed.max_users, 3);
        assert_eq!(parsed.rooms, config.rooms);
    }

    #[test]
    fn test_client_config_load_or_init_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");

        let first = ClientConfig::load_or_init(&path).unwrap();
        assert_eq!(first.nickname, "Jimmy");
        assert!(path.is_file(), "defaults should have been written");

        // Second call loads the same file rather than rewriting it.
        let second = ClientConfig::load_or_init(&path).unwrap();
        assert_eq!(second.port, first.port);
    }

    #[test]
    fn test_server_config_load_missing_file_errors() {
        let result = ServerConfig::load("/nonexistent/confab.toml");
        assert!(matches!(result, Err(ConfabError::ConfigIo(_))));
    }
}
