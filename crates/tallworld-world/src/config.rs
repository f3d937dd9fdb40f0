use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tallworld_common::{Result, TallWorldError};

/// Port the data server listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 25666;

/// How a world reaches its data server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    pub host: String,
    pub port: u16,
    /// Program and leading arguments. The database path and the port are appended.
    pub server_command: Vec<String>,
    /// Database file name inside the world directory.
    pub database: String,
    /// When false, connect to a server that is already running.
    pub launch_server: bool,
    /// Upper bound on the wait for the server to accept connections.
    pub settle_timeout_ms: u64,
    pub ready_poll_interval_ms: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: DEFAULT_PORT,
            server_command: vec![
                "java".to_owned(),
                "-jar".to_owned(),
                "TWMapServer-1.0-all.jar".to_owned(),
            ],
            database: "cubes.dim0.db".to_owned(),
            launch_server: true,
            settle_timeout_ms: 5000,
            ready_poll_interval_ms: 100,
        }
    }
}

impl WorldConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TallWorldError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref()).map_err(|e| {
            TallWorldError::Config(format!("Cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.launch_server && self.server_command.is_empty() {
            return Err(TallWorldError::Config(
                "server_command is empty but launch_server is set".to_owned(),
            ));
        }
        if self.ready_poll_interval_ms == 0 {
            return Err(TallWorldError::Config(
                "ready_poll_interval_ms must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn address(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }
}
