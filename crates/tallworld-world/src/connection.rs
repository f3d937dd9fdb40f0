use crate::config::WorldConfig;
use crate::source::ChunkSource;
use crate::supervisor::{connect_when_ready, ServerProcess};
use std::collections::HashSet;
use std::path::PathBuf;
use tallworld_common::{ColumnCoord, CubeCoord, Result, TallWorldError};
use tallworld_logger::{log, LogSeverity::*};
use tallworld_nbt::Tag;
use tallworld_protocol::ProtocolClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing has been requested yet.
    Unconnected,
    /// Spawning the server and waiting for it to accept connections.
    Launching,
    Connected,
    /// A fatal error happened. Only closing is left.
    Failed,
    Closed,
}

/// The data server and the single client connection to it, started on first use.
pub struct Connection {
    config: WorldConfig,
    database: PathBuf,
    state: ConnectionState,
    server: Option<ServerProcess>,
    client: Option<ProtocolClient>,
}

impl Connection {
    pub fn new(config: WorldConfig, database: PathBuf) -> Self {
        Self {
            config,
            database,
            state: ConnectionState::Unconnected,
            server: None,
            client: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Fails with `WorldClosed` once the connection failed or was closed.
    pub fn ensure_usable(&self) -> Result<()> {
        match self.state {
            ConnectionState::Unconnected | ConnectionState::Connected => Ok(()),
            _ => Err(TallWorldError::WorldClosed),
        }
    }

    fn launch(&mut self) -> Result<()> {
        self.state = ConnectionState::Launching;
        if self.config.launch_server {
            self.server = Some(ServerProcess::start(&self.config, &self.database)?);
        }
        self.client = Some(connect_when_ready(&self.config)?);
        log(
            format!("Connected to data server on {}:{}", self.config.host, self.config.port),
            Info,
        );
        Ok(())
    }

    fn client(&mut self) -> Result<&mut ProtocolClient> {
        self.ensure_usable()?;
        if self.state == ConnectionState::Unconnected {
            match self.launch() {
                Ok(()) => self.state = ConnectionState::Connected,
                Err(err) => {
                    log(format!("Could not start the data server: {}", err), Error);
                    self.state = ConnectionState::Failed;
                    return Err(err);
                }
            }
        }
        self.client.as_mut().ok_or(TallWorldError::WorldClosed)
    }

    fn with_client<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&mut ProtocolClient) -> Result<T>,
    {
        let result = op(self.client()?);
        if let Err(err) = &result {
            if err.is_fatal() {
                log(format!("Connection unusable after: {}", err), Error);
                self.state = ConnectionState::Failed;
            }
        }
        result
    }

    /// Sends the disconnect byte, then asks the server to exit and waits for it.
    /// Both steps run even if the first fails; the first error is returned.
    pub fn close(&mut self) -> Result<()> {
        if matches!(self.state, ConnectionState::Unconnected | ConnectionState::Closed) {
            self.state = ConnectionState::Closed;
            return Ok(());
        }

        let mut first_error = None;
        if let Some(client) = self.client.take() {
            if let Err(err) = client.close() {
                log(format!("Error sending disconnect: {}", err), Warning);
                first_error = Some(err);
            }
        }
        if let Some(server) = self.server.take() {
            if let Err(err) = server.stop() {
                log(format!("Error stopping data server: {}", err), Warning);
                first_error.get_or_insert(err);
            }
        }
        self.state = ConnectionState::Closed;
        first_error.map_or(Ok(()), Err)
    }
}

impl ChunkSource for Connection {
    fn fetch_column(&mut self, coord: ColumnCoord) -> Result<Option<Tag>> {
        self.with_client(|client| client.get_column(coord))
    }

    fn fetch_cube(&mut self, coord: CubeCoord) -> Result<Option<Tag>> {
        self.with_client(|client| client.get_cube(coord))
    }

    fn column_coordinates(&mut self) -> Result<HashSet<ColumnCoord>> {
        self.with_client(|client| client.list_column_coordinates())
    }

    fn cube_coordinates(&mut self) -> Result<HashSet<CubeCoord>> {
        self.with_client(|client| client.list_cube_coordinates())
    }

    fn store_column(&mut self, coord: ColumnCoord, bytes: &[u8]) -> Result<()> {
        self.with_client(|client| client.save_column(coord, bytes))
    }

    fn store_cube(&mut self, coord: CubeCoord, bytes: &[u8]) -> Result<()> {
        self.with_client(|client| client.save_cube(coord, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn unreachable_config() -> WorldConfig {
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        WorldConfig {
            port,
            launch_server: false,
            settle_timeout_ms: 100,
            ready_poll_interval_ms: 10,
            ..WorldConfig::default()
        }
    }

    #[test]
    fn test_close_before_first_use_does_nothing() {
        let mut connection = Connection::new(unreachable_config(), PathBuf::from("db"));
        assert!(connection.close().is_ok());
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_matches!(connection.fetch_cube(CubeCoord::new(0, 0, 0)), Err(TallWorldError::WorldClosed));
    }

    #[test]
    fn test_connect_failure_fails_the_connection() {
        let mut connection = Connection::new(unreachable_config(), PathBuf::from("db"));
        assert_matches!(connection.fetch_column(ColumnCoord::new(0, 0)), Err(TallWorldError::IoError(_)));
        assert_eq!(connection.state(), ConnectionState::Failed);
        assert_matches!(connection.fetch_column(ColumnCoord::new(0, 0)), Err(TallWorldError::WorldClosed));
    }

    #[test]
    fn test_missing_server_executable() {
        let config = WorldConfig {
            server_command: vec!["/nonexistent/tw-server".to_owned()],
            ..unreachable_config()
        };
        let config = WorldConfig { launch_server: true, ..config };
        let mut connection = Connection::new(config, PathBuf::from("db"));
        assert_matches!(connection.cube_coordinates(), Err(TallWorldError::ProcessLaunch(_)));
        assert_eq!(connection.state(), ConnectionState::Failed);
        assert!(connection.close().is_ok());
    }

    #[test]
    fn test_server_closing_is_fatal() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = [0u8; 9];
            socket.read_exact(&mut request).unwrap();
            socket.write_all(&[0x10]).unwrap();
            request
        });

        let config = WorldConfig {
            port,
            ..unreachable_config()
        };
        let mut connection = Connection::new(config, PathBuf::from("db"));
        assert_matches!(connection.fetch_column(ColumnCoord::new(1, 2)), Err(TallWorldError::ServerClosing));
        assert_eq!(connection.state(), ConnectionState::Failed);
        assert_matches!(connection.fetch_column(ColumnCoord::new(1, 2)), Err(TallWorldError::WorldClosed));
        assert_eq!(server.join().unwrap(), [0x05, 0, 0, 0, 1, 0, 0, 0, 2]);
    }
}
