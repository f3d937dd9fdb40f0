use crate::config::WorldConfig;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Instant;
use tallworld_common::{Result, TallWorldError};
use tallworld_logger::{log, LogSeverity::*};
use tallworld_protocol::ProtocolClient;

/// Line written to the server's stdin to request a graceful shutdown.
pub const SHUTDOWN_COMMAND: &[u8] = b"exit\n";

/// The external data server process.
#[derive(Debug)]
pub struct ServerProcess {
    child: Option<Child>,
}

impl ServerProcess {
    /// Spawns the configured server command with the database path and port appended.
    /// The server gives no readiness signal; see [`connect_when_ready`].
    pub fn start(config: &WorldConfig, database: &Path) -> Result<Self> {
        let (program, args) = config.server_command.split_first().ok_or_else(|| {
            TallWorldError::Config("server_command is empty".to_owned())
        })?;

        let child = Command::new(program)
            .args(args)
            .arg(database)
            .arg(config.port.to_string())
            .stdin(Stdio::piped())
            .spawn()
            .map_err(TallWorldError::ProcessLaunch)?;

        log(
            format!(
                "Launched data server {} (pid {}) for {}",
                program,
                child.id(),
                database.display()
            ),
            Info,
        );
        Ok(Self { child: Some(child) })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Asks the server to exit and waits for it. There is no timeout: a server
    /// that ignores the command blocks this call.
    pub fn stop(mut self) -> Result<ExitStatus> {
        let Some(mut child) = self.child.take() else {
            return Err(TallWorldError::ProcessLaunch(io::Error::new(
                io::ErrorKind::NotFound,
                "data server was not running",
            )));
        };

        let stdin = child.stdin.take();
        request_exit(&mut child, stdin)?;

        log("Waiting for data server to close".to_owned(), Info);
        let status = child.wait()?;
        if status.success() {
            log("Data server exited ok".to_owned(), Info);
        } else {
            log(format!("Data server exited with {}", status), Warning);
        }
        Ok(status)
    }
}

/// Writes the shutdown command. If that fails for any reason other than the
/// server having exited already, the child is killed and reaped.
fn request_exit<W: Write>(child: &mut Child, stdin: Option<W>) -> Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(SHUTDOWN_COMMAND).and_then(|_| stdin.flush()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => {
            log(format!("Cannot send exit to data server ({}), killing it", e), Warning);
            let _ = child.kill();
            let _ = child.wait();
            Err(e.into())
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            log("Data server dropped without stop, killing it".to_owned(), Warning);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Polls the server port until a connection is accepted. The settle timeout is
/// only the upper bound; the first successful connect ends the wait.
pub fn connect_when_ready(config: &WorldConfig) -> Result<ProtocolClient> {
    let deadline = Instant::now() + config.settle_timeout();
    loop {
        match ProtocolClient::connect(config.address()) {
            Ok(client) => return Ok(client),
            Err(err) if Instant::now() >= deadline => {
                log(
                    format!(
                        "Data server not reachable on {}:{} after {:?}",
                        config.host,
                        config.port,
                        config.settle_timeout()
                    ),
                    Error,
                );
                return Err(err);
            }
            Err(_) => thread::sleep(config.ready_poll_interval()),
        }
    }
}
