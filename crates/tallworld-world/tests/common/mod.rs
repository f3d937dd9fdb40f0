use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tallworld_world::WorldConfig;
use tempfile::TempDir;
use tokio::io::{self as io, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;

pub const CLOSING: u8 = 0x10;
pub const NOT_FOUND: u8 = 0x14;
pub const FOUND: u8 = 0x15;
pub const COORDINATE_LIST: u8 = 0x16;

/// What the mock data server holds and what it has seen.
#[derive(Debug, Default)]
pub struct ServerState {
    pub cubes: BTreeMap<(i32, i32, i32), Vec<u8>>,
    pub columns: BTreeMap<(i32, i32), Vec<u8>>,
    /// Every opcode received, in order, including the disconnect byte.
    pub opcodes: Vec<u8>,
    pub accepts: usize,
    /// Answer every request with the closing packet.
    pub closing: bool,
}

pub struct MockServer {
    pub port: u16,
    pub state: Arc<Mutex<ServerState>>,
}

impl MockServer {
    pub fn config(&self) -> WorldConfig {
        WorldConfig {
            port: self.port,
            launch_server: false,
            settle_timeout_ms: 1000,
            ready_poll_interval_ms: 10,
            ..WorldConfig::default()
        }
    }

    pub fn opcodes(&self) -> Vec<u8> {
        self.state.lock().unwrap().opcodes.clone()
    }

    pub fn accepts(&self) -> usize {
        self.state.lock().unwrap().accepts
    }

    /// Waits until `n` clients sent the disconnect byte, so everything they
    /// wrote before it has been handled.
    pub async fn wait_for_disconnects(&self, n: usize) {
        for _ in 0..200 {
            if self.opcodes().iter().filter(|&&op| op == 0x00).count() >= n {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("mock server saw fewer than {} disconnects", n);
    }
}

pub async fn start_mock_server() -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(Mutex::new(ServerState::default()));

    let shared = state.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            shared.lock().unwrap().accepts += 1;
            tokio::spawn(handle_connection(socket, shared.clone()));
        }
    });

    MockServer { port, state }
}

async fn read_ints(socket: &mut TcpStream, n: usize) -> io::Result<Vec<i32>> {
    let mut ints = Vec::with_capacity(n);
    for _ in 0..n {
        ints.push(socket.read_i32().await?);
    }
    Ok(ints)
}

async fn read_payload(socket: &mut TcpStream) -> io::Result<Vec<u8>> {
    let len = socket.read_i32().await?;
    let mut payload = vec![0u8; len as usize];
    socket.read_exact(&mut payload).await?;
    Ok(payload)
}

fn chunk_reply(found: Option<&Vec<u8>>) -> Vec<u8> {
    match found {
        Some(bytes) => {
            let mut reply = vec![FOUND];
            reply.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
            reply.extend_from_slice(bytes);
            reply
        }
        None => vec![NOT_FOUND],
    }
}

fn list_reply<I: Iterator<Item = Vec<i32>>>(count: usize, tuples: I) -> Vec<u8> {
    let mut reply = vec![COORDINATE_LIST];
    reply.extend_from_slice(&(count as i32).to_be_bytes());
    for value in tuples.flatten() {
        reply.extend_from_slice(&value.to_be_bytes());
    }
    reply
}

async fn handle_connection(mut socket: TcpStream, state: Arc<Mutex<ServerState>>) -> io::Result<()> {
    loop {
        let opcode = match socket.read_u8().await {
            Ok(opcode) => opcode,
            Err(_) => return Ok(()),
        };
        state.lock().unwrap().opcodes.push(opcode);

        let reply = match opcode {
            0x00 => return Ok(()),
            0x04 => {
                let c = read_ints(&mut socket, 3).await?;
                let state = state.lock().unwrap();
                Some(chunk_reply(state.cubes.get(&(c[0], c[1], c[2]))))
            }
            0x05 => {
                let c = read_ints(&mut socket, 2).await?;
                let state = state.lock().unwrap();
                Some(chunk_reply(state.columns.get(&(c[0], c[1]))))
            }
            0x06 => {
                let state = state.lock().unwrap();
                let tuples = state.cubes.keys().map(|&(x, y, z)| vec![x, y, z]);
                Some(list_reply(state.cubes.len(), tuples))
            }
            0x07 => {
                let state = state.lock().unwrap();
                let tuples = state.columns.keys().map(|&(x, z)| vec![x, z]);
                Some(list_reply(state.columns.len(), tuples))
            }
            0x08 => {
                let c = read_ints(&mut socket, 3).await?;
                let payload = read_payload(&mut socket).await?;
                state.lock().unwrap().cubes.insert((c[0], c[1], c[2]), payload);
                None
            }
            0x09 => {
                let c = read_ints(&mut socket, 2).await?;
                let payload = read_payload(&mut socket).await?;
                state.lock().unwrap().columns.insert((c[0], c[1]), payload);
                None
            }
            other => panic!("mock server got unknown opcode {:#04x}", other),
        };

        if let Some(reply) = reply {
            let reply = if state.lock().unwrap().closing {
                vec![CLOSING]
            } else {
                reply
            };
            socket.write_all(&reply).await?;
        }
    }
}

/// A fresh empty world directory, removed when the returned guard drops.
pub fn temp_world(name: &str) -> (TempDir, PathBuf) {
    let guard = tempfile::Builder::new()
        .prefix(&format!("tallworld-it-{}-", name))
        .tempdir()
        .unwrap();
    let dir = guard.path().to_path_buf();
    (guard, dir)
}
