use crate::frame::ProtocolFrame;
use crate::opcode::{ResponseKind, DISCONNECT_BYTE};
use crate::request::Request;
use bytes::{Buf, Bytes};
use std::collections::HashSet;
use std::hash::Hash;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use tallworld_common::{ColumnCoord, CubeCoord, Result, TallWorldError};
use tallworld_logger::{log, LogSeverity::*};
use tallworld_nbt::{NbtFile, Tag};

/// Whether the connection may still carry requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Ready,
    /// The server sent its closing packet.
    ServerClosing,
    /// The peer hung up mid-frame.
    ConnectionClosed,
    /// A malformed frame or a failed socket call left the stream out of sync.
    Desynced,
}

/// Blocking client for the data server. Exactly one request is in flight at a time:
/// every call writes its request and, if the opcode defines one, reads the reply
/// before returning.
pub struct ProtocolClient<S = TcpStream> {
    stream: S,
    state: ClientState,
}

impl ProtocolClient<TcpStream> {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S: Read + Write> ProtocolClient<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            state: ClientState::Ready,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            ClientState::Ready => Ok(()),
            ClientState::ServerClosing => Err(TallWorldError::ServerClosing),
            ClientState::ConnectionClosed => Err(TallWorldError::ConnectionClosed),
            ClientState::Desynced => Err(TallWorldError::Protocol(
                "Connection is out of sync after an earlier failure".to_owned(),
            )),
        }
    }

    /// Records a failure so that no further request is written to a broken stream.
    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.state = match err {
                TallWorldError::ServerClosing => {
                    log("Data server closing".to_owned(), Warning);
                    ClientState::ServerClosing
                }
                TallWorldError::ConnectionClosed => ClientState::ConnectionClosed,
                TallWorldError::Protocol(msg) => {
                    log(msg.clone(), Error);
                    ClientState::Desynced
                }
                _ => ClientState::Desynced,
            };
        }
        result
    }

    /// Writes one request as a single unit.
    pub fn send_request(&mut self, request: &Request) -> Result<()> {
        self.ensure_ready()?;
        let encoded = request.encode();
        let result = self
            .stream
            .write_all(&encoded)
            .and_then(|_| self.stream.flush())
            .map_err(TallWorldError::from);
        self.track(result)
    }

    /// Sends a request and reads its reply. Requests without a reply return None
    /// as soon as they are written.
    pub fn request(&mut self, request: &Request) -> Result<Option<ProtocolFrame>> {
        self.send_request(request)?;
        match request.opcode().response_family() {
            Some(family) => {
                let frame = ProtocolFrame::read(&mut self.stream, family);
                self.track(frame).map(Some)
            }
            None => Ok(None),
        }
    }

    fn fetch_chunk(&mut self, request: &Request) -> Result<Option<Tag>> {
        let frame = match self.request(request)? {
            Some(frame) => frame,
            None => return Ok(None),
        };
        match (frame.kind, frame.payload) {
            (ResponseKind::Found, Some(payload)) => NbtFile::from_bytes(&payload)
                .map(|file| Some(file.root))
                .map_err(|e| TallWorldError::Nbt(format!("Bad payload for {:?}: {}", request.opcode(), e))),
            _ => Ok(None),
        }
    }

    /// Fetches a cube. `Ok(None)` means nothing was generated there.
    pub fn get_cube(&mut self, coord: CubeCoord) -> Result<Option<Tag>> {
        self.fetch_chunk(&Request::GetCube(coord))
    }

    /// Fetches a column. `Ok(None)` means nothing was generated there.
    pub fn get_column(&mut self, coord: ColumnCoord) -> Result<Option<Tag>> {
        self.fetch_chunk(&Request::GetColumn(coord))
    }

    fn fetch_coordinates<T, F>(&mut self, request: &Request, parse: F) -> Result<HashSet<T>>
    where
        T: Eq + Hash,
        F: Fn(&mut Bytes) -> T,
    {
        let mut coords = HashSet::new();
        let Some(frame) = self.request(request)? else {
            return Ok(coords);
        };
        let mut payload = frame.payload.unwrap_or_default();
        coords.reserve(frame.count);
        for _ in 0..frame.count {
            coords.insert(parse(&mut payload));
        }
        if coords.len() != frame.count {
            log(
                format!(
                    "{:?} returned {} duplicate coordinates",
                    request.opcode(),
                    frame.count - coords.len()
                ),
                Debug,
            );
        }
        Ok(coords)
    }

    /// Every cube the server holds. Duplicates on the wire are collapsed.
    pub fn list_cube_coordinates(&mut self) -> Result<HashSet<CubeCoord>> {
        self.fetch_coordinates(&Request::ListCubeCoordinates, |buf| {
            CubeCoord::new(buf.get_i32(), buf.get_i32(), buf.get_i32())
        })
    }

    /// Every column the server holds. Duplicates on the wire are collapsed.
    pub fn list_column_coordinates(&mut self) -> Result<HashSet<ColumnCoord>> {
        self.fetch_coordinates(&Request::ListColumnCoordinates, |buf| {
            ColumnCoord::new(buf.get_i32(), buf.get_i32())
        })
    }

    /// Sends cube bytes. The server does not answer, so this never blocks on a read.
    pub fn save_cube(&mut self, coord: CubeCoord, payload: &[u8]) -> Result<()> {
        self.send_request(&Request::SaveCube(coord, payload))
    }

    pub fn save_column(&mut self, coord: ColumnCoord, payload: &[u8]) -> Result<()> {
        self.send_request(&Request::SaveColumn(coord, payload))
    }

    /// Sends the unframed disconnect byte and drops the stream.
    pub fn close(mut self) -> Result<()> {
        if self.state == ClientState::ConnectionClosed {
            return Ok(());
        }
        self.stream.write_all(&[DISCONNECT_BYTE])?;
        self.stream.flush()?;
        Ok(())
    }
}
