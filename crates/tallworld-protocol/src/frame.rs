use crate::opcode::{ResponseFamily, ResponseKind};
use bytes::{Buf, Bytes, BytesMut};
use std::io::{self, Read};
use tallworld_common::{Result, TallWorldError};

/// Largest payload accepted in one reply. Longer lengths are treated as a desynced stream.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

/// Reads exactly `n` bytes, accumulating across partial reads.
/// A zero-length read before `n` bytes arrived means the peer hung up.
pub fn recv_exact<R: Read>(reader: &mut R, n: usize) -> Result<BytesMut> {
    let mut buffer = BytesMut::zeroed(n);
    let mut filled = 0;
    while filled < n {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => return Err(TallWorldError::ConnectionClosed),
            Ok(read) => filled += read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buffer)
}

fn recv_i32<R: Read>(reader: &mut R) -> Result<i32> {
    Ok(recv_exact(reader, 4)?.get_i32())
}

fn recv_len<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let value = recv_i32(reader)?;
    usize::try_from(value)
        .map_err(|_| TallWorldError::Protocol(format!("Negative {}: {}", what, value)))
}

fn check_payload_len(length: usize) -> Result<usize> {
    if length > MAX_PAYLOAD_LEN {
        return Err(TallWorldError::Protocol(format!(
            "Payload of {} bytes exceeds the {} byte limit",
            length, MAX_PAYLOAD_LEN
        )));
    }
    Ok(length)
}

/// One decoded server reply: its packet id and the raw bytes that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolFrame {
    pub packet_id: u8,
    pub kind: ResponseKind,
    /// NBT bytes for `Found`, the packed tuples for `CoordinateList`, otherwise None.
    pub payload: Option<Bytes>,
    /// Number of tuples in a `CoordinateList` payload.
    pub count: usize,
}

impl ProtocolFrame {
    /// Reads one reply of the given family. Closing and unknown packet ids are
    /// returned as errors; not-found is a normal frame without payload.
    pub fn read<R: Read>(reader: &mut R, family: ResponseFamily) -> Result<Self> {
        let packet_id = recv_exact(reader, 1)?[0];
        let kind = family.classify(packet_id);
        match kind {
            ResponseKind::Closing => Err(TallWorldError::ServerClosing),
            ResponseKind::Unexpected => Err(TallWorldError::Protocol(format!(
                "Invalid reply id 0x{:02x}",
                packet_id
            ))),
            ResponseKind::NotFound => Ok(Self {
                packet_id,
                kind,
                payload: None,
                count: 0,
            }),
            ResponseKind::Found => {
                let length = check_payload_len(recv_len(reader, "payload length")?)?;
                let payload = recv_exact(reader, length)?.freeze();
                Ok(Self {
                    packet_id,
                    kind,
                    payload: Some(payload),
                    count: 0,
                })
            }
            ResponseKind::CoordinateList => {
                let tuple_size = match family {
                    ResponseFamily::Enumeration { tuple_size } => tuple_size,
                    ResponseFamily::Chunk => {
                        return Err(TallWorldError::Protocol(
                            "Coordinate list in reply to a chunk request".to_owned(),
                        ))
                    }
                };
                let count = recv_len(reader, "coordinate count")?;
                let length = count.checked_mul(tuple_size).ok_or_else(|| {
                    TallWorldError::Protocol(format!("Coordinate count too large: {}", count))
                })?;
                let payload = recv_exact(reader, check_payload_len(length)?)?.freeze();
                Ok(Self {
                    packet_id,
                    kind,
                    payload: Some(payload),
                    count,
                })
            }
        }
    }
}
