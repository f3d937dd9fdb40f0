/// Request opcodes understood by the data server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    GetCube,
    GetColumn,
    ListCubeCoordinates,
    ListColumnCoordinates,
    SaveCube,
    SaveColumn,
}

/// Sent unframed right before the client closes its socket.
pub const DISCONNECT_BYTE: u8 = 0x00;

/// The server is shutting down. Shared by every response family.
pub const PACKET_CLOSING: u8 = 0x10;
pub const PACKET_NOT_FOUND: u8 = 0x14;
pub const PACKET_FOUND: u8 = 0x15;
pub const PACKET_COORDINATE_LIST: u8 = 0x16;

impl Opcode {
    pub fn id(self) -> u8 {
        match self {
            Opcode::GetCube => 0x04,
            Opcode::GetColumn => 0x05,
            Opcode::ListCubeCoordinates => 0x06,
            Opcode::ListColumnCoordinates => 0x07,
            Opcode::SaveCube => 0x08,
            Opcode::SaveColumn => 0x09,
        }
    }

    /// The kind of reply the server sends, or None for fire-and-forget requests.
    pub fn response_family(self) -> Option<ResponseFamily> {
        match self {
            Opcode::GetCube | Opcode::GetColumn => Some(ResponseFamily::Chunk),
            Opcode::ListCubeCoordinates => Some(ResponseFamily::Enumeration { tuple_size: 12 }),
            Opcode::ListColumnCoordinates => Some(ResponseFamily::Enumeration { tuple_size: 8 }),
            Opcode::SaveCube | Opcode::SaveColumn => None,
        }
    }

    pub fn expects_response(self) -> bool {
        self.response_family().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFamily {
    /// Closing, found (length + NBT payload) or not-found.
    Chunk,
    /// Closing or a count followed by `tuple_size`-byte coordinate tuples.
    Enumeration { tuple_size: usize },
}

/// How a packet id is to be handled within a response family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Closing,
    Found,
    NotFound,
    CoordinateList,
    Unexpected,
}

impl ResponseFamily {
    pub fn classify(self, packet_id: u8) -> ResponseKind {
        match (self, packet_id) {
            (_, PACKET_CLOSING) => ResponseKind::Closing,
            (ResponseFamily::Chunk, PACKET_FOUND) => ResponseKind::Found,
            (ResponseFamily::Chunk, PACKET_NOT_FOUND) => ResponseKind::NotFound,
            (ResponseFamily::Enumeration { .. }, PACKET_COORDINATE_LIST) => {
                ResponseKind::CoordinateList
            }
            _ => ResponseKind::Unexpected,
        }
    }
}
