use crate::opcode::Opcode;
use bytes::{BufMut, BytesMut};
use tallworld_common::{ColumnCoord, CubeCoord};

/// A single client request. Fields are written as big-endian i32s after the opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    GetCube(CubeCoord),
    GetColumn(ColumnCoord),
    ListCubeCoordinates,
    ListColumnCoordinates,
    SaveCube(CubeCoord, &'a [u8]),
    SaveColumn(ColumnCoord, &'a [u8]),
}

impl Request<'_> {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::GetCube(_) => Opcode::GetCube,
            Request::GetColumn(_) => Opcode::GetColumn,
            Request::ListCubeCoordinates => Opcode::ListCubeCoordinates,
            Request::ListColumnCoordinates => Opcode::ListColumnCoordinates,
            Request::SaveCube(..) => Opcode::SaveCube,
            Request::SaveColumn(..) => Opcode::SaveColumn,
        }
    }

    /// Encodes the whole request so it can be written in one call.
    pub fn write_to_buffer(&self, buffer: &mut BytesMut) {
        buffer.put_u8(self.opcode().id());
        match self {
            Request::GetCube(coord) => put_cube(buffer, coord),
            Request::GetColumn(coord) => put_column(buffer, coord),
            Request::ListCubeCoordinates | Request::ListColumnCoordinates => {}
            Request::SaveCube(coord, payload) => {
                put_cube(buffer, coord);
                put_payload(buffer, payload);
            }
            Request::SaveColumn(coord, payload) => {
                put_column(buffer, coord);
                put_payload(buffer, payload);
            }
        }
    }

    pub fn encode(&self) -> BytesMut {
        let mut buffer = BytesMut::with_capacity(self.encoded_len());
        self.write_to_buffer(&mut buffer);
        buffer
    }

    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Request::GetCube(_) => 12,
            Request::GetColumn(_) => 8,
            Request::ListCubeCoordinates | Request::ListColumnCoordinates => 0,
            Request::SaveCube(_, payload) => 16 + payload.len(),
            Request::SaveColumn(_, payload) => 12 + payload.len(),
        }
    }
}

fn put_cube(buffer: &mut BytesMut, coord: &CubeCoord) {
    buffer.put_i32(coord.cx);
    buffer.put_i32(coord.cy);
    buffer.put_i32(coord.cz);
}

fn put_column(buffer: &mut BytesMut, coord: &ColumnCoord) {
    buffer.put_i32(coord.cx);
    buffer.put_i32(coord.cz);
}

fn put_payload(buffer: &mut BytesMut, payload: &[u8]) {
    buffer.put_i32(payload.len() as i32);
    buffer.put_slice(payload);
}
