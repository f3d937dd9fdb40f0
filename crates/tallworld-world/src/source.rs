use std::collections::HashSet;
use std::io::{Read, Write};
use tallworld_common::{ColumnCoord, CubeCoord, Result};
use tallworld_nbt::Tag;
use tallworld_protocol::ProtocolClient;

/// Where the caches get chunk data from and write it back to.
pub trait ChunkSource {
    /// `Ok(None)` when nothing exists at `coord`.
    fn fetch_column(&mut self, coord: ColumnCoord) -> Result<Option<Tag>>;
    /// `Ok(None)` when nothing exists at `coord`.
    fn fetch_cube(&mut self, coord: CubeCoord) -> Result<Option<Tag>>;
    fn column_coordinates(&mut self) -> Result<HashSet<ColumnCoord>>;
    fn cube_coordinates(&mut self) -> Result<HashSet<CubeCoord>>;
    fn store_column(&mut self, coord: ColumnCoord, bytes: &[u8]) -> Result<()>;
    fn store_cube(&mut self, coord: CubeCoord, bytes: &[u8]) -> Result<()>;
}

impl<S: Read + Write> ChunkSource for ProtocolClient<S> {
    fn fetch_column(&mut self, coord: ColumnCoord) -> Result<Option<Tag>> {
        self.get_column(coord)
    }

    fn fetch_cube(&mut self, coord: CubeCoord) -> Result<Option<Tag>> {
        self.get_cube(coord)
    }

    fn column_coordinates(&mut self) -> Result<HashSet<ColumnCoord>> {
        self.list_column_coordinates()
    }

    fn cube_coordinates(&mut self) -> Result<HashSet<CubeCoord>> {
        self.list_cube_coordinates()
    }

    fn store_column(&mut self, coord: ColumnCoord, bytes: &[u8]) -> Result<()> {
        self.save_column(coord, bytes)
    }

    fn store_cube(&mut self, coord: CubeCoord, bytes: &[u8]) -> Result<()> {
        self.save_cube(coord, bytes)
    }
}
