use crate::source::ChunkSource;
use std::collections::{HashMap, HashSet};
use tallworld_common::{ColumnCoord, CubeCoord, Result, TallWorldError};
use tallworld_nbt::{NbtFile, Tag};

/// In-memory chunk source that counts every call.
#[derive(Debug, Default)]
pub struct MemorySource {
    pub columns: HashMap<ColumnCoord, Tag>,
    pub cubes: HashMap<CubeCoord, Tag>,
    pub column_fetches: usize,
    pub cube_fetches: usize,
    pub listings: usize,
    pub stored_cubes: Vec<CubeCoord>,
    pub stored_columns: Vec<ColumnCoord>,
    /// Store calls fail once this many cubes were stored.
    pub fail_after: Option<usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cube(mut self, coord: CubeCoord, tag: Tag) -> Self {
        self.columns.entry(coord.column()).or_insert_with(Tag::compound);
        self.cubes.insert(coord, tag);
        self
    }
}

impl ChunkSource for MemorySource {
    fn fetch_column(&mut self, coord: ColumnCoord) -> Result<Option<Tag>> {
        self.column_fetches += 1;
        Ok(self.columns.get(&coord).cloned())
    }

    fn fetch_cube(&mut self, coord: CubeCoord) -> Result<Option<Tag>> {
        self.cube_fetches += 1;
        Ok(self.cubes.get(&coord).cloned())
    }

    fn column_coordinates(&mut self) -> Result<HashSet<ColumnCoord>> {
        self.listings += 1;
        Ok(self.columns.keys().copied().collect())
    }

    fn cube_coordinates(&mut self) -> Result<HashSet<CubeCoord>> {
        self.listings += 1;
        Ok(self.cubes.keys().copied().collect())
    }

    fn store_column(&mut self, coord: ColumnCoord, bytes: &[u8]) -> Result<()> {
        let file = NbtFile::from_bytes(bytes)?;
        self.columns.insert(coord, file.root);
        self.stored_columns.push(coord);
        Ok(())
    }

    fn store_cube(&mut self, coord: CubeCoord, bytes: &[u8]) -> Result<()> {
        if self.fail_after == Some(self.stored_cubes.len()) {
            return Err(TallWorldError::ConnectionClosed);
        }
        let file = NbtFile::from_bytes(bytes)?;
        self.cubes.insert(coord, file.root);
        self.stored_cubes.push(coord);
        Ok(())
    }
}
