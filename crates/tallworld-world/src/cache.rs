use crate::column::Column;
use crate::cube::Cube;
use crate::materials::MaterialTable;
use crate::source::ChunkSource;
use std::collections::hash_map::{self, HashMap};
use std::collections::HashSet;
use tallworld_common::{ColumnCoord, CubeCoord, Result};

/// Lazily filled columns and cubes for one world session. Entries are created on
/// first access and kept until the cache is dropped; nothing is evicted.
#[derive(Debug, Default)]
pub struct WorldCache {
    materials: MaterialTable,
    columns: HashMap<ColumnCoord, Column>,
    cube_index: Option<HashSet<CubeCoord>>,
    column_index: Option<HashSet<ColumnCoord>>,
}

fn column_or_load<'a>(
    columns: &'a mut HashMap<ColumnCoord, Column>,
    source: &mut dyn ChunkSource,
    coord: ColumnCoord,
) -> Result<&'a mut Column> {
    match columns.entry(coord) {
        hash_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
        hash_map::Entry::Vacant(entry) => {
            let tag = source.fetch_column(coord)?;
            Ok(entry.insert(Column::new(coord, tag)))
        }
    }
}

impl WorldCache {
    pub fn new(materials: MaterialTable) -> Self {
        Self {
            materials,
            ..Self::default()
        }
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    /// The column at `coord`, fetched on first access. Columns the server does not
    /// have are cached too; check [`Column::exists`].
    pub fn column(&mut self, source: &mut dyn ChunkSource, coord: ColumnCoord) -> Result<&mut Column> {
        column_or_load(&mut self.columns, source, coord)
    }

    /// The cube at `coord`, fetched on first access together with its column.
    pub fn cube(&mut self, source: &mut dyn ChunkSource, coord: CubeCoord) -> Result<&mut Cube> {
        let column = column_or_load(&mut self.columns, source, coord.column())?;
        let materials = &self.materials;
        column.cube_or_load(coord.cy, || {
            let tag = source.fetch_cube(coord)?;
            Cube::from_tag(coord, tag, materials)
        })
    }

    pub fn loaded_column(&self, coord: ColumnCoord) -> Option<&Column> {
        self.columns.get(&coord)
    }

    pub fn loaded_column_mut(&mut self, coord: ColumnCoord) -> Option<&mut Column> {
        self.columns.get_mut(&coord)
    }

    pub fn loaded_cube_mut(&mut self, coord: CubeCoord) -> Option<&mut Cube> {
        self.columns.get_mut(&coord.column())?.cube_mut(coord.cy)
    }

    pub fn loaded_column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn loaded_cube_count(&self) -> usize {
        self.columns.values().map(Column::loaded_cube_count).sum()
    }

    /// Every cube the server holds, listed once and then cached.
    pub fn cube_coordinates(&mut self, source: &mut dyn ChunkSource) -> Result<&HashSet<CubeCoord>> {
        if self.cube_index.is_none() {
            self.cube_index = Some(source.cube_coordinates()?);
        }
        Ok(self.cube_index.get_or_insert_with(HashSet::new))
    }

    /// Every column the server holds, listed once and then cached.
    pub fn column_coordinates(&mut self, source: &mut dyn ChunkSource) -> Result<&HashSet<ColumnCoord>> {
        if self.column_index.is_none() {
            self.column_index = Some(source.column_coordinates()?);
        }
        Ok(self.column_index.get_or_insert_with(HashSet::new))
    }

    pub fn contains_cube(&mut self, source: &mut dyn ChunkSource, coord: CubeCoord) -> Result<bool> {
        Ok(self.cube_coordinates(source)?.contains(&coord))
    }

    pub fn contains_column(&mut self, source: &mut dyn ChunkSource, coord: ColumnCoord) -> Result<bool> {
        Ok(self.column_coordinates(source)?.contains(&coord))
    }

    /// Keeps an already listed index in step with a cube that was just written.
    pub(crate) fn record_saved_cube(&mut self, coord: CubeCoord) {
        if let Some(index) = self.cube_index.as_mut() {
            index.insert(coord);
        }
        if let Some(index) = self.column_index.as_mut() {
            index.insert(coord.column());
        }
    }

    pub(crate) fn record_saved_column(&mut self, coord: ColumnCoord) {
        if let Some(index) = self.column_index.as_mut() {
            index.insert(coord);
        }
    }

    /// Coordinates of every loaded cube whose dirty flag is set, sorted.
    pub fn dirty_cubes(&self) -> Vec<CubeCoord> {
        let mut dirty: Vec<CubeCoord> = self
            .columns
            .values()
            .flat_map(Column::cubes)
            .filter(|cube| cube.is_dirty())
            .map(Cube::coord)
            .collect();
        dirty.sort();
        dirty
    }

    /// Coordinates of every loaded column whose dirty flag is set, sorted.
    pub fn dirty_columns(&self) -> Vec<ColumnCoord> {
        let mut dirty: Vec<ColumnCoord> = self
            .columns
            .values()
            .filter(|column| column.is_dirty())
            .map(Column::coord)
            .collect();
        dirty.sort();
        dirty
    }
}
