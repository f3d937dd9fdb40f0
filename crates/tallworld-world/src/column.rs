use crate::cube::Cube;
use std::collections::btree_map::{self, BTreeMap};
use tallworld_common::{ColumnCoord, Result};
use tallworld_nbt::{NbtFile, Tag};

/// A vertical stack of cubes. The column owns the cubes loaded so far; cubes refer
/// back to it only through their coordinate.
#[derive(Debug, Clone)]
pub struct Column {
    coord: ColumnCoord,
    /// None when the server reported nothing at this position.
    tag: Option<Tag>,
    cubes: BTreeMap<i32, Cube>,
    dirty: bool,
}

fn skeleton(coord: ColumnCoord) -> Tag {
    let mut level = Tag::compound();
    level.insert("xPos", Tag::Int(coord.cx));
    level.insert("zPos", Tag::Int(coord.cz));
    let mut root = Tag::compound();
    root.insert("Level", level);
    root
}

impl Column {
    pub fn new(coord: ColumnCoord, tag: Option<Tag>) -> Self {
        Self {
            coord,
            tag,
            cubes: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn coord(&self) -> ColumnCoord {
        self.coord
    }

    /// Whether the server had data for this column.
    pub fn exists(&self) -> bool {
        self.tag.is_some()
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    /// Mutable access to the column tag, creating an empty one if needed. Marks the column dirty.
    pub fn tag_mut(&mut self) -> &mut Tag {
        self.dirty = true;
        let coord = self.coord;
        self.tag.get_or_insert_with(|| skeleton(coord))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn cube(&self, cy: i32) -> Option<&Cube> {
        self.cubes.get(&cy)
    }

    pub fn cube_mut(&mut self, cy: i32) -> Option<&mut Cube> {
        self.cubes.get_mut(&cy)
    }

    /// Loaded cubes, bottom to top.
    pub fn cubes(&self) -> impl Iterator<Item = &Cube> {
        self.cubes.values()
    }

    pub fn loaded_cube_count(&self) -> usize {
        self.cubes.len()
    }

    /// Returns the cube at `cy`, calling `load` only if it is not cached yet.
    pub(crate) fn cube_or_load<F>(&mut self, cy: i32, load: F) -> Result<&mut Cube>
    where
        F: FnOnce() -> Result<Cube>,
    {
        match self.cubes.entry(cy) {
            btree_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
            btree_map::Entry::Vacant(entry) => Ok(entry.insert(load()?)),
        }
    }

    /// NBT bytes for a SaveColumn request.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let root = match &self.tag {
            Some(tag) => tag.clone(),
            None => skeleton(self.coord),
        };
        Ok(NbtFile::new(String::new(), root).to_bytes()?)
    }
}
