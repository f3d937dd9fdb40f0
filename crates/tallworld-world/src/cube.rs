use crate::materials::MaterialTable;
use crate::voxel::{
    heightmap, local_index, local_to_wire, pack_nibbles, unpack_nibbles, wire_to_local,
    CUBE_EDGE, CUBE_VOLUME, HEIGHT_MAP_LEN, NIBBLE_ARRAY_LEN,
};
use tallworld_common::{CubeCoord, Result, TallWorldError};
use tallworld_nbt::{NbtFile, Tag};

/// Largest id the Blocks and Add arrays can hold.
pub const MAX_BLOCK_ID: u16 = 0x0FFF;

const LEVEL: &str = "Level";
const SECTIONS: &str = "Sections";
const BLOCKS: &str = "Blocks";
const ADD: &str = "Add";
const DATA: &str = "Data";
const SKY_LIGHT: &str = "SkyLight";
const BLOCK_LIGHT: &str = "BlockLight";

/// A 16x16x16 block of voxels. All arrays are in local (x, z, y) order and hold
/// one value per cell.
#[derive(Debug, Clone)]
pub struct Cube {
    coord: CubeCoord,
    blocks: Vec<u16>,
    data: Vec<u8>,
    sky_light: Vec<u8>,
    block_light: Vec<u8>,
    height_map: Vec<u8>,
    /// The tag tree the server sent, kept so unknown tags survive a save.
    tag: Option<Tag>,
    dirty: bool,
}

pub(crate) fn encode(root: Tag) -> Result<Vec<u8>> {
    Ok(NbtFile::new(String::new(), root).to_bytes()?)
}

/// Returns the named array of a section, checking its length.
fn section_array<'a>(section: Option<&'a Tag>, key: &str, len: usize) -> Result<Option<&'a [u8]>> {
    let Some(tag) = section.and_then(|s| s.get(key)) else {
        return Ok(None);
    };
    let bytes = tag
        .as_byte_array()
        .ok_or_else(|| TallWorldError::Nbt(format!("{} is not a byte array", key)))?;
    if bytes.len() != len {
        return Err(TallWorldError::Nbt(format!(
            "{} holds {} bytes, expected {}",
            key,
            bytes.len(),
            len
        )));
    }
    Ok(Some(bytes))
}

fn decode_nibbles(section: Option<&Tag>, key: &str) -> Result<Vec<u8>> {
    Ok(match section_array(section, key, NIBBLE_ARRAY_LEN)? {
        Some(packed) => wire_to_local(&unpack_nibbles(packed)),
        None => vec![0; CUBE_VOLUME],
    })
}

fn cell(x: usize, y: usize, z: usize) -> usize {
    assert!(
        x < CUBE_EDGE && y < CUBE_EDGE && z < CUBE_EDGE,
        "cell ({}, {}, {}) is outside the cube",
        x,
        y,
        z
    );
    local_index(x, y, z)
}

impl Cube {
    /// An ungenerated cube: every array zeroed, nothing to preserve.
    pub fn empty(coord: CubeCoord) -> Self {
        Self {
            coord,
            blocks: vec![0; CUBE_VOLUME],
            data: vec![0; CUBE_VOLUME],
            sky_light: vec![0; CUBE_VOLUME],
            block_light: vec![0; CUBE_VOLUME],
            height_map: vec![0; HEIGHT_MAP_LEN],
            tag: None,
            dirty: false,
        }
    }

    /// Builds a cube from the tag tree returned by the server, or an empty one
    /// when the server had nothing at this coordinate.
    pub fn from_tag(coord: CubeCoord, tag: Option<Tag>, materials: &MaterialTable) -> Result<Self> {
        let Some(tag) = tag else {
            return Ok(Self::empty(coord));
        };

        let section = tag
            .get(LEVEL)
            .and_then(|level| level.get(SECTIONS))
            .and_then(Tag::as_list)
            .and_then(|sections| sections.first());

        let blocks = match section_array(section, BLOCKS, CUBE_VOLUME)? {
            Some(low) => {
                let high = section_array(section, ADD, NIBBLE_ARRAY_LEN)?
                    .map(unpack_nibbles)
                    .unwrap_or_else(|| vec![0; CUBE_VOLUME]);
                let ids: Vec<u16> = low
                    .iter()
                    .zip(&high)
                    .map(|(&lo, &hi)| u16::from(lo) | (u16::from(hi) << 8))
                    .collect();
                wire_to_local(&ids)
            }
            None => vec![0; CUBE_VOLUME],
        };
        let data = decode_nibbles(section, DATA)?;
        let sky_light = decode_nibbles(section, SKY_LIGHT)?;
        let block_light = decode_nibbles(section, BLOCK_LIGHT)?;
        let height_map = heightmap(materials, &blocks);

        Ok(Self {
            coord,
            blocks,
            data,
            sky_light,
            block_light,
            height_map,
            tag: Some(tag),
            dirty: false,
        })
    }

    pub fn coord(&self) -> CubeCoord {
        self.coord
    }

    /// False for cubes the server reported as not found, until they are saved.
    pub fn is_generated(&self) -> bool {
        self.tag.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Records that `tag` was sent to the server. The cube counts as generated from now on.
    pub(crate) fn mark_saved(&mut self, tag: Tag) {
        self.tag = Some(tag);
        self.dirty = false;
    }

    pub fn blocks(&self) -> &[u16] {
        &self.blocks
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn sky_light(&self) -> &[u8] {
        &self.sky_light
    }

    pub fn block_light(&self) -> &[u8] {
        &self.block_light
    }

    /// Computed when the cube was loaded; see [`Cube::refresh_height_map`].
    pub fn height_map(&self) -> &[u8] {
        &self.height_map
    }

    // In-place access for editing tools. Handing out a mutable array marks the cube dirty.

    pub fn blocks_mut(&mut self) -> &mut [u16] {
        self.dirty = true;
        &mut self.blocks
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.data
    }

    pub fn sky_light_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.sky_light
    }

    pub fn block_light_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.block_light
    }

    // Cell accessors panic on coordinates outside 0..16, like slice indexing.

    pub fn block(&self, x: usize, y: usize, z: usize) -> u16 {
        self.blocks[cell(x, y, z)]
    }

    pub fn set_block(&mut self, x: usize, y: usize, z: usize, id: u16) {
        let index = cell(x, y, z);
        self.blocks_mut()[index] = id;
    }

    pub fn block_data(&self, x: usize, y: usize, z: usize) -> u8 {
        self.data[cell(x, y, z)]
    }

    pub fn set_block_data(&mut self, x: usize, y: usize, z: usize, value: u8) {
        let index = cell(x, y, z);
        self.data_mut()[index] = value & 0x0F;
    }

    pub fn refresh_height_map(&mut self, materials: &MaterialTable) {
        self.height_map = heightmap(materials, &self.blocks);
    }

    /// The tag tree to send back to the server. Tags other than the four voxel
    /// arrays are carried over from the loaded tree. `Add` is only written when
    /// some id exceeds 255; ids above `MAX_BLOCK_ID` cannot be stored and fail.
    pub fn to_tag(&self) -> Result<Tag> {
        if let Some(index) = self.blocks.iter().position(|&id| id > MAX_BLOCK_ID) {
            return Err(TallWorldError::Nbt(format!(
                "Block id {} at local index {} of cube {} does not fit in 12 bits",
                self.blocks[index], index, self.coord
            )));
        }

        let mut root = self.tag.clone().unwrap_or_else(Tag::compound);
        if root.get(LEVEL).and_then(Tag::as_compound).is_none() {
            root.insert(LEVEL, Tag::compound());
        }

        let wire_blocks = local_to_wire(&self.blocks);
        let low: Vec<u8> = wire_blocks.iter().map(|&id| (id & 0xFF) as u8).collect();
        let high: Vec<u8> = wire_blocks.iter().map(|&id| ((id >> 8) & 0x0F) as u8).collect();

        if let Some(level) = root.get_mut(LEVEL) {
            level.insert("x", Tag::Int(self.coord.cx));
            level.insert("y", Tag::Int(self.coord.cy));
            level.insert("z", Tag::Int(self.coord.cz));

            let mut section = level
                .get(SECTIONS)
                .and_then(Tag::as_list)
                .and_then(|sections| sections.first())
                .filter(|s| s.as_compound().is_some())
                .cloned()
                .unwrap_or_else(Tag::compound);

            section.insert(BLOCKS, Tag::ByteArray(low));
            if high.iter().any(|&h| h != 0) {
                section.insert(ADD, Tag::ByteArray(pack_nibbles(&high)));
            } else if let Some(map) = section.as_compound_mut() {
                map.remove(ADD);
            }
            section.insert(DATA, Tag::ByteArray(pack_nibbles(&local_to_wire(&self.data))));
            section.insert(SKY_LIGHT, Tag::ByteArray(pack_nibbles(&local_to_wire(&self.sky_light))));
            section.insert(
                BLOCK_LIGHT,
                Tag::ByteArray(pack_nibbles(&local_to_wire(&self.block_light))),
            );

            level.insert(SECTIONS, Tag::List(vec![section]));
        }
        Ok(root)
    }

    /// Uncompressed NBT bytes for a SaveCube request.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(self.to_tag()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::wire_index;
    use assert_matches::assert_matches;

    fn wire_section() -> Tag {
        let mut blocks = vec![0u8; CUBE_VOLUME];
        let mut add = vec![0u8; CUBE_VOLUME];
        let mut data = vec![0u8; CUBE_VOLUME];
        // stone at x=1, y=2, z=3 with data 5
        blocks[wire_index(1, 2, 3)] = 1;
        data[wire_index(1, 2, 3)] = 5;
        // id 0x1A2 at x=15, y=0, z=0
        blocks[wire_index(15, 0, 0)] = 0xA2;
        add[wire_index(15, 0, 0)] = 0x1;

        let mut section = Tag::compound();
        section.insert("Y", Tag::Byte(0));
        section.insert(BLOCKS, Tag::ByteArray(blocks));
        section.insert(ADD, Tag::ByteArray(pack_nibbles(&add)));
        section.insert(DATA, Tag::ByteArray(pack_nibbles(&data)));
        section.insert(SKY_LIGHT, Tag::ByteArray(vec![0xFF; NIBBLE_ARRAY_LEN]));
        section
    }

    fn cube_tag(section: Option<Tag>) -> Tag {
        let mut level = Tag::compound();
        level.insert("Entities", Tag::List(vec![]));
        if let Some(section) = section {
            level.insert(SECTIONS, Tag::List(vec![section]));
        }
        let mut root = Tag::compound();
        root.insert(LEVEL, level);
        root
    }

    #[test]
    fn test_decode_swaps_axes_and_unpacks() {
        let coord = CubeCoord::new(2, -1, 4);
        let cube = Cube::from_tag(coord, Some(cube_tag(Some(wire_section()))), &MaterialTable::builtin())
            .unwrap();

        assert!(cube.is_generated());
        assert!(!cube.is_dirty());
        assert_eq!(cube.block(1, 2, 3), 1);
        assert_eq!(cube.block_data(1, 2, 3), 5);
        assert_eq!(cube.block(15, 0, 0), 0x1A2);
        assert_eq!(cube.block(3, 2, 1), 0);
        assert!(cube.sky_light().iter().all(|&l| l == 15));
        // BlockLight was absent
        assert!(cube.block_light().iter().all(|&l| l == 0));
        assert_eq!(cube.height_map()[1 * 16 + 3], 3);
        // id 0x1A2 is not in the table, so it blocks light
        assert_eq!(cube.height_map()[15 * 16], 1);
    }

    #[test]
    fn test_not_found_is_zeroed() {
        let cube = Cube::from_tag(CubeCoord::new(-7, -4, -6), None, &MaterialTable::builtin()).unwrap();
        assert!(!cube.is_generated());
        assert_eq!(cube.blocks().len(), CUBE_VOLUME);
        assert!(cube.blocks().iter().all(|&b| b == 0));
        assert!(cube.data().iter().all(|&b| b == 0));
        assert!(cube.height_map().iter().all(|&h| h == 0));
    }

    #[test]
    fn test_missing_sections_is_zeroed() {
        let cube = Cube::from_tag(CubeCoord::new(0, 0, 0), Some(cube_tag(None)), &MaterialTable::builtin())
            .unwrap();
        assert!(cube.is_generated());
        assert_eq!(cube.sky_light().len(), CUBE_VOLUME);
        assert!(cube.blocks().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_wrong_array_length_is_rejected() {
        let mut section = wire_section();
        section.insert(DATA, Tag::ByteArray(vec![0; 10]));
        assert_matches!(
            Cube::from_tag(CubeCoord::new(0, 0, 0), Some(cube_tag(Some(section))), &MaterialTable::builtin()),
            Err(TallWorldError::Nbt(msg)) if msg.contains("Data")
        );
    }

    #[test]
    fn test_mutation_marks_dirty() {
        let mut cube = Cube::empty(CubeCoord::new(0, 0, 0));
        assert!(!cube.is_dirty());
        cube.set_block(4, 5, 6, 3);
        assert!(cube.is_dirty());
        assert_eq!(cube.block(4, 5, 6), 3);

        let mut cube = Cube::empty(CubeCoord::new(0, 0, 0));
        cube.sky_light_mut()[0] = 15;
        assert!(cube.is_dirty());
        cube.mark_saved(cube.to_tag().unwrap());
        assert!(!cube.is_dirty());
        assert!(cube.is_generated());
    }

    #[test]
    fn test_encode_then_decode_preserves_arrays_and_extra_tags() {
        let materials = MaterialTable::builtin();
        let coord = CubeCoord::new(2, -1, 4);
        let mut cube = Cube::from_tag(coord, Some(cube_tag(Some(wire_section()))), &materials).unwrap();
        cube.set_block(7, 8, 9, 0x0FFF);
        cube.set_block_data(7, 8, 9, 0xC);
        cube.block_light_mut()[local_index(0, 15, 0)] = 9;

        let bytes = cube.to_bytes().unwrap();
        let decoded = NbtFile::from_bytes(&bytes).unwrap().root;
        let level = decoded.get(LEVEL).unwrap();
        assert!(level.get("Entities").is_some());
        assert_eq!(level.get("y"), Some(&Tag::Int(-1)));
        let section = &level.get(SECTIONS).and_then(Tag::as_list).unwrap()[0];
        assert_eq!(section.get("Y"), Some(&Tag::Byte(0)));

        let reloaded = Cube::from_tag(coord, Some(decoded), &materials).unwrap();
        assert_eq!(reloaded.blocks(), cube.blocks());
        assert_eq!(reloaded.data(), cube.data());
        assert_eq!(reloaded.sky_light(), cube.sky_light());
        assert_eq!(reloaded.block_light(), cube.block_light());
    }

    #[test]
    fn test_add_only_written_when_needed() {
        let mut cube = Cube::empty(CubeCoord::new(1, 2, 3));
        cube.set_block(0, 0, 0, 1);
        let tag = cube.to_tag().unwrap();
        let section = &tag.get(LEVEL).and_then(|l| l.get(SECTIONS)).and_then(Tag::as_list).unwrap()[0];
        assert!(section.get(ADD).is_none());
        assert_eq!(section.get(BLOCKS).and_then(Tag::as_byte_array).map(|b| b.len()), Some(CUBE_VOLUME));
        assert_eq!(tag.get(LEVEL).and_then(|l| l.get("x")), Some(&Tag::Int(1)));
    }

    #[test]
    fn test_block_id_too_wide_fails_to_encode() {
        let mut cube = Cube::empty(CubeCoord::new(0, 0, 0));
        cube.set_block(1, 2, 3, MAX_BLOCK_ID);
        assert!(cube.to_bytes().is_ok());

        cube.set_block(1, 2, 3, 0x1001);
        assert_matches!(cube.to_bytes(), Err(TallWorldError::Nbt(msg)) if msg.contains("4097"));
    }

    #[test]
    #[should_panic(expected = "outside the cube")]
    fn test_cell_outside_cube_panics() {
        let mut cube = Cube::empty(CubeCoord::new(0, 0, 0));
        cube.set_block(0, 16, 0, 7);
    }
}
