/// A block type known to the height map and light code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Material {
    pub id: u16,
    pub name: &'static str,
    /// Light absorbed by the block, 0 (transparent) to 15 (opaque).
    pub opacity: u8,
}

mod builtin {
    use super::Material;
    include!(concat!(env!("OUT_DIR"), "/materials.rs"));
}
pub use builtin::MATERIALS;

/// Ids that fit in a cube's Blocks + Add arrays.
pub const MAX_BLOCK_IDS: usize = 4096;

/// Opacity of ids missing from the table.
pub const DEFAULT_OPACITY: u8 = 15;

/// Lookup table from block id to light opacity.
#[derive(Debug, Clone)]
pub struct MaterialTable {
    opacity: Vec<u8>,
}

impl MaterialTable {
    /// Table built from `materials.json`.
    pub fn builtin() -> Self {
        let mut table = Self {
            opacity: vec![DEFAULT_OPACITY; MAX_BLOCK_IDS],
        };
        for material in MATERIALS {
            table.set_opacity(material.id, material.opacity);
        }
        table
    }

    pub fn set_opacity(&mut self, id: u16, opacity: u8) {
        if let Some(slot) = self.opacity.get_mut(id as usize) {
            *slot = opacity.min(15);
        }
    }

    pub fn with_opacity(mut self, id: u16, opacity: u8) -> Self {
        self.set_opacity(id, opacity);
        self
    }

    pub fn opacity(&self, id: u16) -> u8 {
        self.opacity.get(id as usize).copied().unwrap_or(DEFAULT_OPACITY)
    }

    pub fn name(id: u16) -> Option<&'static str> {
        MATERIALS
            .binary_search_by_key(&id, |m| m.id)
            .ok()
            .map(|index| MATERIALS[index].name)
    }
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self::builtin()
    }
}
