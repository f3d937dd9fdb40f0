//! Stateless conversions between the wire layout of a cube and the in-memory one.
//!
//! The server stores cells in (y, z, x) order, `index = y*256 + z*16 + x`.
//! The editor works in (x, z, y) order, `index = x*256 + z*16 + y`.

use crate::materials::MaterialTable;

pub const CUBE_EDGE: usize = 16;
pub const CUBE_VOLUME: usize = CUBE_EDGE * CUBE_EDGE * CUBE_EDGE;
/// Size of a packed 4-bit array covering one cube.
pub const NIBBLE_ARRAY_LEN: usize = CUBE_VOLUME / 2;
pub const HEIGHT_MAP_LEN: usize = CUBE_EDGE * CUBE_EDGE;

#[inline]
pub fn wire_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < CUBE_EDGE && y < CUBE_EDGE && z < CUBE_EDGE);
    (y << 8) | (z << 4) | x
}

#[inline]
pub fn local_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < CUBE_EDGE && y < CUBE_EDGE && z < CUBE_EDGE);
    (x << 8) | (z << 4) | y
}

/// Splits every byte into two values, low nibble first.
pub fn unpack_nibbles(packed: &[u8]) -> Vec<u8> {
    let mut values = Vec::with_capacity(packed.len() * 2);
    for &byte in packed {
        values.push(byte & 0x0F);
        values.push(byte >> 4);
    }
    values
}

/// Packs pairs of values into one byte each, the even index in the low nibble.
/// Values are truncated to 4 bits; an odd trailing value gets a zero partner.
pub fn pack_nibbles(values: &[u8]) -> Vec<u8> {
    values
        .chunks(2)
        .map(|pair| {
            let low = pair[0] & 0x0F;
            let high = pair.get(1).copied().unwrap_or(0) & 0x0F;
            low | (high << 4)
        })
        .collect()
}

/// Reorders a full cube from (y, z, x) to (x, z, y).
pub fn wire_to_local<T: Copy + Default>(wire: &[T]) -> Vec<T> {
    debug_assert_eq!(wire.len(), CUBE_VOLUME);
    let mut local = vec![T::default(); CUBE_VOLUME];
    for y in 0..CUBE_EDGE {
        for z in 0..CUBE_EDGE {
            for x in 0..CUBE_EDGE {
                local[local_index(x, y, z)] = wire[wire_index(x, y, z)];
            }
        }
    }
    local
}

/// Reorders a full cube from (x, z, y) back to (y, z, x).
pub fn local_to_wire<T: Copy + Default>(local: &[T]) -> Vec<T> {
    debug_assert_eq!(local.len(), CUBE_VOLUME);
    let mut wire = vec![T::default(); CUBE_VOLUME];
    for y in 0..CUBE_EDGE {
        for z in 0..CUBE_EDGE {
            for x in 0..CUBE_EDGE {
                wire[wire_index(x, y, z)] = local[local_index(x, y, z)];
            }
        }
    }
    wire
}

/// Height of the topmost light-blocking cell in every (x, z) column of a cube,
/// indexed `x*16 + z`. The value is one above that cell, or 0 if every cell lets
/// light through. `blocks` is in local (x, z, y) order.
pub fn heightmap(materials: &MaterialTable, blocks: &[u16]) -> Vec<u8> {
    let mut heights = vec![0u8; HEIGHT_MAP_LEN];
    for (column, height) in heights.iter_mut().enumerate() {
        // In local order the 16 cells of one (x, z) column are contiguous.
        let cells = &blocks[column * CUBE_EDGE..(column + 1) * CUBE_EDGE];
        if let Some(top) = cells.iter().rposition(|&id| materials.opacity(id) > 0) {
            *height = (top + 1) as u8;
        }
    }
    heights
}
