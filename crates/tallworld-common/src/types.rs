use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, crate::error::TallWorldError>;

/// Position of a column, in chunk units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnCoord {
    pub cx: i32,
    pub cz: i32,
}

/// Position of a cube, in chunk units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CubeCoord {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ColumnCoord {
    pub fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    pub fn cube(&self, cy: i32) -> CubeCoord {
        CubeCoord::new(self.cx, cy, self.cz)
    }
}

impl CubeCoord {
    pub fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    /// The column this cube belongs to.
    pub fn column(&self) -> ColumnCoord {
        ColumnCoord::new(self.cx, self.cz)
    }
}

impl fmt::Display for ColumnCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.cx, self.cz)
    }
}

impl fmt::Display for CubeCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.cx, self.cy, self.cz)
    }
}
